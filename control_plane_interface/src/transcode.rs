//! Job submission to a transcoder instance.

use async_trait::async_trait;
use osc_shared_types::Result;
use serde::{Deserialize, Serialize};

use crate::ServiceAccessToken;

/// Transcoding job as accepted by the transcoder's jobs endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeJob {
    pub external_id: String,
    pub profile: String,
    pub output_url: String,
    pub base_name: String,
    pub progress_callback_uri: String,
    pub inputs: Vec<TranscodeInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeInput {
    pub uri: String,
    pub seek_to: u32,
    pub copy_ts: bool,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Acknowledgement returned by the transcoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedJob {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[async_trait]
pub trait TranscodeClient: Send + Sync {
    async fn submit_job(
        &self,
        jobs_url: &str,
        token: &ServiceAccessToken,
        job: &TranscodeJob,
    ) -> Result<SubmittedJob>;
}
