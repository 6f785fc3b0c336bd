//! Submitting VOD packaging jobs to an existing pipeline.

use control_plane_interface::{ControlPlane, TranscodeClient, TranscodeInput, TranscodeJob};
use osc_shared_types::{Result, ServiceId};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::pipeline::VodPipeline;

/// Transcoding profile producing the ABR ladder the packager expects.
pub const PROFILE: &str = "program";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VodJob {
    /// External id, also the base name of every output file.
    pub id: String,
    /// Id assigned by the transcoder.
    pub job_id: String,
    /// Where the packaged VOD will appear.
    pub output_url: String,
}

fn external_id() -> String {
    Uuid::new_v4().simple().to_string().chars().take(12).collect()
}

/// Build the transcoding job for `source` on `pipeline`.
pub fn transcode_job(pipeline: &VodPipeline, id: &str, source: &str) -> TranscodeJob {
    TranscodeJob {
        external_id: id.to_string(),
        profile: PROFILE.to_string(),
        output_url: format!("/usercontent/{}/", id),
        base_name: id.to_string(),
        progress_callback_uri: pipeline.callback_url.clone(),
        inputs: vec![TranscodeInput {
            uri: source.to_string(),
            seek_to: 0,
            copy_ts: true,
            kind: "AudioVideo".to_string(),
        }],
    }
}

/// Submit `source` to the pipeline's transcoder. Packaging follows through
/// the callback listener once transcoding completes.
pub async fn create_vod(
    control_plane: &dyn ControlPlane,
    transcoder: &dyn TranscodeClient,
    pipeline: &VodPipeline,
    source: &str,
) -> Result<VodJob> {
    let id = external_id();
    let job = transcode_job(pipeline, &id, source);
    let token = control_plane
        .get_service_access_token(ServiceId::ENCORE)
        .await?;

    let submitted = transcoder.submit_job(&pipeline.jobs, &token, &job).await?;
    info!(pipeline = %pipeline.name, job_id = %submitted.id, "VOD job submitted");

    Ok(VodJob {
        output_url: format!("{}{}/", pipeline.output, id),
        id,
        job_id: submitted.id,
    })
}
