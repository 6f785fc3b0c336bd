//! VOD job MCP tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use osc_shared_types::Result;

use super::ToolCall;
use crate::validation::Violations;

/// Input for creating a VOD package
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateVodInput {
    /// Name of the pipeline
    pub pipeline: String,
    /// Source video URL
    pub source: String,
}

impl CreateVodInput {
    pub fn validate(self) -> Result<ToolCall> {
        let mut v = Violations::new();
        let pipeline = v.name("pipeline", &self.pipeline);
        let source = v.url("source", &self.source);
        v.finish(|| {
            Some(ToolCall::CreateVod {
                pipeline: pipeline?,
                source: source?,
            })
        })
    }
}
