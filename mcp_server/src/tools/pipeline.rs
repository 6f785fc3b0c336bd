//! VOD pipeline MCP tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use osc_shared_types::{Result, TeardownReport};
use provisioner::OutputSpec;

use super::ToolCall;
use crate::validation::Violations;

/// Where the pipeline writes its packages
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct OutputInput {
    /// Output bucket, defaults to the pipeline name
    #[serde(default)]
    pub bucket: Option<String>,
}

/// Input for creating a VOD pipeline
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateVodPipelineInput {
    /// Name of the pipeline
    pub name: String,
    /// Output location
    #[serde(default)]
    pub output: Option<OutputInput>,
}

impl CreateVodPipelineInput {
    pub fn validate(self) -> Result<ToolCall> {
        let mut v = Violations::new();
        let name = v.name("name", &self.name);
        let bucket = self.output.and_then(|output| output.bucket);
        if let Some(bucket) = &bucket {
            v.name("output.bucket", bucket);
        }
        v.finish(|| {
            Some(ToolCall::CreateVodPipeline {
                name: name?,
                output: OutputSpec { bucket },
            })
        })
    }
}

/// Input for removing a VOD pipeline
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoveVodPipelineInput {
    /// Name of the pipeline
    pub name: String,
    /// Also remove the storage instance holding the pipeline output
    #[serde(default)]
    pub remove_storage: bool,
}

impl RemoveVodPipelineInput {
    pub fn validate(self) -> Result<ToolCall> {
        let mut v = Violations::new();
        let name = v.name("name", &self.name);
        let remove_storage = self.remove_storage;
        v.finish(|| {
            Some(ToolCall::RemoveVodPipeline {
                name: name?,
                remove_storage,
            })
        })
    }
}

/// Output from removing a VOD pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveVodPipelineOutput {
    pub name: String,
    /// Constituents removed by this call
    pub removed: Vec<String>,
    /// Constituents that did not exist
    pub absent: Vec<String>,
    pub message: String,
}

impl RemoveVodPipelineOutput {
    pub fn new(name: &str, report: &TeardownReport) -> Self {
        Self {
            name: name.to_string(),
            removed: report.removed.iter().map(ToString::to_string).collect(),
            absent: report.absent.iter().map(ToString::to_string).collect(),
            message: "removed".to_string(),
        }
    }
}

/// Input for describing a VOD pipeline
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetVodPipelineInput {
    /// Name of the pipeline
    pub name: String,
}

impl GetVodPipelineInput {
    pub fn validate(self) -> Result<ToolCall> {
        let mut v = Violations::new();
        let name = v.name("name", &self.name);
        v.finish(|| Some(ToolCall::GetVodPipeline { name: name? }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osc_shared_types::{InstanceRef, ServiceId};

    #[test]
    fn test_output_bucket_defaults() {
        let input: CreateVodPipelineInput =
            serde_json::from_value(serde_json::json!({"name": "promo"})).unwrap();
        match input.validate().unwrap() {
            ToolCall::CreateVodPipeline { name, output } => {
                assert_eq!(name.as_str(), "promo");
                assert_eq!(output, OutputSpec::default());
            }
            other => panic!("unexpected call: {:?}", other),
        }
    }

    #[test]
    fn test_bad_output_bucket() {
        let input: CreateVodPipelineInput = serde_json::from_value(
            serde_json::json!({"name": "promo", "output": {"bucket": "My_Bucket"}}),
        )
        .unwrap();
        let message = input.validate().unwrap_err().to_string();
        assert!(message.contains("output.bucket: Invalid name"), "{}", message);
    }

    #[test]
    fn test_remove_storage_defaults_to_false() {
        let input: RemoveVodPipelineInput =
            serde_json::from_value(serde_json::json!({"name": "promo"})).unwrap();
        assert!(!input.remove_storage);

        let input = RemoveVodPipelineInput {
            name: "Promo!".into(),
            remove_storage: true,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_removal_output() {
        let report = TeardownReport {
            removed: vec![InstanceRef::new(ServiceId::ENCORE, "promo")],
            absent: vec![InstanceRef::new(ServiceId::ENCORE_PACKAGER, "promo")],
            failed: vec![],
        };
        let output = RemoveVodPipelineOutput::new("promo", &report);
        assert_eq!(output.removed, vec!["encore/promo".to_string()]);
        assert_eq!(output.absent, vec!["eyevinn-encore-packager/promo".to_string()]);
    }
}
