//! Object storage MCP tools.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use control_plane_interface::ObjectSummary;
use osc_shared_types::Result;

use super::ToolCall;
use crate::validation::Violations;

/// Input for creating a bucket on a new storage instance
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateBucketInput {
    /// Name of the bucket, also used for the storage instance
    pub name: String,
}

impl CreateBucketInput {
    pub fn validate(self) -> Result<ToolCall> {
        let mut v = Violations::new();
        let name = v.name("name", &self.name);
        v.finish(|| Some(ToolCall::CreateBucket { name: name? }))
    }
}

/// Input for uploading a local file
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileInput {
    /// Name of the storage instance
    pub instance_name: String,
    /// Bucket to upload into
    pub bucket: String,
    /// Key of the object in the bucket
    pub object_key: String,
    /// Path of the file on local disk
    pub file_path: String,
}

impl UploadFileInput {
    pub fn validate(self) -> Result<ToolCall> {
        let mut v = Violations::new();
        let instance = v.name("instanceName", &self.instance_name);
        let bucket = v.name("bucket", &self.bucket);
        let object_key = v.non_empty("objectKey", &self.object_key);
        let file_path = v.non_empty("filePath", &self.file_path).map(PathBuf::from);
        v.finish(|| {
            Some(ToolCall::UploadFile {
                instance: instance?,
                bucket: bucket?,
                object_key: object_key?,
                file_path: file_path?,
            })
        })
    }
}

/// Input for listing the files in a bucket
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesInput {
    /// Name of the storage instance
    pub instance_name: String,
    /// Bucket to list
    pub bucket: String,
}

impl ListFilesInput {
    pub fn validate(self) -> Result<ToolCall> {
        let mut v = Violations::new();
        let instance = v.name("instanceName", &self.instance_name);
        let bucket = v.name("bucket", &self.bucket);
        v.finish(|| {
            Some(ToolCall::ListFiles {
                instance: instance?,
                bucket: bucket?,
            })
        })
    }
}

/// Output from listing files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesOutput {
    pub instance_name: String,
    pub bucket: String,
    pub objects: Vec<ObjectSummary>,
    pub total: usize,
}

/// Input for creating a bucket on an existing storage instance
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBucketOnInstanceInput {
    /// Name of the storage instance
    pub instance_name: String,
    /// Name of the bucket to create
    pub bucket_name: String,
}

impl CreateBucketOnInstanceInput {
    pub fn validate(self) -> Result<ToolCall> {
        let mut v = Violations::new();
        let instance = v.name("instanceName", &self.instance_name);
        let bucket = v.name("bucketName", &self.bucket_name);
        v.finish(|| {
            Some(ToolCall::CreateBucketOnInstance {
                instance: instance?,
                bucket: bucket?,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_reports_all_fields() {
        let input = UploadFileInput {
            instance_name: "Media".into(),
            bucket: "in-box".into(),
            object_key: "".into(),
            file_path: "/tmp/a.mp4".into(),
        };
        let message = input.validate().unwrap_err().to_string();
        assert!(message.contains("instanceName: "), "{}", message);
        assert!(message.contains("bucket: "), "{}", message);
        assert!(message.contains("objectKey: Required"), "{}", message);
        assert!(!message.contains("filePath"), "{}", message);
    }

    #[test]
    fn test_bucket_on_instance() {
        let input = CreateBucketOnInstanceInput {
            instance_name: "media".into(),
            bucket_name: "archive".into(),
        };
        match input.validate().unwrap() {
            ToolCall::CreateBucketOnInstance { instance, bucket } => {
                assert_eq!(instance.as_str(), "media");
                assert_eq!(bucket.as_str(), "archive");
            }
            other => panic!("unexpected call: {:?}", other),
        }
    }
}
