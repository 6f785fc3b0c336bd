//! S3-compatible data plane of a storage instance.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use osc_shared_types::{OscError, Result, StorageCredentials};
use serde::{Deserialize, Serialize};

/// One object in a bucket listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<()>;

    async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectSummary>>;
}

/// Opens a data-plane client for a storage instance's endpoint and credentials.
pub trait StorageConnector: Send + Sync {
    fn connect(&self, credentials: &StorageCredentials) -> Result<Arc<dyn ObjectStorage>>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Bucket {0} does not exist")]
    BucketNotFound(String),
    #[error("Invalid storage endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("Storage request failed: {0}")]
    Request(String),
}

impl From<StorageError> for OscError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::BucketNotFound(bucket) => OscError::not_found("Bucket", bucket),
            other => OscError::Storage(other.to_string()),
        }
    }
}
