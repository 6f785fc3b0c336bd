//! S3-compatible object storage for MinIO instances.
//!
//! Object reads and writes go through `object_store`. Bucket existence and
//! creation are not part of that API and use the AWS S3 SDK instead.

use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use tracing::debug;
use url::Url;

use control_plane_interface::{ObjectStorage, ObjectSummary, StorageConnector, StorageError};
use osc_shared_types::{Result, StorageCredentials};

/// MinIO accepts any region; requests must still carry one.
pub const DEFAULT_REGION: &str = "us-east-1";

const CREDENTIALS_PROVIDER: &str = "osc-minio";

/// Connects to S3-compatible endpoints.
#[derive(Debug, Clone, Default)]
pub struct S3Connector;

impl S3Connector {
    pub fn new() -> Self {
        Self
    }
}

impl StorageConnector for S3Connector {
    fn connect(&self, credentials: &StorageCredentials) -> Result<Arc<dyn ObjectStorage>> {
        let endpoint = Url::parse(credentials.endpoint.trim_end_matches('/'))
            .map_err(|e| StorageError::InvalidEndpoint(format!("{}: {}", credentials.endpoint, e)))?;
        if endpoint.host_str().is_none() {
            return Err(StorageError::InvalidEndpoint(credentials.endpoint.clone()).into());
        }
        Ok(Arc::new(S3Storage::new(endpoint, credentials.clone())))
    }
}

/// One S3-compatible endpoint with a fixed credential set.
pub struct S3Storage {
    buckets: aws_sdk_s3::Client,
    endpoint: Url,
    credentials: StorageCredentials,
    region: String,
}

impl S3Storage {
    fn new(endpoint: Url, credentials: StorageCredentials) -> Self {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(DEFAULT_REGION))
            .endpoint_url(endpoint.as_str().trim_end_matches('/'))
            .credentials_provider(Credentials::new(
                &credentials.access_key_id,
                &credentials.secret_access_key,
                None,
                None,
                CREDENTIALS_PROVIDER,
            ))
            // MinIO serves buckets under the endpoint path, not as subdomains.
            .force_path_style(true)
            .build();

        Self {
            buckets: aws_sdk_s3::Client::from_conf(config),
            endpoint,
            credentials,
            region: DEFAULT_REGION.to_string(),
        }
    }

    fn store(&self, bucket: &str) -> Result<AmazonS3> {
        let store = AmazonS3Builder::new()
            .with_endpoint(self.endpoint.as_str().trim_end_matches('/'))
            .with_bucket_name(bucket)
            .with_region(&self.region)
            .with_access_key_id(&self.credentials.access_key_id)
            .with_secret_access_key(&self.credentials.secret_access_key)
            .with_allow_http(true)
            .with_virtual_hosted_style_request(false)
            .build()
            .map_err(|e| StorageError::Request(e.to_string()))?;
        Ok(store)
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        debug!(bucket = %bucket, "Checking bucket");
        match self.buckets.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
            Err(e) => Err(StorageError::Request(format!(
                "HEAD bucket {}: {}",
                bucket,
                DisplayErrorContext(&e)
            ))
            .into()),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        debug!(bucket = %bucket, "Creating bucket");
        match self.buckets.create_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(()),
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|e| e.is_bucket_already_owned_by_you()) =>
            {
                Ok(())
            }
            Err(e) => Err(StorageError::Request(format!(
                "PUT bucket {}: {}",
                bucket,
                DisplayErrorContext(&e)
            ))
            .into()),
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<()> {
        let store = self.store(bucket)?;
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        store
            .put_opts(&Path::from(key), PutPayload::from(body), options)
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        Ok(())
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectSummary>> {
        let store = self.store(bucket)?;
        let objects: Vec<_> = store
            .list(None)
            .try_collect()
            .await
            .map_err(|e| match e {
                object_store::Error::NotFound { .. } => StorageError::BucketNotFound(bucket.to_string()),
                other => StorageError::Request(other.to_string()),
            })?;

        Ok(objects
            .into_iter()
            .map(|meta| ObjectSummary {
                key: meta.location.to_string(),
                size: meta.size as u64,
                last_modified: Some(meta.last_modified),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(endpoint: &str) -> StorageCredentials {
        StorageCredentials {
            endpoint: endpoint.into(),
            access_key_id: "root".into(),
            secret_access_key: "aisecret".into(),
        }
    }

    #[test]
    fn test_connect_rejects_bad_endpoint() {
        let connector = S3Connector::new();
        assert!(connector.connect(&credentials("not a url")).is_err());
    }

    #[tokio::test]
    async fn test_connect_accepts_local_endpoint() {
        let connector = S3Connector::new();
        assert!(connector.connect(&credentials("http://localhost:9000/")).is_ok());
    }
}
