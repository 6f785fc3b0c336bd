//! Bucket and object operations on an existing storage instance.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use control_plane_interface::{ObjectStorage, ObjectSummary, StorageConnector};
use osc_shared_types::{OscError, Result, ServiceId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::instance::InstanceProvisioner;
use crate::resources::minio;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedObject {
    pub instance: String,
    pub bucket: String,
    pub key: String,
    pub size: u64,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketInfo {
    pub instance: String,
    pub bucket: String,
    /// False when the bucket already existed.
    pub created: bool,
}

/// Content type inferred from a file's extension.
pub fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

async fn open(
    provisioner: &InstanceProvisioner,
    connector: &dyn StorageConnector,
    instance_name: &str,
) -> Result<Arc<dyn ObjectStorage>> {
    let (instance, _) = provisioner.require(ServiceId::MINIO, instance_name).await?;
    let credentials = minio::credentials(&instance)?;
    connector.connect(&credentials)
}

async fn require_bucket(storage: &dyn ObjectStorage, bucket: &str) -> Result<()> {
    if storage.bucket_exists(bucket).await? {
        Ok(())
    } else {
        Err(OscError::not_found("Bucket", bucket))
    }
}

/// Upload a local file as `object_key` into `bucket` on a storage instance.
pub async fn upload_file(
    provisioner: &InstanceProvisioner,
    connector: &dyn StorageConnector,
    instance_name: &str,
    bucket: &str,
    object_key: &str,
    file_path: &Path,
) -> Result<UploadedObject> {
    let storage = open(provisioner, connector, instance_name).await?;
    require_bucket(storage.as_ref(), bucket).await?;

    let body = tokio::fs::read(file_path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            OscError::not_found("File", file_path.display().to_string())
        } else {
            OscError::Io(e)
        }
    })?;
    let size = body.len() as u64;
    let content_type = content_type_for(file_path);

    storage
        .put_object(bucket, object_key, Bytes::from(body), &content_type)
        .await?;
    info!(instance = %instance_name, bucket = %bucket, key = %object_key, size, "File uploaded");

    Ok(UploadedObject {
        instance: instance_name.to_string(),
        bucket: bucket.to_string(),
        key: object_key.to_string(),
        size,
        content_type,
    })
}

pub async fn list_files(
    provisioner: &InstanceProvisioner,
    connector: &dyn StorageConnector,
    instance_name: &str,
    bucket: &str,
) -> Result<Vec<ObjectSummary>> {
    let storage = open(provisioner, connector, instance_name).await?;
    require_bucket(storage.as_ref(), bucket).await?;
    storage.list_objects(bucket).await
}

/// Create a bucket on an existing storage instance; existing buckets are kept.
pub async fn create_bucket_on_instance(
    provisioner: &InstanceProvisioner,
    connector: &dyn StorageConnector,
    instance_name: &str,
    bucket: &str,
) -> Result<BucketInfo> {
    let storage = open(provisioner, connector, instance_name).await?;
    let created = minio::ensure_bucket(storage.as_ref(), bucket).await?;
    Ok(BucketInfo {
        instance: instance_name.to_string(),
        bucket: bucket.to_string(),
        created,
    })
}
