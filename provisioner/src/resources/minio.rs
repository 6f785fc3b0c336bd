//! MinIO object storage.

use control_plane_interface::{ObjectStorage, StorageConnector};
use osc_shared_types::{Instance, InstanceName, OscError, Result, ServiceId, StorageCredentials};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ResourceKind;
use crate::instance::{InstanceProvisioner, Step};
use crate::resources::{config, generate_password};

pub const ROOT_USER: &str = "root";

/// A bucket on a storage instance, with the credentials to reach it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageBucket {
    pub name: String,
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl StorageBucket {
    pub fn credentials(&self) -> StorageCredentials {
        StorageCredentials {
            endpoint: self.endpoint.clone(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
        }
    }
}

impl std::fmt::Debug for StorageBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageBucket")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

/// Ensure a storage instance named `name` holding a bucket of the same name.
pub async fn ensure(
    provisioner: &InstanceProvisioner,
    connector: &dyn StorageConnector,
    name: &InstanceName,
) -> Step<StorageBucket> {
    let create = config([
        ("RootUser", ROOT_USER.to_string()),
        ("RootPassword", generate_password("ai")),
    ]);
    let Step { created, result } = provisioner
        .ensure(ResourceKind::ObjectStorage, name, create)
        .await;
    let result = match result {
        Ok(provisioned) => with_bucket(&provisioned.instance, connector, name).await,
        Err(e) => Err(e),
    };
    Step { created, result }
}

async fn with_bucket(
    instance: &Instance,
    connector: &dyn StorageConnector,
    name: &InstanceName,
) -> Result<StorageBucket> {
    let credentials = credentials(instance)?;
    let storage = connector.connect(&credentials)?;
    ensure_bucket(storage.as_ref(), name.as_str()).await?;
    Ok(StorageBucket {
        name: name.to_string(),
        endpoint: credentials.endpoint,
        access_key_id: credentials.access_key_id,
        secret_access_key: credentials.secret_access_key,
    })
}

/// Bucket `bucket` on an existing storage instance of the same name.
pub async fn get(provisioner: &InstanceProvisioner, bucket: &str) -> Result<StorageBucket> {
    let (instance, _) = provisioner.require(ServiceId::MINIO, bucket).await?;
    let credentials = credentials(&instance)?;
    Ok(StorageBucket {
        name: bucket.to_string(),
        endpoint: credentials.endpoint,
        access_key_id: credentials.access_key_id,
        secret_access_key: credentials.secret_access_key,
    })
}

/// Endpoint and root credentials of a storage instance.
pub fn credentials(instance: &Instance) -> Result<StorageCredentials> {
    let secret = instance.attribute("RootPassword").ok_or_else(|| {
        OscError::remote(format!(
            "storage instance {} does not expose a root password",
            instance.name
        ))
    })?;
    Ok(StorageCredentials {
        endpoint: instance.base_url().to_string(),
        access_key_id: instance.attribute("RootUser").unwrap_or(ROOT_USER).to_string(),
        secret_access_key: secret.to_string(),
    })
}

/// Create `bucket` unless it already exists. Returns whether it was created.
pub async fn ensure_bucket(storage: &dyn ObjectStorage, bucket: &str) -> Result<bool> {
    if storage.bucket_exists(bucket).await? {
        return Ok(false);
    }
    storage.create_bucket(bucket).await?;
    info!(bucket = %bucket, "Bucket created");
    Ok(true)
}
