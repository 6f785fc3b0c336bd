//! Valkey: memory database and pipeline job queue.

use osc_shared_types::{InstanceName, Result, ServiceId};
use serde_json::Map;

use control_plane_interface::ServiceAccessToken;

use crate::config::ResourceKind;
use crate::instance::{InstanceProvisioner, Step};

/// Port the Redis protocol listens on inside the instance.
pub const REDIS_PORT: u16 = 6379;

/// Ensure a Valkey instance and return its `redis://` connection string.
///
/// The external port is re-resolved on every call, also for a reused instance.
pub async fn ensure(provisioner: &InstanceProvisioner, name: &InstanceName) -> Step<String> {
    let Step { created, result } = provisioner
        .ensure(ResourceKind::MemoryDb, name, Map::new())
        .await;
    let result = match result {
        Ok(provisioned) => redis_url(provisioner, name.as_str(), &provisioned.token).await,
        Err(e) => Err(e),
    };
    Step { created, result }
}

async fn redis_url(
    provisioner: &InstanceProvisioner,
    name: &str,
    token: &ServiceAccessToken,
) -> Result<String> {
    let port = provisioner
        .resolve_port(ServiceId::VALKEY, name, token, REDIS_PORT)
        .await?;
    Ok(format!("redis://{}:{}", port.external_ip, port.external_port))
}
