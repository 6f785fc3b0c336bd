//! Listener receiving transcoder progress callbacks and queueing packaging work.

use osc_shared_types::{Instance, InstanceName, Result, ServiceId};
use serde::{Deserialize, Serialize};

use crate::config::ResourceKind;
use crate::instance::{InstanceProvisioner, Step};
use crate::resources::{config, PACKAGE_QUEUE};

pub const CALLBACK_PATH: &str = "/encoreCallback";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackEndpoint {
    pub url: String,
    /// Where the transcoder posts progress.
    pub callback_url: String,
}

pub async fn ensure(
    provisioner: &InstanceProvisioner,
    name: &InstanceName,
    redis_url: &str,
    encore_url: &str,
) -> Step<CallbackEndpoint> {
    let create = config([
        ("RedisUrl", redis_url.to_string()),
        ("EncoreUrl", encore_url.to_string()),
        ("RedisQueue", PACKAGE_QUEUE.to_string()),
    ]);
    provisioner
        .ensure(ResourceKind::CallbackListener, name, create)
        .await
        .map(|provisioned| Ok(endpoint(&provisioned.instance)))
}

pub async fn get(provisioner: &InstanceProvisioner, name: &str) -> Result<CallbackEndpoint> {
    let (instance, _) = provisioner
        .require(ServiceId::ENCORE_CALLBACK_LISTENER, name)
        .await?;
    Ok(endpoint(&instance))
}

fn endpoint(instance: &Instance) -> CallbackEndpoint {
    let url = instance.base_url().to_string();
    CallbackEndpoint {
        callback_url: format!("{}{}", url, CALLBACK_PATH),
        url,
    }
}
