//! Encore transcoder.

use osc_shared_types::{Instance, InstanceName, OscError, Result, ServiceId};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use url::Url;

use crate::config::ResourceKind;
use crate::instance::{InstanceProvisioner, Step};

pub const JOBS_PATH: &str = "/encoreJobs";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscoderEndpoint {
    /// Instance URL without trailing slash.
    pub url: String,
    /// Job submission endpoint.
    pub jobs: String,
}

pub async fn ensure(
    provisioner: &InstanceProvisioner,
    name: &InstanceName,
) -> Step<TranscoderEndpoint> {
    provisioner
        .ensure(ResourceKind::Transcoder, name, Map::new())
        .await
        .map(|provisioned| endpoint(&provisioned.instance))
}

pub async fn get(provisioner: &InstanceProvisioner, name: &str) -> Result<TranscoderEndpoint> {
    let (instance, _) = provisioner.require(ServiceId::ENCORE, name).await?;
    endpoint(&instance)
}

fn endpoint(instance: &Instance) -> Result<TranscoderEndpoint> {
    let jobs = Url::parse(&instance.url)
        .and_then(|url| url.join(JOBS_PATH))
        .map_err(|e| OscError::remote(format!("invalid transcoder url {:?}: {}", instance.url, e)))?;
    Ok(TranscoderEndpoint {
        url: instance.base_url().to_string(),
        jobs: jobs.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_paths() {
        let instance = Instance::new(ServiceId::ENCORE, "promo", "https://promo.encore.example/");
        let endpoint = endpoint(&instance).unwrap();
        assert_eq!(endpoint.url, "https://promo.encore.example");
        assert_eq!(endpoint.jobs, "https://promo.encore.example/encoreJobs");
    }
}
