//! Packager consuming the job queue and writing streaming packages to storage.

use osc_shared_types::{Instance, InstanceName, OscError, Result, ServiceId};
use serde::{Deserialize, Serialize};

use crate::config::ResourceKind;
use crate::instance::{InstanceProvisioner, Step};
use crate::resources::minio::StorageBucket;
use crate::resources::{config, PACKAGE_QUEUE};

/// Secret reference resolved by the platform, never a literal token.
pub const TOKEN_SECRET_REF: &str = "{{secrets.osctoken}}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackagerInfo {
    pub output_folder: String,
}

impl PackagerInfo {
    /// Bucket named by an `s3://bucket/...` output folder.
    pub fn bucket(&self) -> Option<&str> {
        self.output_folder
            .strip_prefix("s3://")
            .and_then(|rest| rest.split('/').next())
            .filter(|bucket| !bucket.is_empty())
    }
}

/// `s3://{bucket}/`
pub fn output_folder(bucket: &str) -> String {
    format!("s3://{}/", bucket)
}

pub async fn ensure(
    provisioner: &InstanceProvisioner,
    name: &InstanceName,
    redis_url: &str,
    storage: &StorageBucket,
) -> Step<PackagerInfo> {
    let create = config([
        ("RedisUrl", redis_url.to_string()),
        ("RedisQueue", PACKAGE_QUEUE.to_string()),
        ("OutputFolder", output_folder(&storage.name)),
        ("AwsAccessKeyId", storage.access_key_id.clone()),
        ("AwsSecretAccessKey", storage.secret_access_key.clone()),
        ("S3EndpointUrl", storage.endpoint.clone()),
        ("PersonalAccessToken", TOKEN_SECRET_REF.to_string()),
    ]);
    provisioner
        .ensure(ResourceKind::Packager, name, create)
        .await
        .map(|provisioned| info(&provisioned.instance))
}

pub async fn get(provisioner: &InstanceProvisioner, name: &str) -> Result<PackagerInfo> {
    let (instance, _) = provisioner.require(ServiceId::ENCORE_PACKAGER, name).await?;
    info(&instance)
}

fn info(instance: &Instance) -> Result<PackagerInfo> {
    let output_folder = instance.attribute("OutputFolder").ok_or_else(|| {
        OscError::remote(format!("packager {} has no output folder", instance.name))
    })?;
    Ok(PackagerInfo {
        output_folder: output_folder.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_from_output_folder() {
        let info = PackagerInfo {
            output_folder: output_folder("media"),
        };
        assert_eq!(info.output_folder, "s3://media/");
        assert_eq!(info.bucket(), Some("media"));

        let nested = PackagerInfo {
            output_folder: "s3://media/vod/".into(),
        };
        assert_eq!(nested.bucket(), Some("media"));

        let local = PackagerInfo {
            output_folder: "/tmp/out".into(),
        };
        assert_eq!(local.bucket(), None);
    }
}
