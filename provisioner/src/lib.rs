//! Provisioning of Open Source Cloud resources.
//!
//! - [`poller`]: bounded, cancellable readiness wait
//! - [`instance`]: idempotent get-or-create of a named instance
//! - [`resources`]: per-service create configs and derived values
//! - [`pipeline`]: VOD pipeline composition, lookup and teardown
//! - [`files`], [`vod`]: operations on already provisioned resources
//!
//! [`Provisioner`] bundles them behind the operations the MCP server exposes.

pub mod config;
pub mod database;
pub mod files;
pub mod instance;
pub mod pipeline;
pub mod poller;
pub mod resources;
pub mod vod;

use std::path::Path;
use std::sync::Arc;

use control_plane_interface::{ControlPlane, ObjectSummary, StorageConnector, TranscodeClient};
use osc_shared_types::{InstanceName, Result, Subscription, TeardownReport};
use tokio_util::sync::CancellationToken;

pub use config::{PipelineOptions, ProvisionerConfig, ReadinessPolicy, ResourceKind, SettleDelays};
pub use database::DatabaseKind;
pub use files::{BucketInfo, UploadedObject};
pub use instance::{InstanceProvisioner, Provisioned, Removal, Step};
pub use pipeline::{OutputSpec, PipelineComposer, VodPipeline};
pub use resources::minio::StorageBucket;
pub use vod::VodJob;

/// Entry point for every provisioning operation.
pub struct Provisioner {
    instances: InstanceProvisioner,
    pipelines: PipelineComposer,
    connector: Arc<dyn StorageConnector>,
    transcoder: Arc<dyn TranscodeClient>,
}

impl Provisioner {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        connector: Arc<dyn StorageConnector>,
        transcoder: Arc<dyn TranscodeClient>,
        config: ProvisionerConfig,
        cancel: CancellationToken,
    ) -> Self {
        let instances = InstanceProvisioner::new(control_plane, config, cancel);
        let pipelines = PipelineComposer::new(instances.clone(), connector.clone());
        Self {
            instances,
            pipelines,
            connector,
            transcoder,
        }
    }

    pub async fn create_database(&self, name: &InstanceName, kind: DatabaseKind) -> Result<String> {
        database::create_database(&self.instances, name, kind).await
    }

    /// Storage instance `name` with a bucket of the same name.
    pub async fn create_bucket(&self, name: &InstanceName) -> Result<StorageBucket> {
        resources::minio::ensure(&self.instances, self.connector.as_ref(), name)
            .await
            .into_result()
    }

    pub async fn create_vod_pipeline(
        &self,
        name: &InstanceName,
        output: &OutputSpec,
    ) -> Result<VodPipeline> {
        self.pipelines.create(name, output).await
    }

    pub async fn get_vod_pipeline(&self, name: &InstanceName) -> Result<VodPipeline> {
        self.pipelines.get(name.as_str()).await
    }

    pub async fn remove_vod_pipeline(
        &self,
        name: &InstanceName,
        remove_storage: bool,
    ) -> Result<TeardownReport> {
        self.pipelines.remove(name.as_str(), remove_storage).await
    }

    /// Transcode and package `source` with an existing pipeline.
    pub async fn create_vod(&self, pipeline: &InstanceName, source: &str) -> Result<VodJob> {
        let pipeline = self.pipelines.get(pipeline.as_str()).await?;
        vod::create_vod(
            self.instances.control_plane(),
            self.transcoder.as_ref(),
            &pipeline,
            source,
        )
        .await
    }

    pub async fn upload_file(
        &self,
        instance: &InstanceName,
        bucket: &InstanceName,
        object_key: &str,
        file_path: &Path,
    ) -> Result<UploadedObject> {
        files::upload_file(
            &self.instances,
            self.connector.as_ref(),
            instance.as_str(),
            bucket.as_str(),
            object_key,
            file_path,
        )
        .await
    }

    pub async fn list_files(
        &self,
        instance: &InstanceName,
        bucket: &InstanceName,
    ) -> Result<Vec<ObjectSummary>> {
        files::list_files(
            &self.instances,
            self.connector.as_ref(),
            instance.as_str(),
            bucket.as_str(),
        )
        .await
    }

    pub async fn create_bucket_on_instance(
        &self,
        instance: &InstanceName,
        bucket: &InstanceName,
    ) -> Result<BucketInfo> {
        files::create_bucket_on_instance(
            &self.instances,
            self.connector.as_ref(),
            instance.as_str(),
            bucket.as_str(),
        )
        .await
    }

    /// Services the account currently subscribes to.
    pub async fn list_active_services(&self) -> Result<Vec<Subscription>> {
        self.instances.control_plane().list_subscriptions().await
    }
}
