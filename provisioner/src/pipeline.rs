//! VOD pipeline composition.
//!
//! A pipeline has no record of its own. Its constituents share the pipeline
//! name, so lookups and teardown find them again by querying each service:
//!
//! ```text
//!  storage (bucket) ─┐
//!                    ├─▶ queue ─▶ callback listener ─▶ packager
//!  transcoder ───────┘
//! ```
//!
//! Storage and transcoder do not depend on each other and are provisioned
//! concurrently. A failed creation removes what this call created, newest first.

use std::sync::Arc;

use control_plane_interface::StorageConnector;
use osc_shared_types::{InstanceName, InstanceRef, OscError, Result, ServiceId, TeardownReport};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn, Instrument};

use crate::config::PipelineOptions;
use crate::instance::{InstanceProvisioner, Removal, Step};
use crate::resources::{callback_listener, encore, minio, packager, valkey};

/// Where a pipeline writes its packages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSpec {
    /// Output bucket; defaults to the pipeline name.
    #[serde(default)]
    pub bucket: Option<String>,
}

impl OutputSpec {
    pub fn bucket_name(&self, pipeline: &InstanceName) -> Result<InstanceName> {
        match &self.bucket {
            Some(bucket) => InstanceName::parse(bucket.as_str()).map_err(|_| {
                OscError::Validation(format!(
                    "output.bucket: Invalid name {:?}, must match {}",
                    bucket,
                    osc_shared_types::INSTANCE_NAME_PATTERN
                ))
            }),
            None => Ok(pipeline.clone()),
        }
    }
}

/// A composed VOD pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VodPipeline {
    pub name: String,
    /// Transcoder job submission endpoint.
    pub jobs: String,
    /// Callback listener endpoint for transcoder progress.
    pub callback_url: String,
    /// Packager output folder (`s3://bucket/`).
    pub output: String,
    /// Storage endpoint hosting the output bucket.
    pub endpoint: String,
}

/// Instances created so far by one composition.
#[derive(Debug, Default)]
struct Ledger {
    created: Vec<InstanceRef>,
}

impl Ledger {
    fn record<T>(&mut self, step: Step<T>) -> Result<T> {
        if let Some(created) = step.created {
            self.created.push(created);
        }
        step.result
    }
}

pub struct PipelineComposer {
    provisioner: InstanceProvisioner,
    connector: Arc<dyn StorageConnector>,
}

impl PipelineComposer {
    pub fn new(provisioner: InstanceProvisioner, connector: Arc<dyn StorageConnector>) -> Self {
        Self {
            provisioner,
            connector,
        }
    }

    fn options(&self) -> &PipelineOptions {
        &self.provisioner.config().pipeline
    }

    /// Create (or complete) the pipeline `name`.
    pub async fn create(&self, name: &InstanceName, output: &OutputSpec) -> Result<VodPipeline> {
        let bucket = output.bucket_name(name)?;
        let span = observability::pipeline_span!("create", name);

        async {
            let mut ledger = Ledger::default();
            match self.build(name, &bucket, &mut ledger).await {
                Ok(pipeline) => {
                    info!(created = ledger.created.len(), "Pipeline ready");
                    Ok(pipeline)
                }
                Err(cause) => Err(self.abort(name, cause, ledger).await),
            }
        }
        .instrument(span)
        .await
    }

    async fn build(
        &self,
        name: &InstanceName,
        bucket: &InstanceName,
        ledger: &mut Ledger,
    ) -> Result<VodPipeline> {
        let p = &self.provisioner;

        let (storage, transcoder) = if self.options().parallel_fork {
            let (storage, transcoder) = tokio::join!(
                minio::ensure(p, self.connector.as_ref(), bucket),
                encore::ensure(p, name)
            );
            let storage = ledger.record(storage);
            let transcoder = ledger.record(transcoder);
            if let (Err(_), Err(e)) = (&storage, &transcoder) {
                warn!(error = %e, "Transcoder provisioning failed as well");
            }
            (storage?, transcoder?)
        } else {
            let storage = ledger.record(minio::ensure(p, self.connector.as_ref(), bucket).await)?;
            let transcoder = ledger.record(encore::ensure(p, name).await)?;
            (storage, transcoder)
        };

        let redis_url = ledger.record(valkey::ensure(p, name).await)?;
        let callback = ledger
            .record(callback_listener::ensure(p, name, &redis_url, &transcoder.url).await)?;
        let packager = ledger.record(packager::ensure(p, name, &redis_url, &storage).await)?;

        Ok(VodPipeline {
            name: name.to_string(),
            jobs: transcoder.jobs,
            callback_url: callback.callback_url,
            output: packager.output_folder,
            endpoint: storage.endpoint,
        })
    }

    /// Undo what this composition created and wrap the failure.
    async fn abort(&self, pipeline: &InstanceName, cause: OscError, ledger: Ledger) -> OscError {
        let mut rolled_back = Vec::new();
        let mut left_behind = Vec::new();

        if self.options().compensate {
            for target in ledger.created.into_iter().rev() {
                match self.provisioner.remove(target.service_id, &target.name).await {
                    Ok(_) => rolled_back.push(target),
                    Err(e) => {
                        warn!(instance = %target, error = %e, "Rollback failed");
                        left_behind.push(target);
                    }
                }
            }
        } else {
            left_behind = ledger.created;
        }

        error!(
            error = %cause,
            rolled_back = rolled_back.len(),
            left_behind = left_behind.len(),
            "Pipeline creation aborted"
        );
        OscError::PipelineAborted {
            pipeline: pipeline.to_string(),
            cause: Box::new(cause),
            rolled_back,
            left_behind,
        }
    }

    /// Describe an existing pipeline. Every constituent must exist.
    pub async fn get(&self, name: &str) -> Result<VodPipeline> {
        let p = &self.provisioner;
        let transcoder = encore::get(p, name).await?;
        let callback = callback_listener::get(p, name).await?;
        let packager = packager::get(p, name).await?;
        let bucket = packager.bucket().unwrap_or(name);
        let storage = minio::get(p, bucket).await?;

        Ok(VodPipeline {
            name: name.to_string(),
            jobs: transcoder.jobs,
            callback_url: callback.callback_url,
            output: packager.output_folder,
            endpoint: storage.endpoint,
        })
    }

    /// Best-effort removal of the pipeline's transcoder, callback listener and
    /// packager, plus its storage instance when `remove_storage` is set.
    ///
    /// Every removal is attempted; failures are collected into
    /// [`OscError::Teardown`] alongside the removals that went through.
    pub async fn remove(&self, name: &str, remove_storage: bool) -> Result<TeardownReport> {
        let span = observability::pipeline_span!("remove", name);

        async {
            let mut targets = vec![
                InstanceRef::new(ServiceId::ENCORE, name),
                InstanceRef::new(ServiceId::ENCORE_CALLBACK_LISTENER, name),
                InstanceRef::new(ServiceId::ENCORE_PACKAGER, name),
            ];
            if remove_storage {
                let bucket = self.storage_bucket(name).await;
                targets.push(InstanceRef::new(ServiceId::MINIO, bucket));
            }

            let mut report = TeardownReport::default();
            for target in targets {
                match self.provisioner.remove(target.service_id, &target.name).await {
                    Ok(Removal::Removed) => report.removed.push(target),
                    Ok(Removal::Absent) => report.absent.push(target),
                    Err(e) => {
                        warn!(instance = %target, error = %e, "Removal failed");
                        report.failed.push((target, e.to_string()));
                    }
                }
            }

            if report.is_complete() {
                info!(removed = report.removed.len(), absent = report.absent.len(), "Pipeline removed");
                Ok(report)
            } else {
                Err(OscError::Teardown(report))
            }
        }
        .instrument(span)
        .await
    }

    /// Bucket the packager writes to, or the pipeline name when unknown.
    async fn storage_bucket(&self, name: &str) -> String {
        match packager::get(&self.provisioner, name).await {
            Ok(info) => info.bucket().unwrap_or(name).to_string(),
            Err(e) => {
                if !e.is_not_found() {
                    warn!(error = %e, "Could not read packager output folder");
                }
                name.to_string()
            }
        }
    }
}
