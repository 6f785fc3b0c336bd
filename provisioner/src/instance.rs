//! Idempotent get-or-create of named instances.

use std::sync::Arc;

use control_plane_interface::{ControlPlane, ServiceAccessToken};
use osc_shared_types::{
    Instance, InstanceName, InstancePort, InstanceRef, InstanceState, OscError, Result, ServiceId,
};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::config::{ProvisionerConfig, ResourceKind};
use crate::poller::await_ready;

/// An instance returned by [`InstanceProvisioner::ensure`].
#[derive(Debug, Clone)]
pub struct Provisioned {
    pub instance: Instance,
    /// Whether this call created the instance (as opposed to reusing it).
    pub created: bool,
    /// Token the instance was provisioned with, for follow-up calls.
    pub token: ServiceAccessToken,
}

/// Outcome of one provisioning step.
///
/// Keeps track of a created instance even when deriving the step's value
/// failed afterwards, so callers can clean it up.
#[derive(Debug)]
pub struct Step<T> {
    pub created: Option<InstanceRef>,
    pub result: Result<T>,
}

impl<T> Step<T> {
    /// A step that reused an existing instance.
    pub fn reused(value: T) -> Self {
        Self {
            created: None,
            result: Ok(value),
        }
    }

    pub fn failed(err: OscError) -> Self {
        Self {
            created: None,
            result: Err(err),
        }
    }

    /// Derive the step's value, keeping track of the created instance.
    pub fn map<U>(self, f: impl FnOnce(T) -> Result<U>) -> Step<U> {
        Step {
            created: self.created,
            result: self.result.and_then(f),
        }
    }

    pub fn into_result(self) -> Result<T> {
        self.result
    }
}

/// Result of removing a single instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    Absent,
}

enum Lookup {
    Existing(Provisioned),
    Created(Instance, ServiceAccessToken),
}

/// Gets or creates instances against the control plane.
///
/// Holds no instance state: every call fetches a fresh access token and
/// re-reads the remote side.
#[derive(Clone)]
pub struct InstanceProvisioner {
    control_plane: Arc<dyn ControlPlane>,
    config: ProvisionerConfig,
    cancel: CancellationToken,
}

impl InstanceProvisioner {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        config: ProvisionerConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            control_plane,
            config,
            cancel,
        }
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    pub fn control_plane(&self) -> &dyn ControlPlane {
        self.control_plane.as_ref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Return the instance named `name`, creating it with `config` if absent.
    ///
    /// A found instance is returned as-is without readiness polling. A created
    /// one is polled until running, then given the kind's settle delay. Once
    /// the create call went through, the step records the instance even if
    /// polling or settling fails afterwards.
    pub async fn ensure(
        &self,
        kind: ResourceKind,
        name: &InstanceName,
        config: Map<String, Value>,
    ) -> Step<Provisioned> {
        let service = kind.service_id();
        let span = observability::instance_span!("ensure", service, name);

        async move {
            let (instance, token) = match self.find_or_create(service, name, config).await {
                Ok(Lookup::Existing(provisioned)) => return Step::reused(provisioned),
                Ok(Lookup::Created(instance, token)) => (instance, token),
                Err(e) => return Step::failed(e),
            };
            info!("Instance created, waiting for it to become ready");

            let reference = instance.reference();
            let result = self.await_created(kind, name, &token).await.map(|attempts| {
                info!(attempts, "Instance ready");
                Provisioned {
                    instance: instance.with_state(InstanceState::Ready),
                    created: true,
                    token,
                }
            });
            if let Err(e) = &result {
                warn!(error = %e, "Created instance did not become ready");
            }
            Step {
                created: Some(reference),
                result,
            }
        }
        .instrument(span)
        .await
    }

    async fn find_or_create(
        &self,
        service: ServiceId,
        name: &InstanceName,
        mut config: Map<String, Value>,
    ) -> Result<Lookup> {
        self.check_cancelled()?;
        let token = self.control_plane.get_service_access_token(service).await?;

        if let Some(instance) = self
            .control_plane
            .get_instance(service, name.as_str(), &token)
            .await?
        {
            debug!("Reusing existing instance");
            return Ok(Lookup::Existing(Provisioned {
                instance,
                created: false,
                token,
            }));
        }

        // Last point at which nothing has been created remotely.
        self.check_cancelled()?;
        config.insert("name".to_string(), Value::String(name.to_string()));
        match self
            .control_plane
            .create_instance(service, &token, &config)
            .await
        {
            Ok(Some(instance)) => Ok(Lookup::Created(instance, token)),
            Ok(None) => Err(OscError::Provision {
                service,
                name: name.to_string(),
                reason: "no instance returned".to_string(),
            }),
            Err(OscError::Duplicate { .. }) => {
                // Lost a create race; reuse the winner's instance.
                let instance = self
                    .control_plane
                    .get_instance(service, name.as_str(), &token)
                    .await?
                    .ok_or_else(|| OscError::Provision {
                        service,
                        name: name.to_string(),
                        reason: "instance reported as duplicate but not found".to_string(),
                    })?;
                Ok(Lookup::Existing(Provisioned {
                    instance,
                    created: false,
                    token,
                }))
            }
            Err(e @ (OscError::Token { .. } | OscError::Cancelled)) => Err(e),
            Err(e) => Err(OscError::Provision {
                service,
                name: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn await_created(
        &self,
        kind: ResourceKind,
        name: &InstanceName,
        token: &ServiceAccessToken,
    ) -> Result<u32> {
        let attempts = await_ready(
            self.control_plane.as_ref(),
            kind.service_id(),
            name.as_str(),
            token,
            &self.config.readiness,
            &self.cancel,
        )
        .await?;
        self.settle(kind).await?;
        Ok(attempts)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(OscError::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn settle(&self, kind: ResourceKind) -> Result<()> {
        let delay = self.config.settle.for_kind(kind);
        if delay.is_zero() {
            return Ok(());
        }
        debug!(delay_ms = delay.as_millis() as u64, "Settling");
        tokio::select! {
            _ = self.cancel.cancelled() => Err(OscError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Look up an instance without side effects.
    pub async fn find(&self, service: ServiceId, name: &str) -> Result<Option<Instance>> {
        let token = self.control_plane.get_service_access_token(service).await?;
        self.control_plane.get_instance(service, name, &token).await
    }

    /// Look up an instance that must exist.
    pub async fn require(&self, service: ServiceId, name: &str) -> Result<(Instance, ServiceAccessToken)> {
        let token = self.control_plane.get_service_access_token(service).await?;
        match self.control_plane.get_instance(service, name, &token).await? {
            Some(instance) => Ok((instance, token)),
            None => Err(OscError::not_found(format!("{} instance", service), name)),
        }
    }

    /// Remove an instance; an already absent instance is not an error.
    pub async fn remove(&self, service: ServiceId, name: &str) -> Result<Removal> {
        let token = self.control_plane.get_service_access_token(service).await?;
        match self.control_plane.remove_instance(service, name, &token).await {
            Ok(()) => {
                info!(service = %service, instance = %name, "Instance removed");
                Ok(Removal::Removed)
            }
            Err(e) if e.is_not_found() => {
                debug!(service = %service, instance = %name, "Instance already absent");
                Ok(Removal::Absent)
            }
            Err(e) => Err(e),
        }
    }

    /// Find the externally reachable mapping of `internal_port`.
    pub async fn resolve_port(
        &self,
        service: ServiceId,
        name: &str,
        token: &ServiceAccessToken,
        internal_port: u16,
    ) -> Result<InstancePort> {
        self.control_plane
            .get_ports_for_instance(service, name, token)
            .await?
            .into_iter()
            .find(|p| p.internal_port == internal_port)
            .ok_or_else(|| OscError::PortResolution {
                service,
                name: name.to_string(),
                port: internal_port,
            })
    }
}
