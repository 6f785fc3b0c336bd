//! Collaborator interfaces consumed by the provisioner.
//!
//! - [`ControlPlane`]: the Open Source Cloud control plane (tokens, instances, health, ports)
//! - [`ObjectStorage`] / [`StorageConnector`]: S3-compatible data plane of a storage instance
//! - [`TranscodeClient`]: job submission to a running transcoder instance

pub mod storage;
pub mod transcode;

use std::fmt;

use async_trait::async_trait;
use osc_shared_types::{Instance, InstancePort, OscError, Result, ServiceId, Subscription};
use serde_json::{Map, Value};

pub use storage::{ObjectStorage, ObjectSummary, StorageConnector, StorageError};
pub use transcode::{SubmittedJob, TranscodeClient, TranscodeInput, TranscodeJob};

/// Short-lived token scoped to one service type.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceAccessToken(String);

impl ServiceAccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ServiceAccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServiceAccessToken(<redacted>)")
    }
}

/// Remote control plane owning every provisioned instance.
///
/// Every call is authenticated per service type; implementations must not
/// cache instance metadata since the remote side is the only source of truth.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn get_service_access_token(&self, service: ServiceId) -> Result<ServiceAccessToken>;

    /// Look up an instance by name. `Ok(None)` when it does not exist.
    async fn get_instance(
        &self,
        service: ServiceId,
        name: &str,
        token: &ServiceAccessToken,
    ) -> Result<Option<Instance>>;

    /// Create an instance from a service-specific config (must contain `name`).
    /// `Ok(None)` means the control plane accepted the call but returned no instance.
    async fn create_instance(
        &self,
        service: ServiceId,
        token: &ServiceAccessToken,
        config: &Map<String, Value>,
    ) -> Result<Option<Instance>>;

    /// Current health status string, `Ok(None)` if not reported yet.
    async fn get_instance_health(
        &self,
        service: ServiceId,
        name: &str,
        token: &ServiceAccessToken,
    ) -> Result<Option<String>>;

    async fn get_ports_for_instance(
        &self,
        service: ServiceId,
        name: &str,
        token: &ServiceAccessToken,
    ) -> Result<Vec<InstancePort>>;

    /// Remove an instance. Removing an absent instance yields `OscError::NotFound`.
    async fn remove_instance(
        &self,
        service: ServiceId,
        name: &str,
        token: &ServiceAccessToken,
    ) -> Result<()>;

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>>;
}

#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    #[error("Token request for {0} failed: {1}")]
    TokenRequest(ServiceId, String),
    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Instance {0} not found")]
    InstanceNotFound(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl From<ControlPlaneError> for OscError {
    fn from(err: ControlPlaneError) -> Self {
        match err {
            ControlPlaneError::TokenRequest(service, reason) => OscError::Token { service, reason },
            ControlPlaneError::InstanceNotFound(name) => OscError::not_found("Instance", name),
            other => OscError::Remote(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_debug_is_redacted() {
        let token = ServiceAccessToken::new("sat-123");
        assert_eq!(format!("{:?}", token), "ServiceAccessToken(<redacted>)");
        assert_eq!(token.as_str(), "sat-123");
    }

    #[test]
    fn test_error_conversion() {
        let err: OscError = ControlPlaneError::TokenRequest(ServiceId::ENCORE, "401".into()).into();
        assert!(matches!(err, OscError::Token { .. }));

        let err: OscError = ControlPlaneError::InstanceNotFound("promo".into()).into();
        assert!(err.is_not_found());

        let err: OscError = ControlPlaneError::Status {
            status: 500,
            body: "boom".into(),
        }
        .into();
        assert!(matches!(err, OscError::Remote(_)));
    }
}
