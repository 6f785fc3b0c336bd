use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Pattern every user-chosen instance, bucket and pipeline name must match.
pub const INSTANCE_NAME_PATTERN: &str = "^[a-z0-9]+$";

static NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(INSTANCE_NAME_PATTERN).expect("instance name pattern is valid"));

/// Identifies a remote service type in the Open Source Cloud catalog.
///
/// Service ids are statically known per resource kind, so the id borrows a
/// `'static` string instead of owning one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ServiceId(&'static str);

impl ServiceId {
    /// Valkey key-value store (memory database and pipeline job queue).
    pub const VALKEY: ServiceId = ServiceId("valkey-io-valkey");
    /// Apache CouchDB document store.
    pub const COUCHDB: ServiceId = ServiceId("apache-couchdb");
    /// MinIO S3-compatible object storage.
    pub const MINIO: ServiceId = ServiceId("minio-minio");
    /// SVT Encore transcoder.
    pub const ENCORE: ServiceId = ServiceId("encore");
    /// Listener that receives transcoder callbacks and enqueues packaging jobs.
    pub const ENCORE_CALLBACK_LISTENER: ServiceId = ServiceId("eyevinn-encore-callback-listener");
    /// Packager consuming the job queue and writing streaming packages.
    pub const ENCORE_PACKAGER: ServiceId = ServiceId("eyevinn-encore-packager");

    pub const fn new(id: &'static str) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A validated instance name (`^[a-z0-9]+$`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct InstanceName(String);

impl InstanceName {
    /// Validate and wrap a user-chosen name.
    pub fn parse(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if Self::is_valid(&name) {
            Ok(Self(name))
        } else {
            Err(OscError::Validation(format!(
                "name: Invalid name {:?}, must match {}",
                name, INSTANCE_NAME_PATTERN
            )))
        }
    }

    /// Check a candidate name without allocating.
    pub fn is_valid(name: &str) -> bool {
        NAME_REGEX.is_match(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for InstanceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a remote instance as seen by this process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InstanceState {
    Absent,
    Provisioning,
    Ready,
    Failed,
}

impl InstanceState {
    /// Health status string reported by the control plane once an instance is up.
    pub const RUNNING: &'static str = "running";

    /// Map a reported health status onto the lifecycle.
    pub fn from_health(status: Option<&str>) -> Self {
        match status {
            Some(Self::RUNNING) => InstanceState::Ready,
            Some("failed") | Some("error") => InstanceState::Failed,
            _ => InstanceState::Provisioning,
        }
    }
}

/// Transient view of a named instance owned by the remote control plane.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instance {
    pub name: String,
    pub service_id: ServiceId,
    pub url: String,
    pub state: InstanceState,
    /// Service-specific configuration echoed back by the control plane
    /// (e.g. `RootPassword`, `OutputFolder`).
    pub attributes: Map<String, Value>,
}

impl Instance {
    pub fn new(service_id: ServiceId, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service_id,
            url: url.into(),
            state: InstanceState::Ready,
            attributes: Map::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_state(mut self, state: InstanceState) -> Self {
        self.state = state;
        self
    }

    /// String attribute lookup.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Instance URL without trailing slashes.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    pub fn reference(&self) -> InstanceRef {
        InstanceRef::new(self.service_id, self.name.clone())
    }
}

/// Port exposed by an instance outside the cloud network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstancePort {
    pub internal_port: u16,
    pub external_ip: String,
    pub external_port: u16,
}

/// An active service subscription of the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub service_id: String,
}

/// Endpoint and credentials of an S3-compatible storage instance.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageCredentials {
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// `service/name` address of a remote instance, used in error reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRef {
    pub service_id: ServiceId,
    pub name: String,
}

impl InstanceRef {
    pub fn new(service_id: ServiceId, name: impl Into<String>) -> Self {
        Self {
            service_id,
            name: name.into(),
        }
    }
}

impl fmt::Display for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service_id, self.name)
    }
}

/// Outcome of a best-effort, multi-instance removal.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeardownReport {
    pub removed: Vec<InstanceRef>,
    pub absent: Vec<InstanceRef>,
    pub failed: Vec<(InstanceRef, String)>,
}

impl TeardownReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

impl fmt::Display for TeardownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed: Vec<String> = self
            .failed
            .iter()
            .map(|(r, reason)| format!("{}: {}", r, reason))
            .collect();
        write!(
            f,
            "failed [{}]; removed [{}]; already absent [{}]",
            failed.join(", "),
            join_refs(&self.removed),
            join_refs(&self.absent)
        )
    }
}

pub fn join_refs(refs: &[InstanceRef]) -> String {
    refs.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum OscError {
    #[error("Invalid arguments: {0}")]
    Validation(String),
    #[error("Failed to obtain access token for {service}: {reason}")]
    Token { service: ServiceId, reason: String },
    #[error("Failed to create instance with name {name} ({service}): {reason}")]
    Provision {
        service: ServiceId,
        name: String,
        reason: String,
    },
    #[error("Instance {name} ({service}) reported status {status:?}")]
    InstanceFailed {
        service: ServiceId,
        name: String,
        status: String,
    },
    #[error("Instance {name} ({service}) not ready after {attempts} health checks")]
    ReadinessTimeout {
        service: ServiceId,
        name: String,
        attempts: u32,
    },
    #[error("Failed to get port {port} for instance {name} ({service})")]
    PortResolution {
        service: ServiceId,
        name: String,
        port: u16,
    },
    #[error("{what} {name} not found")]
    NotFound { what: String, name: String },
    #[error("Instance with name {name} already exists ({service})")]
    Duplicate { service: ServiceId, name: String },
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("Remote call failed: {0}")]
    Remote(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Operation cancelled")]
    Cancelled,
    #[error(
        "Pipeline {pipeline} aborted: {cause}; rolled back [{}]; left behind [{}]",
        join_refs(.rolled_back),
        join_refs(.left_behind)
    )]
    PipelineAborted {
        pipeline: String,
        #[source]
        cause: Box<OscError>,
        rolled_back: Vec<InstanceRef>,
        left_behind: Vec<InstanceRef>,
    },
    #[error("Pipeline teardown incomplete: {0}")]
    Teardown(TeardownReport),
}

impl OscError {
    pub fn not_found(what: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            what: what.into(),
            name: name.into(),
        }
    }

    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// The error of the step that actually failed, looking through pipeline aborts.
    pub fn root_cause(&self) -> &OscError {
        match self {
            OscError::PipelineAborted { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, OscError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, OscError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_name_validation() {
        assert!(InstanceName::parse("mydb1").is_ok());
        assert!(InstanceName::parse("My-DB").is_err());
        assert!(InstanceName::parse("").is_err());
        assert!(InstanceName::parse("with space").is_err());
    }

    #[test]
    fn test_state_from_health() {
        assert_eq!(InstanceState::from_health(Some("running")), InstanceState::Ready);
        assert_eq!(InstanceState::from_health(Some("starting")), InstanceState::Provisioning);
        assert_eq!(InstanceState::from_health(None), InstanceState::Provisioning);
        assert_eq!(InstanceState::from_health(Some("failed")), InstanceState::Failed);
    }

    #[test]
    fn test_instance_base_url_and_attributes() {
        let mut attrs = Map::new();
        attrs.insert("RootPassword".into(), Value::String("secret".into()));
        let instance = Instance::new(ServiceId::MINIO, "media", "https://media.minio.example/")
            .with_attributes(attrs);

        assert_eq!(instance.base_url(), "https://media.minio.example");
        assert_eq!(instance.attribute("RootPassword"), Some("secret"));
        assert_eq!(instance.attribute("missing"), None);
        assert_eq!(instance.reference().to_string(), "minio-minio/media");
    }

    #[test]
    fn test_root_cause_unwraps_pipeline_abort() {
        let err = OscError::PipelineAborted {
            pipeline: "promo".into(),
            cause: Box::new(OscError::Provision {
                service: ServiceId::MINIO,
                name: "promo".into(),
                reason: "no instance returned".into(),
            }),
            rolled_back: vec![InstanceRef::new(ServiceId::ENCORE, "promo")],
            left_behind: vec![],
        };

        assert!(matches!(err.root_cause(), OscError::Provision { .. }));
        let msg = err.to_string();
        assert!(msg.contains("rolled back [encore/promo]"), "{}", msg);
    }

    #[test]
    fn test_storage_credentials_debug_redacts_secret() {
        let creds = StorageCredentials {
            endpoint: "https://s3.example".into(),
            access_key_id: "root".into(),
            secret_access_key: "hunter2".into(),
        };
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("hunter2"));
    }
}
