//! Tuning knobs for provisioning: poll bounds, settle delays, pipeline strategy.

use std::fmt;
use std::time::Duration;

use osc_shared_types::ServiceId;

/// The kinds of instance this crate knows how to provision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Valkey key-value store, also the pipeline's job queue.
    MemoryDb,
    /// CouchDB document store.
    NoSql,
    /// MinIO S3-compatible storage.
    ObjectStorage,
    /// Encore transcoder.
    Transcoder,
    CallbackListener,
    Packager,
}

impl ResourceKind {
    pub fn service_id(self) -> ServiceId {
        match self {
            ResourceKind::MemoryDb => ServiceId::VALKEY,
            ResourceKind::NoSql => ServiceId::COUCHDB,
            ResourceKind::ObjectStorage => ServiceId::MINIO,
            ResourceKind::Transcoder => ServiceId::ENCORE,
            ResourceKind::CallbackListener => ServiceId::ENCORE_CALLBACK_LISTENER,
            ResourceKind::Packager => ServiceId::ENCORE_PACKAGER,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Bounds of the readiness poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    /// Wait before each health check.
    pub interval: Duration,
    /// Health checks before giving up.
    pub max_attempts: u32,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            max_attempts: 300,
        }
    }
}

/// Delay applied after a freshly created instance first reports healthy,
/// before anything connects to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleDelays {
    pub memory_db: Duration,
    pub no_sql: Duration,
    pub object_storage: Duration,
    pub transcoder: Duration,
    pub callback_listener: Duration,
    pub packager: Duration,
}

impl SettleDelays {
    /// No settling at all.
    pub const NONE: SettleDelays = SettleDelays {
        memory_db: Duration::ZERO,
        no_sql: Duration::ZERO,
        object_storage: Duration::ZERO,
        transcoder: Duration::ZERO,
        callback_listener: Duration::ZERO,
        packager: Duration::ZERO,
    };

    pub fn for_kind(&self, kind: ResourceKind) -> Duration {
        match kind {
            ResourceKind::MemoryDb => self.memory_db,
            ResourceKind::NoSql => self.no_sql,
            ResourceKind::ObjectStorage => self.object_storage,
            ResourceKind::Transcoder => self.transcoder,
            ResourceKind::CallbackListener => self.callback_listener,
            ResourceKind::Packager => self.packager,
        }
    }
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            memory_db: Duration::from_millis(2000),
            object_storage: Duration::from_millis(2000),
            ..Self::NONE
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Provision storage and transcoder concurrently.
    pub parallel_fork: bool,
    /// Remove constituents created by a failed pipeline creation.
    pub compensate: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            parallel_fork: true,
            compensate: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvisionerConfig {
    pub readiness: ReadinessPolicy,
    pub settle: SettleDelays,
    pub pipeline: PipelineOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProvisionerConfig::default();
        assert_eq!(config.readiness.interval, Duration::from_secs(1));
        assert_eq!(config.readiness.max_attempts, 300);
        assert_eq!(
            config.settle.for_kind(ResourceKind::MemoryDb),
            Duration::from_secs(2)
        );
        assert_eq!(config.settle.for_kind(ResourceKind::Packager), Duration::ZERO);
        assert!(config.pipeline.parallel_fork);
        assert!(config.pipeline.compensate);
    }

    #[test]
    fn test_service_ids() {
        assert_eq!(ResourceKind::MemoryDb.service_id().as_str(), "valkey-io-valkey");
        assert_eq!(
            ResourceKind::CallbackListener.service_id().as_str(),
            "eyevinn-encore-callback-listener"
        );
    }
}
