//! Control plane and data plane implementations.
//!
//! - [`OscControlPlane`]: HTTP client for the Open Source Cloud APIs
//! - [`S3Connector`]: S3-compatible object storage of MinIO instances
//! - [`mock`] / [`memory_storage`]: in-memory doubles used by tests and local development

pub mod memory_storage;
pub mod mock;
pub mod osc;
pub mod s3;

pub use memory_storage::{InMemoryConnector, InMemoryStorage};
pub use mock::{MockCall, MockControlPlane, RecordingTranscoder};
pub use osc::{OscControlPlane, DEFAULT_ENVIRONMENT};
pub use s3::{S3Connector, S3Storage};
