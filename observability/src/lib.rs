//! Logging for the OSC MCP server.
//!
//! stdout carries the MCP protocol, so every log line is written to stderr.
//! The span macros give provisioning flows a consistent set of fields
//! (`service`, `instance`, `pipeline`).

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, TracingConfig, DEFAULT_SERVICE_NAME};

/// Re-export tracing macros for convenience
pub use tracing::{debug, error, info, instrument, trace, warn, Instrument, Level};
