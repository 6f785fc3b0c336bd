//! Tracing configuration and initialization.

use std::io;
use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

pub const DEFAULT_SERVICE_NAME: &str = "osc-mcp";

/// Configuration for tracing initialization.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Service name for identification
    pub service_name: String,
    /// Log level used when `RUST_LOG` is not set
    pub log_level: Level,
    /// Whether to include span events (enter, exit, close)
    pub include_span_events: bool,
    /// Whether to output in JSON format
    pub json_output: bool,
    /// Whether to include file and line numbers
    pub include_location: bool,
    /// Whether to include target (module path)
    pub include_target: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            log_level: Level::INFO,
            include_span_events: false,
            json_output: false,
            include_location: false,
            include_target: true,
        }
    }
}

impl TracingConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.log_level = level;
        self
    }

    /// Set the level from a textual name, keeping the current one if it does not parse.
    pub fn with_level_name(mut self, name: &str) -> Self {
        if let Ok(level) = Level::from_str(name.trim()) {
            self.log_level = level;
        }
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json_output = json;
        self
    }

    pub fn with_span_events(mut self, include: bool) -> Self {
        self.include_span_events = include;
        self
    }

    fn build_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("{}", self.log_level)))
    }
}

/// Initialize tracing with the given configuration.
///
/// Fails if a global subscriber is already installed.
///
/// # Example
///
/// ```no_run
/// use observability::{init_tracing, TracingConfig};
/// use tracing::Level;
///
/// init_tracing(TracingConfig::new("osc-mcp").with_level(Level::DEBUG)).ok();
/// ```
pub fn init_tracing(config: TracingConfig) -> Result<(), TryInitError> {
    let filter = config.build_filter();

    let span_events = if config.include_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    if config.json_output {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_span_events(span_events)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_target(config.include_target);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(io::stderr)
            .with_ansi(false)
            .with_span_events(span_events)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_target(config.include_target);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()?;
    }

    tracing::info!(
        service = %config.service_name,
        level = %config.log_level,
        "Tracing initialized"
    );
    Ok(())
}

/// Span for a single-instance operation.
#[macro_export]
macro_rules! instance_span {
    ($op:expr, $service:expr, $name:expr) => {
        tracing::info_span!(
            "instance_operation",
            operation = $op,
            service = %$service,
            instance = %$name
        )
    };
}

/// Span for a pipeline operation.
#[macro_export]
macro_rules! pipeline_span {
    ($op:expr, $pipeline:expr) => {
        tracing::info_span!("pipeline_operation", operation = $op, pipeline = %$pipeline)
    };
}

/// Span for an MCP request.
#[macro_export]
macro_rules! request_span {
    ($method:expr) => {
        tracing::info_span!("mcp_request", method = %$method)
    };
    ($method:expr, $tool:expr) => {
        tracing::info_span!("mcp_request", method = %$method, tool = %$tool)
    };
}
