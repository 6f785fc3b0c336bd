//! Configuration for the OSC MCP server.
//!
//! Credentials and deployment selection come from the environment; tuning of
//! the provisioning flow comes from an optional TOML settings file:
//!
//! - `OSC_ACCESS_TOKEN` (required): personal access token for the control plane
//! - `OSC_ENVIRONMENT`: control plane environment, `prod` by default
//! - `OSC_MCP_SETTINGS`: settings file, `~/.config/osc-mcp/settings.toml` by default
//! - `LOG_LEVEL`, `LOG_JSON`: logging
//!
//! # Example
//!
//! ```no_run
//! use server_config::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> server_config::Result<()> {
//!     let config = ServerConfig::load().await?;
//!     println!("environment: {}", config.environment);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod paths;
pub mod settings;
mod error;

pub use config::{LogSettings, ServerConfig};
pub use error::{ConfigError, Result};
pub use paths::ConfigPaths;
pub use settings::Settings;

/// Application name used for XDG paths
pub const APP_NAME: &str = "osc-mcp";

pub const ACCESS_TOKEN_VAR: &str = "OSC_ACCESS_TOKEN";
pub const ENVIRONMENT_VAR: &str = "OSC_ENVIRONMENT";
pub const SETTINGS_VAR: &str = "OSC_MCP_SETTINGS";
pub const LOG_LEVEL_VAR: &str = "LOG_LEVEL";
pub const LOG_JSON_VAR: &str = "LOG_JSON";
