//! MCP server binary for Eyevinn Open Source Cloud.
//!
//! # Usage
//!
//! Run with stdio transport:
//! ```bash
//! OSC_ACCESS_TOKEN=<personal access token> osc-mcp
//! ```

use std::process::exit;
use std::sync::Arc;

use anyhow::Context;
use control_plane::{OscControlPlane, S3Connector};
use mcp_server::OscMcpServer;
use observability::{init_tracing, TracingConfig};
use provisioner::Provisioner;
use server_config::{LogSettings, ServerConfig};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Main entry point for the MCP server.
#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = ServerConfig::load().await;

    // Logs go to stderr, stdout is reserved for the MCP protocol
    let log = config.as_ref().map(|c| c.log.clone()).unwrap_or_default();
    if let Err(e) = init_tracing(tracing_config(&log)) {
        eprintln!("Failed to initialize tracing: {}", e);
    }

    if let Err(e) = run(config).await {
        error!("Server error: {:#}", e);
        exit(1);
    }
}

fn tracing_config(log: &LogSettings) -> TracingConfig {
    let config = TracingConfig::default().with_json(log.json);
    match &log.level {
        Some(level) => config.with_level_name(level),
        None => config,
    }
}

async fn run(config: server_config::Result<ServerConfig>) -> anyhow::Result<()> {
    let config = config.context("Failed to load configuration")?;

    info!(
        environment = %config.environment,
        settings = ?config.settings_path,
        "Starting OSC MCP server"
    );

    let control_plane = Arc::new(OscControlPlane::new(
        config.access_token.clone(),
        config.environment.clone(),
    ));
    let cancel = CancellationToken::new();
    let provisioner = Provisioner::new(
        control_plane.clone(),
        Arc::new(S3Connector::new()),
        control_plane,
        config.settings.provisioner_config(),
        cancel.clone(),
    );

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                shutdown.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for interrupt"),
        }
    });

    OscMcpServer::new(provisioner, cancel)
        .serve_stdio()
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("MCP transport failed")?;

    Ok(())
}
