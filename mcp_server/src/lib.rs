//! MCP server for Eyevinn Open Source Cloud.
//!
//! Exposes provisioning of databases, storage buckets and VOD pipelines to AI
//! agents over the Model Context Protocol:
//!
//! - **Tools**: create databases and buckets, compose and tear down VOD
//!   pipelines, submit VOD jobs, upload and list files
//! - **Resources**: active service subscriptions, pipeline descriptions
//!
//! # Architecture
//!
//! [`OscMcpServer`] speaks JSON-RPC 2.0 over stdio and delegates every tool
//! call to a [`provisioner::Provisioner`]. Tool arguments are validated at the
//! dispatch boundary into a closed [`tools::ToolCall`] before anything remote
//! is touched.

pub mod resources;
pub mod server;
pub mod tools;
pub mod validation;

pub use server::OscMcpServer;
pub use server::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use server::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
    PROTOCOL_VERSION,
};

// Re-export common types
pub use rmcp;
