//! MCP server implementation for Open Source Cloud provisioning.
//!
//! This module provides the main MCP server that exposes the provisioner to
//! AI agents via the Model Context Protocol.

use std::sync::Arc;

use rmcp::model::Implementation;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use osc_shared_types::{InstanceName, OscError, Result};
use provisioner::Provisioner;

use crate::resources::{self, ActiveServiceResource, ResourcePath};
use crate::tools::*;

/// MCP protocol revision spoken by this server.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP server for Eyevinn Open Source Cloud.
///
/// Tool calls are validated into a [`ToolCall`] and delegated to the
/// [`Provisioner`]; resources give read-only views of the account.
#[derive(Clone)]
pub struct OscMcpServer {
    provisioner: Arc<Provisioner>,
    cancel: CancellationToken,
}

impl OscMcpServer {
    /// Create a new MCP server around a provisioner.
    ///
    /// Cancelling `cancel` stops [`serve`](Self::serve) after the request in
    /// flight.
    pub fn new(provisioner: Provisioner, cancel: CancellationToken) -> Self {
        Self::with_shared(Arc::new(provisioner), cancel)
    }

    pub fn with_shared(provisioner: Arc<Provisioner>, cancel: CancellationToken) -> Self {
        Self {
            provisioner,
            cancel,
        }
    }

    /// Get server info for MCP initialization.
    pub fn server_info() -> Implementation {
        Implementation {
            name: "eyevinn-osc-mcp-server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: Some("Eyevinn Open Source Cloud".to_string()),
            website_url: Some("https://www.osaas.io".to_string()),
            icons: None,
        }
    }

    // === Tool Implementations ===

    /// Run a validated tool call and return its JSON result.
    pub async fn execute(&self, call: ToolCall) -> Result<Value> {
        let p = &self.provisioner;
        match call {
            ToolCall::CreateDatabase { name, kind } => {
                let connection_url = p.create_database(&name, kind).await?;
                to_json(CreateDatabaseOutput {
                    name: name.to_string(),
                    database_type: kind.to_string(),
                    connection_url,
                })
            }
            ToolCall::CreateBucket { name } => to_json(p.create_bucket(&name).await?),
            ToolCall::CreateVodPipeline { name, output } => {
                to_json(p.create_vod_pipeline(&name, &output).await?)
            }
            ToolCall::RemoveVodPipeline {
                name,
                remove_storage,
            } => {
                let report = p.remove_vod_pipeline(&name, remove_storage).await?;
                to_json(RemoveVodPipelineOutput::new(name.as_str(), &report))
            }
            ToolCall::GetVodPipeline { name } => to_json(p.get_vod_pipeline(&name).await?),
            ToolCall::CreateVod { pipeline, source } => {
                to_json(p.create_vod(&pipeline, &source).await?)
            }
            ToolCall::UploadFile {
                instance,
                bucket,
                object_key,
                file_path,
            } => to_json(
                p.upload_file(&instance, &bucket, &object_key, &file_path)
                    .await?,
            ),
            ToolCall::ListFiles { instance, bucket } => {
                let objects = p.list_files(&instance, &bucket).await?;
                to_json(ListFilesOutput {
                    instance_name: instance.to_string(),
                    bucket: bucket.to_string(),
                    total: objects.len(),
                    objects,
                })
            }
            ToolCall::CreateBucketOnInstance { instance, bucket } => {
                to_json(p.create_bucket_on_instance(&instance, &bucket).await?)
            }
        }
    }
}

fn to_json<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Map a provisioning failure onto a JSON-RPC error.
pub fn error_response(id: Option<Value>, err: &OscError) -> JsonRpcResponse {
    let message = err.to_string();
    match err {
        OscError::Validation(_) => JsonRpcResponse::error(id, INVALID_PARAMS, message),
        OscError::PipelineAborted {
            pipeline,
            rolled_back,
            left_behind,
            ..
        } => JsonRpcResponse::error_with_data(
            id,
            INTERNAL_ERROR,
            message,
            serde_json::json!({
                "pipeline": pipeline,
                "cause": err.root_cause().to_string(),
                "rolledBack": rolled_back,
                "leftBehind": left_behind
            }),
        ),
        OscError::Teardown(report) => match serde_json::to_value(report) {
            Ok(data) => JsonRpcResponse::error_with_data(id, INTERNAL_ERROR, message, data),
            Err(_) => JsonRpcResponse::error(id, INTERNAL_ERROR, message),
        },
        _ => JsonRpcResponse::error(id, INTERNAL_ERROR, message),
    }
}

// ============================================================================
// JSON-RPC Types
// ============================================================================

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Request ID (absent for notifications)
    #[serde(default)]
    pub id: Option<Value>,
    /// Method name
    pub method: String,
    /// Parameters (optional)
    #[serde(default)]
    pub params: Value,
}

impl JsonRpcRequest {
    /// Notifications carry no id and get no response.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Request ID (null for notifications)
    pub id: Option<Value>,
    /// Result (on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error (on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Create an error response with data.
    pub fn error_with_data(
        id: Option<Value>,
        code: i32,
        message: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: Some(data),
            }),
        }
    }
}

// Standard JSON-RPC error codes
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

// ============================================================================
// MCP Protocol Implementation
// ============================================================================

impl OscMcpServer {
    /// Handle an incoming JSON-RPC request.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        debug!(method = %request.method, "Handling MCP request");

        match request.method.as_str() {
            // MCP Protocol Methods
            "initialize" => self.handle_initialize(request.id, request.params).await,
            "initialized" | "notifications/initialized" => {
                self.handle_initialized(request.id).await
            }
            "notifications/cancelled" => JsonRpcResponse::success(request.id, serde_json::json!({})),
            "ping" => self.handle_ping(request.id).await,

            // Tool Methods
            "tools/list" => self.handle_tools_list(request.id).await,
            "tools/call" => self.handle_tools_call(request.id, request.params).await,

            // Resource Methods
            "resources/list" => self.handle_resources_list(request.id).await,
            "resources/templates/list" => self.handle_resource_templates_list(request.id).await,
            "resources/read" => self.handle_resources_read(request.id, request.params).await,

            // Unknown method
            _ => {
                warn!(method = %request.method, "Unknown method");
                JsonRpcResponse::error(
                    request.id,
                    METHOD_NOT_FOUND,
                    format!("Method not found: {}", request.method),
                )
            }
        }
    }

    /// Handle initialize request.
    async fn handle_initialize(&self, id: Option<Value>, params: Value) -> JsonRpcResponse {
        #[derive(Debug, Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct InitializeParams {
            #[serde(default)]
            protocol_version: Option<String>,
            #[serde(default)]
            client_info: Option<Value>,
        }

        let params = if params.is_null() {
            serde_json::json!({})
        } else {
            params
        };
        let params: InitializeParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                return JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    format!("Invalid params: {}", e),
                );
            }
        };

        let server_info = Self::server_info();
        let result = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {
                    "listChanged": false
                },
                "resources": {
                    "subscribe": false,
                    "listChanged": false
                }
            },
            "serverInfo": {
                "name": server_info.name,
                "version": server_info.version
            }
        });

        info!(
            client_protocol = params.protocol_version.as_deref().unwrap_or("unspecified"),
            client = ?params.client_info,
            "MCP server initialized"
        );
        JsonRpcResponse::success(id, result)
    }

    /// Handle initialized notification.
    async fn handle_initialized(&self, id: Option<Value>) -> JsonRpcResponse {
        debug!("Client sent initialized notification");
        JsonRpcResponse::success(id, serde_json::json!({}))
    }

    /// Handle ping request.
    async fn handle_ping(&self, id: Option<Value>) -> JsonRpcResponse {
        JsonRpcResponse::success(id, serde_json::json!({}))
    }

    /// Handle tools/list request.
    async fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        let tool_defs = ToolDefinitions::all();
        let tools: Vec<Value> = tool_defs
            .tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "description": t.description,
                    "inputSchema": t.input_schema
                })
            })
            .collect();

        JsonRpcResponse::success(id, serde_json::json!({ "tools": tools }))
    }

    /// Handle tools/call request.
    async fn handle_tools_call(&self, id: Option<Value>, params: Value) -> JsonRpcResponse {
        #[derive(Debug, Deserialize)]
        struct ToolCallParams {
            name: String,
            #[serde(default)]
            arguments: Value,
        }

        let params: ToolCallParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                return JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    format!("Invalid params: {}", e),
                );
            }
        };

        let Some(tool) = ToolName::from_name(&params.name) else {
            return JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Unknown tool: {}", params.name),
            );
        };

        let span = observability::request_span!("tools/call", tool.as_str());
        let result = async {
            let call = ToolCall::parse(tool, params.arguments)?;
            debug!("Calling tool");
            let output = self.execute(call).await?;
            Ok::<_, OscError>(serde_json::to_string_pretty(&output)?)
        }
        .instrument(span)
        .await;

        let text = match result {
            Ok(text) => text,
            Err(e) => {
                warn!(tool = tool.as_str(), error = %e, "Tool call failed");
                return error_response(id, &e);
            }
        };

        // Format result as MCP tool result
        let content = serde_json::json!([{
            "type": "text",
            "text": text
        }]);

        JsonRpcResponse::success(id, serde_json::json!({ "content": content }))
    }

    /// Handle resources/list request.
    async fn handle_resources_list(&self, id: Option<Value>) -> JsonRpcResponse {
        let resources = resources::list_available_resources();
        let resource_list: Vec<Value> = resources
            .iter()
            .map(|r| {
                serde_json::json!({
                    "uri": r.uri,
                    "name": r.name,
                    "description": r.description,
                    "mimeType": r.mime_type
                })
            })
            .collect();

        JsonRpcResponse::success(id, serde_json::json!({ "resources": resource_list }))
    }

    /// Handle resources/templates/list request.
    async fn handle_resource_templates_list(&self, id: Option<Value>) -> JsonRpcResponse {
        let templates: Vec<Value> = resources::list_resource_templates()
            .iter()
            .map(|t| {
                serde_json::json!({
                    "uriTemplate": t.uri_template,
                    "name": t.name,
                    "description": t.description,
                    "mimeType": t.mime_type
                })
            })
            .collect();

        JsonRpcResponse::success(id, serde_json::json!({ "resourceTemplates": templates }))
    }

    /// Handle resources/read request.
    async fn handle_resources_read(&self, id: Option<Value>, params: Value) -> JsonRpcResponse {
        #[derive(Debug, Deserialize)]
        struct ReadParams {
            uri: String,
        }

        let params: ReadParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                return JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    format!("Invalid params: {}", e),
                );
            }
        };

        let resource_path = match resources::parse_resource_uri(&params.uri) {
            Some(p) => p,
            None => {
                return JsonRpcResponse::error(
                    id,
                    INVALID_REQUEST,
                    format!("Unknown resource: {}", params.uri),
                );
            }
        };

        let content = match resource_path {
            ResourcePath::ActiveServices => self.active_services_text().await,
            ResourcePath::Pipeline(name) => self.pipeline_text(name).await,
            ResourcePath::LocalVideos => {
                return JsonRpcResponse::success(id, serde_json::json!({ "contents": [] }));
            }
        };
        let content = match content {
            Ok(content) => content,
            Err(e) => return error_response(id, &e),
        };

        let result = serde_json::json!({
            "contents": [{
                "uri": params.uri,
                "mimeType": "application/json",
                "text": content
            }]
        });

        JsonRpcResponse::success(id, result)
    }

    async fn active_services_text(&self) -> Result<String> {
        let active: Vec<ActiveServiceResource> = self
            .provisioner
            .list_active_services()
            .await?
            .into_iter()
            .map(|s| ActiveServiceResource {
                service_id: s.service_id,
            })
            .collect();
        Ok(serde_json::to_string_pretty(&active)?)
    }

    async fn pipeline_text(&self, name: String) -> Result<String> {
        let name = InstanceName::parse(name)?;
        let pipeline = self.provisioner.get_vod_pipeline(&name).await?;
        Ok(serde_json::to_string_pretty(&pipeline)?)
    }

    /// Run the MCP server over stdio.
    pub async fn serve_stdio(self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let reader = BufReader::new(tokio::io::stdin());
        let writer = tokio::io::stdout();
        self.serve(reader, writer).await
    }

    /// Serve newline-delimited JSON-RPC until end of input or cancellation.
    pub async fn serve<R, W>(
        &self,
        reader: R,
        mut writer: W,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        info!("MCP server listening on stdio");

        loop {
            let line = tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("MCP server cancelled");
                    break;
                }
                line = lines.next_line() => line?,
            };
            let Some(line) = line else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            debug!(request = %line, "Received request");

            let request: JsonRpcRequest = match serde_json::from_str(&line) {
                Ok(r) => r,
                Err(e) => {
                    error!(error = %e, "Failed to parse request");
                    let response =
                        JsonRpcResponse::error(None, PARSE_ERROR, format!("Parse error: {}", e));
                    write_response(&mut writer, &response).await?;
                    continue;
                }
            };

            let notification = request.is_notification();
            let response = self.handle_request(request).await;
            if notification {
                continue;
            }

            write_response(&mut writer, &response).await?;
        }

        info!("MCP server shutdown");
        Ok(())
    }
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &JsonRpcResponse,
) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let response_json = serde_json::to_string(response)?;
    debug!(response = %response_json, "Sending response");
    writer.write_all(response_json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use osc_shared_types::{InstanceRef, ServiceId, TeardownReport};

    #[test]
    fn test_server_info() {
        let info = OscMcpServer::server_info();
        assert_eq!(info.name, "eyevinn-osc-mcp-server");
        assert!(!info.version.is_empty());
    }

    #[test]
    fn test_validation_maps_to_invalid_params() {
        let err = OscError::Validation("name: Invalid name".into());
        let response = error_response(Some(serde_json::json!(7)), &err);
        let error = response.error.unwrap();
        assert_eq!(error.code, INVALID_PARAMS);
        assert_eq!(error.message, "Invalid arguments: name: Invalid name");
        assert_eq!(response.id, Some(serde_json::json!(7)));
    }

    #[test]
    fn test_teardown_carries_report() {
        let report = TeardownReport {
            removed: vec![InstanceRef::new(ServiceId::ENCORE, "promo")],
            absent: vec![],
            failed: vec![(
                InstanceRef::new(ServiceId::ENCORE_CALLBACK_LISTENER, "promo"),
                "503".into(),
            )],
        };
        let response = error_response(None, &OscError::Teardown(report));
        let error = response.error.unwrap();
        assert_eq!(error.code, INTERNAL_ERROR);
        let data = error.data.unwrap();
        assert_eq!(data["removed"][0]["name"], "promo");
        assert_eq!(data["failed"][0][1], "503");
    }

    #[test]
    fn test_pipeline_abort_carries_constituents() {
        let err = OscError::PipelineAborted {
            pipeline: "promo".into(),
            cause: Box::new(OscError::Cancelled),
            rolled_back: vec![InstanceRef::new(ServiceId::ENCORE, "promo")],
            left_behind: vec![],
        };
        let data = error_response(None, &err).error.unwrap().data.unwrap();
        assert_eq!(data["cause"], "Operation cancelled");
        assert_eq!(data["rolledBack"][0]["serviceId"], "encore");
    }

    #[test]
    fn test_unserializable_output_is_an_error() {
        let mut output = std::collections::HashMap::new();
        output.insert((1u8, 2u8), "tuple keys are not JSON object keys");
        let err = to_json(output).unwrap_err();
        assert!(matches!(err, OscError::Serialization(_)));
        assert_eq!(error_response(None, &err).error.unwrap().code, INTERNAL_ERROR);
    }

    #[test]
    fn test_notification_detection() {
        let request: JsonRpcRequest = serde_json::from_str(
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        )
        .unwrap();
        assert!(request.is_notification());
    }
}
