//! MCP server core: routes JSON-RPC requests to tool handlers.

use std::sync::Arc;

use tracing::{debug, info, warn};

use elefante_core::Orchestrator;

use crate::protocol::types::{
    CallToolRequest, InitializeRequest, InitializeResult, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, ServerCapabilities, ServerInfo, ToolDescription, MCP_VERSION,
};
use crate::tools;

/// MCP server over one orchestrator instance
pub struct McpServer {
    core: Arc<Orchestrator>,
    initialized: bool,
}

impl McpServer {
    pub fn new(core: Arc<Orchestrator>) -> Self {
        Self {
            core,
            initialized: false,
        }
    }

    /// Handle one JSON-RPC request; `None` for notifications
    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("Handling request: {}", request.method);

        if !self.initialized
            && request.method != "initialize"
            && request.method != "notifications/initialized"
        {
            warn!("Rejecting request '{}': server not initialized", request.method);
            return Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::server_not_initialized(),
            ));
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params),
            "notifications/initialized" => return None,
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(request.params).await,
            "ping" => Ok(serde_json::json!({})),
            method => {
                warn!("Unknown method: {}", method);
                Err(JsonRpcError::method_not_found())
            }
        };

        Some(match result {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(error) => JsonRpcResponse::error(request.id, error),
        })
    }

    fn handle_initialize(
        &mut self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: InitializeRequest = match params {
            Some(p) => serde_json::from_value(p)
                .map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => InitializeRequest::default(),
        };

        // Use the client's version when it is older; clients reject newer servers
        let negotiated_version = if request.protocol_version.as_str() < MCP_VERSION {
            info!(
                "Client requested older protocol version {}, using it",
                request.protocol_version
            );
            request.protocol_version.clone()
        } else {
            MCP_VERSION.to_string()
        };

        self.initialized = true;
        info!("MCP session initialized with protocol version {}", negotiated_version);

        let result = InitializeResult {
            protocol_version: negotiated_version,
            server_info: ServerInfo {
                name: "elefante".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            capabilities: ServerCapabilities {
                tools: Some(serde_json::json!({ "listChanged": false })),
            },
            instructions: Some(
                "Elefante is a persistent memory system. Always call search_memories before \
                 add_memory: every write consumes a one-shot search token for its session, and \
                 writes without one fail with compliance_gate_closed. Ingestion deduplicates by \
                 canonical key - identical content reinforces, changed wording supersedes, and \
                 opposing statements are stored as contradictions awaiting resolve_conflict."
                    .to_string(),
            ),
        };

        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    fn handle_tools_list(&self) -> Result<serde_json::Value, JsonRpcError> {
        let descriptions: Vec<ToolDescription> = tools::descriptions();
        Ok(serde_json::json!({ "tools": descriptions }))
    }

    async fn handle_tools_call(
        &self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let call: CallToolRequest = match params {
            Some(p) => serde_json::from_value(p)
                .map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => return Err(JsonRpcError::invalid_params("missing tool call params")),
        };

        match tools::dispatch(&self.core, &call.name, call.arguments).await {
            Ok(result) => {
                let text = serde_json::to_string_pretty(&result)
                    .map_err(|e| JsonRpcError::internal_error(&e.to_string()))?;
                Ok(serde_json::json!({
                    "content": [{ "type": "text", "text": text }],
                    "isError": false,
                }))
            }
            Err(message) => {
                // Tool failures travel as tool results, not protocol errors,
                // so the client model can read and react to them
                Ok(serde_json::json!({
                    "content": [{ "type": "text", "text": message }],
                    "isError": true,
                }))
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use elefante_core::{CoreConfig, HashedEmbedder};
    use serde_json::json;
    use tempfile::TempDir;

    fn server() -> (TempDir, McpServer) {
        let dir = TempDir::new().unwrap();
        let config = CoreConfig {
            data_root: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let core = Orchestrator::open(config, Arc::new(HashedEmbedder::new(128))).unwrap();
        (dir, McpServer::new(Arc::new(core)))
    }

    fn request(method: &str, params: serde_json::Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: method.to_string(),
            params: Some(params),
        }
    }

    #[tokio::test]
    async fn test_requires_initialize_first() {
        let (_dir, mut server) = server();
        let response = server
            .handle_request(request("tools/list", json!({})))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32003);
    }

    #[tokio::test]
    async fn test_initialize_then_list_tools() {
        let (_dir, mut server) = server();
        let response = server
            .handle_request(request("initialize", json!({"protocolVersion": MCP_VERSION})))
            .await
            .unwrap();
        assert!(response.error.is_none());

        let response = server
            .handle_request(request("tools/list", json!({})))
            .await
            .unwrap();
        let tools = response.result.unwrap();
        let names: Vec<&str> = tools["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"add_memory"));
        assert!(names.contains(&"search_memories"));
        assert!(names.contains(&"consolidate"));
    }

    #[tokio::test]
    async fn test_gate_error_travels_as_tool_result() {
        let (_dir, mut server) = server();
        server
            .handle_request(request("initialize", json!({})))
            .await
            .unwrap();

        // add_memory before any search: the gate rejects, as a tool error
        let response = server
            .handle_request(request(
                "tools/call",
                json!({"name": "add_memory", "arguments": {"content": "premature write"}}),
            ))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("compliance_gate_closed"));
    }

    #[tokio::test]
    async fn test_search_then_add_roundtrip() {
        let (_dir, mut server) = server();
        server
            .handle_request(request("initialize", json!({})))
            .await
            .unwrap();

        let response = server
            .handle_request(request(
                "tools/call",
                json!({"name": "search_memories", "arguments": {"query": "anything"}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.result.unwrap()["isError"], false);

        let response = server
            .handle_request(request(
                "tools/call",
                json!({"name": "add_memory", "arguments": {"content": "gated write succeeds"}}),
            ))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["isError"], false);
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("\"action\": \"ADD\""));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (_dir, mut server) = server();
        server
            .handle_request(request("initialize", json!({})))
            .await
            .unwrap();
        let response = server
            .handle_request(request(
                "tools/call",
                json!({"name": "does_not_exist", "arguments": {}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.result.unwrap()["isError"], true);
    }
}
