//! stdio transport for MCP.
//!
//! Reads line-delimited JSON-RPC from stdin and writes responses to stdout.
//! Stdout carries protocol traffic only; everything else goes to stderr via
//! tracing. Oversized payloads are rejected before parsing.

use std::io::{self, BufRead, BufReader, Write};

use tracing::{debug, error, warn};

use super::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::server::McpServer;

/// Largest accepted request line
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// stdio transport for the MCP server
pub struct StdioTransport;

impl StdioTransport {
    pub fn new() -> Self {
        Self
    }

    /// Run the server over stdio until stdin closes
    pub async fn run(self, mut server: McpServer) -> Result<(), io::Error> {
        let stdin = io::stdin();
        let stdout = io::stdout();

        let reader = BufReader::new(stdin.lock());
        let mut stdout = stdout.lock();

        for line in reader.lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    error!("Failed to read line: {}", e);
                    break;
                }
            };

            if line.is_empty() {
                continue;
            }

            if line.len() > MAX_LINE_BYTES {
                warn!("Rejecting oversized payload: {} bytes", line.len());
                let response = JsonRpcResponse::error(
                    None,
                    JsonRpcError::invalid_request("payload too large"),
                );
                Self::write_response(&mut stdout, &response)?;
                continue;
            }

            debug!("Received: {} bytes", line.len());

            let request: JsonRpcRequest = match serde_json::from_str(&line) {
                Ok(r) => r,
                Err(e) => {
                    warn!("Failed to parse request: {}", e);
                    let response = JsonRpcResponse::error(None, JsonRpcError::parse_error());
                    Self::write_response(&mut stdout, &response)?;
                    continue;
                }
            };

            if let Some(response) = server.handle_request(request).await {
                Self::write_response(&mut stdout, &response)?;
            }
        }

        Ok(())
    }

    fn write_response(
        stdout: &mut impl Write,
        response: &JsonRpcResponse,
    ) -> Result<(), io::Error> {
        match serde_json::to_string(response) {
            Ok(json) => {
                debug!("Sending: {} bytes", json.len());
                writeln!(stdout, "{}", json)?;
                stdout.flush()
            }
            Err(e) => {
                error!("Failed to serialize response: {}", e);
                // Minimal fallback so the client does not hang
                let fallback = r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error"}}"#;
                writeln!(stdout, "{}", fallback)?;
                stdout.flush()
            }
        }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}
