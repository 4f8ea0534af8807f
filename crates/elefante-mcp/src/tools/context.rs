//! Session context and statistics tools.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use elefante_core::Orchestrator;

use super::core_err;

pub fn context_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "sessionId": { "type": "string", "description": "Session to snapshot" },
            "depth": {
                "type": "integer",
                "description": "How many recent memories to include (default: 10)",
                "default": 10,
                "minimum": 1,
                "maximum": 100
            }
        },
        "required": ["sessionId"]
    })
}

pub fn stats_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {}
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContextArgs {
    session_id: String,
    depth: Option<usize>,
}

pub async fn execute_context(
    core: &Arc<Orchestrator>,
    args: Option<Value>,
) -> Result<Value, String> {
    let args: ContextArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {}", e))?,
        None => return Err("Missing arguments".to_string()),
    };
    let snapshot = core
        .get_context(&args.session_id, args.depth.map(|d| d.clamp(1, 100)))
        .map_err(core_err)?;
    serde_json::to_value(snapshot).map_err(|e| e.to_string())
}

pub async fn execute_stats(
    core: &Arc<Orchestrator>,
    _args: Option<Value>,
) -> Result<Value, String> {
    let stats = core.get_stats().map_err(core_err)?;
    serde_json::to_value(stats).map_err(|e| e.to_string())
}
