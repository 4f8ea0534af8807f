//! Housekeeping tool.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use elefante_core::Orchestrator;

use super::core_err;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "dryRun": {
                "type": "boolean",
                "description": "Report without writing (default: true)",
                "default": true
            },
            "force": {
                "type": "boolean",
                "description": "Apply changes even when dryRun is set (default: false)",
                "default": false
            }
        }
    })
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConsolidateArgs {
    dry_run: Option<bool>,
    force: Option<bool>,
}

pub async fn execute(core: &Arc<Orchestrator>, args: Option<Value>) -> Result<Value, String> {
    let args: ConsolidateArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {}", e))?,
        None => ConsolidateArgs::default(),
    };
    let report = core
        .consolidate(args.dry_run.unwrap_or(true), args.force.unwrap_or(false))
        .await
        .map_err(core_err)?;
    serde_json::to_value(report).map_err(|e| e.to_string())
}
