//! Retrieval and compliance tools.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use elefante_core::Orchestrator;

use super::core_err;

pub fn search_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Search query"
            },
            "limit": {
                "type": "integer",
                "description": "Maximum results (default: 10)",
                "default": 10,
                "minimum": 1,
                "maximum": 50
            },
            "filters": {
                "type": "object",
                "description": "Metadata predicates: namespaces, statuses, layer, knowledgeType, canonicalKey, sessionId, tagsAny, modifiedSince, modifiedUntil. Defaults to namespace prod, status active."
            },
            "sessionId": {
                "type": "string",
                "description": "Session to issue the search token for, and to blend conversation context from"
            }
        },
        "required": ["query"]
    })
}

pub fn assert_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "sessionId": { "type": "string" }
        }
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchArgs {
    query: String,
    limit: Option<usize>,
    filters: Option<Value>,
    session_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct AssertArgs {
    session_id: Option<String>,
}

pub async fn execute_search(
    core: &Arc<Orchestrator>,
    args: Option<Value>,
) -> Result<Value, String> {
    let args: SearchArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {}", e))?,
        None => return Err("Missing arguments".to_string()),
    };

    let response = core
        .search_memories(
            &args.query,
            args.limit.map(|l| l.clamp(1, 50)),
            args.filters,
            args.session_id.as_deref(),
        )
        .await
        .map_err(core_err)?;

    let results: Vec<Value> = response
        .results
        .iter()
        .map(|r| {
            serde_json::json!({
                "id": r.memory.id,
                "content": r.memory.content,
                "canonicalKey": r.memory.canonical_key,
                "score": r.score,
                "similarity": r.similarity,
                "status": r.memory.status,
                "authorityScore": r.memory.authority_score,
                "explanation": r.explanation,
            })
        })
        .collect();

    Ok(serde_json::json!({
        "query": args.query,
        "total": results.len(),
        "results": results,
        "constellation": response.constellation,
        "synthesis": response.synthesis,
    }))
}

pub async fn execute_assert(
    core: &Arc<Orchestrator>,
    args: Option<Value>,
) -> Result<Value, String> {
    let args: AssertArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {}", e))?,
        None => AssertArgs::default(),
    };
    let stamp = core
        .assert_compliance(args.session_id.as_deref())
        .map_err(core_err)?;
    serde_json::to_value(stamp).map_err(|e| e.to_string())
}
