//! Memory write/read tools.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use elefante_core::{AgentEnrichment, ConflictPolicy, Namespace, Orchestrator, Source};

use super::core_err;

pub fn add_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "content": {
                "type": "string",
                "description": "One atomic piece of knowledge"
            },
            "enrichment": {
                "type": "object",
                "description": "Agent-supplied classification: canonicalKey, layer, sublayer, ring, knowledgeType, importance (1-10), namespace, ephemeral, expiresAt, tags, entities, relationships"
            },
            "source": {
                "type": "string",
                "description": "Origin of the memory",
                "enum": ["user_input", "agent", "test_suite", "import", "system"],
                "default": "agent"
            },
            "sessionId": {
                "type": "string",
                "description": "Session binding; the compliance gate is per session"
            }
        },
        "required": ["content"]
    })
}

pub fn get_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "id": { "type": "string", "description": "Memory id" }
        },
        "required": ["id"]
    })
}

pub fn delete_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "id": { "type": "string", "description": "Memory id" },
            "sessionId": { "type": "string" }
        },
        "required": ["id"]
    })
}

pub fn list_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "limit": {
                "type": "integer",
                "description": "Maximum results (default: 20)",
                "default": 20,
                "minimum": 1,
                "maximum": 200
            },
            "namespace": {
                "type": "string",
                "enum": ["prod", "test", "ephemeral"],
                "description": "Namespace to browse (default: prod)"
            }
        }
    })
}

pub fn resolve_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "firstId": {
                "type": "string",
                "description": "First memory of the conflicting pair (the winner under the manual policy)"
            },
            "secondId": { "type": "string", "description": "Second memory of the pair" },
            "policy": {
                "type": "string",
                "enum": ["manual", "latest_wins", "source_priority"],
                "default": "manual"
            },
            "sessionId": { "type": "string" }
        },
        "required": ["firstId", "secondId"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddArgs {
    content: String,
    #[serde(default)]
    enrichment: Option<AgentEnrichment>,
    source: Option<String>,
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdArgs {
    id: String,
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListArgs {
    limit: Option<usize>,
    namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveArgs {
    first_id: String,
    second_id: String,
    policy: Option<String>,
    session_id: Option<String>,
}

pub async fn execute_add(core: &Arc<Orchestrator>, args: Option<Value>) -> Result<Value, String> {
    let args: AddArgs = parse_args(args)?;
    let source = match args.source.as_deref() {
        Some(s) => Source::parse_name(s).ok_or_else(|| format!("unknown source: {}", s))?,
        None => Source::Agent,
    };
    let enrichment = args.enrichment.unwrap_or_default();

    let outcome = core
        .add_memory(&args.content, &enrichment, source, args.session_id.as_deref())
        .await
        .map_err(core_err)?;

    Ok(serde_json::json!({
        "id": outcome.id,
        "action": outcome.action.as_str(),
        "memory": outcome.memory,
    }))
}

pub async fn execute_get(core: &Arc<Orchestrator>, args: Option<Value>) -> Result<Value, String> {
    let args: IdArgs = parse_args(args)?;
    let memory = core.get_memory(&args.id).map_err(core_err)?;
    match memory {
        Some(memory) => Ok(serde_json::json!({ "memory": memory })),
        None => Err(format!("not_found: no memory with id {}", args.id)),
    }
}

pub async fn execute_delete(
    core: &Arc<Orchestrator>,
    args: Option<Value>,
) -> Result<Value, String> {
    let args: IdArgs = parse_args(args)?;
    let removed = core
        .delete_memory(&args.id, args.session_id.as_deref())
        .await
        .map_err(core_err)?;
    Ok(serde_json::json!({ "deleted": removed.id }))
}

pub async fn execute_list(core: &Arc<Orchestrator>, args: Option<Value>) -> Result<Value, String> {
    let args: ListArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {}", e))?,
        None => ListArgs {
            limit: None,
            namespace: None,
        },
    };
    let namespace = match args.namespace.as_deref() {
        Some(s) => Some(Namespace::parse_name(s).ok_or_else(|| format!("unknown namespace: {}", s))?),
        None => None,
    };
    let records = core
        .list_recent(args.limit.unwrap_or(20).clamp(1, 200), namespace)
        .map_err(core_err)?;
    Ok(serde_json::json!({
        "total": records.len(),
        "memories": records,
    }))
}

pub async fn execute_resolve(
    core: &Arc<Orchestrator>,
    args: Option<Value>,
) -> Result<Value, String> {
    let args: ResolveArgs = parse_args(args)?;
    let policy = match args.policy.as_deref() {
        Some(s) => ConflictPolicy::parse_name(s).ok_or_else(|| format!("unknown policy: {}", s))?,
        None => ConflictPolicy::Manual,
    };
    let resolution = core
        .resolve_conflict(
            &args.first_id,
            &args.second_id,
            policy,
            args.session_id.as_deref(),
        )
        .await
        .map_err(core_err)?;
    Ok(serde_json::to_value(resolution).map_err(|e| e.to_string())?)
}

fn parse_args<T: serde::de::DeserializeOwned>(args: Option<Value>) -> Result<T, String> {
    match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {}", e)),
        None => Err("Missing arguments".to_string()),
    }
}
