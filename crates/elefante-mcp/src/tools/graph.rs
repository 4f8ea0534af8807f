//! Graph surface tools.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use elefante_core::Orchestrator;

use super::core_err;

pub fn query_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "sql": {
                "type": "string",
                "description": "Single read-only SELECT/WITH statement over graph_nodes(id, label, name, props, created_at) and graph_edges(id, src_id, dst_id, edge_type, props, created_at)"
            },
            "params": {
                "type": "array",
                "description": "Positional parameters bound to ?1, ?2, ...",
                "items": {}
            }
        },
        "required": ["sql"]
    })
}

pub fn entity_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "name": { "type": "string", "description": "Entity name (merge key)" },
            "entityType": {
                "type": "string",
                "description": "Entity kind, e.g. person, project, technology, file"
            },
            "props": { "type": "object", "description": "Arbitrary JSON payload" }
        },
        "required": ["name", "entityType"]
    })
}

pub fn relationship_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "srcId": { "type": "string", "description": "Source node id" },
            "dstId": { "type": "string", "description": "Target node id" },
            "relation": { "type": "string", "description": "Relationship discriminator" }
        },
        "required": ["srcId", "dstId", "relation"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryArgs {
    sql: String,
    #[serde(default)]
    params: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntityArgs {
    name: String,
    entity_type: String,
    #[serde(default)]
    props: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelationshipArgs {
    src_id: String,
    dst_id: String,
    relation: String,
}

pub async fn execute_query(core: &Arc<Orchestrator>, args: Option<Value>) -> Result<Value, String> {
    let args: QueryArgs = parse_args(args)?;
    let rows = core.query_graph(&args.sql, &args.params).map_err(core_err)?;
    Ok(serde_json::json!({
        "total": rows.len(),
        "rows": rows,
    }))
}

pub async fn execute_create_entity(
    core: &Arc<Orchestrator>,
    args: Option<Value>,
) -> Result<Value, String> {
    let args: EntityArgs = parse_args(args)?;
    let entity = core
        .create_entity(&args.name, &args.entity_type, args.props)
        .await
        .map_err(core_err)?;
    serde_json::to_value(entity).map_err(|e| e.to_string())
}

pub async fn execute_create_relationship(
    core: &Arc<Orchestrator>,
    args: Option<Value>,
) -> Result<Value, String> {
    let args: RelationshipArgs = parse_args(args)?;
    let edge = core
        .create_relationship(&args.src_id, &args.dst_id, &args.relation)
        .await
        .map_err(core_err)?;
    serde_json::to_value(edge).map_err(|e| e.to_string())
}

fn parse_args<T: serde::de::DeserializeOwned>(args: Option<Value>) -> Result<T, String> {
    match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {}", e)),
        None => Err("Missing arguments".to_string()),
    }
}
