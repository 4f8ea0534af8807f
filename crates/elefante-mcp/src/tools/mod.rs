//! Tool handlers - a 1:1 translation of MCP tool calls to orchestrator
//! operations. No logic lives here beyond argument parsing and result
//! shaping.

pub mod consolidate;
pub mod context;
pub mod graph;
pub mod memory;
pub mod search;

use std::sync::Arc;

use serde_json::Value;

use elefante_core::{CoreError, Orchestrator};

use crate::protocol::types::ToolDescription;

/// Render a core error with its stable machine code
pub(crate) fn core_err(e: CoreError) -> String {
    format!("{}: {}", e.code(), e)
}

/// The complete tool surface
pub fn descriptions() -> Vec<ToolDescription> {
    vec![
        ToolDescription {
            name: "add_memory".to_string(),
            description: Some(
                "Ingest one atomic memory. The refinery decides ADD/REINFORCE/SUPERSEDE/CONTRADICT \
                 against the active memory for its canonical key. Requires a preceding \
                 search_memories call in the same session (search-before-write gate)."
                    .to_string(),
            ),
            input_schema: memory::add_schema(),
        },
        ToolDescription {
            name: "search_memories".to_string(),
            description: Some(
                "Retrieve memories by composite score (similarity, concept overlap, domain, \
                 co-activation, authority, recency) with per-signal explanations and a \
                 constellation structure. Opens the session's write gate."
                    .to_string(),
            ),
            input_schema: search::search_schema(),
        },
        ToolDescription {
            name: "assert_compliance".to_string(),
            description: Some(
                "Mint a compliance stamp proving a search preceded this call; consumes the \
                 session's search token."
                    .to_string(),
            ),
            input_schema: search::assert_schema(),
        },
        ToolDescription {
            name: "get_memory".to_string(),
            description: Some("Fetch one memory by id.".to_string()),
            input_schema: memory::get_schema(),
        },
        ToolDescription {
            name: "delete_memory".to_string(),
            description: Some(
                "Remove a memory from both stores. Gated like any other write.".to_string(),
            ),
            input_schema: memory::delete_schema(),
        },
        ToolDescription {
            name: "list_recent".to_string(),
            description: Some("Browse memories chronologically, newest first.".to_string()),
            input_schema: memory::list_schema(),
        },
        ToolDescription {
            name: "resolve_conflict".to_string(),
            description: Some(
                "Settle a contradiction: promote one memory and demote the other under the \
                 chosen policy (manual, latest_wins, source_priority)."
                    .to_string(),
            ),
            input_schema: memory::resolve_schema(),
        },
        ToolDescription {
            name: "query_graph".to_string(),
            description: Some(
                "Read-only query over the property graph (graph_nodes / graph_edges). Single \
                 SELECT/WITH statement; positional parameters."
                    .to_string(),
            ),
            input_schema: graph::query_schema(),
        },
        ToolDescription {
            name: "create_entity".to_string(),
            description: Some(
                "Create (or merge into) a named entity node in the graph.".to_string(),
            ),
            input_schema: graph::entity_schema(),
        },
        ToolDescription {
            name: "create_relationship".to_string(),
            description: Some(
                "Create a typed RELATES_TO edge between two existing graph nodes.".to_string(),
            ),
            input_schema: graph::relationship_schema(),
        },
        ToolDescription {
            name: "get_context".to_string(),
            description: Some(
                "Read-only snapshot of one session: gate state, recent memories, entities, \
                 relationships."
                    .to_string(),
            ),
            input_schema: context::context_schema(),
        },
        ToolDescription {
            name: "get_stats".to_string(),
            description: Some(
                "Store-wide counts plus a dual-store consistency health check.".to_string(),
            ),
            input_schema: context::stats_schema(),
        },
        ToolDescription {
            name: "consolidate".to_string(),
            description: Some(
                "Deterministic housekeeping: collapse duplicate canonical groups and archive \
                 expired memories. Dry-run by default; never runs implicitly."
                    .to_string(),
            ),
            input_schema: consolidate::schema(),
        },
    ]
}

/// Route one tool call to its handler
pub async fn dispatch(
    core: &Arc<Orchestrator>,
    name: &str,
    args: Option<Value>,
) -> Result<Value, String> {
    match name {
        "add_memory" => memory::execute_add(core, args).await,
        "get_memory" => memory::execute_get(core, args).await,
        "delete_memory" => memory::execute_delete(core, args).await,
        "list_recent" => memory::execute_list(core, args).await,
        "resolve_conflict" => memory::execute_resolve(core, args).await,
        "search_memories" => search::execute_search(core, args).await,
        "assert_compliance" => search::execute_assert(core, args).await,
        "query_graph" => graph::execute_query(core, args).await,
        "create_entity" => graph::execute_create_entity(core, args).await,
        "create_relationship" => graph::execute_create_relationship(core, args).await,
        "get_context" => context::execute_context(core, args).await,
        "get_stats" => context::execute_stats(core, args).await,
        "consolidate" => consolidate::execute(core, args).await,
        other => Err(format!("unknown tool: {}", other)),
    }
}
