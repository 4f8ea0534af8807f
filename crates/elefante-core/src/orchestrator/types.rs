//! Public result types of the orchestrator API.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::{IngestAction, MemoryRecord, Source};
use crate::session::SessionGate;

/// Outcome of `add_memory`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOutcome {
    /// Id of the affected memory (existing on REINFORCE, new otherwise)
    pub id: String,
    /// Decision the refinery took
    pub action: IngestAction,
    /// The affected memory after the write
    pub memory: MemoryRecord,
}

/// An entity as returned by `create_entity`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityOut {
    pub id: String,
    pub name: String,
    pub entity_type: String,
    pub props: serde_json::Value,
}

/// A relationship as returned by `create_relationship`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipOut {
    pub src_id: String,
    pub dst_id: String,
    /// Relationship discriminator
    pub relation: String,
}

/// Dual-store consistency snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreHealth {
    /// Both stores agree on the id set
    pub consistent: bool,
    /// Ids present in the vector store but missing a graph node
    pub vector_only: Vec<String>,
    /// Memory node ids present in the graph but missing a vector record
    pub graph_only: Vec<String>,
}

/// Output of `get_stats`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    /// Total records in the vector store
    pub vector_count: i64,
    /// Graph node counts keyed by label
    pub graph_nodes_by_label: BTreeMap<String, i64>,
    /// Total graph edges
    pub graph_edge_count: i64,
    /// Record counts keyed by namespace
    pub namespaces: BTreeMap<String, i64>,
    /// Dual-store consistency
    pub health: StoreHealth,
}

/// Output of `get_context`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSnapshot {
    pub session_id: String,
    /// Compliance gate state for the session
    pub gate: SessionGate,
    /// Most recent memories created in the session
    pub recent_memories: Vec<MemoryRecord>,
    /// Entities referenced by those memories
    pub entities: Vec<EntityOut>,
    /// Relationships among those entities
    pub relationships: Vec<RelationshipOut>,
}

/// Conflict-resolution policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Caller names the winner explicitly (first argument)
    Manual,
    /// Most recently created memory wins
    LatestWins,
    /// Higher source priority wins; creation time breaks ties
    SourcePriority,
}

impl ConflictPolicy {
    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(ConflictPolicy::Manual),
            "latest_wins" => Some(ConflictPolicy::LatestWins),
            "source_priority" => Some(ConflictPolicy::SourcePriority),
            _ => None,
        }
    }

    /// Pick the winner between two memories under this policy. `first` is
    /// the caller-preferred winner for the manual policy.
    pub fn pick<'a>(
        &self,
        first: &'a MemoryRecord,
        second: &'a MemoryRecord,
    ) -> (&'a MemoryRecord, &'a MemoryRecord) {
        match self {
            ConflictPolicy::Manual => (first, second),
            ConflictPolicy::LatestWins => {
                if first.created_at >= second.created_at {
                    (first, second)
                } else {
                    (second, first)
                }
            }
            ConflictPolicy::SourcePriority => {
                match first.source.priority().cmp(&second.source.priority()) {
                    std::cmp::Ordering::Greater => (first, second),
                    std::cmp::Ordering::Less => (second, first),
                    std::cmp::Ordering::Equal => {
                        if first.created_at >= second.created_at {
                            (first, second)
                        } else {
                            (second, first)
                        }
                    }
                }
            }
        }
    }
}

/// Outcome of `resolve_conflict`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictResolution {
    pub winner_id: String,
    pub loser_id: String,
    pub policy: ConflictPolicy,
    pub resolved_at: DateTime<Utc>,
}

/// One collapsed duplicate group in a consolidation report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    pub namespace: String,
    pub canonical_key: String,
    pub survivor_id: String,
    /// Ids demoted to redundant (exact content duplicates)
    pub demoted_redundant: Vec<String>,
    /// Ids linked as superseded (same key, different content)
    pub linked_superseded: Vec<String>,
}

/// Output of `consolidate`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationReport {
    /// Whether this run only reported without writing
    pub dry_run: bool,
    pub groups: Vec<DuplicateGroup>,
    /// Expired memories archived by the sweep
    pub expired_archived: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ConsolidationReport {
    /// True when the run found nothing to do
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.expired_archived.is_empty()
    }
}
