//! Orchestrator - the public API of the memory core
//!
//! Composes the refinery, dual store, lock manager, compliance gate, and
//! retriever under an invariant-preserving protocol:
//!
//! ```text
//! compliance gate -> refinery -> write lock -> dual-store update -> score
//! ```
//!
//! Within one `add_memory` the vector insert precedes the graph insert, and
//! both precede edge creation; a reader may briefly observe a memory without
//! edges, which retrieval tolerates (graph-derived signals default to 0).
//! On failure, earlier effects are rolled back before the error surfaces;
//! a failed rollback archives the vector record and logs for manual
//! reconciliation.

mod consolidate;
mod oplog;
mod types;

pub use types::{
    AddOutcome, ConflictPolicy, ConflictResolution, ConsolidationReport, ContextSnapshot,
    DuplicateGroup, EntityOut, RelationshipOut, StatsReport, StoreHealth,
};

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use oplog::OperationLog;

use crate::config::CoreConfig;
use crate::embed::{Embedding, EmbeddingProvider};
use crate::error::{CoreError, Result};
use crate::graph::{EdgeType, GraphStore, NodeLabel};
use crate::memory::{
    AgentEnrichment, IngestAction, MemoryRecord, MemoryStatus, Namespace, Source,
};
use crate::refinery::{recompute_authority, RefinedCandidate, Refinery};
use crate::retrieval::{CognitiveRetriever, SearchResponse};
use crate::session::{ComplianceGate, ComplianceStamp};
use crate::lock::LockManager;
use crate::vector::{MemoryFilter, VectorStore};

/// Default result count for `search_memories`
const DEFAULT_K: usize = 10;

/// Default depth for `get_context`
const DEFAULT_CONTEXT_DEPTH: usize = 10;

/// The invariant-preserving composition of the memory core. This is the only
/// type external callers (RPC adapters, scripts, tests) should depend on.
pub struct Orchestrator {
    config: CoreConfig,
    refinery: Refinery,
    vector: Arc<VectorStore>,
    graph: Arc<GraphStore>,
    locks: LockManager,
    gate: ComplianceGate,
    embedder: Arc<dyn EmbeddingProvider>,
    retriever: CognitiveRetriever,
    oplog: OperationLog,
}

impl Orchestrator {
    /// Open the core over the configured data root. Layout beneath it:
    /// `vector/`, `graph/`, `locks/`, `logs/`.
    pub fn open(config: CoreConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let data_root = Self::resolve_data_root(&config)?;

        let vector = Arc::new(VectorStore::open(
            &data_root.join("vector"),
            embedder.dimensions(),
        )?);
        let graph = Arc::new(GraphStore::open(&data_root.join("graph").join("graph.db"))?);
        let locks = LockManager::new(
            &data_root.join("locks"),
            config.lock_acquire_timeout_ms,
            config.lock_stale_threshold_ms,
        )?;
        let gate = ComplianceGate::new(config.enforce_compliance_gate);
        let oplog = OperationLog::open(&data_root.join("logs").join("operations.log"))?;

        let retriever = CognitiveRetriever::new(
            Arc::clone(&vector),
            Arc::clone(&graph),
            Arc::clone(&embedder),
            config.clone(),
        );

        Ok(Self {
            refinery: Refinery::new(config.clone()),
            config,
            vector,
            graph,
            locks,
            gate,
            embedder,
            retriever,
            oplog,
        })
    }

    fn resolve_data_root(config: &CoreConfig) -> Result<PathBuf> {
        if let Some(root) = &config.data_root {
            std::fs::create_dir_all(root)?;
            return Ok(root.clone());
        }
        let proj_dirs = directories::ProjectDirs::from("ai", "elefante", "core")
            .ok_or_else(|| CoreError::Init("could not determine data directory".to_string()))?;
        let root = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(root)
    }

    /// Deploy-time configuration this core was opened with
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub(crate) fn vector(&self) -> &VectorStore {
        &self.vector
    }

    pub(crate) fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub(crate) fn locks(&self) -> &LockManager {
        &self.locks
    }

    pub(crate) fn oplog(&self) -> &OperationLog {
        &self.oplog
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Ingest one memory. The compliance gate must be open for the session;
    /// the refinery decides between ADD, REINFORCE, SUPERSEDE, and
    /// CONTRADICT against the current active memory for the canonical key.
    pub async fn add_memory(
        &self,
        content: &str,
        enrichment: &AgentEnrichment,
        source: Source,
        session_id: Option<&str>,
    ) -> Result<AddOutcome> {
        if content.trim().is_empty() {
            return Err(CoreError::ContentRequired);
        }
        // Checked up front, consumed only after the write lands, so a failed
        // transaction leaves the token usable for a retry
        self.gate.require_open(session_id)?;

        let candidate = self.refinery.refine(content, enrichment, source)?;
        let active = self
            .vector
            .active_for(candidate.namespace, &candidate.canonical_key.to_string())?;
        let action = self.refinery.decide_action(&candidate, active.as_ref());

        let outcome = match action {
            IngestAction::Reinforce => {
                // decide_action only returns Reinforce when an active exists
                let active = active.ok_or_else(|| {
                    CoreError::InvariantViolation("REINFORCE without an active memory".into())
                })?;
                self.reinforce(active).await?
            }
            _ => {
                self.insert_new(candidate, action, active, enrichment, session_id)
                    .await?
            }
        };

        self.gate.consume_for_write(session_id)?;
        self.oplog.record(
            "add_memory",
            serde_json::json!({
                "id": outcome.id,
                "action": outcome.action.as_str(),
                "canonicalKey": outcome.memory.canonical_key,
                "namespace": outcome.memory.namespace.as_str(),
            }),
        );
        Ok(outcome)
    }

    /// Bookkeeping-only update for an exact duplicate of the active memory
    async fn reinforce(&self, mut active: MemoryRecord) -> Result<AddOutcome> {
        let _lock = self.locks.acquire("add_memory:reinforce").await?;
        let now = Utc::now();
        active.access_count += 1;
        active.last_modified = now;
        active.last_accessed = now;
        active.authority_score = recompute_authority(&active, now);

        self.vector.update_record(&active)?;
        self.graph
            .upsert_node(NodeLabel::Memory, &active.id, &memory_node_props(&active))?;

        Ok(AddOutcome {
            id: active.id.clone(),
            action: IngestAction::Reinforce,
            memory: active,
        })
    }

    /// Insert a new memory (ADD / SUPERSEDE / CONTRADICT) as one logical
    /// transaction under the write lock
    async fn insert_new(
        &self,
        candidate: RefinedCandidate,
        action: IngestAction,
        active: Option<MemoryRecord>,
        enrichment: &AgentEnrichment,
        session_id: Option<&str>,
    ) -> Result<AddOutcome> {
        let embedder = Arc::clone(&self.embedder);
        let text = candidate.content.clone();
        let embedding = tokio::task::spawn_blocking(move || embedder.embed(&text))
            .await
            .map_err(|e| CoreError::Embedding(e.to_string()))?
            .map_err(|e| CoreError::Embedding(e.to_string()))?;

        let _lock = self.locks.acquire("add_memory").await?;
        let now = Utc::now();

        let mut record = candidate.into_record(session_id.map(str::to_string), now);
        record.related_memory_ids = enrichment.related_memory_ids.clone();
        match (&action, &active) {
            (IngestAction::Supersede, Some(old)) => {
                record.supersedes_id = Some(old.id.clone());
            }
            (IngestAction::Contradict, Some(old)) => {
                record.status = MemoryStatus::Contradictory;
                record.conflict_ids.push(old.id.clone());
            }
            _ => {}
        }

        let predecessor_preimage = active.clone();
        match self.write_dual_store(&mut record, &embedding, action, active, enrichment, session_id)
        {
            Ok(()) => Ok(AddOutcome {
                id: record.id.clone(),
                action,
                memory: record,
            }),
            Err(e) => {
                self.rollback_insert(&record.id, predecessor_preimage.as_ref());
                Err(e)
            }
        }
    }

    /// Staged dual-store write. Predecessor mutation comes last so earlier
    /// failures need no predecessor restore.
    fn write_dual_store(
        &self,
        record: &mut MemoryRecord,
        embedding: &Embedding,
        action: IngestAction,
        active: Option<MemoryRecord>,
        enrichment: &AgentEnrichment,
        session_id: Option<&str>,
    ) -> Result<()> {
        // 1. Vector record (durable before return)
        self.vector.upsert(record, embedding)?;

        // 2. Memory node
        self.graph
            .upsert_node(NodeLabel::Memory, &record.id, &memory_node_props(record))?;

        // 3. Concept nodes are MERGEd so each canonical name exists once
        for concept in &record.concepts {
            let concept_id =
                self.graph
                    .merge_node_by_name(NodeLabel::Concept, concept, &serde_json::json!({}))?;
            self.graph.upsert_edge(
                &record.id,
                &concept_id,
                EdgeType::HasConcept,
                &serde_json::json!({}),
            )?;
        }

        // 4. Entities from agent enrichment
        let mut entity_ids: BTreeMap<&str, String> = BTreeMap::new();
        for entity in &enrichment.entities {
            let props = serde_json::json!({
                "entity_type": entity.entity_type,
                "props": entity.props,
            });
            let entity_id =
                self.graph
                    .merge_node_by_name(NodeLabel::Entity, &entity.name, &props)?;
            self.graph.upsert_edge(
                &record.id,
                &entity_id,
                EdgeType::HasEntity,
                &serde_json::json!({}),
            )?;
            entity_ids.insert(entity.name.as_str(), entity_id);
        }

        // 5. Relationships among the supplied entities
        for rel in &enrichment.relationships {
            let (Some(src), Some(dst)) = (entity_ids.get(rel.from.as_str()), entity_ids.get(rel.to.as_str()))
            else {
                tracing::warn!(
                    from = %rel.from,
                    to = %rel.to,
                    "Skipping relationship between entities not in this enrichment"
                );
                continue;
            };
            self.graph.upsert_edge(
                src,
                dst,
                EdgeType::RelatesTo,
                &serde_json::json!({ "entity_type": rel.relation }),
            )?;
        }

        // 6. Session binding
        if let Some(sid) = session_id {
            if self.graph.get_node(sid)?.is_none() {
                self.graph.upsert_node(
                    NodeLabel::Session,
                    sid,
                    &serde_json::json!({ "started_at": Utc::now().to_rfc3339() }),
                )?;
            }
            self.graph.upsert_edge(
                &record.id,
                sid,
                EdgeType::MentionedIn,
                &serde_json::json!({}),
            )?;
        }

        // 7. Version chain / conflict links, mutating the predecessor last
        match (action, active) {
            (IngestAction::Supersede, Some(mut old)) => {
                self.graph.upsert_edge(
                    &record.id,
                    &old.id,
                    EdgeType::Supersedes,
                    &serde_json::json!({}),
                )?;
                old.status = MemoryStatus::Superseded;
                old.superseded_by_id = Some(record.id.clone());
                old.last_modified = Utc::now();
                self.vector.update_record(&old)?;
                self.graph
                    .upsert_node(NodeLabel::Memory, &old.id, &memory_node_props(&old))?;
            }
            (IngestAction::Contradict, Some(mut old)) => {
                self.graph.upsert_edge(
                    &record.id,
                    &old.id,
                    EdgeType::Contradicts,
                    &serde_json::json!({}),
                )?;
                self.graph.upsert_edge(
                    &old.id,
                    &record.id,
                    EdgeType::Contradicts,
                    &serde_json::json!({}),
                )?;
                // The prior memory stays active; only its conflict cache grows
                if !old.conflict_ids.contains(&record.id) {
                    old.conflict_ids.push(record.id.clone());
                }
                old.last_modified = Utc::now();
                self.vector.update_record(&old)?;
                self.graph
                    .upsert_node(NodeLabel::Memory, &old.id, &memory_node_props(&old))?;
            }
            _ => {}
        }

        Ok(())
    }

    /// Undo a failed insert: remove the new memory from both stores and
    /// restore the predecessor's pre-image. A rollback failure archives the
    /// vector record instead and logs for reconciliation.
    fn rollback_insert(&self, new_id: &str, predecessor: Option<&MemoryRecord>) {
        let graph_result = self.graph.delete_node(new_id);
        let vector_result = self.vector.delete(new_id);

        if let Some(old) = predecessor {
            if let Err(e) = self.vector.update_record(old) {
                if !matches!(e, CoreError::NotFound(_)) {
                    tracing::error!("Rollback failed to restore predecessor {}: {}", old.id, e);
                }
            }
            let _ = self
                .graph
                .upsert_node(NodeLabel::Memory, &old.id, &memory_node_props(old));
        }

        if graph_result.is_err() || vector_result.is_err() {
            tracing::error!(
                id = new_id,
                "Rollback incomplete; archiving vector record for manual reconciliation"
            );
            if let Ok(Some(mut record)) = self.vector.get(new_id) {
                record.status = MemoryStatus::Archived;
                let _ = self.vector.update_record(&record);
            }
            self.oplog.record(
                "rollback_failed",
                serde_json::json!({ "id": new_id }),
            );
        }
    }

    /// Remove a memory from both stores under the write lock
    pub async fn delete_memory(&self, id: &str, session_id: Option<&str>) -> Result<MemoryRecord> {
        self.gate.require_open(session_id)?;
        let record = self
            .vector
            .get(id)?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;

        let _lock = self.locks.acquire("delete_memory").await?;
        self.vector.delete(id)?;
        self.graph.delete_node(id)?;

        self.gate.consume_for_write(session_id)?;
        self.oplog
            .record("delete_memory", serde_json::json!({ "id": id }));
        Ok(record)
    }

    /// Promote one side of a contradiction and demote the other. The only
    /// path from `contradictory` suggestions to a settled state; never runs
    /// implicitly.
    pub async fn resolve_conflict(
        &self,
        first_id: &str,
        second_id: &str,
        policy: ConflictPolicy,
        session_id: Option<&str>,
    ) -> Result<ConflictResolution> {
        self.gate.require_open(session_id)?;
        let first = self
            .vector
            .get(first_id)?
            .ok_or_else(|| CoreError::NotFound(first_id.to_string()))?;
        let second = self
            .vector
            .get(second_id)?
            .ok_or_else(|| CoreError::NotFound(second_id.to_string()))?;

        let (winner, loser) = policy.pick(&first, &second);
        let mut winner = winner.clone();
        let mut loser = loser.clone();

        let _lock = self.locks.acquire("resolve_conflict").await?;
        let now = Utc::now();

        winner.status = MemoryStatus::Active;
        winner.last_modified = now;
        loser.status = MemoryStatus::Superseded;
        loser.superseded_by_id = Some(winner.id.clone());
        winner.supersedes_id = Some(loser.id.clone());
        loser.last_modified = now;

        self.vector.update_record(&winner)?;
        self.vector.update_record(&loser)?;
        self.graph
            .upsert_node(NodeLabel::Memory, &winner.id, &memory_node_props(&winner))?;
        self.graph
            .upsert_node(NodeLabel::Memory, &loser.id, &memory_node_props(&loser))?;
        self.graph.upsert_edge(
            &winner.id,
            &loser.id,
            EdgeType::Supersedes,
            &serde_json::json!({}),
        )?;

        self.gate.consume_for_write(session_id)?;
        let resolution = ConflictResolution {
            winner_id: winner.id.clone(),
            loser_id: loser.id.clone(),
            policy,
            resolved_at: now,
        };
        self.oplog.record(
            "resolve_conflict",
            serde_json::json!({
                "winner": resolution.winner_id,
                "loser": resolution.loser_id,
            }),
        );
        Ok(resolution)
    }

    /// Create (or merge into) an entity node under the write lock
    pub async fn create_entity(
        &self,
        name: &str,
        entity_type: &str,
        props: serde_json::Value,
    ) -> Result<EntityOut> {
        if name.trim().is_empty() {
            return Err(CoreError::ContentRequired);
        }
        let _lock = self.locks.acquire("create_entity").await?;
        let node_props = serde_json::json!({
            "entity_type": entity_type,
            "props": props,
        });
        let id = self
            .graph
            .merge_node_by_name(NodeLabel::Entity, name, &node_props)?;
        self.oplog
            .record("create_entity", serde_json::json!({ "id": id, "name": name }));
        Ok(EntityOut {
            id,
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            props,
        })
    }

    /// Create a typed relationship between two existing nodes under the
    /// write lock
    pub async fn create_relationship(
        &self,
        src_id: &str,
        dst_id: &str,
        relation: &str,
    ) -> Result<RelationshipOut> {
        if self.graph.get_node(src_id)?.is_none() {
            return Err(CoreError::NotFound(src_id.to_string()));
        }
        if self.graph.get_node(dst_id)?.is_none() {
            return Err(CoreError::NotFound(dst_id.to_string()));
        }

        let _lock = self.locks.acquire("create_relationship").await?;
        self.graph.upsert_edge(
            src_id,
            dst_id,
            EdgeType::RelatesTo,
            &serde_json::json!({ "entity_type": relation }),
        )?;
        self.oplog.record(
            "create_relationship",
            serde_json::json!({ "src": src_id, "dst": dst_id, "relation": relation }),
        );
        Ok(RelationshipOut {
            src_id: src_id.to_string(),
            dst_id: dst_id.to_string(),
            relation: relation.to_string(),
        })
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Retrieve memories for a query, issue the session's search token, and
    /// return results with explanations and constellation structure.
    pub async fn search_memories(
        &self,
        query: &str,
        k: Option<usize>,
        filters: Option<serde_json::Value>,
        session_id: Option<&str>,
    ) -> Result<SearchResponse> {
        let normalized = crate::refinery::normalize_content(query);
        if normalized.is_empty() {
            return Err(CoreError::QueryRequired);
        }
        let filter = match filters {
            Some(value) => MemoryFilter::from_json(value)?,
            None => MemoryFilter::default(),
        };
        let k = k.unwrap_or(DEFAULT_K).max(1);

        let response = self
            .retriever
            .retrieve(&normalized, k, &filter, session_id)
            .await?;

        self.gate.record_search(session_id, response.results.len());
        self.oplog.record(
            "search_memories",
            serde_json::json!({
                "query": normalized,
                "results": response.results.len(),
            }),
        );
        Ok(response)
    }

    /// Mint a compliance stamp for the session, consuming its search token
    pub fn assert_compliance(&self, session_id: Option<&str>) -> Result<ComplianceStamp> {
        self.gate.assert_compliance(session_id)
    }

    /// Read-only graph query; never takes the write lock
    pub fn query_graph(
        &self,
        sql: &str,
        params: &[serde_json::Value],
    ) -> Result<Vec<BTreeMap<String, serde_json::Value>>> {
        self.graph.query(sql, params)
    }

    /// Fetch one memory by id
    pub fn get_memory(&self, id: &str) -> Result<Option<MemoryRecord>> {
        self.vector.get(id)
    }

    /// Chronological browse, newest first
    pub fn list_recent(
        &self,
        limit: usize,
        namespace: Option<Namespace>,
    ) -> Result<Vec<MemoryRecord>> {
        let filter = MemoryFilter::for_namespaces(namespace.map(|n| vec![n]).unwrap_or_default());
        let mut records = self.vector.scan(&filter)?;
        records.truncate(limit);
        Ok(records)
    }

    /// Read-only snapshot of one session: gate state, recent memories, and
    /// the entity neighborhood they reference
    pub fn get_context(&self, session_id: &str, depth: Option<usize>) -> Result<ContextSnapshot> {
        let depth = depth.unwrap_or(DEFAULT_CONTEXT_DEPTH).max(1);
        let filter = MemoryFilter {
            session_id: Some(session_id.to_string()),
            namespaces: vec![Namespace::Prod, Namespace::Test, Namespace::Ephemeral],
            ..Default::default()
        };
        let mut recent = self.vector.scan(&filter)?;
        recent.truncate(depth);

        let mut entities: Vec<EntityOut> = Vec::new();
        for memory in &recent {
            for edge in self.graph.edges_from(&memory.id, EdgeType::HasEntity)? {
                if entities.iter().any(|e| e.id == edge.dst_id) {
                    continue;
                }
                if let Some(node) = self.graph.get_node(&edge.dst_id)? {
                    entities.push(EntityOut {
                        id: node.id,
                        name: node.name.unwrap_or_default(),
                        entity_type: node
                            .props
                            .get("entity_type")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        props: node.props.get("props").cloned().unwrap_or(serde_json::Value::Null),
                    });
                }
            }
        }

        let entity_ids: Vec<&str> = entities.iter().map(|e| e.id.as_str()).collect();
        let mut relationships = Vec::new();
        for entity in &entities {
            for edge in self.graph.edges_from(&entity.id, EdgeType::RelatesTo)? {
                if entity_ids.contains(&edge.dst_id.as_str()) {
                    relationships.push(RelationshipOut {
                        src_id: edge.src_id,
                        relation: edge
                            .props
                            .get("entity_type")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        dst_id: edge.dst_id,
                    });
                }
            }
        }

        Ok(ContextSnapshot {
            session_id: session_id.to_string(),
            gate: self.gate.state(Some(session_id)),
            recent_memories: recent,
            entities,
            relationships,
        })
    }

    /// Store-wide statistics plus a dual-store consistency check
    pub fn get_stats(&self) -> Result<StatsReport> {
        let vector_count = self.vector.count()?;

        let mut graph_nodes_by_label = BTreeMap::new();
        for label in [
            NodeLabel::Memory,
            NodeLabel::Entity,
            NodeLabel::Concept,
            NodeLabel::Session,
        ] {
            graph_nodes_by_label.insert(label.as_str().to_string(), self.graph.count_by_label(label)?);
        }

        let mut namespaces = BTreeMap::new();
        for (namespace, count) in self.vector.count_by_namespace()? {
            namespaces.insert(namespace, count);
        }

        let vector_ids = self.vector.all_ids()?;
        let graph_ids = self.graph.node_ids_by_label(NodeLabel::Memory)?;
        let vector_only: Vec<String> = vector_ids
            .iter()
            .filter(|id| !graph_ids.contains(id))
            .cloned()
            .collect();
        let graph_only: Vec<String> = graph_ids
            .iter()
            .filter(|id| !vector_ids.contains(id))
            .cloned()
            .collect();

        Ok(StatsReport {
            vector_count,
            graph_edge_count: self.graph.edge_count()?,
            graph_nodes_by_label,
            namespaces,
            health: StoreHealth {
                consistent: vector_only.is_empty() && graph_only.is_empty(),
                vector_only,
                graph_only,
            },
        })
    }
}

/// Graph mirror of a memory record: id plus the identity fields invariant
/// checks need. The vector store remains the field-level truth.
fn memory_node_props(record: &MemoryRecord) -> serde_json::Value {
    serde_json::json!({
        "canonical_key": record.canonical_key,
        "namespace": record.namespace.as_str(),
        "status": record.status.as_str(),
        "content_hash": record.content_hash,
        "created_at": record.created_at.to_rfc3339(),
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashedEmbedder;
    use tempfile::TempDir;

    const DIMS: usize = 128;

    fn open_core() -> (TempDir, Orchestrator) {
        let dir = TempDir::new().unwrap();
        let config = CoreConfig {
            data_root: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let core =
            Orchestrator::open(config, Arc::new(HashedEmbedder::new(DIMS))).unwrap();
        (dir, core)
    }

    /// Open the gate for one write
    async fn open_gate(core: &Orchestrator, session: Option<&str>) {
        core.search_memories("warmup query", None, None, session).await.unwrap();
    }

    #[tokio::test]
    async fn test_add_memory_requires_content() {
        let (_dir, core) = open_core();
        open_gate(&core, None).await;
        let err = core
            .add_memory("   ", &AgentEnrichment::default(), Source::Agent, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ContentRequired));
    }

    #[tokio::test]
    async fn test_add_then_get() {
        let (_dir, core) = open_core();
        open_gate(&core, None).await;
        let outcome = core
            .add_memory(
                "Rust workspaces share one lockfile",
                &AgentEnrichment::default(),
                Source::UserInput,
                None,
            )
            .await
            .unwrap();
        assert_eq!(outcome.action, IngestAction::Add);
        assert_eq!(outcome.memory.access_count, 1);

        let loaded = core.get_memory(&outcome.id).unwrap().unwrap();
        assert_eq!(loaded.content, "Rust workspaces share one lockfile");
    }

    #[tokio::test]
    async fn test_dual_store_consistency_after_add() {
        let (_dir, core) = open_core();
        open_gate(&core, None).await;
        core.add_memory(
            "consistency check memory",
            &AgentEnrichment::default(),
            Source::Agent,
            None,
        )
        .await
        .unwrap();

        let stats = core.get_stats().unwrap();
        assert!(stats.health.consistent);
        assert_eq!(stats.vector_count, 1);
        assert_eq!(stats.graph_nodes_by_label["Memory"], 1);
        // Concept nodes were created alongside
        assert!(stats.graph_nodes_by_label["Concept"] > 0);
    }

    #[tokio::test]
    async fn test_entities_and_relationships_recorded() {
        let (_dir, core) = open_core();
        open_gate(&core, Some("s1")).await;

        let enrichment: AgentEnrichment = serde_json::from_value(serde_json::json!({
            "entities": [
                {"name": "elefante", "entityType": "project", "props": {}},
                {"name": "sqlite", "entityType": "technology", "props": {}}
            ],
            "relationships": [
                {"from": "elefante", "to": "sqlite", "relation": "uses"}
            ]
        }))
        .unwrap();

        core.add_memory(
            "Elefante persists both stores in SQLite",
            &enrichment,
            Source::Agent,
            Some("s1"),
        )
        .await
        .unwrap();

        let ctx = core.get_context("s1", None).unwrap();
        assert_eq!(ctx.recent_memories.len(), 1);
        assert_eq!(ctx.entities.len(), 2);
        assert_eq!(ctx.relationships.len(), 1);
        assert_eq!(ctx.relationships[0].relation, "uses");
    }

    #[tokio::test]
    async fn test_query_graph_is_read_only() {
        let (_dir, core) = open_core();
        let err = core.query_graph("DROP TABLE graph_nodes", &[]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidFilter(_)));
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let (_dir, core) = open_core();
        let err = core.search_memories("  ", None, None, None).await.unwrap_err();
        assert!(matches!(err, CoreError::QueryRequired));
    }

    #[tokio::test]
    async fn test_invalid_filter_surfaces() {
        let (_dir, core) = open_core();
        let err = core
            .search_memories("q", None, Some(serde_json::json!({"bogus": 1})), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidFilter(_)));
    }

    #[tokio::test]
    async fn test_delete_memory_cleans_both_stores() {
        let (_dir, core) = open_core();
        open_gate(&core, None).await;
        let outcome = core
            .add_memory("to be removed", &AgentEnrichment::default(), Source::Agent, None)
            .await
            .unwrap();

        open_gate(&core, None).await;
        core.delete_memory(&outcome.id, None).await.unwrap();

        assert!(core.get_memory(&outcome.id).unwrap().is_none());
        let stats = core.get_stats().unwrap();
        assert!(stats.health.consistent);
        assert_eq!(stats.graph_nodes_by_label["Memory"], 0);
    }

    #[tokio::test]
    async fn test_create_entity_merges_by_name() {
        let (_dir, core) = open_core();
        let a = core
            .create_entity("postgres", "technology", serde_json::json!({}))
            .await
            .unwrap();
        let b = core
            .create_entity("postgres", "technology", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_create_relationship_requires_nodes() {
        let (_dir, core) = open_core();
        let err = core
            .create_relationship("missing-a", "missing-b", "uses")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
