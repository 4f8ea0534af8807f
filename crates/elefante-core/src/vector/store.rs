//! SQLite persistence for memory records and their embeddings.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::MemoryFilter;
#[cfg(not(feature = "vector-search"))]
use crate::embed::cosine_similarity;
use crate::embed::Embedding;
use crate::error::{CoreError, Result};
use crate::memory::{
    KnowledgeType, Layer, MemoryRecord, MemoryStatus, Namespace, Ring, Source,
};

#[cfg(feature = "vector-search")]
use super::VectorIndex;

/// Memory rows plus the embedding blob. Timestamps are RFC3339 text for
/// portability; list fields are JSON text.
const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    canonical_key TEXT NOT NULL,
    namespace TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    layer TEXT NOT NULL DEFAULT 'world',
    sublayer TEXT NOT NULL DEFAULT '',
    ring TEXT NOT NULL DEFAULT 'leaf',
    knowledge_type TEXT NOT NULL DEFAULT 'fact',
    importance INTEGER NOT NULL DEFAULT 5,
    created_at TEXT NOT NULL,
    last_modified TEXT NOT NULL,
    last_accessed TEXT NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 1,
    supersedes_id TEXT,
    superseded_by_id TEXT,
    related_memory_ids TEXT NOT NULL DEFAULT '[]',
    conflict_ids TEXT NOT NULL DEFAULT '[]',
    potential_conflict_ids TEXT NOT NULL DEFAULT '[]',
    co_activated_with TEXT NOT NULL DEFAULT '[]',
    concepts TEXT NOT NULL DEFAULT '[]',
    surfaces_when TEXT NOT NULL DEFAULT '[]',
    authority_score REAL NOT NULL DEFAULT 0.0,
    expires_at TEXT,
    source TEXT NOT NULL DEFAULT 'agent',
    session_id TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    embedding BLOB NOT NULL,
    embedding_dim INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_memories_namespace ON memories(namespace);
CREATE INDEX IF NOT EXISTS idx_memories_status ON memories(status);
CREATE INDEX IF NOT EXISTS idx_memories_canonical
    ON memories(namespace, canonical_key, status);
CREATE INDEX IF NOT EXISTS idx_memories_hash ON memories(namespace, content_hash);
CREATE INDEX IF NOT EXISTS idx_memories_modified ON memories(last_modified);
CREATE INDEX IF NOT EXISTS idx_memories_session ON memories(session_id);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

/// Contents of the writer sentinel file
#[derive(Debug, Serialize, Deserialize)]
struct WriterSentinel {
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// Persistent vector store.
///
/// One process may hold the writer role per collection directory; a second
/// open fails fast with `StoreBusy` unless the recorded holder is dead.
/// Readers rely on SQLite WAL snapshots for consistency.
pub struct VectorStore {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    dir: PathBuf,
    dimensions: usize,
    #[cfg(feature = "vector-search")]
    index: Mutex<VectorIndex>,
}

impl VectorStore {
    /// Open the collection under `dir` (created if absent), claiming the
    /// writer role.
    pub fn open(dir: &Path, dimensions: usize) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Self::claim_writer(dir)?;

        let db_path = dir.join("vector.db");
        let writer = Connection::open(&db_path)?;
        Self::configure_connection(&writer)?;
        writer.execute_batch(SCHEMA_V1)?;

        let reader = Connection::open(&db_path)?;
        Self::configure_connection(&reader)?;

        let store = Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            dir: dir.to_path_buf(),
            dimensions,
            #[cfg(feature = "vector-search")]
            index: Mutex::new(VectorIndex::new(dimensions)?),
        };

        #[cfg(feature = "vector-search")]
        store.load_embeddings_into_index()?;

        Ok(store)
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -32000;
             PRAGMA temp_store = MEMORY;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Claim the single-writer sentinel, reclaiming a dead holder's file.
    fn claim_writer(dir: &Path) -> Result<()> {
        let sentinel_path = dir.join("writer.lock");
        if let Ok(raw) = std::fs::read_to_string(&sentinel_path) {
            if let Ok(sentinel) = serde_json::from_str::<WriterSentinel>(&raw) {
                if crate::lock::pid_alive(sentinel.pid) {
                    return Err(CoreError::StoreBusy(sentinel.pid));
                }
                tracing::warn!(
                    holder_pid = sentinel.pid,
                    "Reclaiming vector writer sentinel from dead process"
                );
            }
        }
        let sentinel = WriterSentinel {
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };
        std::fs::write(&sentinel_path, serde_json::to_string(&sentinel)?.as_bytes())?;
        Ok(())
    }

    #[cfg(feature = "vector-search")]
    fn load_embeddings_into_index(&self) -> Result<()> {
        let reader = self.lock_reader()?;
        let mut stmt = reader.prepare("SELECT id, embedding FROM memories")?;
        let embeddings: Vec<(String, Vec<u8>)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .filter_map(|r| r.ok())
            .collect();
        drop(stmt);
        drop(reader);

        let mut index = self.lock_index()?;
        for (id, bytes) in embeddings {
            if let Some(embedding) = Embedding::from_bytes(&bytes) {
                if embedding.dimensions == self.dimensions {
                    if let Err(e) = index.add(&id, &embedding.vector) {
                        tracing::warn!("Failed to index embedding for {}: {}", id, e);
                    }
                } else {
                    tracing::warn!(
                        id = %id,
                        "Skipping embedding with stale dimension {} (expected {})",
                        embedding.dimensions,
                        self.dimensions
                    );
                }
            }
        }
        Ok(())
    }

    fn lock_writer(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| CoreError::Init("vector writer lock poisoned".into()))
    }

    fn lock_reader(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| CoreError::Init("vector reader lock poisoned".into()))
    }

    #[cfg(feature = "vector-search")]
    fn lock_index(&self) -> Result<std::sync::MutexGuard<'_, VectorIndex>> {
        self.index
            .lock()
            .map_err(|_| CoreError::Init("vector index lock poisoned".into()))
    }

    /// Embedding dimension this collection was opened with
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    // ========================================================================
    // MUTATION
    // ========================================================================

    /// Atomic per-id upsert; durable before returning
    pub fn upsert(&self, record: &MemoryRecord, embedding: &Embedding) -> Result<()> {
        if embedding.dimensions != self.dimensions {
            return Err(CoreError::Embedding(format!(
                "dimension mismatch: expected {}, got {}",
                self.dimensions, embedding.dimensions
            )));
        }

        {
            let writer = self.lock_writer()?;
            writer.execute(
                "INSERT OR REPLACE INTO memories (
                    id, content, content_hash, canonical_key, namespace, status,
                    layer, sublayer, ring, knowledge_type, importance,
                    created_at, last_modified, last_accessed, access_count,
                    supersedes_id, superseded_by_id,
                    related_memory_ids, conflict_ids, potential_conflict_ids,
                    co_activated_with, concepts, surfaces_when, authority_score,
                    expires_at, source, session_id, tags, embedding, embedding_dim
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6,
                    ?7, ?8, ?9, ?10, ?11,
                    ?12, ?13, ?14, ?15,
                    ?16, ?17,
                    ?18, ?19, ?20,
                    ?21, ?22, ?23, ?24,
                    ?25, ?26, ?27, ?28, ?29, ?30
                )",
                params![
                    record.id,
                    record.content,
                    record.content_hash,
                    record.canonical_key,
                    record.namespace.as_str(),
                    record.status.as_str(),
                    record.layer.as_str(),
                    record.sublayer,
                    record.ring.as_str(),
                    record.knowledge_type.as_str(),
                    record.importance as i64,
                    record.created_at.to_rfc3339(),
                    record.last_modified.to_rfc3339(),
                    record.last_accessed.to_rfc3339(),
                    record.access_count,
                    record.supersedes_id,
                    record.superseded_by_id,
                    to_json(&record.related_memory_ids),
                    to_json(&record.conflict_ids),
                    to_json(&record.potential_conflict_ids),
                    to_json(&record.co_activated_with),
                    to_json(&record.concepts),
                    to_json(&record.surfaces_when),
                    record.authority_score,
                    record.expires_at.map(|t| t.to_rfc3339()),
                    record.source.as_str(),
                    record.session_id,
                    to_json(&record.tags),
                    embedding.to_bytes(),
                    embedding.dimensions as i64,
                ],
            )?;
        }

        #[cfg(feature = "vector-search")]
        self.lock_index()?.add(&record.id, &embedding.vector)?;

        Ok(())
    }

    /// Metadata-only update (bookkeeping, status transitions, relationship
    /// caches); the embedding is left untouched.
    pub fn update_record(&self, record: &MemoryRecord) -> Result<()> {
        let writer = self.lock_writer()?;
        let changed = writer.execute(
            "UPDATE memories SET
                status = ?1,
                importance = ?2,
                last_modified = ?3,
                last_accessed = ?4,
                access_count = ?5,
                supersedes_id = ?6,
                superseded_by_id = ?7,
                related_memory_ids = ?8,
                conflict_ids = ?9,
                potential_conflict_ids = ?10,
                co_activated_with = ?11,
                authority_score = ?12,
                expires_at = ?13,
                tags = ?14
            WHERE id = ?15",
            params![
                record.status.as_str(),
                record.importance as i64,
                record.last_modified.to_rfc3339(),
                record.last_accessed.to_rfc3339(),
                record.access_count,
                record.supersedes_id,
                record.superseded_by_id,
                to_json(&record.related_memory_ids),
                to_json(&record.conflict_ids),
                to_json(&record.potential_conflict_ids),
                to_json(&record.co_activated_with),
                record.authority_score,
                record.expires_at.map(|t| t.to_rfc3339()),
                to_json(&record.tags),
                record.id,
            ],
        )?;
        if changed == 0 {
            return Err(CoreError::NotFound(record.id.clone()));
        }
        Ok(())
    }

    /// Idempotent delete
    pub fn delete(&self, id: &str) -> Result<()> {
        {
            let writer = self.lock_writer()?;
            writer.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
        }
        #[cfg(feature = "vector-search")]
        self.lock_index()?.remove(id)?;
        Ok(())
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Fetch one record
    pub fn get(&self, id: &str) -> Result<Option<MemoryRecord>> {
        let reader = self.lock_reader()?;
        let record = reader
            .query_row("SELECT * FROM memories WHERE id = ?1", params![id], |row| {
                Self::row_to_record(row)
            })
            .optional()?;
        Ok(record)
    }

    /// Fetch the stored embedding for a record
    pub fn get_embedding(&self, id: &str) -> Result<Embedding> {
        let reader = self.lock_reader()?;
        let bytes: Option<Vec<u8>> = reader
            .query_row(
                "SELECT embedding FROM memories WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        bytes
            .and_then(|b| Embedding::from_bytes(&b))
            .ok_or_else(|| CoreError::EmbeddingMissing(id.to_string()))
    }

    /// The single active record for `(namespace, canonical_key)`, if any.
    /// Newest wins if the uniqueness invariant was violated externally.
    pub fn active_for(
        &self,
        namespace: Namespace,
        canonical_key: &str,
    ) -> Result<Option<MemoryRecord>> {
        let reader = self.lock_reader()?;
        let record = reader
            .query_row(
                "SELECT * FROM memories
                 WHERE namespace = ?1 AND canonical_key = ?2 AND status = 'active'
                 ORDER BY last_modified DESC LIMIT 1",
                params![namespace.as_str(), canonical_key],
                |row| Self::row_to_record(row),
            )
            .optional()?;
        Ok(record)
    }

    /// Nearest neighbors passing the filter, as (record, cosine), best
    /// first. `k` larger than the population returns everything that passes.
    pub fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
        filter: &MemoryFilter,
    ) -> Result<Vec<(MemoryRecord, f32)>> {
        if k == 0 {
            return Ok(vec![]);
        }

        #[cfg(feature = "vector-search")]
        {
            let index = self.lock_index()?;
            let population = index.len();
            if population == 0 {
                return Ok(vec![]);
            }

            // Over-fetch to survive post-filtering; widen to the full
            // population when the filtered slice comes up short.
            let mut fetch = (k * 4).max(16).min(population);
            loop {
                let hits = index.search(query_embedding, fetch)?;
                let mut out = Vec::with_capacity(k);
                for (id, similarity) in &hits {
                    if let Some(record) = self.get(id)? {
                        if filter.matches(&record) {
                            out.push((record, *similarity));
                            if out.len() == k {
                                return Ok(out);
                            }
                        }
                    }
                }
                if fetch >= population {
                    return Ok(out);
                }
                fetch = population;
            }
        }

        #[cfg(not(feature = "vector-search"))]
        self.brute_search(query_embedding, k, filter)
    }

    /// Linear cosine scan; used when the HNSW feature is disabled
    #[cfg(not(feature = "vector-search"))]
    fn brute_search(
        &self,
        query_embedding: &[f32],
        k: usize,
        filter: &MemoryFilter,
    ) -> Result<Vec<(MemoryRecord, f32)>> {
        let mut scored: Vec<(MemoryRecord, f32)> = Vec::new();
        for record in self.scan(filter)? {
            let embedding = self.get_embedding(&record.id)?;
            let similarity = cosine_similarity(query_embedding, &embedding.vector);
            scored.push((record, similarity));
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    /// All records passing the filter, newest modification first
    pub fn scan(&self, filter: &MemoryFilter) -> Result<Vec<MemoryRecord>> {
        let reader = self.lock_reader()?;
        let mut stmt = reader.prepare("SELECT * FROM memories ORDER BY last_modified DESC")?;
        let rows = stmt.query_map([], |row| Self::row_to_record(row))?;

        let mut out = Vec::new();
        for row in rows {
            let record = row?;
            if filter.matches(&record) {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// Total number of records across all namespaces
    pub fn count(&self) -> Result<i64> {
        let reader = self.lock_reader()?;
        let count = reader.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Record counts grouped by namespace
    pub fn count_by_namespace(&self) -> Result<Vec<(String, i64)>> {
        let reader = self.lock_reader()?;
        let mut stmt =
            reader.prepare("SELECT namespace, COUNT(*) FROM memories GROUP BY namespace")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// All memory ids (dual-store health checks)
    pub fn all_ids(&self) -> Result<Vec<String>> {
        let reader = self.lock_reader()?;
        let mut stmt = reader.prepare("SELECT id FROM memories")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut ids = Vec::new();
        for id in rows {
            ids.push(id?);
        }
        Ok(ids)
    }

    // ========================================================================
    // ROW MAPPING
    // ========================================================================

    fn parse_timestamp(value: &str, field_name: &str) -> rusqlite::Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("Invalid {} timestamp '{}': {}", field_name, value, e),
                    )),
                )
            })
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<MemoryRecord> {
        let created_at: String = row.get("created_at")?;
        let last_modified: String = row.get("last_modified")?;
        let last_accessed: String = row.get("last_accessed")?;
        let expires_at: Option<String> = row.get("expires_at")?;

        let namespace: String = row.get("namespace")?;
        let status: String = row.get("status")?;
        let layer: String = row.get("layer")?;
        let ring: String = row.get("ring")?;
        let knowledge_type: String = row.get("knowledge_type")?;
        let source: String = row.get("source")?;

        Ok(MemoryRecord {
            id: row.get("id")?,
            content: row.get("content")?,
            content_hash: row.get("content_hash")?,
            canonical_key: row.get("canonical_key")?,
            namespace: Namespace::parse_name(&namespace).unwrap_or_default(),
            status: MemoryStatus::parse_name(&status).unwrap_or_default(),
            layer: Layer::parse_name(&layer).unwrap_or_default(),
            sublayer: row.get("sublayer")?,
            ring: Ring::parse_name(&ring).unwrap_or_default(),
            knowledge_type: KnowledgeType::parse_name(&knowledge_type).unwrap_or_default(),
            importance: row.get::<_, i64>("importance")?.clamp(1, 10) as u8,
            created_at: Self::parse_timestamp(&created_at, "created_at")?,
            last_modified: Self::parse_timestamp(&last_modified, "last_modified")?,
            last_accessed: Self::parse_timestamp(&last_accessed, "last_accessed")?,
            access_count: row.get("access_count")?,
            supersedes_id: row.get("supersedes_id")?,
            superseded_by_id: row.get("superseded_by_id")?,
            related_memory_ids: from_json(row.get::<_, String>("related_memory_ids")?),
            conflict_ids: from_json(row.get::<_, String>("conflict_ids")?),
            potential_conflict_ids: from_json(row.get::<_, String>("potential_conflict_ids")?),
            co_activated_with: from_json(row.get::<_, String>("co_activated_with")?),
            concepts: from_json(row.get::<_, String>("concepts")?),
            surfaces_when: from_json(row.get::<_, String>("surfaces_when")?),
            authority_score: row.get("authority_score")?,
            expires_at: expires_at.and_then(|s| {
                DateTime::parse_from_rfc3339(&s).map(|dt| dt.with_timezone(&Utc)).ok()
            }),
            source: Source::parse_name(&source).unwrap_or_default(),
            session_id: row.get("session_id")?,
            tags: from_json(row.get::<_, String>("tags")?),
        })
    }
}

impl Drop for VectorStore {
    fn drop(&mut self) {
        // Release the writer sentinel if it is still ours
        let sentinel_path = self.dir.join("writer.lock");
        if let Ok(raw) = std::fs::read_to_string(&sentinel_path) {
            if let Ok(sentinel) = serde_json::from_str::<WriterSentinel>(&raw) {
                if sentinel.pid == std::process::id() {
                    let _ = std::fs::remove_file(&sentinel_path);
                }
            }
        }
    }
}

fn to_json(list: &[String]) -> String {
    serde_json::to_string(list).unwrap_or_else(|_| "[]".to_string())
}

fn from_json(raw: String) -> Vec<String> {
    serde_json::from_str(&raw).unwrap_or_default()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::{EmbeddingProvider, HashedEmbedder};
    use crate::memory::AgentEnrichment;
    use crate::refinery::Refinery;
    use crate::config::CoreConfig;
    use tempfile::TempDir;

    const DIMS: usize = 64;

    fn open_store() -> (TempDir, VectorStore) {
        let dir = TempDir::new().unwrap();
        let store = VectorStore::open(&dir.path().join("vector"), DIMS).unwrap();
        (dir, store)
    }

    fn make_record(content: &str) -> (MemoryRecord, Embedding) {
        let refinery = Refinery::new(CoreConfig::default());
        let candidate = refinery
            .refine(content, &AgentEnrichment::default(), Source::UserInput)
            .unwrap();
        let record = candidate.into_record(None, Utc::now());
        let embedding = HashedEmbedder::new(DIMS).embed(content).unwrap();
        (record, embedding)
    }

    #[test]
    fn test_upsert_get_roundtrip() {
        let (_dir, store) = open_store();
        let (record, embedding) = make_record("Docker container for dashboard runs on port 8000");
        store.upsert(&record, &embedding).unwrap();

        let loaded = store.get(&record.id).unwrap().unwrap();
        assert_eq!(loaded.content, record.content);
        assert_eq!(loaded.canonical_key, record.canonical_key);
        assert_eq!(loaded.access_count, 1);
        assert_eq!(loaded.namespace, Namespace::Prod);

        let emb = store.get_embedding(&record.id).unwrap();
        assert_eq!(emb.vector, embedding.vector);
    }

    #[test]
    fn test_delete_idempotent() {
        let (_dir, store) = open_store();
        let (record, embedding) = make_record("to be deleted");
        store.upsert(&record, &embedding).unwrap();
        store.delete(&record.id).unwrap();
        store.delete(&record.id).unwrap();
        assert!(store.get(&record.id).unwrap().is_none());
    }

    #[test]
    fn test_search_defaults_to_prod() {
        let (_dir, store) = open_store();
        let embedder = HashedEmbedder::new(DIMS);

        let (mut test_record, test_emb) = make_record("test-only knowledge about docker");
        test_record.namespace = Namespace::Test;
        store.upsert(&test_record, &test_emb).unwrap();

        let (prod_record, prod_emb) = make_record("prod knowledge about docker");
        store.upsert(&prod_record, &prod_emb).unwrap();

        let query = embedder.embed("docker knowledge").unwrap();
        let results = store.search(&query.vector, 10, &MemoryFilter::default()).unwrap();
        assert!(results.iter().all(|(r, _)| r.namespace == Namespace::Prod));
        assert!(results.iter().any(|(r, _)| r.id == prod_record.id));
    }

    #[test]
    fn test_search_k_exceeds_population() {
        let (_dir, store) = open_store();
        let (record, embedding) = make_record("lone memory");
        store.upsert(&record, &embedding).unwrap();

        let results = store.search(&embedding.vector, 50, &MemoryFilter::default()).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_active_for_lookup() {
        let (_dir, store) = open_store();
        let (record, embedding) = make_record("Always use absolute paths in scripts");
        let key = record.canonical_key.clone();
        store.upsert(&record, &embedding).unwrap();

        let found = store.active_for(Namespace::Prod, &key).unwrap().unwrap();
        assert_eq!(found.id, record.id);
        assert!(store.active_for(Namespace::Test, &key).unwrap().is_none());
    }

    #[test]
    fn test_update_record_bookkeeping() {
        let (_dir, store) = open_store();
        let (mut record, embedding) = make_record("bookkeeping target");
        store.upsert(&record, &embedding).unwrap();

        record.access_count = 2;
        record.status = MemoryStatus::Superseded;
        store.update_record(&record).unwrap();

        let loaded = store.get(&record.id).unwrap().unwrap();
        assert_eq!(loaded.access_count, 2);
        assert_eq!(loaded.status, MemoryStatus::Superseded);
    }

    #[test]
    fn test_second_writer_fails_fast() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vector");
        let _store = VectorStore::open(&path, DIMS).unwrap();

        let err = VectorStore::open(&path, DIMS);
        // Same-process reopen counts as a second writer
        assert!(matches!(err, Err(CoreError::StoreBusy(_))));
    }

    #[test]
    fn test_index_rebuilt_on_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vector");
        let (record, embedding) = make_record("survives reopen");
        {
            let store = VectorStore::open(&path, DIMS).unwrap();
            store.upsert(&record, &embedding).unwrap();
        }
        let store = VectorStore::open(&path, DIMS).unwrap();
        let results = store.search(&embedding.vector, 1, &MemoryFilter::default()).unwrap();
        assert_eq!(results[0].0.id, record.id);
    }
}
