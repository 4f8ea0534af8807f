//! SQLite-backed property graph.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{EdgeType, NodeLabel};
use crate::error::{CoreError, Result};

/// Graph schema. One version so far; the `schema_version` table is in place
/// for the next one.
const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS graph_nodes (
    id TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    name TEXT,
    props TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_graph_nodes_label ON graph_nodes(label);
CREATE UNIQUE INDEX IF NOT EXISTS idx_graph_nodes_label_name
    ON graph_nodes(label, name) WHERE name IS NOT NULL;

CREATE TABLE IF NOT EXISTS graph_edges (
    id TEXT PRIMARY KEY,
    src_id TEXT NOT NULL,
    dst_id TEXT NOT NULL,
    edge_type TEXT NOT NULL,
    props TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    UNIQUE(src_id, dst_id, edge_type)
);

CREATE INDEX IF NOT EXISTS idx_graph_edges_src ON graph_edges(src_id);
CREATE INDEX IF NOT EXISTS idx_graph_edges_dst ON graph_edges(dst_id);
CREATE INDEX IF NOT EXISTS idx_graph_edges_type ON graph_edges(edge_type);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

/// A node row
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: String,
    pub label: NodeLabel,
    pub name: Option<String>,
    /// JSON payload (the `props` column)
    pub props: serde_json::Value,
}

/// An edge row
#[derive(Debug, Clone)]
pub struct GraphEdge {
    pub id: String,
    pub src_id: String,
    pub dst_id: String,
    pub edge_type: EdgeType,
    pub props: serde_json::Value,
}

/// Persistent labeled property graph.
///
/// Separate reader/writer connections behind mutexes so the store is
/// `Send + Sync` with `&self` methods. Cross-process write exclusivity is the
/// LockManager's job; this type only guards in-process access.
pub struct GraphStore {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    path: PathBuf,
}

impl GraphStore {
    /// Open (or create) the graph database at `path`.
    ///
    /// Path hygiene on init: an empty directory at the path is removed, a
    /// zero-byte file is removed, anything else is reused in place. The
    /// parent directory is created by this engine, not by callers.
    pub fn open(path: &Path) -> Result<Self> {
        Self::prepare_path(path)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let writer = Connection::open(path)?;
        Self::configure_connection(&writer)?;
        writer.execute_batch(SCHEMA_V1)?;

        let reader = Connection::open(path)?;
        Self::configure_connection(&reader)?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            path: path.to_path_buf(),
        })
    }

    fn prepare_path(path: &Path) -> Result<()> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_dir() => {
                if std::fs::read_dir(path)?.next().is_none() {
                    tracing::warn!("Removing empty directory at graph db path {:?}", path);
                    std::fs::remove_dir(path)?;
                }
            }
            Ok(meta) if meta.len() == 0 => {
                tracing::warn!("Removing zero-byte file at graph db path {:?}", path);
                std::fs::remove_file(path)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_writer(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| CoreError::Init("graph writer lock poisoned".into()))
    }

    fn lock_reader(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| CoreError::Init("graph reader lock poisoned".into()))
    }

    // ========================================================================
    // NODES
    // ========================================================================

    /// Idempotent node upsert by id; props are replaced wholesale
    pub fn upsert_node(
        &self,
        label: NodeLabel,
        id: &str,
        props: &serde_json::Value,
    ) -> Result<()> {
        let writer = self.lock_writer()?;
        writer.execute(
            "INSERT INTO graph_nodes (id, label, name, props, created_at)
             VALUES (?1, ?2, NULL, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET props = excluded.props",
            params![id, label.as_str(), props.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// MERGE semantics by `(label, name)`: returns the existing node's id if
    /// one exists, otherwise creates it. Used for Concepts and Entities.
    pub fn merge_node_by_name(
        &self,
        label: NodeLabel,
        name: &str,
        props: &serde_json::Value,
    ) -> Result<String> {
        let writer = self.lock_writer()?;

        let existing: Option<String> = writer
            .query_row(
                "SELECT id FROM graph_nodes WHERE label = ?1 AND name = ?2",
                params![label.as_str(), name],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(id);
        }

        let id = Uuid::new_v4().to_string();
        writer.execute(
            "INSERT INTO graph_nodes (id, label, name, props, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, label.as_str(), name, props.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(id)
    }

    /// Fetch a node by id
    pub fn get_node(&self, id: &str) -> Result<Option<GraphNode>> {
        let reader = self.lock_reader()?;
        let node = reader
            .query_row(
                "SELECT id, label, name, props FROM graph_nodes WHERE id = ?1",
                params![id],
                |row| {
                    let label_str: String = row.get(1)?;
                    let props_str: String = row.get(3)?;
                    Ok((row.get::<_, String>(0)?, label_str, row.get::<_, Option<String>>(2)?, props_str))
                },
            )
            .optional()?;

        Ok(node.and_then(|(id, label, name, props)| {
            Some(GraphNode {
                id,
                label: NodeLabel::parse_name(&label)?,
                name,
                props: serde_json::from_str(&props).unwrap_or(serde_json::Value::Null),
            })
        }))
    }

    /// Delete a node and all edges touching it. Idempotent.
    pub fn delete_node(&self, id: &str) -> Result<()> {
        let writer = self.lock_writer()?;
        writer.execute(
            "DELETE FROM graph_edges WHERE src_id = ?1 OR dst_id = ?1",
            params![id],
        )?;
        writer.execute("DELETE FROM graph_nodes WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Count nodes carrying a label
    pub fn count_by_label(&self, label: NodeLabel) -> Result<i64> {
        let reader = self.lock_reader()?;
        let count = reader.query_row(
            "SELECT COUNT(*) FROM graph_nodes WHERE label = ?1",
            params![label.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ========================================================================
    // EDGES
    // ========================================================================

    /// Idempotent edge upsert on `(src, dst, edge_type)`
    pub fn upsert_edge(
        &self,
        src_id: &str,
        dst_id: &str,
        edge_type: EdgeType,
        props: &serde_json::Value,
    ) -> Result<()> {
        let writer = self.lock_writer()?;
        writer.execute(
            "INSERT INTO graph_edges (id, src_id, dst_id, edge_type, props, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(src_id, dst_id, edge_type) DO UPDATE SET props = excluded.props",
            params![
                Uuid::new_v4().to_string(),
                src_id,
                dst_id,
                edge_type.as_str(),
                props.to_string(),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// Delete one edge. Idempotent.
    pub fn delete_edge(&self, src_id: &str, dst_id: &str, edge_type: EdgeType) -> Result<()> {
        let writer = self.lock_writer()?;
        writer.execute(
            "DELETE FROM graph_edges WHERE src_id = ?1 AND dst_id = ?2 AND edge_type = ?3",
            params![src_id, dst_id, edge_type.as_str()],
        )?;
        Ok(())
    }

    /// All edges of a given type leaving `src_id`
    pub fn edges_from(&self, src_id: &str, edge_type: EdgeType) -> Result<Vec<GraphEdge>> {
        let reader = self.lock_reader()?;
        let mut stmt = reader.prepare(
            "SELECT id, src_id, dst_id, edge_type, props FROM graph_edges
             WHERE src_id = ?1 AND edge_type = ?2",
        )?;
        let rows = stmt.query_map(params![src_id, edge_type.as_str()], Self::row_to_edge)?;
        let mut edges = Vec::new();
        for edge in rows {
            if let Some(e) = edge? {
                edges.push(e);
            }
        }
        Ok(edges)
    }

    /// All edges of a given type touching `id` in either direction
    pub fn edges_touching(&self, id: &str, edge_type: EdgeType) -> Result<Vec<GraphEdge>> {
        let reader = self.lock_reader()?;
        let mut stmt = reader.prepare(
            "SELECT id, src_id, dst_id, edge_type, props FROM graph_edges
             WHERE (src_id = ?1 OR dst_id = ?1) AND edge_type = ?2",
        )?;
        let rows = stmt.query_map(params![id, edge_type.as_str()], Self::row_to_edge)?;
        let mut edges = Vec::new();
        for edge in rows {
            if let Some(e) = edge? {
                edges.push(e);
            }
        }
        Ok(edges)
    }

    /// Total edge count
    pub fn edge_count(&self) -> Result<i64> {
        let reader = self.lock_reader()?;
        let count = reader.query_row("SELECT COUNT(*) FROM graph_edges", [], |row| row.get(0))?;
        Ok(count)
    }

    /// All node ids carrying a label (housekeeping scans)
    pub fn node_ids_by_label(&self, label: NodeLabel) -> Result<Vec<String>> {
        let reader = self.lock_reader()?;
        let mut stmt =
            reader.prepare("SELECT id FROM graph_nodes WHERE label = ?1 ORDER BY created_at")?;
        let rows = stmt.query_map(params![label.as_str()], |row| row.get(0))?;
        let mut ids = Vec::new();
        for id in rows {
            ids.push(id?);
        }
        Ok(ids)
    }

    fn row_to_edge(row: &rusqlite::Row) -> rusqlite::Result<Option<GraphEdge>> {
        let edge_type_str: String = row.get(3)?;
        let props_str: String = row.get(4)?;
        Ok(EdgeType::parse_name(&edge_type_str).map(|edge_type| GraphEdge {
            id: row.get(0).unwrap_or_default(),
            src_id: row.get(1).unwrap_or_default(),
            dst_id: row.get(2).unwrap_or_default(),
            edge_type,
            props: serde_json::from_str(&props_str).unwrap_or(serde_json::Value::Null),
        }))
    }

    // ========================================================================
    // READ-ONLY QUERY SURFACE
    // ========================================================================

    /// Run a read-only query over the graph schema and return rows as JSON
    /// objects keyed by column name. Single statement, SELECT/WITH only.
    /// Non-matching patterns return an empty row set, never an error.
    pub fn query(
        &self,
        sql: &str,
        query_params: &[serde_json::Value],
    ) -> Result<Vec<BTreeMap<String, serde_json::Value>>> {
        Self::guard_read_only(sql)?;

        let reader = self.lock_reader()?;
        let mut stmt = reader.prepare(sql)?;
        let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

        let bound: Vec<rusqlite::types::Value> =
            query_params.iter().map(json_to_sql_value).collect();

        let mut rows = stmt.query(rusqlite::params_from_iter(bound))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut obj = BTreeMap::new();
            for (i, name) in column_names.iter().enumerate() {
                obj.insert(name.clone(), sql_value_to_json(row.get_ref(i)?));
            }
            out.push(obj);
        }
        Ok(out)
    }

    /// Reject anything that is not a single read-only statement
    fn guard_read_only(sql: &str) -> Result<()> {
        let trimmed = sql.trim().trim_end_matches(';');
        if trimmed.contains(';') {
            return Err(CoreError::InvalidFilter(
                "multiple statements are not allowed".to_string(),
            ));
        }
        let lowered = trimmed.to_lowercase();
        if !(lowered.starts_with("select") || lowered.starts_with("with")) {
            return Err(CoreError::InvalidFilter(
                "only read-only SELECT/WITH queries are allowed".to_string(),
            ));
        }
        for forbidden in [
            "insert", "update", "delete", "drop", "alter", "create", "pragma", "attach", "vacuum",
        ] {
            if lowered
                .split(|c: char| !c.is_ascii_alphanumeric())
                .any(|w| w == forbidden)
            {
                return Err(CoreError::InvalidFilter(format!(
                    "forbidden keyword in read-only query: {}",
                    forbidden
                )));
            }
        }
        Ok(())
    }
}

fn json_to_sql_value(v: &serde_json::Value) -> rusqlite::types::Value {
    use rusqlite::types::Value;
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Integer(*b as i64),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else {
                Value::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}

fn sql_value_to_json(v: rusqlite::types::ValueRef<'_>) -> serde_json::Value {
    use rusqlite::types::ValueRef;
    match v {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Value::from(f),
        ValueRef::Text(t) => serde_json::Value::from(String::from_utf8_lossy(t).to_string()),
        ValueRef::Blob(b) => serde_json::Value::from(format!("<blob {} bytes>", b.len())),
    }
}

// ============================================================================
// TESTS
// ============================================================================
