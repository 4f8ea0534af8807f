//! Memory record - the fundamental unit of stored knowledge
//!
//! Each record represents one atomic piece of knowledge with:
//! - Normalized content and its stable hash
//! - A deterministic canonical identity (Subject-Aspect-Qualifier)
//! - Namespace routing and lifecycle status
//! - Agent-supplied topology (layer, ring, knowledge type, importance)
//! - Denormalized relationship caches (conflicts, co-activation)
//!
//! The embedding vector itself lives in the vector store, not here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// CLOSED-SET VOCABULARIES
// ============================================================================

/// Isolation domain for memories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Durable production knowledge
    #[default]
    Prod,
    /// Knowledge created by test suites
    Test,
    /// Diagnostic or temporary knowledge; always carries an expiry
    Ephemeral,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Prod => "prod",
            Namespace::Test => "test",
            Namespace::Ephemeral => "ephemeral",
        }
    }

    /// Parse from the closed set; `None` for anything else.
    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "prod" => Some(Namespace::Prod),
            "test" => Some(Namespace::Test),
            "ephemeral" => Some(Namespace::Ephemeral),
            _ => None,
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryStatus {
    /// The current memory for its canonical key
    #[default]
    Active,
    /// Replaced by a newer version with the same canonical key
    Superseded,
    /// Merged away during consolidation
    Redundant,
    /// Opposes an active memory; awaiting explicit resolution
    Contradictory,
    /// Removed from retrieval by user action or failed rollback
    Archived,
}

impl MemoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryStatus::Active => "active",
            MemoryStatus::Superseded => "superseded",
            MemoryStatus::Redundant => "redundant",
            MemoryStatus::Contradictory => "contradictory",
            MemoryStatus::Archived => "archived",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "active" => Some(MemoryStatus::Active),
            "superseded" => Some(MemoryStatus::Superseded),
            "redundant" => Some(MemoryStatus::Redundant),
            "contradictory" => Some(MemoryStatus::Contradictory),
            "archived" => Some(MemoryStatus::Archived),
            _ => None,
        }
    }
}

impl std::fmt::Display for MemoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Top-level knowledge layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Knowledge about the agent itself
    #[serde(rename = "self")]
    Selfhood,
    /// Knowledge about the world
    #[default]
    World,
    /// Goals and intents
    Intent,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Selfhood => "self",
            Layer::World => "world",
            Layer::Intent => "intent",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "self" => Some(Layer::Selfhood),
            "world" => Some(Layer::World),
            "intent" => Some(Layer::Intent),
            _ => None,
        }
    }

    /// Canonical-key subject component for this layer.
    pub fn subject(&self) -> &'static str {
        match self {
            Layer::Selfhood => "Self",
            Layer::World => "World",
            Layer::Intent => "Dev",
        }
    }
}

/// Topology ring, from foundational to peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Ring {
    Core,
    Domain,
    Topic,
    #[default]
    Leaf,
}

impl Ring {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ring::Core => "core",
            Ring::Domain => "domain",
            Ring::Topic => "topic",
            Ring::Leaf => "leaf",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "core" => Some(Ring::Core),
            "domain" => Some(Ring::Domain),
            "topic" => Some(Ring::Topic),
            "leaf" => Some(Ring::Leaf),
            _ => None,
        }
    }
}

/// Kind of knowledge a memory expresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeType {
    Law,
    Principle,
    Preference,
    Method,
    #[default]
    Fact,
    Decision,
    Insight,
}

impl KnowledgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KnowledgeType::Law => "law",
            KnowledgeType::Principle => "principle",
            KnowledgeType::Preference => "preference",
            KnowledgeType::Method => "method",
            KnowledgeType::Fact => "fact",
            KnowledgeType::Decision => "decision",
            KnowledgeType::Insight => "insight",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "law" => Some(KnowledgeType::Law),
            "principle" => Some(KnowledgeType::Principle),
            "preference" => Some(KnowledgeType::Preference),
            "method" => Some(KnowledgeType::Method),
            "fact" => Some(KnowledgeType::Fact),
            "decision" => Some(KnowledgeType::Decision),
            "insight" => Some(KnowledgeType::Insight),
            _ => None,
        }
    }
}

/// Origin of an ingested memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    UserInput,
    #[default]
    Agent,
    TestSuite,
    Import,
    System,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::UserInput => "user_input",
            Source::Agent => "agent",
            Source::TestSuite => "test_suite",
            Source::Import => "import",
            Source::System => "system",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "user_input" => Some(Source::UserInput),
            "agent" => Some(Source::Agent),
            "test_suite" => Some(Source::TestSuite),
            "import" => Some(Source::Import),
            "system" => Some(Source::System),
            _ => None,
        }
    }

    /// Priority used by the source_priority conflict-resolution policy.
    pub fn priority(&self) -> u8 {
        match self {
            Source::UserInput => 5,
            Source::System => 4,
            Source::Agent => 3,
            Source::Import => 2,
            Source::TestSuite => 1,
        }
    }
}

/// Decision taken by the refinery for an ingestion candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IngestAction {
    /// No active memory for the canonical key; insert as new
    Add,
    /// Exact duplicate of the active memory; bookkeeping only
    Reinforce,
    /// Same concept, changed wording; version-chain replacement
    Supersede,
    /// Opposes the active memory; stored as contradictory
    Contradict,
}

impl IngestAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestAction::Add => "ADD",
            IngestAction::Reinforce => "REINFORCE",
            IngestAction::Supersede => "SUPERSEDE",
            IngestAction::Contradict => "CONTRADICT",
        }
    }
}

// ============================================================================
// MEMORY RECORD
// ============================================================================

/// A memory record in the dual store.
///
/// Content is immutable after creation; subsequent writes for the same
/// concept go through SUPERSEDE, never in-place update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Normalized content (trimmed, whitespace-collapsed, `\n` line endings)
    pub content: String,
    /// xxh3-64 hex of the normalized content
    pub content_hash: String,
    /// Deterministic identity: `{Subject}-{Aspect}-{Qualifier}`
    pub canonical_key: String,
    /// Isolation domain
    pub namespace: Namespace,
    /// Lifecycle status
    pub status: MemoryStatus,
    /// Knowledge layer
    pub layer: Layer,
    /// Free-form refinement of the layer
    pub sublayer: String,
    /// Topology ring
    pub ring: Ring,
    /// Kind of knowledge
    pub knowledge_type: KnowledgeType,
    /// Agent-supplied importance, 1..=10
    pub importance: u8,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last bookkeeping update
    pub last_modified: DateTime<Utc>,
    /// Last retrieval or reinforcement
    pub last_accessed: DateTime<Utc>,
    /// Times accessed; starts at 1, never decreases
    pub access_count: i64,

    // ========== Version chain ==========
    /// Memory this record replaced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supersedes_id: Option<String>,
    /// Memory that replaced this record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superseded_by_id: Option<String>,

    // ========== Denormalized relationship caches ==========
    /// Explicitly related memories
    #[serde(default)]
    pub related_memory_ids: Vec<String>,
    /// Confirmed contradictions (mirrored by CONTRADICTS edges)
    #[serde(default)]
    pub conflict_ids: Vec<String>,
    /// Suggested conflicts; never block retrieval
    #[serde(default)]
    pub potential_conflict_ids: Vec<String>,
    /// Memories this one co-appeared with in result sets, most recent first
    #[serde(default)]
    pub co_activated_with: Vec<String>,

    // ========== Derived retrieval features ==========
    /// 3-5 normalized keywords extracted from content
    #[serde(default)]
    pub concepts: Vec<String>,
    /// Query patterns this memory should surface for
    #[serde(default)]
    pub surfaces_when: Vec<String>,
    /// Composite of importance, usage, freshness, recency; [0, 1]
    pub authority_score: f64,

    // ========== Expiry & provenance ==========
    /// Required for ephemeral memories
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Origin of this memory
    pub source: Source,
    /// Session in which the memory was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
}

impl MemoryRecord {
    /// True when the record participates in canonical-uniqueness lookups.
    pub fn is_active(&self) -> bool {
        self.status == MemoryStatus::Active
    }

    /// True when the record has passed its expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|t| t <= now).unwrap_or(false)
    }
}

// ============================================================================
// INPUT TYPES
// ============================================================================

/// An entity reference supplied by the agent alongside a memory.
///
/// Uses `deny_unknown_fields` to prevent field injection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EntityInput {
    /// Entity name (merge key)
    pub name: String,
    /// Entity kind, e.g. "person", "project", "technology", "file"
    pub entity_type: String,
    /// Arbitrary JSON payload stored under the node's `props` column
    #[serde(default)]
    pub props: serde_json::Value,
}

/// A relationship between two supplied entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RelationshipInput {
    /// Name of the source entity (must appear in the entities list)
    pub from: String,
    /// Name of the target entity
    pub to: String,
    /// Relationship discriminator carried on the RELATES_TO edge
    pub relation: String,
}

/// Agent-supplied enrichment for an ingestion candidate.
///
/// The core validates shape and coerces defaults; it never classifies
/// content itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct AgentEnrichment {
    /// Pre-computed canonical key; used verbatim (after sanitization) when valid
    pub canonical_key: Option<String>,
    /// Knowledge layer
    pub layer: Option<String>,
    /// Layer refinement
    pub sublayer: Option<String>,
    /// Topology ring
    pub ring: Option<String>,
    /// Kind of knowledge
    pub knowledge_type: Option<String>,
    /// Importance 1..=10; out-of-range values are clamped
    pub importance: Option<u8>,
    /// Forced namespace; must be in the closed set when present
    pub namespace: Option<String>,
    /// Marks the candidate diagnostic/temporary (routes to ephemeral)
    pub ephemeral: bool,
    /// Expiry; required when ephemeral
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Free-form tags
    pub tags: Vec<String>,
    /// Entities referenced by the memory
    pub entities: Vec<EntityInput>,
    /// Relationships among the supplied entities
    pub relationships: Vec<RelationshipInput>,
    /// Explicitly related memory ids
    pub related_memory_ids: Vec<String>,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_closed_set() {
        assert_eq!(Namespace::parse_name("prod"), Some(Namespace::Prod));
        assert_eq!(Namespace::parse_name("test"), Some(Namespace::Test));
        assert_eq!(Namespace::parse_name("ephemeral"), Some(Namespace::Ephemeral));
        assert_eq!(Namespace::parse_name("staging"), None);
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            MemoryStatus::Active,
            MemoryStatus::Superseded,
            MemoryStatus::Redundant,
            MemoryStatus::Contradictory,
            MemoryStatus::Archived,
        ] {
            assert_eq!(MemoryStatus::parse_name(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_layer_serde_names() {
        assert_eq!(Layer::Selfhood.as_str(), "self");
        assert_eq!(Layer::parse_name("self"), Some(Layer::Selfhood));
        let json = serde_json::to_string(&Layer::Selfhood).unwrap();
        assert_eq!(json, "\"self\"");
    }

    #[test]
    fn test_source_priority_ordering() {
        assert!(Source::UserInput.priority() > Source::Agent.priority());
        assert!(Source::Agent.priority() > Source::TestSuite.priority());
    }

    #[test]
    fn test_enrichment_deny_unknown_fields() {
        let ok = r#"{"importance": 7, "tags": ["x"]}"#;
        assert!(serde_json::from_str::<AgentEnrichment>(ok).is_ok());

        let bad = r#"{"importance": 7, "surprise": true}"#;
        assert!(serde_json::from_str::<AgentEnrichment>(bad).is_err());
    }
}
