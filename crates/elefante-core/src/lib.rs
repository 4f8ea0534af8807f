//! # Elefante Core
//!
//! Memory orchestration core for AI agents. Ingests atomic pieces of
//! knowledge and retrieves them by semantic similarity, graph traversal, or
//! a fused composite score:
//!
//! - **Canonical identity**: every memory carries a deterministic
//!   `{Subject}-{Aspect}-{Qualifier}` key; at most one memory per
//!   `(namespace, canonical_key)` is active, and re-ingestion resolves to
//!   REINFORCE / SUPERSEDE / CONTRADICT instead of piling up duplicates
//! - **Dual store**: a vector collection (SQLite + HNSW) over content
//!   embeddings and a labeled property graph of entities, concepts, and
//!   version/conflict edges, kept consistent under a transaction-scoped
//!   write lock shared across host processes
//! - **Composite retrieval**: six pure signals (similarity, concept
//!   overlap, domain, co-activation, authority, recency) blended with
//!   deploy-time weights, with per-signal explanations and a constellation
//!   structure around the top hit
//! - **Compliance gate**: search-before-write enforcement through a
//!   one-shot per-session token
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use elefante_core::{AgentEnrichment, CoreConfig, HashedEmbedder, Orchestrator, Source};
//!
//! let core = Orchestrator::open(CoreConfig::default(), Arc::new(HashedEmbedder::default()))?;
//!
//! // Search first - the gate requires it before any write
//! let found = core.search_memories("absolute paths", None, None, Some("session-1")).await?;
//!
//! let outcome = core
//!     .add_memory(
//!         "Always use absolute paths in scripts.",
//!         &AgentEnrichment::default(),
//!         Source::UserInput,
//!         Some("session-1"),
//!     )
//!     .await?;
//! ```
//!
//! ## Feature Flags
//!
//! - `embeddings` (default): local embedding generation with fastembed
//! - `vector-search` (default): HNSW nearest-neighbor search with USearch
//! - `bundled-sqlite` (default): compile SQLite into the binary

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod config;
pub mod embed;
pub mod error;
pub mod graph;
pub mod lock;
pub mod memory;
pub mod orchestrator;
pub mod refinery;
pub mod retrieval;
pub mod session;
pub mod vector;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use config::{CoreConfig, OpposingPattern, RetrievalWeights};

pub use error::{CoreError, ErrorKind, Result};

pub use memory::{
    AgentEnrichment, EntityInput, IngestAction, KnowledgeType, Layer, MemoryRecord, MemoryStatus,
    Namespace, RelationshipInput, Ring, Source,
};

pub use refinery::{
    authority_score, content_hash, normalize_content, CanonicalKey, RefinedCandidate, Refinery,
};

pub use embed::{cosine_similarity, EmbedError, Embedding, EmbeddingProvider, HashedEmbedder};

#[cfg(feature = "embeddings")]
#[cfg_attr(docsrs, doc(cfg(feature = "embeddings")))]
pub use embed::FastembedProvider;

pub use vector::{MemoryFilter, VectorStore};

pub use graph::{EdgeType, GraphEdge, GraphNode, GraphStore, NodeLabel};

pub use lock::{LockInfo, LockManager, WriteLock};

pub use session::{ComplianceGate, ComplianceStamp, SessionGate};

pub use retrieval::{
    CognitiveRetriever, Constellation, QueryFeatures, ScoredMemory, SearchResponse, SignalScore,
};

pub use orchestrator::{
    AddOutcome, ConflictPolicy, ConflictResolution, ConsolidationReport, ContextSnapshot,
    DuplicateGroup, EntityOut, Orchestrator, RelationshipOut, StatsReport, StoreHealth,
};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        AddOutcome, AgentEnrichment, CoreConfig, CoreError, HashedEmbedder, IngestAction,
        MemoryFilter, MemoryRecord, MemoryStatus, Namespace, Orchestrator, Result, SearchResponse,
        Source,
    };

    #[cfg(feature = "embeddings")]
    pub use crate::FastembedProvider;
}
