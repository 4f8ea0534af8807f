//! Memory Data Model
//!
//! The atomic unit of stored knowledge plus the closed-set vocabularies
//! around it, and the enrichment payload agents attach at ingestion.

mod record;

pub use record::{
    AgentEnrichment, EntityInput, IngestAction, KnowledgeType, Layer, MemoryRecord, MemoryStatus,
    Namespace, RelationshipInput, Ring, Source,
};
