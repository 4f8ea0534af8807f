//! Graph Store
//!
//! Persistent labeled property graph over SQLite:
//! - Node labels: Memory, Entity, Concept, Session
//! - Edge types: HAS_ENTITY, HAS_CONCEPT, MENTIONED_IN, RELATES_TO,
//!   SUPERSEDES, CO_ACTIVATED_WITH, SUPPORTS, CONTRADICTS
//!
//! Payloads live under a `props` column; discriminators under `entity_type` /
//! `edge_type`. The names `properties`, `type`, and `label` are reserved by
//! query surfaces and never used as property names.

mod store;

pub use store::{GraphNode, GraphEdge, GraphStore};

use serde::{Deserialize, Serialize};

/// Node labels in the property graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeLabel {
    Memory,
    Entity,
    Concept,
    Session,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::Memory => "Memory",
            NodeLabel::Entity => "Entity",
            NodeLabel::Concept => "Concept",
            NodeLabel::Session => "Session",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "Memory" => Some(NodeLabel::Memory),
            "Entity" => Some(NodeLabel::Entity),
            "Concept" => Some(NodeLabel::Concept),
            "Session" => Some(NodeLabel::Session),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Edge types in the property graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeType {
    HasEntity,
    HasConcept,
    MentionedIn,
    RelatesTo,
    Supersedes,
    CoActivatedWith,
    Supports,
    Contradicts,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::HasEntity => "HAS_ENTITY",
            EdgeType::HasConcept => "HAS_CONCEPT",
            EdgeType::MentionedIn => "MENTIONED_IN",
            EdgeType::RelatesTo => "RELATES_TO",
            EdgeType::Supersedes => "SUPERSEDES",
            EdgeType::CoActivatedWith => "CO_ACTIVATED_WITH",
            EdgeType::Supports => "SUPPORTS",
            EdgeType::Contradicts => "CONTRADICTS",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "HAS_ENTITY" => Some(EdgeType::HasEntity),
            "HAS_CONCEPT" => Some(EdgeType::HasConcept),
            "MENTIONED_IN" => Some(EdgeType::MentionedIn),
            "RELATES_TO" => Some(EdgeType::RelatesTo),
            "SUPERSEDES" => Some(EdgeType::Supersedes),
            "CO_ACTIVATED_WITH" => Some(EdgeType::CoActivatedWith),
            "SUPPORTS" => Some(EdgeType::Supports),
            "CONTRADICTS" => Some(EdgeType::Contradicts),
            _ => None,
        }
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_roundtrip() {
        for label in [NodeLabel::Memory, NodeLabel::Entity, NodeLabel::Concept, NodeLabel::Session]
        {
            assert_eq!(NodeLabel::parse_name(label.as_str()), Some(label));
        }
    }

    #[test]
    fn test_edge_type_roundtrip() {
        for edge in [
            EdgeType::HasEntity,
            EdgeType::HasConcept,
            EdgeType::MentionedIn,
            EdgeType::RelatesTo,
            EdgeType::Supersedes,
            EdgeType::CoActivatedWith,
            EdgeType::Supports,
            EdgeType::Contradicts,
        ] {
            assert_eq!(EdgeType::parse_name(edge.as_str()), Some(edge));
        }
    }
}
