//! Metadata filter for search and scan.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::memory::{KnowledgeType, Layer, MemoryStatus, Namespace};

/// Conjunction of metadata predicates.
///
/// An empty namespace list means "caller did not specify"; the store
/// substitutes the prod default before filtering. Unknown fields in the
/// external JSON form are rejected (`InvalidFilter`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct MemoryFilter {
    /// Namespaces to include; empty -> default `[prod]`
    pub namespaces: Vec<Namespace>,
    /// Statuses to include; empty -> `[active]`
    pub statuses: Vec<MemoryStatus>,
    /// Restrict to one layer
    pub layer: Option<Layer>,
    /// Restrict to one knowledge type
    pub knowledge_type: Option<KnowledgeType>,
    /// Restrict to one canonical key
    pub canonical_key: Option<String>,
    /// Restrict to memories created in one session
    pub session_id: Option<String>,
    /// Require at least one of these tags
    pub tags_any: Vec<String>,
    /// Only memories modified at or after this instant
    pub modified_since: Option<DateTime<Utc>>,
    /// Only memories modified at or before this instant
    pub modified_until: Option<DateTime<Utc>>,
}

impl MemoryFilter {
    /// Filter that only pins namespaces
    pub fn for_namespaces(namespaces: Vec<Namespace>) -> Self {
        Self {
            namespaces,
            ..Default::default()
        }
    }

    /// Parse the external JSON form, mapping serde failures (including
    /// unknown fields) to `InvalidFilter`.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| CoreError::InvalidFilter(e.to_string()))
    }

    /// Namespaces with the prod default applied
    pub fn effective_namespaces(&self) -> Vec<Namespace> {
        if self.namespaces.is_empty() {
            vec![Namespace::Prod]
        } else {
            self.namespaces.clone()
        }
    }

    /// Statuses with the active default applied
    pub fn effective_statuses(&self) -> Vec<MemoryStatus> {
        if self.statuses.is_empty() {
            vec![MemoryStatus::Active]
        } else {
            self.statuses.clone()
        }
    }

    /// True when a record passes every predicate
    pub fn matches(&self, record: &crate::memory::MemoryRecord) -> bool {
        if !self.effective_namespaces().contains(&record.namespace) {
            return false;
        }
        if !self.effective_statuses().contains(&record.status) {
            return false;
        }
        if let Some(layer) = self.layer {
            if record.layer != layer {
                return false;
            }
        }
        if let Some(kt) = self.knowledge_type {
            if record.knowledge_type != kt {
                return false;
            }
        }
        if let Some(key) = &self.canonical_key {
            if &record.canonical_key != key {
                return false;
            }
        }
        if let Some(session) = &self.session_id {
            if record.session_id.as_ref() != Some(session) {
                return false;
            }
        }
        if !self.tags_any.is_empty() && !self.tags_any.iter().any(|t| record.tags.contains(t)) {
            return false;
        }
        if let Some(since) = self.modified_since {
            if record.last_modified < since {
                return false;
            }
        }
        if let Some(until) = self.modified_until {
            if record.last_modified > until {
                return false;
            }
        }
        true
    }
}
