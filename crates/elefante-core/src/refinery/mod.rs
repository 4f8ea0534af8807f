//! Refinery - canonicalization and deduplication
//!
//! Converts an ingestion candidate (content + agent enrichment + source) into
//! a normalized, uniquely identifiable record and decides the ingest action
//! against existing state. Everything here is deterministic; there is no
//! model in the loop.

mod canonical;
mod concepts;

pub use canonical::CanonicalKey;
pub use concepts::{extract_concepts, infer_surfaces_when, STOP_WORDS};

use chrono::{DateTime, Utc};
use uuid::Uuid;
use xxhash_rust::xxh3::xxh3_64;

use crate::config::CoreConfig;
use crate::error::{CoreError, Result};
use crate::memory::{
    AgentEnrichment, IngestAction, KnowledgeType, Layer, MemoryRecord, MemoryStatus, Namespace,
    Ring, Source,
};

// ============================================================================
// NORMALIZATION & HASHING
// ============================================================================

/// Normalize content: trim, unify line endings to `\n`, collapse runs of
/// spaces and tabs to single spaces (newlines are preserved).
pub fn normalize_content(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(unified.len());
    for (i, line) in unified.lines().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let mut last_space = false;
        for c in line.trim().chars() {
            if c == ' ' || c == '\t' {
                if !last_space {
                    out.push(' ');
                }
                last_space = true;
            } else {
                out.push(c);
                last_space = false;
            }
        }
    }
    out.trim().to_string()
}

/// Stable hash of normalized content, as lowercase hex
pub fn content_hash(normalized: &str) -> String {
    format!("{:016x}", xxh3_64(normalized.as_bytes()))
}

// ============================================================================
// AUTHORITY SCORE
// ============================================================================

/// Composite authority score, clamped to [0, 1]:
///
/// ```text
/// authority = 0.35 * (importance / 10)
///           + 0.25 * min(ln(1 + access_count) / ln(51), 1)
///           + 0.20 * exp(-0.007 * age_days)
///           + 0.20 * exp(-0.05 * days_since_last_access)
/// ```
pub fn authority_score(
    importance: u8,
    access_count: i64,
    age_days: f64,
    days_since_last_access: f64,
) -> f64 {
    let usage = ((1.0 + access_count.max(0) as f64).ln() / 51f64.ln()).min(1.0);
    let score = 0.35 * (importance.min(10) as f64 / 10.0)
        + 0.25 * usage
        + 0.20 * (-0.007 * age_days.max(0.0)).exp()
        + 0.20 * (-0.05 * days_since_last_access.max(0.0)).exp();
    score.clamp(0.0, 1.0)
}

/// Recompute a record's authority from its bookkeeping fields
pub fn recompute_authority(record: &MemoryRecord, now: DateTime<Utc>) -> f64 {
    let age_days = (now - record.created_at).num_seconds() as f64 / 86_400.0;
    let since_access = (now - record.last_accessed).num_seconds() as f64 / 86_400.0;
    authority_score(record.importance, record.access_count, age_days, since_access)
}

// ============================================================================
// REFINED CANDIDATE
// ============================================================================

/// A fully canonicalized ingestion candidate, ready for the action decision
#[derive(Debug, Clone)]
pub struct RefinedCandidate {
    /// Normalized content
    pub content: String,
    /// Hash of the normalized content
    pub content_hash: String,
    /// Deterministic identity
    pub canonical_key: CanonicalKey,
    /// Routed namespace
    pub namespace: Namespace,
    pub layer: Layer,
    pub sublayer: String,
    pub ring: Ring,
    pub knowledge_type: KnowledgeType,
    /// Clamped to 1..=10
    pub importance: u8,
    pub source: Source,
    pub expires_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    /// Top extracted keywords
    pub concepts: Vec<String>,
    /// Synthesized query patterns
    pub surfaces_when: Vec<String>,
}

impl RefinedCandidate {
    /// Materialize a new memory record from this candidate
    pub fn into_record(self, session_id: Option<String>, now: DateTime<Utc>) -> MemoryRecord {
        let authority = authority_score(self.importance, 1, 0.0, 0.0);
        MemoryRecord {
            id: Uuid::new_v4().to_string(),
            content: self.content,
            content_hash: self.content_hash,
            canonical_key: self.canonical_key.to_string(),
            namespace: self.namespace,
            status: MemoryStatus::Active,
            layer: self.layer,
            sublayer: self.sublayer,
            ring: self.ring,
            knowledge_type: self.knowledge_type,
            importance: self.importance,
            created_at: now,
            last_modified: now,
            last_accessed: now,
            access_count: 1,
            supersedes_id: None,
            superseded_by_id: None,
            related_memory_ids: Vec::new(),
            conflict_ids: Vec::new(),
            potential_conflict_ids: Vec::new(),
            co_activated_with: Vec::new(),
            concepts: self.concepts,
            surfaces_when: self.surfaces_when,
            authority_score: authority,
            expires_at: self.expires_at,
            source: self.source,
            session_id,
            tags: self.tags,
        }
    }
}

// ============================================================================
// REFINERY
// ============================================================================

/// Deterministic canonicalization engine
pub struct Refinery {
    config: CoreConfig,
}

impl Refinery {
    pub fn new(config: CoreConfig) -> Self {
        Self { config }
    }

    /// Refine a candidate into its canonical form.
    ///
    /// Fails with `InvalidNamespace`, `InvalidCanonicalKey`, or
    /// `ExpiresAtRequired` per the ingestion contract.
    pub fn refine(
        &self,
        raw_content: &str,
        enrichment: &AgentEnrichment,
        source: Source,
    ) -> Result<RefinedCandidate> {
        let content = normalize_content(raw_content);
        if content.is_empty() {
            return Err(CoreError::ContentRequired);
        }
        let hash = content_hash(&content);

        let layer = enrichment
            .layer
            .as_deref()
            .and_then(Layer::parse_name)
            .unwrap_or_default();
        let sublayer = enrichment.sublayer.clone().unwrap_or_default();
        let ring = enrichment
            .ring
            .as_deref()
            .and_then(Ring::parse_name)
            .unwrap_or_default();
        let knowledge_type = enrichment
            .knowledge_type
            .as_deref()
            .and_then(KnowledgeType::parse_name)
            .unwrap_or_default();
        let importance = enrichment.importance.unwrap_or(5).clamp(1, 10);

        let namespace = self.route_namespace(&content, enrichment, source)?;

        let expires_at = enrichment.expires_at;
        if namespace == Namespace::Ephemeral && expires_at.is_none() {
            return Err(CoreError::ExpiresAtRequired(namespace.as_str().to_string()));
        }
        if namespace == Namespace::Test && expires_at.is_none() && self.config.require_test_expiry {
            return Err(CoreError::ExpiresAtRequired(namespace.as_str().to_string()));
        }

        let concepts = extract_concepts(&content, &self.config.concept_lexicon);
        let surfaces_when = infer_surfaces_when(&content, &concepts);

        let canonical_key = match enrichment.canonical_key.as_deref() {
            Some(supplied) if !supplied.trim().is_empty() => CanonicalKey::sanitize(supplied)
                .ok_or_else(|| CoreError::InvalidCanonicalKey(supplied.to_string()))?,
            _ => CanonicalKey::derive(layer, &sublayer, knowledge_type, &concepts),
        };

        Ok(RefinedCandidate {
            content,
            content_hash: hash,
            canonical_key,
            namespace,
            layer,
            sublayer,
            ring,
            knowledge_type,
            importance,
            source,
            expires_at,
            tags: enrichment.tags.clone(),
            concepts,
            surfaces_when,
        })
    }

    /// Deterministic namespace routing, in contract order:
    /// test-suite source / test tags / test content patterns -> test;
    /// diagnostic flag -> ephemeral; otherwise prod.
    /// A forced namespace must be in the closed set.
    fn route_namespace(
        &self,
        content: &str,
        enrichment: &AgentEnrichment,
        source: Source,
    ) -> Result<Namespace> {
        if let Some(forced) = enrichment.namespace.as_deref() {
            return Namespace::parse_name(forced)
                .ok_or_else(|| CoreError::InvalidNamespace(forced.to_string()));
        }

        let tagged_test = enrichment
            .tags
            .iter()
            .any(|t| self.config.test_memory_tags.iter().any(|m| m == t));
        let content_lower = content.to_lowercase();
        let content_test = self
            .config
            .test_content_patterns
            .iter()
            .any(|p| content_lower.contains(&p.to_lowercase()));

        if source == Source::TestSuite || tagged_test || content_test {
            return Ok(Namespace::Test);
        }
        if enrichment.ephemeral {
            return Ok(Namespace::Ephemeral);
        }
        Ok(Namespace::Prod)
    }

    /// Decide the ingest action for a refined candidate against the current
    /// active memory for its `(namespace, canonical_key)` pair.
    pub fn decide_action(
        &self,
        candidate: &RefinedCandidate,
        active: Option<&MemoryRecord>,
    ) -> IngestAction {
        let Some(active) = active else {
            return IngestAction::Add;
        };

        if active.content_hash == candidate.content_hash {
            return IngestAction::Reinforce;
        }

        if self.is_opposing(&candidate.content, &active.content)
            && concept_overlap(&candidate.concepts, &active.concepts)
                > self.config.contradiction_overlap_threshold
        {
            return IngestAction::Contradict;
        }

        IngestAction::Supersede
    }

    /// True when the two contents match opposite sides of any configured
    /// opposing-marker pair.
    fn is_opposing(&self, a: &str, b: &str) -> bool {
        let a = a.to_lowercase();
        let b = b.to_lowercase();
        self.config.opposing_patterns.iter().any(|p| {
            (contains_word(&a, &p.a) && contains_word(&b, &p.b))
                || (contains_word(&a, &p.b) && contains_word(&b, &p.a))
        })
    }
}

/// Whole-word containment check on lowercased text
fn contains_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .any(|t| t == word)
}

/// Jaccard overlap of two concept lists; 0 when either is empty
pub fn concept_overlap(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let set_a: std::collections::HashSet<&str> = a.iter().map(|s| s.as_str()).collect();
    let set_b: std::collections::HashSet<&str> = b.iter().map(|s| s.as_str()).collect();
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

// ============================================================================
// TESTS
// ============================================================================
