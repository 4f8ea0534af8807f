//! Core configuration.
//!
//! Every recognized option from the deployment surface lives here. Weights,
//! thresholds, and pattern rules are data: nothing in the scoring or
//! contradiction paths hard-codes them.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Weights for the composite retrieval score. Fixed at deploy time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalWeights {
    /// Cosine similarity of content embeddings
    pub vec: f64,
    /// Jaccard overlap of extracted concepts
    pub concept: f64,
    /// Layer/sublayer match against the inferred query domain
    pub domain: f64,
    /// Co-activation with other memories in the batch
    pub co: f64,
    /// Authority score of the memory
    pub auth: f64,
    /// Recency of last access
    pub time: f64,
}

impl Default for RetrievalWeights {
    fn default() -> Self {
        Self {
            vec: 0.30,
            concept: 0.20,
            domain: 0.15,
            co: 0.15,
            auth: 0.10,
            time: 0.10,
        }
    }
}

impl RetrievalWeights {
    /// Sum of all weights (used to renormalize after adaptive rescaling).
    pub fn total(&self) -> f64 {
        self.vec + self.concept + self.domain + self.co + self.auth + self.time
    }
}

/// A pair of opposing content markers. When the candidate matches one side
/// and the active memory matches the other, with high concept overlap, the
/// ingest decision becomes CONTRADICT instead of SUPERSEDE.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpposingPattern {
    /// Marker word on one side (matched as a whole word, case-insensitive)
    pub a: String,
    /// Marker word on the opposing side
    pub b: String,
}

impl OpposingPattern {
    fn new(a: &str, b: &str) -> Self {
        Self {
            a: a.to_string(),
            b: b.to_string(),
        }
    }
}

/// Configuration for the orchestration core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreConfig {
    /// Data root; `vector/`, `graph/`, `locks/`, and `logs/` live beneath it.
    /// `None` resolves to the platform data directory.
    pub data_root: Option<PathBuf>,

    /// Embedding dimension (provider-dependent; the store validates against it)
    pub embedding_dimension: usize,

    /// Write lock acquisition timeout in milliseconds
    pub lock_acquire_timeout_ms: u64,

    /// Hard stale threshold after which a lock is reclaimed with a warning
    pub lock_stale_threshold_ms: u64,

    /// Composite retrieval weights
    pub retrieval_weights: RetrievalWeights,

    /// Namespaces searched when the caller supplies no namespace filter
    pub default_namespace_filter_on_search: Vec<String>,

    /// TTL applied to ephemeral memories when the caller omits expires_at
    /// entirely is an error; this is only consulted for test-namespace expiry
    pub ephemeral_ttl_seconds: Option<u64>,

    /// Tags that route a candidate into the test namespace
    pub test_memory_tags: Vec<String>,

    /// Content substrings that route a candidate into the test namespace
    pub test_content_patterns: Vec<String>,

    /// Embedding-similarity threshold for deduplicating hybrid results
    pub dedup_similarity_threshold: f64,

    /// Opposing-marker pairs that trigger CONTRADICT
    pub opposing_patterns: Vec<OpposingPattern>,

    /// Minimum concept overlap (0..1) required alongside an opposing match
    pub contradiction_overlap_threshold: f64,

    /// Whether writes require a preceding search in the same session
    pub enforce_compliance_gate: bool,

    /// Maximum entries kept per memory in the co-activation list
    pub co_activation_cap: usize,

    /// Technical terms boosted during concept extraction
    pub concept_lexicon: Vec<String>,

    /// Whether test-namespace memories require an expiry
    pub require_test_expiry: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_root: None,
            embedding_dimension: 256,
            lock_acquire_timeout_ms: 5_000,
            lock_stale_threshold_ms: 30_000,
            retrieval_weights: RetrievalWeights::default(),
            default_namespace_filter_on_search: vec!["prod".to_string()],
            ephemeral_ttl_seconds: None,
            test_memory_tags: vec!["test".to_string(), "e2e".to_string()],
            test_content_patterns: vec![
                "[e2e]".to_string(),
                "smoke test".to_string(),
                "test fixture".to_string(),
            ],
            dedup_similarity_threshold: 0.95,
            opposing_patterns: vec![
                OpposingPattern::new("always", "never"),
                OpposingPattern::new("use", "avoid"),
                OpposingPattern::new("do", "don't"),
                OpposingPattern::new("enable", "disable"),
            ],
            contradiction_overlap_threshold: 0.6,
            enforce_compliance_gate: true,
            co_activation_cap: 32,
            concept_lexicon: vec![
                "docker", "kubernetes", "rust", "python", "sqlite", "postgres",
                "api", "http", "grpc", "json", "yaml", "config", "database",
                "server", "client", "cache", "embedding", "vector", "graph",
                "async", "thread", "lock", "mutex", "git", "ci", "deploy",
                "dashboard", "mcp", "stdio", "port", "timeout", "path",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            require_test_expiry: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        let w = RetrievalWeights::default();
        assert!((w.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_default_config() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.lock_acquire_timeout_ms, 5_000);
        assert_eq!(cfg.lock_stale_threshold_ms, 30_000);
        assert_eq!(cfg.default_namespace_filter_on_search, vec!["prod"]);
        assert_eq!(cfg.dedup_similarity_threshold, 0.95);
        assert!(cfg.enforce_compliance_gate);
        assert!(cfg.opposing_patterns.iter().any(|p| p.a == "always" && p.b == "never"));
    }

    #[test]
    fn test_config_roundtrip() {
        let cfg = CoreConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: CoreConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.co_activation_cap, cfg.co_activation_cap);
    }
}
