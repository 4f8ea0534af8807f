//! Cognitive Retriever - composite scoring over vector candidates
//!
//! Ranks candidates for a query by blending six signals, each a pure
//! function `(query features, memory) -> [0, 1]`:
//!
//! ```text
//! score = 0.30*s_vec + 0.20*s_concept + 0.15*s_domain
//!       + 0.15*s_co + 0.10*s_auth + 0.10*s_time
//! ```
//!
//! Weights are data (deploy-time config), adaptively rescaled per query:
//! pronoun-heavy queries lean on recency, identifier-like tokens lean on
//! graph anchoring, interrogatives lean on semantic similarity.
//!
//! Retrieval also learns: every returned batch appends to each member's
//! co-activation list (bounded, least-recently-co-activated evicted) and
//! bumps access bookkeeping.

mod features;

pub use features::QueryFeatures;

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::config::{CoreConfig, RetrievalWeights};
use crate::embed::{cosine_similarity, EmbeddingProvider};
use crate::error::Result;
use crate::graph::{EdgeType, GraphStore};
use crate::memory::MemoryRecord;
use crate::refinery::{concept_overlap, recompute_authority};
use crate::vector::{MemoryFilter, VectorStore};

/// Over-fetch multiplier before re-ranking
const OVERFETCH: usize = 3;

/// Capacity of the query-embedding cache
const QUERY_CACHE_SIZE: usize = 100;

/// Per-signal breakdown attached to each result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalScore {
    /// Raw signal value in [0, 1]
    pub score: f64,
    /// Weighted contribution to the composite
    pub contribution: f64,
    /// Human-readable reason
    pub reason: String,
}

/// A ranked memory with its composite score and explanation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredMemory {
    pub memory: MemoryRecord,
    /// Composite score
    pub score: f64,
    /// Raw cosine similarity from the vector store
    pub similarity: f64,
    /// Per-signal breakdown, keyed by signal name
    pub explanation: BTreeMap<String, SignalScore>,
}

/// Result-set structure around the top hit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constellation {
    /// Top-ranked memory id
    pub primary: Option<String>,
    /// Ids linked to the primary by SUPPORTS or CO_ACTIVATED_WITH
    pub supporting: Vec<String>,
    /// Ids linked to the primary by CONTRADICTS
    pub contradicting: Vec<String>,
    /// Remaining result ids
    pub other: Vec<String>,
}

/// Full retrieval response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<ScoredMemory>,
    pub constellation: Constellation,
    /// One-line summary of the constellation
    pub synthesis: String,
}

/// Composite-scoring retriever over the dual store
pub struct CognitiveRetriever {
    vector: Arc<VectorStore>,
    graph: Arc<GraphStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: CoreConfig,
    /// Repeated queries skip the embedding model
    query_cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl CognitiveRetriever {
    pub fn new(
        vector: Arc<VectorStore>,
        graph: Arc<GraphStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: CoreConfig,
    ) -> Self {
        Self {
            vector,
            graph,
            embedder,
            config,
            query_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(QUERY_CACHE_SIZE).expect("cache capacity is non-zero"),
            )),
        }
    }

    /// Embed a query, consulting the LRU cache first. Model work runs on a
    /// blocking worker so the cooperative core is never stalled.
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        {
            let mut cache = self.query_cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = cache.get(query) {
                return Ok(cached.clone());
            }
        }

        let embedder = Arc::clone(&self.embedder);
        let owned_query = query.to_string();
        let embedding = tokio::task::spawn_blocking(move || embedder.embed(&owned_query))
            .await
            .map_err(|e| crate::error::CoreError::Embedding(e.to_string()))?
            .map_err(|e| crate::error::CoreError::Embedding(e.to_string()))?;

        self.query_cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .put(query.to_string(), embedding.vector.clone());
        Ok(embedding.vector)
    }

    /// Run the retrieval pipeline. The query must already be normalized and
    /// non-empty; filters must already be validated.
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        filter: &MemoryFilter,
        session_id: Option<&str>,
    ) -> Result<SearchResponse> {
        let features = QueryFeatures::extract(query, &self.config.concept_lexicon);
        let query_embedding = self.embed_query(query).await?;

        let mut candidates =
            self.vector
                .search(&query_embedding, k.max(1) * OVERFETCH, filter)?;

        // Conversation-context hybrid: fold in this session's own memories,
        // deduplicated against stored results by embedding similarity
        if let Some(session) = session_id {
            let session_filter = MemoryFilter {
                session_id: Some(session.to_string()),
                namespaces: filter.effective_namespaces(),
                ..Default::default()
            };
            let session_hits =
                self.vector
                    .search(&query_embedding, k.max(1) * OVERFETCH, &session_filter)?;
            self.merge_session_hits(&mut candidates, session_hits)?;
        }

        let weights = self.adaptive_weights(&features);
        let batch_ids: Vec<String> = candidates.iter().map(|(m, _)| m.id.clone()).collect();

        let mut scored: Vec<ScoredMemory> = candidates
            .into_iter()
            .map(|(memory, similarity)| {
                self.score_memory(memory, similarity as f64, &features, &batch_ids, &weights)
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        let constellation = self.build_constellation(&scored)?;
        let synthesis = self.synthesize(&scored, &constellation);

        // Learning + bookkeeping are best-effort; retrieval never fails on them
        if let Err(e) = self.record_co_activation(&scored) {
            tracing::warn!("Co-activation update failed: {}", e);
        }
        if let Err(e) = self.record_access(&scored) {
            tracing::warn!("Access bookkeeping failed: {}", e);
        }

        Ok(SearchResponse {
            results: scored,
            constellation,
            synthesis,
        })
    }

    /// Merge session-scoped hits into the candidate list. Exact ids are
    /// deduplicated directly; near-duplicates are dropped when their stored
    /// embeddings exceed the dedup similarity threshold against an existing
    /// candidate.
    fn merge_session_hits(
        &self,
        candidates: &mut Vec<(MemoryRecord, f32)>,
        session_hits: Vec<(MemoryRecord, f32)>,
    ) -> Result<()> {
        for (hit, similarity) in session_hits {
            if candidates.iter().any(|(m, _)| m.id == hit.id) {
                continue;
            }
            let hit_embedding = self.vector.get_embedding(&hit.id)?;
            let mut duplicate = false;
            for (existing, _) in candidates.iter() {
                let existing_embedding = self.vector.get_embedding(&existing.id)?;
                let pair_sim =
                    cosine_similarity(&hit_embedding.vector, &existing_embedding.vector);
                if pair_sim as f64 >= self.config.dedup_similarity_threshold {
                    duplicate = true;
                    break;
                }
            }
            if !duplicate {
                candidates.push((hit, similarity));
            }
        }
        Ok(())
    }

    /// Deterministic pre-rank rescaling of the deploy-time weights,
    /// renormalized to keep the composite in [0, 1].
    fn adaptive_weights(&self, features: &QueryFeatures) -> RetrievalWeights {
        let mut w = self.config.retrieval_weights;
        if features.has_pronoun {
            w.time *= 1.5;
        }
        if features.has_identifier {
            w.co *= 1.5;
            w.domain *= 1.25;
        }
        if features.is_interrogative {
            w.vec *= 1.25;
        }
        let total = w.total();
        if total > 0.0 {
            w.vec /= total;
            w.concept /= total;
            w.domain /= total;
            w.co /= total;
            w.auth /= total;
            w.time /= total;
        }
        w
    }

    fn score_memory(
        &self,
        memory: MemoryRecord,
        similarity: f64,
        features: &QueryFeatures,
        batch_ids: &[String],
        weights: &RetrievalWeights,
    ) -> ScoredMemory {
        let now = Utc::now();

        let s_vec = similarity.clamp(0.0, 1.0);
        let s_concept = concept_overlap(&features.concepts, &memory.concepts);

        let s_domain = if Some(memory.layer) == features.inferred_layer {
            let sublayer_match = features
                .inferred_sublayer
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(&memory.sublayer));
            if sublayer_match { 1.0 } else { 0.5 }
        } else {
            0.0
        };

        let others = batch_ids.len().saturating_sub(1);
        let s_co = if others == 0 {
            0.0
        } else {
            let co_hits = batch_ids
                .iter()
                .filter(|id| **id != memory.id && memory.co_activated_with.contains(id))
                .count();
            (co_hits as f64 / others as f64).min(1.0)
        };

        let s_auth = memory.authority_score.clamp(0.0, 1.0);

        let days_since_access =
            (now - memory.last_accessed).num_seconds().max(0) as f64 / 86_400.0;
        let s_time = (-0.05 * days_since_access).exp();

        let score = weights.vec * s_vec
            + weights.concept * s_concept
            + weights.domain * s_domain
            + weights.co * s_co
            + weights.auth * s_auth
            + weights.time * s_time;

        let mut explanation = BTreeMap::new();
        explanation.insert(
            "vec".to_string(),
            SignalScore {
                score: s_vec,
                contribution: weights.vec * s_vec,
                reason: "cosine similarity of content embeddings".to_string(),
            },
        );
        let shared: Vec<&str> = features
            .concepts
            .iter()
            .filter(|c| memory.concepts.contains(c))
            .map(|s| s.as_str())
            .collect();
        explanation.insert(
            "concept".to_string(),
            SignalScore {
                score: s_concept,
                contribution: weights.concept * s_concept,
                reason: if shared.is_empty() {
                    "no shared concepts".to_string()
                } else {
                    format!("shared concepts: {}", shared.join(", "))
                },
            },
        );
        explanation.insert(
            "domain".to_string(),
            SignalScore {
                score: s_domain,
                contribution: weights.domain * s_domain,
                reason: match s_domain {
                    s if s >= 1.0 => "layer and sublayer match the query domain".to_string(),
                    s if s > 0.0 => "layer matches the query domain".to_string(),
                    _ => "different domain".to_string(),
                },
            },
        );
        explanation.insert(
            "co".to_string(),
            SignalScore {
                score: s_co,
                contribution: weights.co * s_co,
                reason: format!(
                    "co-activated with {:.0}% of this batch",
                    s_co * 100.0
                ),
            },
        );
        explanation.insert(
            "auth".to_string(),
            SignalScore {
                score: s_auth,
                contribution: weights.auth * s_auth,
                reason: "authority from importance, usage, freshness, recency".to_string(),
            },
        );
        explanation.insert(
            "time".to_string(),
            SignalScore {
                score: s_time,
                contribution: weights.time * s_time,
                reason: format!("last accessed {:.1} days ago", days_since_access),
            },
        );

        ScoredMemory {
            memory,
            score,
            similarity,
            explanation,
        }
    }

    /// Partition results around the top hit using graph edges, falling back
    /// to the denormalized id caches when edges are missing.
    fn build_constellation(&self, results: &[ScoredMemory]) -> Result<Constellation> {
        let Some(primary) = results.first() else {
            return Ok(Constellation::default());
        };
        let primary_id = primary.memory.id.clone();

        let mut supporting_ids: Vec<String> = Vec::new();
        for edge_type in [EdgeType::Supports, EdgeType::CoActivatedWith] {
            for edge in self.graph.edges_touching(&primary_id, edge_type)? {
                let other = if edge.src_id == primary_id { edge.dst_id } else { edge.src_id };
                supporting_ids.push(other);
            }
        }
        supporting_ids.extend(primary.memory.co_activated_with.iter().cloned());

        let mut contradicting_ids: Vec<String> = Vec::new();
        for edge in self.graph.edges_touching(&primary_id, EdgeType::Contradicts)? {
            let other = if edge.src_id == primary_id { edge.dst_id } else { edge.src_id };
            contradicting_ids.push(other);
        }
        contradicting_ids.extend(primary.memory.conflict_ids.iter().cloned());

        let mut constellation = Constellation {
            primary: Some(primary_id.clone()),
            ..Default::default()
        };
        for result in results.iter().skip(1) {
            let id = &result.memory.id;
            if contradicting_ids.contains(id) {
                constellation.contradicting.push(id.clone());
            } else if supporting_ids.contains(id) {
                constellation.supporting.push(id.clone());
            } else {
                constellation.other.push(id.clone());
            }
        }
        Ok(constellation)
    }

    fn synthesize(&self, results: &[ScoredMemory], constellation: &Constellation) -> String {
        let Some(primary) = results.first() else {
            return "No memories matched the query.".to_string();
        };
        let title: String = primary
            .memory
            .content
            .split_whitespace()
            .take(8)
            .collect::<Vec<_>>()
            .join(" ");
        let mut line = format!(
            "Primary: {} | Supported by: {}",
            title,
            constellation.supporting.len()
        );
        if !constellation.contradicting.is_empty() {
            line.push_str(&format!(
                " | Note: conflicts in {}",
                constellation.contradicting.len()
            ));
        }
        line
    }

    /// Append each returned memory to every other's co-activation list,
    /// most-recent-first, deduplicated, evicting the least recently
    /// co-activated past the cap. Mirrored as CO_ACTIVATED_WITH edges.
    fn record_co_activation(&self, results: &[ScoredMemory]) -> Result<()> {
        if results.len() < 2 {
            return Ok(());
        }
        let cap = self.config.co_activation_cap;
        let ids: Vec<&str> = results.iter().map(|r| r.memory.id.as_str()).collect();

        for result in results {
            let mut record = match self.vector.get(&result.memory.id)? {
                Some(r) => r,
                None => continue,
            };
            let mut list: Vec<String> = ids
                .iter()
                .filter(|id| **id != record.id)
                .map(|id| id.to_string())
                .collect();
            for existing in &record.co_activated_with {
                if !list.contains(existing) {
                    list.push(existing.clone());
                }
            }
            list.truncate(cap);
            record.co_activated_with = list;
            record.last_modified = Utc::now();
            self.vector.update_record(&record)?;
        }

        for (i, a) in ids.iter().enumerate() {
            for b in ids.iter().skip(i + 1) {
                self.graph
                    .upsert_edge(a, b, EdgeType::CoActivatedWith, &serde_json::json!({}))?;
            }
        }
        Ok(())
    }

    /// Bump access counters and recompute authority for returned memories
    fn record_access(&self, results: &[ScoredMemory]) -> Result<()> {
        let now = Utc::now();
        for result in results {
            let mut record = match self.vector.get(&result.memory.id)? {
                Some(r) => r,
                None => continue,
            };
            record.access_count += 1;
            record.last_accessed = now;
            record.authority_score = recompute_authority(&record, now);
            self.vector.update_record(&record)?;
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
