//! HNSW nearest-neighbor index (USearch).
//!
//! String keys are mapped to dense u64 ids; cosine distance is converted to
//! similarity on the way out. The index is in-memory and rebuilt from the
//! SQLite rows on open.

use std::collections::HashMap;

use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::error::{CoreError, Result};

/// HNSW connectivity parameter
const DEFAULT_CONNECTIVITY: usize = 16;

/// Expansion factor for index building
const DEFAULT_EXPANSION_ADD: usize = 128;

/// Expansion factor for search
const DEFAULT_EXPANSION_SEARCH: usize = 64;

/// Configuration for the vector index
#[derive(Debug, Clone)]
pub struct VectorIndexConfig {
    /// Number of dimensions
    pub dimensions: usize,
    /// HNSW connectivity parameter
    pub connectivity: usize,
    /// Expansion factor for adding vectors
    pub expansion_add: usize,
    /// Expansion factor for searching
    pub expansion_search: usize,
}

impl VectorIndexConfig {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            connectivity: DEFAULT_CONNECTIVITY,
            expansion_add: DEFAULT_EXPANSION_ADD,
            expansion_search: DEFAULT_EXPANSION_SEARCH,
        }
    }
}

/// Cosine HNSW index with string keys
pub struct VectorIndex {
    index: Index,
    config: VectorIndexConfig,
    key_to_id: HashMap<String, u64>,
    id_to_key: HashMap<u64, String>,
    next_id: u64,
}

impl VectorIndex {
    pub fn new(dimensions: usize) -> Result<Self> {
        let config = VectorIndexConfig::new(dimensions);
        let options = IndexOptions {
            dimensions: config.dimensions,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: config.connectivity,
            expansion_add: config.expansion_add,
            expansion_search: config.expansion_search,
            multi: false,
        };

        let index = Index::new(&options)
            .map_err(|e| CoreError::Init(format!("vector index creation failed: {}", e)))?;

        Ok(Self {
            index,
            config,
            key_to_id: HashMap::new(),
            id_to_key: HashMap::new(),
            next_id: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.index.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.key_to_id.contains_key(key)
    }

    fn reserve(&self, capacity: usize) -> Result<()> {
        self.index
            .reserve(capacity)
            .map_err(|e| CoreError::Init(format!("vector index reserve failed: {}", e)))
    }

    /// Add or replace a vector under a string key
    pub fn add(&mut self, key: &str, vector: &[f32]) -> Result<()> {
        if vector.len() != self.config.dimensions {
            return Err(CoreError::Embedding(format!(
                "dimension mismatch: expected {}, got {}",
                self.config.dimensions,
                vector.len()
            )));
        }

        if let Some(&existing_id) = self.key_to_id.get(key) {
            self.index
                .remove(existing_id)
                .map_err(|e| CoreError::Embedding(format!("index remove failed: {}", e)))?;
            self.reserve(self.index.size() + 1)?;
            self.index
                .add(existing_id, vector)
                .map_err(|e| CoreError::Embedding(format!("index add failed: {}", e)))?;
            return Ok(());
        }

        // usearch requires reserve() before add()
        let capacity = self.index.capacity();
        let size = self.index.size();
        if size >= capacity {
            self.reserve(std::cmp::max(capacity * 2, 16))?;
        }

        let id = self.next_id;
        self.next_id += 1;

        self.index
            .add(id, vector)
            .map_err(|e| CoreError::Embedding(format!("index add failed: {}", e)))?;

        self.key_to_id.insert(key.to_string(), id);
        self.id_to_key.insert(id, key.to_string());
        Ok(())
    }

    /// Remove a vector; returns whether the key existed
    pub fn remove(&mut self, key: &str) -> Result<bool> {
        if let Some(id) = self.key_to_id.remove(key) {
            self.id_to_key.remove(&id);
            self.index
                .remove(id)
                .map_err(|e| CoreError::Embedding(format!("index remove failed: {}", e)))?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Nearest neighbors as (key, cosine_similarity), best first
    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<(String, f32)>> {
        if query.len() != self.config.dimensions {
            return Err(CoreError::Embedding(format!(
                "dimension mismatch: expected {}, got {}",
                self.config.dimensions,
                query.len()
            )));
        }
        if self.is_empty() {
            return Ok(vec![]);
        }

        let results = self
            .index
            .search(query, limit)
            .map_err(|e| CoreError::Embedding(format!("index search failed: {}", e)))?;

        let mut out = Vec::with_capacity(results.keys.len());
        for (key, distance) in results.keys.iter().zip(results.distances.iter()) {
            if let Some(string_key) = self.id_to_key.get(key) {
                out.push((string_key.clone(), 1.0 - distance));
            }
        }
        Ok(out)
    }
}
