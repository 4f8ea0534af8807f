//! Provider trait, vector math, and the deterministic hashed embedder.

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

// ============================================================================
// ERROR TYPE
// ============================================================================

/// Embedding error types
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbedError {
    /// Failed to initialize the model
    #[error("model initialization failed: {0}")]
    ModelInit(String),
    /// Failed to generate an embedding
    #[error("embedding generation failed: {0}")]
    Failed(String),
    /// Empty or otherwise unusable input
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

// ============================================================================
// EMBEDDING TYPE
// ============================================================================

/// A dense embedding vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    /// The embedding vector
    pub vector: Vec<f32>,
    /// Dimensions of the vector
    pub dimensions: usize,
}

impl Embedding {
    /// Create a new embedding from a vector
    pub fn new(vector: Vec<f32>) -> Self {
        let dimensions = vector.len();
        Self { vector, dimensions }
    }

    /// Cosine similarity with another embedding; 0.0 on dimension mismatch
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        if self.dimensions != other.dimensions {
            return 0.0;
        }
        cosine_similarity(&self.vector, &other.vector)
    }

    /// Normalize to unit length in place
    pub fn normalize(&mut self) {
        let norm = self.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut self.vector {
                *x /= norm;
            }
        }
    }

    /// Serialize to little-endian f32 bytes for blob storage
    pub fn to_bytes(&self) -> Vec<u8> {
        self.vector.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize from little-endian f32 bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() % 4 != 0 {
            return None;
        }
        let vector: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Some(Self::new(vector))
    }
}

// ============================================================================
// VECTOR MATH
// ============================================================================

/// Cosine similarity of two vectors; 0.0 when either norm is zero
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Dot product of two equal-length vectors
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

// ============================================================================
// PROVIDER TRAIT
// ============================================================================

/// Black-box embedding function. Deterministic for a fixed model.
///
/// Implementations may block; the orchestrator offloads calls to a worker
/// thread and awaits the result.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text into a dense vector of [`Self::dimensions`] length
    fn embed(&self, text: &str) -> Result<Embedding, EmbedError>;

    /// Fixed output dimension of this provider
    fn dimensions(&self) -> usize;

    /// Human-readable model identifier
    fn model_name(&self) -> &str;
}

// ============================================================================
// HASHED EMBEDDER (deterministic, offline)
// ============================================================================

/// Deterministic bag-of-tokens embedder.
///
/// Each whitespace token is hashed into a handful of dimensions with
/// alternating sign; the result is unit-normalized. Texts sharing tokens get
/// proportionally similar vectors, which is enough for reproducible ranking
/// tests without model downloads.
pub struct HashedEmbedder {
    dimensions: usize,
}

impl HashedEmbedder {
    /// Create an embedder with the given output dimension
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for HashedEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EmbeddingProvider for HashedEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding, EmbedError> {
        if text.trim().is_empty() {
            return Err(EmbedError::InvalidInput("empty text".to_string()));
        }

        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let h = xxh3_64(token.as_bytes());
            // Spread each token over 4 buckets derived from its hash
            for i in 0..4u64 {
                let bucket = ((h.rotate_left((i * 16) as u32)) as usize) % self.dimensions;
                let sign = if (h >> i) & 1 == 0 { 1.0 } else { -1.0 };
                vector[bucket] += sign;
            }
        }

        let mut embedding = Embedding::new(vector);
        embedding.normalize();
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "hashed-bag-of-tokens"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identity() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_embedding_bytes_roundtrip() {
        let e = Embedding::new(vec![0.5, -1.25, 3.0]);
        let back = Embedding::from_bytes(&e.to_bytes()).unwrap();
        assert_eq!(back.vector, e.vector);
        assert_eq!(back.dimensions, 3);
    }

    #[test]
    fn test_hashed_embedder_deterministic() {
        let embedder = HashedEmbedder::new(64);
        let a = embedder.embed("docker container port").unwrap();
        let b = embedder.embed("docker container port").unwrap();
        assert_eq!(a.vector, b.vector);
    }

    #[test]
    fn test_hashed_embedder_similarity_ordering() {
        let embedder = HashedEmbedder::new(256);
        let base = embedder.embed("the dashboard runs on port 8000").unwrap();
        let near = embedder.embed("where does the dashboard run").unwrap();
        let far = embedder.embed("quarterly financial projections for turnips").unwrap();

        let near_sim = base.cosine_similarity(&near);
        let far_sim = base.cosine_similarity(&far);
        assert!(near_sim > far_sim);
    }

    #[test]
    fn test_hashed_embedder_rejects_empty() {
        let embedder = HashedEmbedder::default();
        assert!(embedder.embed("   ").is_err());
    }

    #[test]
    fn test_hashed_embedder_unit_norm() {
        let embedder = HashedEmbedder::new(128);
        let e = embedder.embed("unit norm check").unwrap();
        let norm: f32 = e.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }
}
