//! Embedding Provider Seam
//!
//! The core treats embedding as a black-box function `text -> float[D]`.
//! Implementations:
//! - [`FastembedProvider`] (feature `embeddings`): local ONNX inference with a
//!   process-global, lazily-loaded model
//! - [`HashedEmbedder`]: deterministic bag-of-tokens projection, used by the
//!   test suites and as a degraded-mode fallback

mod provider;

#[cfg(feature = "embeddings")]
mod local;

pub use provider::{
    cosine_similarity, dot_product, EmbedError, Embedding, EmbeddingProvider, HashedEmbedder,
};

#[cfg(feature = "embeddings")]
#[cfg_attr(docsrs, doc(cfg(feature = "embeddings")))]
pub use local::{FastembedProvider, FASTEMBED_DIMENSIONS};
