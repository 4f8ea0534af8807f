//! Vector Store
//!
//! Persistent mapping from memory id to (content, embedding, metadata) with
//! cosine nearest-neighbor search and metadata filtering. SQLite rows are the
//! durable truth; an HNSW index (feature `vector-search`) is rebuilt from
//! them on open and kept in sync on every mutation.

mod filter;
mod store;

#[cfg(feature = "vector-search")]
mod index;

pub use filter::MemoryFilter;
pub use store::VectorStore;

#[cfg(feature = "vector-search")]
pub use index::{VectorIndex, VectorIndexConfig};
