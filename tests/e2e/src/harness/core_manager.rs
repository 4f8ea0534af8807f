//! Test Core Manager
//!
//! Provides isolated orchestrator instances for testing:
//! - Temporary data roots that are cleaned up automatically
//! - Deterministic hashed embeddings (no model downloads)
//! - Helpers for gate handling and seeding

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use elefante_core::{
    AddOutcome, AgentEnrichment, CoreConfig, HashedEmbedder, Orchestrator, Result, SearchResponse,
    Source,
};

/// Embedding dimension used across the e2e suites
pub const TEST_DIMS: usize = 128;

/// An isolated orchestrator over a temporary data root.
///
/// The data root is deleted when the manager drops.
pub struct TestCore {
    /// The orchestrator under test
    pub core: Orchestrator,
    /// Kept alive so the temp dir survives until drop
    _temp_dir: Option<TempDir>,
    data_root: PathBuf,
}

impl TestCore {
    /// Create a core over a fresh temporary data root
    pub fn new_temp() -> Self {
        Self::with_config_overrides(|_| {})
    }

    /// Create a core, letting the caller tweak the config first
    pub fn with_config_overrides(tweak: impl FnOnce(&mut CoreConfig)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let data_root = temp_dir.path().to_path_buf();

        let mut config = CoreConfig {
            data_root: Some(data_root.clone()),
            ..Default::default()
        };
        tweak(&mut config);

        let core = Orchestrator::open(config, Arc::new(HashedEmbedder::new(TEST_DIMS)))
            .expect("Failed to open test core");

        Self {
            core,
            _temp_dir: Some(temp_dir),
            data_root,
        }
    }

    /// Data root path
    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Path of the write lock file
    pub fn write_lock_path(&self) -> PathBuf {
        self.data_root.join("locks").join("write.lock")
    }

    /// Open the compliance gate for one write in `session`
    pub async fn open_gate(&self, session: Option<&str>) -> SearchResponse {
        self.core
            .search_memories("gate warmup", None, None, session)
            .await
            .expect("gate-opening search failed")
    }

    /// Search + add in one step (the usual compliant flow)
    pub async fn add(&self, content: &str, session: Option<&str>) -> Result<AddOutcome> {
        self.open_gate(session).await;
        self.core
            .add_memory(content, &AgentEnrichment::default(), Source::UserInput, session)
            .await
    }

    /// Search + add with explicit enrichment and source
    pub async fn add_enriched(
        &self,
        content: &str,
        enrichment: &AgentEnrichment,
        source: Source,
        session: Option<&str>,
    ) -> Result<AddOutcome> {
        self.open_gate(session).await;
        self.core.add_memory(content, enrichment, source, session).await
    }

    /// Seed several distinct memories
    pub async fn seed(&self, count: usize) -> Vec<String> {
        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            let outcome = self
                .add_enriched(
                    &format!("Seeded memory number {} about subsystem {}", i, i % 3),
                    &AgentEnrichment {
                        canonical_key: Some(format!("World-Seed-K{}", i)),
                        ..Default::default()
                    },
                    Source::Import,
                    None,
                )
                .await
                .expect("seeding failed");
            ids.push(outcome.id);
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_temp_core_creation() {
        let t = TestCore::new_temp();
        let stats = t.core.get_stats().unwrap();
        assert_eq!(stats.vector_count, 0);
        assert!(t.data_root().exists());
    }

    #[tokio::test]
    async fn test_seed() {
        let t = TestCore::new_temp();
        let ids = t.seed(5).await;
        assert_eq!(ids.len(), 5);
        assert_eq!(t.core.get_stats().unwrap().vector_count, 5);
    }
}
