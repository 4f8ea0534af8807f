//! Deterministic housekeeping over the dual store.
//!
//! Two passes, both idempotent:
//! 1. For each `(namespace, canonical_key)` group with more than one active
//!    memory, keep the best (highest importance, then most recent) and
//!    collapse the rest: exact content duplicates reinforce the survivor and
//!    demote to `redundant`; a changed-content loser is linked into the
//!    version chain when the survivor has no predecessor yet, otherwise it
//!    also demotes to `redundant` (the chain allows one outgoing SUPERSEDES).
//! 2. Expiry sweep: memories past `expires_at` are archived.
//!
//! Never runs implicitly; dry runs touch nothing.

use std::collections::BTreeMap;

use chrono::Utc;

use super::types::{ConsolidationReport, DuplicateGroup};
use super::{memory_node_props, Orchestrator};
use crate::error::Result;
use crate::graph::{EdgeType, NodeLabel};
use crate::memory::{MemoryRecord, MemoryStatus, Namespace};
use crate::refinery::recompute_authority;
use crate::vector::MemoryFilter;

impl Orchestrator {
    /// Run consolidation. `dry_run` (the default posture) only reports;
    /// `force` applies even when `dry_run` is set.
    pub async fn consolidate(&self, dry_run: bool, force: bool) -> Result<ConsolidationReport> {
        let apply = force || !dry_run;
        let started_at = Utc::now();
        let timer = std::time::Instant::now();

        let _lock = if apply {
            Some(self.locks().acquire("consolidate").await?)
        } else {
            None
        };

        let all_namespaces = vec![Namespace::Prod, Namespace::Test, Namespace::Ephemeral];
        let active_filter = MemoryFilter {
            namespaces: all_namespaces.clone(),
            statuses: vec![MemoryStatus::Active],
            ..Default::default()
        };
        let actives = self.vector().scan(&active_filter)?;

        // Group actives by canonical identity
        let mut groups: BTreeMap<(String, String), Vec<MemoryRecord>> = BTreeMap::new();
        for record in actives {
            groups
                .entry((record.namespace.as_str().to_string(), record.canonical_key.clone()))
                .or_default()
                .push(record);
        }

        let mut report_groups = Vec::new();
        for ((namespace, canonical_key), mut members) in groups {
            if members.len() < 2 {
                continue;
            }
            // Best active: highest importance, then most recent modification
            members.sort_by(|a, b| {
                b.importance
                    .cmp(&a.importance)
                    .then(b.last_modified.cmp(&a.last_modified))
            });
            let mut survivor = members.remove(0);
            let mut group = DuplicateGroup {
                namespace,
                canonical_key,
                survivor_id: survivor.id.clone(),
                demoted_redundant: Vec::new(),
                linked_superseded: Vec::new(),
            };

            let mut chain_free = survivor.supersedes_id.is_none();
            for mut loser in members {
                if loser.content_hash == survivor.content_hash {
                    group.demoted_redundant.push(loser.id.clone());
                    if apply {
                        survivor.access_count += loser.access_count;
                        loser.status = MemoryStatus::Redundant;
                        self.demote(&mut loser)?;
                    }
                } else if chain_free {
                    chain_free = false;
                    group.linked_superseded.push(loser.id.clone());
                    if apply {
                        loser.status = MemoryStatus::Superseded;
                        loser.superseded_by_id = Some(survivor.id.clone());
                        survivor.supersedes_id = Some(loser.id.clone());
                        self.demote(&mut loser)?;
                        self.graph().upsert_edge(
                            &survivor.id,
                            &loser.id,
                            EdgeType::Supersedes,
                            &serde_json::json!({}),
                        )?;
                    }
                } else {
                    group.demoted_redundant.push(loser.id.clone());
                    if apply {
                        loser.status = MemoryStatus::Redundant;
                        self.demote(&mut loser)?;
                    }
                }
            }

            if apply {
                let now = Utc::now();
                survivor.last_modified = now;
                survivor.authority_score = recompute_authority(&survivor, now);
                self.vector().update_record(&survivor)?;
                self.graph()
                    .upsert_node(NodeLabel::Memory, &survivor.id, &memory_node_props(&survivor))?;
            }
            report_groups.push(group);
        }

        // Expiry sweep over everything not already archived
        let sweep_filter = MemoryFilter {
            namespaces: all_namespaces,
            statuses: vec![
                MemoryStatus::Active,
                MemoryStatus::Superseded,
                MemoryStatus::Redundant,
                MemoryStatus::Contradictory,
            ],
            ..Default::default()
        };
        let now = Utc::now();
        let mut expired_archived = Vec::new();
        for mut record in self.vector().scan(&sweep_filter)? {
            if record.is_expired_at(now) {
                expired_archived.push(record.id.clone());
                if apply {
                    record.status = MemoryStatus::Archived;
                    self.demote(&mut record)?;
                }
            }
        }

        let report = ConsolidationReport {
            dry_run: !apply,
            groups: report_groups,
            expired_archived,
            started_at,
            duration_ms: timer.elapsed().as_millis() as u64,
        };

        if apply {
            self.oplog().record(
                "consolidate",
                serde_json::json!({
                    "groups": report.groups.len(),
                    "expired": report.expired_archived.len(),
                }),
            );
        }
        Ok(report)
    }

    /// Persist a status demotion to both stores
    fn demote(&self, record: &mut MemoryRecord) -> Result<()> {
        record.last_modified = Utc::now();
        self.vector().update_record(record)?;
        self.graph()
            .upsert_node(NodeLabel::Memory, &record.id, &memory_node_props(record))?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::embed::{EmbeddingProvider, HashedEmbedder};
    use crate::memory::{AgentEnrichment, Source};
    use crate::refinery::Refinery;
    use std::sync::Arc;
    use tempfile::TempDir;

    const DIMS: usize = 128;

    fn open_core() -> (TempDir, Orchestrator) {
        let dir = TempDir::new().unwrap();
        let config = CoreConfig {
            data_root: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let core = Orchestrator::open(config, Arc::new(HashedEmbedder::new(DIMS))).unwrap();
        (dir, core)
    }

    /// Plant a record directly, bypassing the refinery's uniqueness flow, so
    /// consolidation has violations to repair
    fn plant(core: &Orchestrator, content: &str, canonical_key: &str, importance: u8) -> String {
        let refinery = Refinery::new(CoreConfig::default());
        let mut record = refinery
            .refine(content, &AgentEnrichment::default(), Source::Agent)
            .unwrap()
            .into_record(None, Utc::now());
        record.canonical_key = canonical_key.to_string();
        record.importance = importance;
        let embedding = HashedEmbedder::new(DIMS).embed(content).unwrap();
        let id = record.id.clone();
        core.vector().upsert(&record, &embedding).unwrap();
        core.graph()
            .upsert_node(NodeLabel::Memory, &id, &memory_node_props(&record))
            .unwrap();
        id
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let (_dir, core) = open_core();
        plant(&core, "duplicate group member one", "World-Fact-Dup", 5);
        plant(&core, "duplicate group member two", "World-Fact-Dup", 7);

        let report = core.consolidate(true, false).await.unwrap();
        assert!(report.dry_run);
        assert_eq!(report.groups.len(), 1);

        // Both still active
        let filter = MemoryFilter {
            statuses: vec![MemoryStatus::Active],
            canonical_key: Some("World-Fact-Dup".to_string()),
            ..Default::default()
        };
        assert_eq!(core.vector().scan(&filter).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_force_collapses_duplicates() {
        let (_dir, core) = open_core();
        let low = plant(&core, "same concept, older phrasing", "World-Fact-Dup", 4);
        let high = plant(&core, "same concept, better phrasing", "World-Fact-Dup", 8);

        let report = core.consolidate(true, true).await.unwrap();
        assert!(!report.dry_run);
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].survivor_id, high);

        let survivor = core.get_memory(&high).unwrap().unwrap();
        assert_eq!(survivor.status, MemoryStatus::Active);
        let loser = core.get_memory(&low).unwrap().unwrap();
        assert_eq!(loser.status, MemoryStatus::Superseded);
        assert_eq!(loser.superseded_by_id.as_deref(), Some(high.as_str()));
    }

    #[tokio::test]
    async fn test_exact_duplicates_reinforce_survivor() {
        let (_dir, core) = open_core();
        let a = plant(&core, "verbatim duplicated content", "World-Fact-Same", 5);
        let b = plant(&core, "verbatim duplicated content", "World-Fact-Same", 5);

        core.consolidate(true, true).await.unwrap();

        let (survivor_id, loser_id) = {
            let a_rec = core.get_memory(&a).unwrap().unwrap();
            if a_rec.status == MemoryStatus::Active { (a, b) } else { (b, a) }
        };
        let survivor = core.get_memory(&survivor_id).unwrap().unwrap();
        let loser = core.get_memory(&loser_id).unwrap().unwrap();
        assert_eq!(survivor.access_count, 2);
        assert_eq!(loser.status, MemoryStatus::Redundant);
    }

    #[tokio::test]
    async fn test_second_force_run_is_empty() {
        let (_dir, core) = open_core();
        plant(&core, "first of pair", "World-Fact-Twice", 5);
        plant(&core, "second of pair", "World-Fact-Twice", 6);

        let first = core.consolidate(true, true).await.unwrap();
        assert!(!first.is_empty());

        let second = core.consolidate(true, true).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_expiry_sweep_archives() {
        let (_dir, core) = open_core();
        let id = plant(&core, "short-lived diagnostic note", "World-Fact-Ttl", 3);
        let mut record = core.get_memory(&id).unwrap().unwrap();
        record.expires_at = Some(Utc::now() - chrono::Duration::minutes(1));
        core.vector().update_record(&record).unwrap();

        let report = core.consolidate(true, true).await.unwrap();
        assert_eq!(report.expired_archived, vec![id.clone()]);
        let archived = core.get_memory(&id).unwrap().unwrap();
        assert_eq!(archived.status, MemoryStatus::Archived);
    }
}
