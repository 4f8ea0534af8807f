//! Quantified invariants, idempotence laws, and boundary behaviors.

use elefante_e2e_tests::harness::TestCore;
use elefante_e2e_tests::mocks::fixtures;

use elefante_core::{AgentEnrichment, CoreError, MemoryStatus, Namespace, Source};

fn ungated() -> TestCore {
    TestCore::with_config_overrides(|c| c.enforce_compliance_gate = false)
}

/// Count active graph Memory nodes for one canonical identity
fn active_count(t: &TestCore, namespace: &str, canonical_key: &str) -> i64 {
    let rows = t
        .core
        .query_graph(
            "SELECT COUNT(*) AS n FROM graph_nodes
             WHERE label = 'Memory'
               AND json_extract(props, '$.namespace') = ?1
               AND json_extract(props, '$.canonical_key') = ?2
               AND json_extract(props, '$.status') = 'active'",
            &[serde_json::json!(namespace), serde_json::json!(canonical_key)],
        )
        .unwrap();
    rows[0]["n"].as_i64().unwrap()
}

// ============================================================================
// QUANTIFIED INVARIANTS
// ============================================================================

#[tokio::test]
async fn invariant_canonical_uniqueness_across_sequences() {
    let t = ungated();
    let key = "World-Seq-Target";

    // A mixed sequence: add, duplicate, rewording, duplicate of the rewording
    let contents = [
        "The deploy target is the staging cluster.",
        "The deploy target is the staging cluster.",
        "The deploy target moved to the blue cluster.",
        "The deploy target moved to the blue cluster.",
    ];
    for content in contents {
        t.core
            .add_memory(content, &fixtures::keyed(key), Source::Agent, None)
            .await
            .unwrap();
    }

    assert_eq!(active_count(&t, "prod", key), 1);
}

#[tokio::test]
async fn invariant_version_chain_consistency() {
    let t = ungated();
    let key = "World-Chain-Link";

    let a = t
        .core
        .add_memory("version one of the rule", &fixtures::keyed(key), Source::Agent, None)
        .await
        .unwrap();
    let b = t
        .core
        .add_memory("version two of the rule", &fixtures::keyed(key), Source::Agent, None)
        .await
        .unwrap();
    let c = t
        .core
        .add_memory("version three of the rule", &fixtures::keyed(key), Source::Agent, None)
        .await
        .unwrap();

    // Pairwise: superseded_by on one side iff supersedes on the other iff
    // exactly one SUPERSEDES edge between them
    for (old, new) in [(&a, &b), (&b, &c)] {
        let old_rec = t.core.get_memory(&old.id).unwrap().unwrap();
        let new_rec = t.core.get_memory(&new.id).unwrap().unwrap();
        assert_eq!(old_rec.superseded_by_id.as_deref(), Some(new.id.as_str()));
        assert_eq!(new_rec.supersedes_id.as_deref(), Some(old.id.as_str()));

        let rows = t
            .core
            .query_graph(
                "SELECT COUNT(*) AS n FROM graph_edges
                 WHERE edge_type = 'SUPERSEDES' AND src_id = ?1 AND dst_id = ?2",
                &[serde_json::json!(new.id), serde_json::json!(old.id)],
            )
            .unwrap();
        assert_eq!(rows[0]["n"], serde_json::json!(1));
    }
}

#[tokio::test]
async fn invariant_dual_store_consistency_after_operations() {
    let t = ungated();

    let ids = t.seed(4).await;
    assert!(t.core.get_stats().unwrap().health.consistent);

    t.core.delete_memory(&ids[0], None).await.unwrap();
    let stats = t.core.get_stats().unwrap();
    assert!(stats.health.consistent);
    assert_eq!(stats.vector_count, 3);
    assert_eq!(stats.graph_nodes_by_label["Memory"], 3);
}

#[tokio::test]
async fn invariant_access_count_monotone() {
    let t = ungated();
    let outcome = t
        .core
        .add_memory(
            "memory under repeated retrieval",
            &AgentEnrichment::default(),
            Source::Agent,
            None,
        )
        .await
        .unwrap();

    let mut last = outcome.memory.access_count;
    for _ in 0..4 {
        t.core
            .search_memories("repeated retrieval", None, None, None)
            .await
            .unwrap();
        let current = t.core.get_memory(&outcome.id).unwrap().unwrap().access_count;
        assert!(current >= last);
        last = current;
    }
    assert!(last > outcome.memory.access_count);
}

#[tokio::test]
async fn invariant_default_search_is_prod_only() {
    let t = ungated();

    t.core
        .add_memory(
            "test-suite knowledge about widgets",
            &AgentEnrichment::default(),
            Source::TestSuite,
            None,
        )
        .await
        .unwrap();
    t.core
        .add_memory(
            "production knowledge about widgets",
            &AgentEnrichment::default(),
            Source::UserInput,
            None,
        )
        .await
        .unwrap();

    let response = t
        .core
        .search_memories("knowledge about widgets", None, None, None)
        .await
        .unwrap();
    assert!(!response.results.is_empty());
    assert!(response
        .results
        .iter()
        .all(|r| r.memory.namespace == Namespace::Prod));

    // Crossing namespaces requires explicit opt-in
    let response = t
        .core
        .search_memories(
            "knowledge about widgets",
            None,
            Some(serde_json::json!({"namespaces": ["test"]})),
            None,
        )
        .await
        .unwrap();
    assert!(response
        .results
        .iter()
        .all(|r| r.memory.namespace == Namespace::Test));
}

#[tokio::test]
async fn invariant_results_bounded_by_k() {
    let t = ungated();
    t.seed(10).await;

    for k in [1usize, 3, 7, 50] {
        let response = t
            .core
            .search_memories("seeded memory subsystem", Some(k), None, None)
            .await
            .unwrap();
        assert!(response.results.len() <= k);
    }
}

// ============================================================================
// IDEMPOTENCE LAWS
// ============================================================================

#[tokio::test]
async fn law_same_content_same_id() {
    let t = ungated();
    let first = t
        .core
        .add_memory(fixtures::ABSOLUTE_PATHS, &AgentEnrichment::default(), Source::Agent, None)
        .await
        .unwrap();
    let second = t
        .core
        .add_memory(fixtures::ABSOLUTE_PATHS, &AgentEnrichment::default(), Source::Agent, None)
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.memory.access_count, first.memory.access_count + 1);
}

#[tokio::test]
async fn law_dry_run_consolidate_is_noop() {
    let t = ungated();
    t.seed(5).await;

    let before = t.core.get_stats().unwrap();
    let report = t.core.consolidate(true, false).await.unwrap();
    assert!(report.dry_run);
    let after = t.core.get_stats().unwrap();

    assert_eq!(before.vector_count, after.vector_count);
    assert_eq!(before.graph_edge_count, after.graph_edge_count);
    assert_eq!(before.namespaces, after.namespaces);
}

#[tokio::test]
async fn law_second_forced_consolidate_is_empty() {
    let t = ungated();
    t.seed(3).await;

    t.core.consolidate(true, true).await.unwrap();
    let second = t.core.consolidate(true, true).await.unwrap();
    assert!(second.is_empty());
}

// ============================================================================
// BOUNDARY BEHAVIORS
// ============================================================================

#[tokio::test]
async fn boundary_zero_matches_yield_synthesis() {
    let t = ungated();
    let response = t
        .core
        .search_memories("query against an empty store", None, None, None)
        .await
        .unwrap();
    assert!(response.results.is_empty());
    assert!(response.constellation.primary.is_none());
    assert!(response.constellation.supporting.is_empty());
    assert!(!response.synthesis.is_empty());
}

#[tokio::test]
async fn boundary_empty_query_rejected() {
    let t = ungated();
    let err = t.core.search_memories("   \n ", None, None, None).await.unwrap_err();
    assert!(matches!(err, CoreError::QueryRequired));
}

#[tokio::test]
async fn boundary_ephemeral_requires_expiry() {
    let t = ungated();
    let enrichment = AgentEnrichment {
        ephemeral: true,
        ..Default::default()
    };
    let err = t
        .core
        .add_memory("diagnostic scratch", &enrichment, Source::Agent, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ExpiresAtRequired(_)));
}

#[tokio::test]
async fn boundary_statuses_survive_conflict_resolution() {
    let t = ungated();

    let pro = t
        .core
        .add_memory(fixtures::RELATIVE_PATHS_PRO, &AgentEnrichment::default(), Source::Agent, None)
        .await
        .unwrap();
    let con = t
        .core
        .add_memory(fixtures::RELATIVE_PATHS_CON, &AgentEnrichment::default(), Source::Agent, None)
        .await
        .unwrap();
    assert_eq!(con.memory.status, MemoryStatus::Contradictory);

    let resolution = t
        .core
        .resolve_conflict(&con.id, &pro.id, elefante_core::ConflictPolicy::Manual, None)
        .await
        .unwrap();
    assert_eq!(resolution.winner_id, con.id);

    let winner = t.core.get_memory(&con.id).unwrap().unwrap();
    let loser = t.core.get_memory(&pro.id).unwrap().unwrap();
    assert_eq!(winner.status, MemoryStatus::Active);
    assert_eq!(loser.status, MemoryStatus::Superseded);
    assert_eq!(loser.superseded_by_id.as_deref(), Some(con.id.as_str()));
}
