//! Acceptance scenarios, driven end to end through the orchestrator with
//! literal inputs.

use elefante_e2e_tests::harness::TestCore;
use elefante_e2e_tests::mocks::fixtures;

use elefante_core::{
    AgentEnrichment, CoreError, IngestAction, MemoryStatus, Source,
};

/// Core with the gate disabled, for scenarios that exercise ingestion and
/// retrieval semantics rather than compliance
fn ungated() -> TestCore {
    TestCore::with_config_overrides(|c| c.enforce_compliance_gate = false)
}

// ============================================================================
// 1. REINFORCEMENT
// ============================================================================

#[tokio::test]
async fn scenario_reinforcement() {
    let t = ungated();

    let first = t
        .core
        .add_memory(
            fixtures::ABSOLUTE_PATHS,
            &fixtures::important(9),
            Source::UserInput,
            None,
        )
        .await
        .unwrap();
    assert_eq!(first.action, IngestAction::Add);
    assert_eq!(first.memory.access_count, 1);
    assert_eq!(first.memory.importance, 9);

    let second = t
        .core
        .add_memory(
            fixtures::ABSOLUTE_PATHS,
            &fixtures::important(9),
            Source::UserInput,
            None,
        )
        .await
        .unwrap();
    assert_eq!(second.action, IngestAction::Reinforce);
    assert_eq!(second.id, first.id);
    assert_eq!(second.memory.access_count, 2);
    assert!(second.memory.last_modified > first.memory.last_modified);

    // Still exactly one record
    let stats = t.core.get_stats().unwrap();
    assert_eq!(stats.vector_count, 1);
}

// ============================================================================
// 2. SUPERSEDE
// ============================================================================

#[tokio::test]
async fn scenario_supersede() {
    let t = ungated();
    let key = "Dev-Paths-Absolute";

    let x = t
        .core
        .add_memory(
            fixtures::ABSOLUTE_PATHS_V1,
            &fixtures::keyed(key),
            Source::UserInput,
            None,
        )
        .await
        .unwrap();
    assert_eq!(x.action, IngestAction::Add);

    let y = t
        .core
        .add_memory(
            fixtures::ABSOLUTE_PATHS_V2,
            &fixtures::keyed(key),
            Source::UserInput,
            None,
        )
        .await
        .unwrap();
    assert_eq!(y.action, IngestAction::Supersede);
    assert_ne!(y.id, x.id);
    assert_eq!(y.memory.supersedes_id.as_deref(), Some(x.id.as_str()));
    assert_eq!(y.memory.status, MemoryStatus::Active);

    let old = t.core.get_memory(&x.id).unwrap().unwrap();
    assert_eq!(old.status, MemoryStatus::Superseded);
    assert_eq!(old.superseded_by_id.as_deref(), Some(y.id.as_str()));

    // Exactly one SUPERSEDES edge, new -> old
    let rows = t
        .core
        .query_graph(
            "SELECT COUNT(*) AS n FROM graph_edges
             WHERE edge_type = 'SUPERSEDES' AND src_id = ?1 AND dst_id = ?2",
            &[serde_json::json!(y.id), serde_json::json!(x.id)],
        )
        .unwrap();
    assert_eq!(rows[0]["n"], serde_json::json!(1));
}

// ============================================================================
// 3. CONTRADICT
// ============================================================================

#[tokio::test]
async fn scenario_contradict() {
    let t = ungated();

    let pro = t
        .core
        .add_memory(
            fixtures::RELATIVE_PATHS_PRO,
            &AgentEnrichment::default(),
            Source::UserInput,
            None,
        )
        .await
        .unwrap();
    assert_eq!(pro.action, IngestAction::Add);

    let con = t
        .core
        .add_memory(
            fixtures::RELATIVE_PATHS_CON,
            &AgentEnrichment::default(),
            Source::UserInput,
            None,
        )
        .await
        .unwrap();
    assert_eq!(con.action, IngestAction::Contradict);
    assert_eq!(con.memory.status, MemoryStatus::Contradictory);
    assert!(con.memory.conflict_ids.contains(&pro.id));

    // The first memory stays active and learns about the conflict
    let first = t.core.get_memory(&pro.id).unwrap().unwrap();
    assert_eq!(first.status, MemoryStatus::Active);
    assert!(first.conflict_ids.contains(&con.id));

    // CONTRADICTS edges exist in both directions
    for (src, dst) in [(&con.id, &pro.id), (&pro.id, &con.id)] {
        let rows = t
            .core
            .query_graph(
                "SELECT COUNT(*) AS n FROM graph_edges
                 WHERE edge_type = 'CONTRADICTS' AND src_id = ?1 AND dst_id = ?2",
                &[serde_json::json!(src), serde_json::json!(dst)],
            )
            .unwrap();
        assert_eq!(rows[0]["n"], serde_json::json!(1), "missing edge {} -> {}", src, dst);
    }
}

// ============================================================================
// 4. COMPLIANCE GATE
// ============================================================================

#[tokio::test]
async fn scenario_compliance_gate() {
    let t = TestCore::new_temp();
    let session = Some("fresh-session");

    // Write before any search is rejected
    let err = t
        .core
        .add_memory("premature knowledge", &AgentEnrichment::default(), Source::Agent, session)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ComplianceGateClosed(_)));

    // A search opens the gate for exactly one write
    t.core
        .search_memories("anything", None, None, session)
        .await
        .unwrap();
    let outcome = t
        .core
        .add_memory("now-compliant knowledge", &AgentEnrichment::default(), Source::Agent, session)
        .await
        .unwrap();
    assert_eq!(outcome.action, IngestAction::Add);

    // The token was consumed; a second write needs its own search
    let err = t
        .core
        .add_memory("greedy second write", &AgentEnrichment::default(), Source::Agent, session)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ComplianceGateClosed(_)));
}

// ============================================================================
// 5. RETRIEVAL WITH EXPLANATION
// ============================================================================

#[tokio::test]
async fn scenario_retrieval_with_explanation() {
    let t = ungated();

    let m1 = t
        .core
        .add_memory(fixtures::DASHBOARD_PORT, &AgentEnrichment::default(), Source::Agent, None)
        .await
        .unwrap();
    t.core
        .add_memory(fixtures::MCP_STDIO, &AgentEnrichment::default(), Source::Agent, None)
        .await
        .unwrap();

    let response = t
        .core
        .search_memories("where does the dashboard run?", None, None, None)
        .await
        .unwrap();

    assert_eq!(response.constellation.primary.as_deref(), Some(m1.id.as_str()));
    let top = &response.results[0];
    assert_eq!(top.memory.id, m1.id);
    assert!(top.score > response.results[1].score);

    // Shared concept 'dashboard' registers, similarity out-contributes it,
    // and the recency signal is live
    assert!(top.explanation["concept"].score > 0.0);
    assert!(top.explanation["vec"].contribution > top.explanation["concept"].contribution);
    let s_time = top.explanation["time"].score;
    assert!(s_time > 0.0 && s_time <= 1.0);
}

// ============================================================================
// 6. LOCK RECLAMATION
// ============================================================================

#[cfg(unix)]
#[tokio::test]
async fn scenario_stale_lock_reclaimed() {
    let t = ungated();

    // A reaped child gives a guaranteed-dead PID
    let mut child = std::process::Command::new("true").spawn().unwrap();
    let dead_pid = child.id();
    child.wait().unwrap();

    std::fs::create_dir_all(t.write_lock_path().parent().unwrap()).unwrap();
    std::fs::write(
        t.write_lock_path(),
        serde_json::json!({
            "holder_pid": dead_pid,
            "acquired_at": chrono::Utc::now().to_rfc3339(),
            "operation": "crashed_add",
        })
        .to_string(),
    )
    .unwrap();

    // The stale lock is reclaimed silently and the write succeeds
    let outcome = t
        .core
        .add_memory("written past a dead holder", &AgentEnrichment::default(), Source::Agent, None)
        .await
        .unwrap();
    assert_eq!(outcome.action, IngestAction::Add);
    assert!(t.core.get_memory(&outcome.id).unwrap().is_some());
}
