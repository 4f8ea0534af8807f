//! Lock contention and concurrent-writer behavior.

use std::sync::Arc;

use elefante_e2e_tests::harness::TestCore;

use elefante_core::{AgentEnrichment, CoreError, Source};

#[tokio::test]
async fn live_holder_times_out_with_no_half_writes() {
    let t = TestCore::with_config_overrides(|c| {
        c.enforce_compliance_gate = false;
        c.lock_acquire_timeout_ms = 200;
    });

    // Hold the write lock as a live process (ourselves) within the stale window
    std::fs::create_dir_all(t.write_lock_path().parent().unwrap()).unwrap();
    std::fs::write(
        t.write_lock_path(),
        serde_json::json!({
            "holder_pid": std::process::id(),
            "acquired_at": chrono::Utc::now().to_rfc3339(),
            "operation": "long_running_op",
        })
        .to_string(),
    )
    .unwrap();

    let err = t
        .core
        .add_memory("blocked write", &AgentEnrichment::default(), Source::Agent, None)
        .await
        .unwrap_err();
    match err {
        CoreError::WriteLockUnavailable { holder_pid, operation, waited_ms } => {
            assert_eq!(holder_pid, std::process::id());
            assert_eq!(operation, "long_running_op");
            assert!(waited_ms >= 200);
        }
        other => panic!("expected WriteLockUnavailable, got {:?}", other),
    }

    // No partial effects are visible
    let stats = t.core.get_stats().unwrap();
    assert_eq!(stats.vector_count, 0);
    assert_eq!(stats.graph_nodes_by_label["Memory"], 0);
    assert!(stats.health.consistent);

    std::fs::remove_file(t.write_lock_path()).unwrap();
}

#[tokio::test]
async fn concurrent_writes_linearize_under_the_lock() {
    let t = Arc::new(TestCore::with_config_overrides(|c| {
        c.enforce_compliance_gate = false;
    }));

    let mut handles = Vec::new();
    for i in 0..8 {
        let t = Arc::clone(&t);
        handles.push(tokio::spawn(async move {
            t.core
                .add_memory(
                    &format!("concurrently written memory {}", i),
                    &AgentEnrichment {
                        canonical_key: Some(format!("World-Conc-W{}", i)),
                        ..Default::default()
                    },
                    Source::Agent,
                    None,
                )
                .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stats = t.core.get_stats().unwrap();
    assert_eq!(stats.vector_count, 8);
    assert_eq!(stats.graph_nodes_by_label["Memory"], 8);
    assert!(stats.health.consistent);
}

#[tokio::test]
async fn readers_do_not_take_the_write_lock() {
    let t = TestCore::with_config_overrides(|c| {
        c.enforce_compliance_gate = false;
        c.lock_acquire_timeout_ms = 200;
    });
    t.seed(2).await;

    // Hold the lock, then read: searches and stats must still succeed
    std::fs::write(
        t.write_lock_path(),
        serde_json::json!({
            "holder_pid": std::process::id(),
            "acquired_at": chrono::Utc::now().to_rfc3339(),
            "operation": "held_for_reads",
        })
        .to_string(),
    )
    .unwrap();

    let response = t
        .core
        .search_memories("seeded memory", None, None, None)
        .await
        .unwrap();
    assert!(!response.results.is_empty());
    assert!(t.core.get_stats().is_ok());
    assert!(t.core.get_memory(&response.results[0].memory.id).is_ok());

    std::fs::remove_file(t.write_lock_path()).unwrap();
}
