//! Retrieval pipeline benchmarks.
//!
//! Measures the composite-scoring hot path end to end against a seeded
//! store, using the deterministic hashed embedder so runs are comparable.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use tempfile::TempDir;

use elefante_core::{
    AgentEnrichment, CoreConfig, HashedEmbedder, Orchestrator, Source,
};

const DIMS: usize = 256;

fn seeded_core(count: usize) -> (TempDir, Orchestrator, tokio::runtime::Runtime) {
    let dir = TempDir::new().expect("temp dir");
    let config = CoreConfig {
        data_root: Some(dir.path().to_path_buf()),
        enforce_compliance_gate: false,
        ..Default::default()
    };
    let core = Orchestrator::open(config, Arc::new(HashedEmbedder::new(DIMS)))
        .expect("orchestrator");

    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    runtime.block_on(async {
        for i in 0..count {
            core.add_memory(
                &format!(
                    "Memory number {} about {} in the {} subsystem",
                    i,
                    ["docker", "sqlite", "locks", "embeddings", "sessions"][i % 5],
                    ["storage", "retrieval", "graph", "gate"][i % 4],
                ),
                &AgentEnrichment {
                    canonical_key: Some(format!("World-Bench-K{}", i)),
                    ..Default::default()
                },
                Source::Import,
                None,
            )
            .await
            .expect("seed memory");
        }
    });

    (dir, core, runtime)
}

fn bench_search(c: &mut Criterion) {
    let (_dir, core, runtime) = seeded_core(500);

    c.bench_function("search_memories_500", |b| {
        b.iter(|| {
            runtime
                .block_on(core.search_memories(
                    "docker storage subsystem",
                    Some(10),
                    None,
                    None,
                ))
                .expect("search")
        })
    });
}

fn bench_add(c: &mut Criterion) {
    let (_dir, core, runtime) = seeded_core(100);
    let mut i = 0u64;

    c.bench_function("add_memory", |b| {
        b.iter(|| {
            i += 1;
            runtime
                .block_on(core.add_memory(
                    &format!("Freshly benched memory {}", i),
                    &AgentEnrichment {
                        canonical_key: Some(format!("World-Bench-Add{}", i)),
                        ..Default::default()
                    },
                    Source::Import,
                    None,
                ))
                .expect("add")
        })
    });
}

criterion_group!(benches, bench_search, bench_add);
criterion_main!(benches);
