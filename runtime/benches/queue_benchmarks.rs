//! Queue Manager Benchmarks
//!
//! - Join: append to a growing waiting list
//! - Join + promote: one full admission cycle
//! - Position: lookup deep in a long waiting list
//!
//! Run with: `cargo bench`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used)] // Benchmarks can use expect for setup

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use turnstile_core::environment::SystemClock;
use turnstile_core::{NoopPublisher, QueueConfig};
use turnstile_runtime::QueueManager;
use turnstile_testing::helpers::{contact, event, participant};

fn manager() -> QueueManager {
    QueueManager::new(
        QueueConfig::default(),
        Arc::new(SystemClock),
        Arc::new(NoopPublisher),
    )
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

fn benchmark_admission(c: &mut Criterion) {
    let mut group = c.benchmark_group("admission");
    group.throughput(Throughput::Elements(1));
    let runtime = runtime();

    group.bench_function("join", |b| {
        let manager = manager();
        let e1 = event("E1");
        let next = AtomicU64::new(0);

        b.to_async(&runtime).iter(|| async {
            let id = format!("p{}", next.fetch_add(1, Ordering::Relaxed));
            black_box(manager.join(&e1, Some(participant(&id)), contact(&id)).await);
        });
    });

    group.bench_function("join_promote_complete", |b| {
        let manager = manager();
        let e1 = event("E1");
        let next = AtomicU64::new(0);

        b.to_async(&runtime).iter(|| async {
            let id = format!("p{}", next.fetch_add(1, Ordering::Relaxed));
            manager.join(&e1, Some(participant(&id)), contact(&id)).await;
            let promoted = manager.promote_next(&e1).await.expect("just joined");
            black_box(manager.complete(&e1, &promoted.participant_id).await);
        });
    });

    group.finish();
}

fn benchmark_position(c: &mut Criterion) {
    let mut group = c.benchmark_group("position");
    let runtime = runtime();

    for depth in [10_usize, 1_000, 10_000] {
        let manager = manager();
        let e1 = event("E1");
        runtime.block_on(async {
            for i in 0..depth {
                let id = format!("p{i}");
                manager.join(&e1, Some(participant(&id)), contact(&id)).await;
            }
        });
        let last = format!("p{}", depth - 1);

        group.bench_with_input(BenchmarkId::from_parameter(depth), &last, |b, last| {
            b.iter(|| black_box(manager.position(&e1, last)));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_admission, benchmark_position);
criterion_main!(benches);
