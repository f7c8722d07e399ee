//! Memory budget enforcement tests

mod test_data_gen;

use quiver_compute::{AggregateFunc, AggregateSpec};
use quiver_core::budget::{BudgetGuard, MemoryBudget};
use quiver_core::config::EngineConfig;
use quiver_core::Error;
use quiver_exec::{Declaration, ExecContext, ExecPlan, ScanNodeOptions, SinkNodeOptions, VecSource};
use quiver_mem::MemoryPool;
use std::sync::Arc;
use std::thread;

#[test]
fn test_budget_acquire_release() {
    let budget = MemoryPool::new(1024 * 1024); // 1MB
    assert_eq!(budget.used_bytes(), 0);

    let guard = budget
        .try_acquire(100 * 1024, "test")
        .expect("Acquire failed");
    assert_eq!(budget.used_bytes(), 100 * 1024);
    assert_eq!(guard.bytes(), 100 * 1024);
    assert_eq!(guard.tag(), "test");

    drop(guard);
    assert_eq!(budget.used_bytes(), 0);
}

#[test]
fn test_budget_exhaustion() {
    let budget = MemoryPool::new(500 * 1024);

    let guard1 = budget
        .try_acquire(400 * 1024, "test")
        .expect("First acquire failed");

    // 400KB + 200KB would exceed the 500KB cap
    assert!(budget.try_acquire(200 * 1024, "test").is_none());
    assert!(budget.acquire(200 * 1024, "test").is_err());
    assert_eq!(budget.used_bytes(), 400 * 1024);

    drop(guard1);
    let guard2 = budget
        .try_acquire(200 * 1024, "test")
        .expect("Acquire after release failed");
    assert_eq!(budget.used_bytes(), 200 * 1024);
    assert_eq!(budget.peak_bytes(), 400 * 1024);
    drop(guard2);
}

#[test]
fn test_concurrent_guards_never_exceed_capacity() {
    let budget = Arc::new(MemoryPool::new(64 * 1024));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let budget = Arc::clone(&budget);
            thread::spawn(move || {
                for _ in 0..200 {
                    if let Some(mut guard) = budget.try_acquire(4 * 1024, "worker") {
                        assert!(budget.used_bytes() <= budget.capacity_bytes());
                        guard.try_resize(8 * 1024);
                        assert!(budget.used_bytes() <= budget.capacity_bytes());
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("Worker panicked");
    }
    assert_eq!(budget.used_bytes(), 0);
    assert!(budget.peak_bytes() <= 64 * 1024);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_aggregate_over_budget_fails_the_plan() {
    let config = EngineConfig {
        mem_cap_bytes: 4 * 1024,
        ..EngineConfig::default()
    };
    let ctx = ExecContext::current_with(&config).expect("No runtime");
    let mut plan = ExecPlan::new(ctx);

    let batch = test_data_gen::generate_grouped_batch(5000, 2500);
    let schema = Arc::clone(batch.schema());
    let sink = SinkNodeOptions::new();
    let mut reader = sink.reader();
    Declaration::sequence([
        Declaration::scan(ScanNodeOptions::new(schema, vec![Box::new(VecSource::new(vec![batch]))])),
        Declaration::aggregate(
            vec!["group".to_string()],
            vec![AggregateSpec::new(AggregateFunc::Sum, "value", "total")],
        ),
        Declaration::sink(sink),
    ])
    .expect("Sequence failed")
    .add_to_plan(&mut plan)
    .expect("Add failed");

    plan.validate().expect("Validate failed");
    plan.start_producing().expect("Start failed");

    let err = plan.finished().await.expect_err("Plan should fail");
    assert!(matches!(err.as_core(), Some(Error::ResourceExhausted(_))), "{err}");
    assert!(err.to_string().contains("aggregate#1"), "{err}");

    let delivered = reader.next().await.expect("Error is delivered");
    assert!(delivered.is_err());
    assert!(reader.next().await.is_none());
}
