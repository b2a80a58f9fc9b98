//! Dispatcher instruments driven by a real rayon pool.

use std::sync::Arc;
use std::time::Duration;

use meter_rs::dispatcher::{
    ACTIVE_THREADS, PARALLELISM, POOL_SIZE, PROCESSED_TASKS, QUEUED_TASK_COUNT,
};
use meter_rs::{
    CollectionContext, DispatcherKind, DispatcherSensor, Meter, MeterBuilder, MonitoredPool,
    DISPATCHER_CATEGORY,
};

fn meter() -> Meter {
    MeterBuilder::new()
        .include(DISPATCHER_CATEGORY, "*")
        .exclude(DISPATCHER_CATEGORY, "internal-*")
        .build()
        .unwrap()
}

fn max_of(meter: &Meter, ctx: &mut CollectionContext, dispatcher: &str, instrument: &str) -> i64 {
    meter
        .collect_all(ctx)
        .find(DISPATCHER_CATEGORY, dispatcher)
        .and_then(|s| s.get(instrument))
        .map(|s| s.max())
        .unwrap()
}

#[test]
fn test_processed_tasks_per_window() {
    let meter = meter();
    let pool = Arc::new(MonitoredPool::new("workers", DispatcherKind::ThreadPoolExecutor, 2).unwrap());
    let recorder = meter
        .register_dispatcher("workers", pool.clone())
        .unwrap()
        .unwrap();
    let names: Vec<&str> = recorder.instrument_names().collect();
    assert_eq!(
        names,
        vec!["core-pool-size", "max-pool-size", "pool-size", "active-threads", "processed-tasks"]
    );

    for _ in 0..100 {
        pool.spawn(|| {
            std::hint::black_box((0..1_000u64).sum::<u64>());
        })
        .unwrap();
    }
    assert!(pool.wait_idle(Duration::from_secs(10)));

    let mut ctx = CollectionContext::new();
    meter.refresh_all();
    let processed = max_of(&meter, &mut ctx, "workers", PROCESSED_TASKS);
    assert!((100..=105).contains(&processed), "processed {}", processed);

    // No new work in the next window
    meter.refresh_all();
    assert_eq!(max_of(&meter, &mut ctx, "workers", PROCESSED_TASKS), 0);

    meter.refresh_all();
    assert_eq!(max_of(&meter, &mut ctx, "workers", POOL_SIZE), 2);
}

#[test]
fn test_fork_join_instruments() {
    let meter = meter();
    let pool = Arc::new(MonitoredPool::new("compute", DispatcherKind::ForkJoin, 3).unwrap());
    let recorder = meter
        .register_dispatcher("compute", pool.clone())
        .unwrap()
        .unwrap();

    assert_eq!(recorder.min_max_counter(PARALLELISM).unwrap().current(), 3);
    assert!(recorder.gauge(PROCESSED_TASKS).is_none());

    meter.refresh_all();
    let mut ctx = CollectionContext::new();
    let batch = meter.collect_all(&mut ctx);
    let snapshot = batch.find(DISPATCHER_CATEGORY, "compute").unwrap();
    assert_eq!(snapshot.get(PARALLELISM).map(|s| s.max()), Some(3));
    assert_eq!(snapshot.get(POOL_SIZE).map(|s| s.max()), Some(3));
    assert_eq!(snapshot.get(ACTIVE_THREADS).map(|s| s.max()), Some(0));
    assert_eq!(snapshot.get(QUEUED_TASK_COUNT).map(|s| s.max()), Some(0));
}

#[test]
fn test_excluded_dispatcher_is_skipped() {
    let meter = meter();
    let pool = Arc::new(MonitoredPool::new("internal-io", DispatcherKind::ForkJoin, 1).unwrap());
    assert!(meter
        .register_dispatcher("internal-io", pool.clone())
        .unwrap()
        .is_none());
    assert!(!meter.unregister_dispatcher("internal-io"));
}

#[test]
fn test_shut_down_dispatcher_stops_refreshing() {
    let meter = meter();
    let pool = Arc::new(MonitoredPool::new("short-lived", DispatcherKind::ForkJoin, 1).unwrap());
    meter.register_dispatcher("short-lived", pool.clone()).unwrap();

    assert_eq!(meter.refresh_all().failed, 0);
    pool.shutdown();

    // Every gauge of the dispatcher now fails without affecting the meter
    let report = meter.refresh_all();
    assert_eq!(report.refreshed, 0);
    assert_eq!(report.failed, 4);
    assert_eq!(meter.metrics().refresh_failures.get(), 4);

    assert!(meter.unregister_dispatcher("short-lived"));
    assert!(meter.find(DISPATCHER_CATEGORY, "short-lived").is_none());
}
