//! Monitor two rayon dispatchers and print every collection batch.
//!
//! Run with:
//!
//! ```text
//! cargo run --example dispatcher_monitor -- --meter-tick-interval 1s --tasks 2000
//! RUST_LOG=meter_rs=debug cargo run --example dispatcher_monitor
//! ```

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use meter_rs::{
    CollectionBatch, DispatcherKind, DispatcherSensor, InstrumentSummary, MeterArgs,
    MeterBuilder, MonitoredPool, DISPATCHER_CATEGORY,
};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Print dispatcher metrics while a synthetic workload runs")]
struct Args {
    #[command(flatten)]
    meter: MeterArgs,

    /// Optional meter config file (TOML, YAML or JSON)
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Tasks submitted to each dispatcher
    #[arg(long, default_value_t = 500)]
    tasks: usize,

    /// Worker threads per dispatcher
    #[arg(long, default_value_t = 4)]
    threads: usize,

    /// Collection batches to print before exiting
    #[arg(long, default_value_t = 3)]
    batches: usize,
}

fn print_batch(batch: &CollectionBatch) {
    println!("--- cycle {} ({} entities)", batch.cycle, batch.snapshots.len());
    for snapshot in &batch.snapshots {
        println!("{}", snapshot.key());
        for (name, summary) in snapshot.iter() {
            match summary {
                InstrumentSummary::Gauge(g) => println!(
                    "  {:<18} min={:<6} max={:<6} samples={}",
                    name, g.min, g.max, g.count
                ),
                InstrumentSummary::MinMaxCounter(c) => println!(
                    "  {:<18} min={:<6} max={:<6} current={}",
                    name, c.min, c.max, c.current
                ),
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()?;

    let mut builder = MeterBuilder::new()
        .tick_interval(Duration::from_secs(1))
        .include(DISPATCHER_CATEGORY, "*")
        .exclude(DISPATCHER_CATEGORY, "internal-*");
    if let Some(ref path) = args.config {
        builder = builder.file(path);
    }
    let meter = Arc::new(builder.env_prefix("METER").with_cli_args(&args.meter).build()?);

    let executor = Arc::new(MonitoredPool::new(
        "executor",
        DispatcherKind::ThreadPoolExecutor,
        args.threads,
    )?);
    let fork_join = Arc::new(MonitoredPool::new("fork-join", DispatcherKind::ForkJoin, args.threads)?);
    let internal = Arc::new(MonitoredPool::new("internal-io", DispatcherKind::ForkJoin, 1)?);

    meter.register_dispatcher(executor.name(), executor.clone())?;
    meter.register_dispatcher(fork_join.name(), fork_join.clone())?;
    // Excluded by the filter
    meter.register_dispatcher(internal.name(), internal.clone())?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    meter.start(runtime.handle(), tx)?;

    for pool in [&executor, &fork_join] {
        for i in 0..args.tasks {
            pool.spawn(move || {
                std::thread::sleep(Duration::from_micros(200 + (i % 7) as u64 * 100));
            })?;
        }
    }
    info!(tasks = args.tasks, "workload submitted");

    runtime.block_on(async {
        for _ in 0..args.batches {
            match rx.recv().await {
                Some(batch) => print_batch(&batch),
                None => break,
            }
        }
    });

    meter.shutdown();
    for pool in [&executor, &fork_join, &internal] {
        meter.unregister_dispatcher(pool.name());
        pool.shutdown();
    }
    Ok(())
}
