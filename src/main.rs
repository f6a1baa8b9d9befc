use slotpool::{Completion, Config, MapWorkerPool, WorkFn};
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    sync::Arc,
    time::Instant,
};
use tracing_subscriber::EnvFilter;


fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let now = Instant::now();
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = delivered.clone();

    let pool: MapWorkerPool<u64, u64> = MapWorkerPool::with_config(
        Config::default().queue_limit(1024).env_overrides(),
        move |_, completion: Completion<u64, u64>| {
            if completion.status.is_ok() {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        },
    );

    let square = WorkFn::new(|x: &u64| Ok(x * x));
    for i in 0..1_000_000u64 {
        pool.submit(square.clone(), i);
    }
    pool.join();
    let metrics = pool.metrics();
    pool.stop();

    tracing::info!(
        delivered = delivered.load(Ordering::Relaxed),
        workers = metrics.workers,
        success_rate = metrics.success_rate(),
        elapsed = ?now.elapsed(),
        "done"
    );
}
