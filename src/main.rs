use simpool::{
    PollResult, PollingWorkerPool, PoolConfig, Scheduler, SimulationHost, WaitMode, chrome_trace,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// A toy simulation: each frame advances a row of particles one step,
/// one particle per poll.
struct ParticleHost {
    particles: Vec<AtomicUsize>,
    cursor: AtomicUsize,
    shut_down: AtomicBool,
}

impl ParticleHost {
    fn new(count: usize) -> Self {
        Self {
            particles: (0..count).map(AtomicUsize::new).collect(),
            cursor: AtomicUsize::new(count),
            shut_down: AtomicBool::new(false),
        }
    }

    fn checksum(&self) -> usize {
        self.particles.iter().map(|p| p.load(Ordering::Relaxed)).sum()
    }
}

impl SimulationHost for ParticleHost {
    fn poll_for_work(&self, _mode: WaitMode) -> PollResult {
        if self.shut_down.load(Ordering::Acquire) {
            return PollResult::SimEnded;
        }
        let index = self.cursor.fetch_add(1, Ordering::AcqRel);
        match self.particles.get(index) {
            Some(particle) => {
                particle.fetch_add(1, Ordering::Relaxed);
                PollResult::MoreWork
            }
            None => PollResult::SimEnded,
        }
    }

    fn reset_poll_for_work(&self) {
        self.cursor.store(0, Ordering::Release);
    }

    fn shutdown_worker_threads(&self) {
        self.shut_down.store(true, Ordering::Release);
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let trace_path = std::env::var("SIMPOOL_TRACE").ok();
    let config = PoolConfig::default().with_trace(trace_path.is_some());

    if let Err(e) = run(config) {
        error!("demo failed: {e}");
        std::process::exit(1);
    }

    if let Some(path) = trace_path {
        chrome_trace::collect_local_trace();
        match chrome_trace::export_to_file(&path) {
            Ok(()) => info!("chrome trace written to {path}"),
            Err(e) => error!("failed to write chrome trace to {path}: {e}"),
        }
    }
}

fn run(config: PoolConfig) -> simpool::Result<()> {
    let num_threads = 4;

    // Task pool: sum a range in parallel.
    let mut scheduler = Scheduler::with_config(num_threads, config.clone())?;
    info!(threads = num_threads, "scheduler started");

    let sum = Arc::new(AtomicUsize::new(0));
    let num_tasks = 1_000;
    let start = Instant::now();
    for i in 0..num_tasks {
        let sum = sum.clone();
        scheduler.submit(move || {
            sum.fetch_add(i, Ordering::Relaxed);
        });
    }
    scheduler.wait_all();
    let expected: usize = (0..num_tasks).sum();
    info!(
        tasks = num_tasks,
        elapsed = ?start.elapsed(),
        sum = sum.load(Ordering::Relaxed),
        expected,
        "task batch finished"
    );
    scheduler.destroy()?;

    // Polling pool: step the particle host for a few frames.
    let host = Arc::new(ParticleHost::new(10_000));
    let mut pool = PollingWorkerPool::with_config(num_threads, host.clone(), config)?;
    let frames = 8;
    let start = Instant::now();
    for _ in 0..frames {
        pool.reset_poll_for_work();
        pool.wait_for_frame_end();
    }
    info!(
        frames,
        elapsed = ?start.elapsed(),
        checksum = host.checksum(),
        "simulation frames finished"
    );
    pool.destroy()?;

    Ok(())
}
