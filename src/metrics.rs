//! Optional activity counters, compiled in with the `metrics` feature.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Activity counters for a pool.
#[derive(Debug)]
pub struct Metrics {
    /// Tasks pushed through `submit`, `submit_background` or `submit_batch`.
    pub tasks_submitted: AtomicU64,
    /// Tasks executed, by workers or by a thread inside `wait_all`.
    pub tasks_executed: AtomicU64,
    /// Subset of `tasks_executed` run on a caller thread inside `wait_all` or `destroy`.
    pub tasks_run_by_waiter: AtomicU64,
    /// Frames started through `reset_poll_for_work`.
    pub frames_started: AtomicU64,
    /// Calls made to the host's `poll_for_work`.
    pub polls: AtomicU64,
    /// Time when metrics collection started.
    pub start_time: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            tasks_submitted: AtomicU64::new(0),
            tasks_executed: AtomicU64::new(0),
            tasks_run_by_waiter: AtomicU64::new(0),
            frames_started: AtomicU64::new(0),
            polls: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Returns a snapshot of current metrics values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_executed: self.tasks_executed.load(Ordering::Relaxed),
            tasks_run_by_waiter: self.tasks_run_by_waiter.load(Ordering::Relaxed),
            frames_started: self.frames_started.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
            elapsed_seconds: self.start_time.elapsed().as_secs_f64(),
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub tasks_submitted: u64,
    pub tasks_executed: u64,
    pub tasks_run_by_waiter: u64,
    pub frames_started: u64,
    pub polls: u64,
    pub elapsed_seconds: f64,
}

impl MetricsSnapshot {
    /// Tasks executed per second since collection started.
    pub fn tasks_per_second(&self) -> f64 {
        if self.elapsed_seconds > 0.0 {
            self.tasks_executed as f64 / self.elapsed_seconds
        } else {
            0.0
        }
    }

    /// Tasks submitted but not yet finished (queued or mid-execution).
    pub fn outstanding(&self) -> i64 {
        self.tasks_submitted as i64 - self.tasks_executed as i64
    }

    /// Average number of polls per started frame.
    pub fn polls_per_frame(&self) -> f64 {
        if self.frames_started == 0 {
            0.0
        } else {
            self.polls as f64 / self.frames_started as f64
        }
    }
}
