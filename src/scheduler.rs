//! Fixed-size task scheduler.
//!
//! The [`Scheduler`] owns a pool of worker threads draining a shared FIFO
//! [`TaskQueue`]. Work is handed over with [`Scheduler::submit`] and
//! [`Scheduler::wait_all`] is the barrier: the calling thread helps execute
//! queued tasks and returns once nothing is queued and nothing is running.

use crate::chrome_trace::{CALLER_TID, TASK_SPAN, TraceGuard};
use crate::config::PoolConfig;
use crate::error::Result;
#[cfg(feature = "metrics")]
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::queue::{TaskQueue, Wakeup};
use crate::task::Task;
use crate::worker::{QuitSignal, WorkerSet};
use crossbeam::utils::{Backoff, CachePadded};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tracing::{debug, warn};

/// State shared between the scheduler, its handles and its workers.
///
/// Outlives any individual worker set: tasks queued while no pool exists stay
/// here until the next `create` or `wait_all`.
struct Shared {
    queue: TaskQueue,
    /// Tasks currently mid-execution on any thread.
    working: CachePadded<AtomicUsize>,
    #[cfg(feature = "metrics")]
    metrics: Metrics,
}

/// Decrements the working count when a task finishes, including by unwinding.
struct WorkingGuard<'a>(&'a AtomicUsize);

impl Drop for WorkingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Shared {
    fn new() -> Self {
        Self {
            queue: TaskQueue::new(),
            working: CachePadded::new(AtomicUsize::new(0)),
            #[cfg(feature = "metrics")]
            metrics: Metrics::new(),
        }
    }

    fn push(&self, task: Task) {
        self.queue.push(task);
        #[cfg(feature = "metrics")]
        Metrics::add(&self.metrics.tasks_submitted, 1);
    }

    fn push_batch<I>(&self, tasks: I) -> usize
    where
        I: IntoIterator<Item = Task>,
    {
        let pushed = self.queue.push_batch(tasks);
        #[cfg(feature = "metrics")]
        Metrics::add(&self.metrics.tasks_submitted, pushed as u64);
        pushed
    }

    /// Dequeues one task and runs it on the current thread.
    ///
    /// The working count is raised before the queue lock is released, so no
    /// observer can see the task neither queued nor running. Execution itself
    /// happens outside the lock. Returns `false` when the queue was empty.
    fn try_execute_one(&self, trace_tid: Option<usize>) -> bool {
        let Some(task) = self.queue.pop_with(|| {
            self.working.fetch_add(1, Ordering::AcqRel);
        }) else {
            return false;
        };

        let _working = WorkingGuard(&self.working);
        let _span = trace_tid.map(|tid| TraceGuard::new(TASK_SPAN, tid));
        task.execute();

        #[cfg(feature = "metrics")]
        Metrics::add(&self.metrics.tasks_executed, 1);
        true
    }

    /// True when nothing is queued and nothing is running.
    fn is_idle(&self) -> bool {
        self.queue
            .is_empty_and(|| self.working.load(Ordering::Acquire) == 0)
    }
}

impl QuitSignal for Shared {
    fn raise_quit(&self) {
        self.queue.set_quit(true);
    }
}

fn worker_loop(shared: &Shared, id: usize, trace: bool) {
    let trace_tid = trace.then_some(id);
    // Quit wins over pending work; see `TaskQueue::wait`.
    while let Wakeup::Pending = shared.queue.wait() {
        shared.try_execute_one(trace_tid);
    }
}

/// Cloneable submission handle.
///
/// Lets running tasks (or other threads) submit follow-up work without
/// borrowing the [`Scheduler`]. Tasks submitted through a handle are covered
/// by [`Scheduler::wait_all`].
#[derive(Clone)]
pub struct SchedulerHandle {
    shared: Arc<Shared>,
}

impl SchedulerHandle {
    /// Queues a task. See [`Scheduler::submit`].
    pub fn submit<T: Into<Task>>(&self, task: T) {
        self.shared.push(task.into());
    }

    /// Queues a task on the background lane. See [`Scheduler::submit_background`].
    pub fn submit_background<T: Into<Task>>(&self, task: T) {
        self.submit(task);
    }

    /// Queues every task under one lock acquisition.
    pub fn submit_batch<I>(&self, tasks: I) -> usize
    where
        I: IntoIterator,
        I::Item: Into<Task>,
    {
        self.shared.push_batch(tasks.into_iter().map(Into::into))
    }
}

/// A fixed pool of worker threads executing [`Task`]s in FIFO order.
///
/// # Example
///
/// ```
/// use simpool::Scheduler;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let scheduler = Scheduler::new(4).unwrap();
/// let done = Arc::new(AtomicUsize::new(0));
///
/// for _ in 0..100 {
///     let done = done.clone();
///     scheduler.submit(move || {
///         done.fetch_add(1, Ordering::Relaxed);
///     });
/// }
///
/// scheduler.wait_all();
/// assert_eq!(done.load(Ordering::Relaxed), 100);
/// ```
pub struct Scheduler {
    shared: Arc<Shared>,
    workers: Option<WorkerSet>,
    config: PoolConfig,
}

impl Scheduler {
    /// Creates a scheduler with `num_threads` worker threads.
    pub fn new(num_threads: usize) -> Result<Self> {
        Self::with_config(num_threads, PoolConfig::default())
    }

    /// Creates a scheduler with custom configuration.
    pub fn with_config(num_threads: usize, config: PoolConfig) -> Result<Self> {
        let mut scheduler = Self::without_workers(config);
        scheduler.create(num_threads)?;
        Ok(scheduler)
    }

    /// Creates a scheduler with one worker per available CPU.
    pub fn with_default_threads() -> Result<Self> {
        let num_cpus = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::new(num_cpus)
    }

    /// Creates a scheduler with no pool yet.
    ///
    /// Submitted tasks stay queued until a [`wait_all`](Self::wait_all),
    /// [`create`](Self::create) or [`destroy`](Self::destroy) caller drains
    /// them on its own thread.
    pub fn without_workers(config: PoolConfig) -> Self {
        Scheduler {
            shared: Arc::new(Shared::new()),
            workers: None,
            config,
        }
    }

    /// Spawns a fresh pool of `num_threads` workers.
    ///
    /// An existing pool is fully torn down first (drained and joined), so
    /// calling `create` twice is the same as `destroy` followed by `create`.
    /// On failure no pool is left running; already spawned threads are
    /// joined before the error is returned.
    pub fn create(&mut self, num_threads: usize) -> Result<()> {
        if let Err(err) = self.destroy() {
            warn!(error = %err, "previous pool reported failures during teardown");
        }

        self.shared.queue.set_quit(false);

        let trace = self.config.trace;
        let shared = &self.shared;
        let workers = WorkerSet::spawn(num_threads, &self.config, shared.clone(), |id| {
            let shared = shared.clone();
            move || worker_loop(&shared, id, trace)
        })?;

        debug!(threads = num_threads, "scheduler created");
        self.workers = Some(workers);
        Ok(())
    }

    /// Tears the pool down.
    ///
    /// Queued tasks are drained first (the caller helps, as in `wait_all`),
    /// then quit is raised and every worker joined. Tasks that slip in through
    /// a [`SchedulerHandle`] during teardown are executed on the calling
    /// thread. Returns [`PoolError::WorkerPanicked`](crate::PoolError) when
    /// some workers died from a panicking task; the teardown is complete
    /// either way. Without a pool, the caller still runs every queued task.
    pub fn destroy(&mut self) -> Result<()> {
        self.wait_all();

        let Some(mut workers) = self.workers.take() else {
            return Ok(());
        };

        let panicked = workers.shutdown();
        drop(workers);

        self.run_queued_on_caller();

        debug!(panicked, "scheduler destroyed");
        match panicked {
            0 => Ok(()),
            count => Err(crate::PoolError::WorkerPanicked { count }),
        }
    }

    /// Queues a task for execution.
    ///
    /// Never blocks beyond the queue lock. Tasks are dequeued in submission
    /// order; which worker runs a task and the order of completion are
    /// unspecified.
    pub fn submit<T: Into<Task>>(&self, task: T) {
        self.shared.push(task.into());
    }

    /// Queues a task on the background lane.
    ///
    /// The background lane is not separate today: this is the same as
    /// [`submit`](Self::submit).
    pub fn submit_background<T: Into<Task>>(&self, task: T) {
        self.submit(task);
    }

    /// Queues every task under one lock acquisition. Returns how many were queued.
    pub fn submit_batch<I>(&self, tasks: I) -> usize
    where
        I: IntoIterator,
        I::Item: Into<Task>,
    {
        self.shared.push_batch(tasks.into_iter().map(Into::into))
    }

    /// Returns a cloneable handle for submitting from other threads or tasks.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            shared: self.shared.clone(),
        }
    }

    /// Blocks until no task is queued and no task is running anywhere.
    ///
    /// The calling thread executes queued tasks itself, then spins with
    /// backoff until running tasks finish. Tasks submitted by running tasks
    /// are covered. There is no timeout: a task that never returns keeps
    /// this call spinning.
    pub fn wait_all(&self) {
        let backoff = Backoff::new();

        loop {
            if self.run_queued_on_caller() > 0 {
                backoff.reset();
            }

            if self.shared.is_idle() {
                return;
            }
            backoff.snooze();
        }
    }

    /// Executes queued tasks on the calling thread until the queue is empty.
    /// Returns how many ran.
    fn run_queued_on_caller(&self) -> usize {
        let trace_tid = self.caller_trace_tid();
        let mut ran = 0;
        while self.shared.try_execute_one(trace_tid) {
            #[cfg(feature = "metrics")]
            Metrics::add(&self.shared.metrics.tasks_run_by_waiter, 1);
            ran += 1;
        }
        ran
    }

    fn caller_trace_tid(&self) -> Option<usize> {
        self.config.trace.then_some(CALLER_TID)
    }

    /// Returns the number of worker threads, 0 when no pool exists.
    pub fn num_workers(&self) -> usize {
        self.workers.as_ref().map_or(0, WorkerSet::len)
    }

    /// Whether a worker pool is currently running.
    pub fn is_running(&self) -> bool {
        self.workers.is_some()
    }

    /// Number of queued tasks not yet picked up.
    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    /// Number of tasks currently executing.
    pub fn working(&self) -> usize {
        self.shared.working.load(Ordering::Acquire)
    }

    /// Returns the configuration the scheduler was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    #[cfg(feature = "metrics")]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Err(err) = self.destroy() {
            tracing::error!(error = %err, "scheduler dropped with failed workers");
        }
    }
}
