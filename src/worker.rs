//! Worker thread ownership.
//!
//! Both pools own a fixed-length set of OS threads. [`WorkerSet`] spawns them
//! (named, optionally pinned), and guarantees that every thread is signalled
//! and joined before the set goes away, including when spawning fails halfway
//! through construction.

use crate::chrome_trace::CollectorGuard;
use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::PinningStrategy;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{trace, warn};

/// Something a worker set can raise to make its threads leave their loop.
pub trait QuitSignal: Send + Sync {
    /// Raises quit and wakes every thread blocked on the owner's signals.
    fn raise_quit(&self);
}

/// A single worker thread.
pub struct Worker {
    id: usize,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawns a worker thread running `body`.
    ///
    /// The thread is named `{thread_name}-{id}` and pinned according to the
    /// configured strategy before `body` starts.
    pub fn spawn<B>(id: usize, config: &PoolConfig, body: B) -> io::Result<Self>
    where
        B: FnOnce() + Send + 'static,
    {
        let mut builder = thread::Builder::new().name(format!("{}-{}", config.thread_name, id));
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let pinning = config.pinning;
        let collect_trace = config.trace;
        let handle = builder.spawn(move || {
            pin_current_thread(id, pinning);
            let _collector = collect_trace.then_some(CollectorGuard);

            trace!(worker = id, "worker started");
            body();
            trace!(worker = id, "worker exiting");
        })?;

        Ok(Worker {
            id,
            handle: Some(handle),
        })
    }

    /// Returns the worker's ID.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Waits for the worker thread to finish.
    pub fn join(mut self) -> thread::Result<()> {
        match self.handle.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }
}

fn pin_current_thread(id: usize, strategy: PinningStrategy) {
    match strategy {
        PinningStrategy::None => {}
        PinningStrategy::Linear => {
            if let Some(core_ids) = core_affinity::get_core_ids() {
                if !core_ids.is_empty() {
                    let core = core_ids[id % core_ids.len()];
                    if !core_affinity::set_for_current(core) {
                        trace!(worker = id, core = core.id, "core pinning refused");
                    }
                }
            }
        }
    }
}

/// An owned, fixed-length set of worker threads.
///
/// Dropping the set raises the owner's quit signal and joins every thread.
pub struct WorkerSet {
    workers: Vec<Worker>,
    quit: Arc<dyn QuitSignal>,
}

impl WorkerSet {
    /// Spawns `count` workers. `make_body` builds the loop run by worker `i`.
    ///
    /// If any spawn fails, the threads already running are signalled through
    /// `quit` and joined before the error is returned.
    pub fn spawn<M, B>(
        count: usize,
        config: &PoolConfig,
        quit: Arc<dyn QuitSignal>,
        mut make_body: M,
    ) -> Result<Self>
    where
        M: FnMut(usize) -> B,
        B: FnOnce() + Send + 'static,
    {
        if count == 0 {
            return Err(PoolError::InvalidThreadCount(count));
        }

        let mut set = WorkerSet {
            workers: Vec::with_capacity(count),
            quit,
        };

        for id in 0..count {
            let worker = Worker::spawn(id, config, make_body(id))
                .map_err(|source| PoolError::Spawn { index: id, source })?;
            set.workers.push(worker);
        }

        Ok(set)
    }

    /// Returns the number of worker threads in the set.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Raises quit, joins every worker and returns how many had panicked.
    ///
    /// Calling it again after the set is empty is a no-op returning 0.
    pub fn shutdown(&mut self) -> usize {
        if self.workers.is_empty() {
            return 0;
        }

        self.quit.raise_quit();

        let mut panicked = 0;
        for worker in self.workers.drain(..) {
            let worker_id = worker.id();
            if worker.join().is_err() {
                panicked += 1;
                warn!(worker = worker_id, "worker thread panicked");
            }
        }
        panicked
    }

    /// Shuts the set down, turning panicked workers into an error.
    pub fn join(mut self) -> Result<()> {
        match self.shutdown() {
            0 => Ok(()),
            count => Err(PoolError::WorkerPanicked { count }),
        }
    }
}

impl Drop for WorkerSet {
    fn drop(&mut self) {
        let panicked = self.shutdown();
        if panicked > 0 {
            tracing::error!(panicked, "worker set dropped with panicked threads");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::{Condvar, Mutex};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Flag {
        raised: Mutex<bool>,
        cond: Condvar,
    }

    impl Flag {
        fn wait(&self) {
            let mut raised = self.raised.lock();
            while !*raised {
                self.cond.wait(&mut raised);
            }
        }
    }

    impl QuitSignal for Flag {
        fn raise_quit(&self) {
            *self.raised.lock() = true;
            self.cond.notify_all();
        }
    }

    #[test]
    fn test_worker_set_creation() {
        let flag = Arc::new(Flag::default());
        let started = Arc::new(AtomicUsize::new(0));

        let set = WorkerSet::spawn(4, &PoolConfig::default(), flag.clone(), |_| {
            let flag = flag.clone();
            let started = started.clone();
            move || {
                started.fetch_add(1, Ordering::SeqCst);
                flag.wait();
            }
        })
        .expect("spawn failed");

        assert_eq!(set.len(), 4);
        set.join().expect("join failed");
        assert_eq!(started.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let flag = Arc::new(Flag::default());
        let result = WorkerSet::spawn(0, &PoolConfig::default(), flag, |_| || {});
        assert!(matches!(result, Err(PoolError::InvalidThreadCount(0))));
    }

    #[test]
    fn test_thread_names_use_prefix() {
        let flag = Arc::new(Flag::default());
        let names = Arc::new(Mutex::new(Vec::new()));
        let config = PoolConfig::default().with_thread_name("step");

        let set = WorkerSet::spawn(2, &config, flag.clone(), |_| {
            let names = names.clone();
            move || {
                let name = thread::current().name().map(str::to_owned);
                names.lock().push(name);
            }
        })
        .expect("spawn failed");
        set.join().expect("join failed");

        let mut names = names.lock().clone();
        names.sort();
        assert_eq!(
            names,
            vec![Some("step-0".to_string()), Some("step-1".to_string())]
        );
    }

    #[test]
    fn test_panicked_worker_reported() {
        let flag = Arc::new(Flag::default());
        let set = WorkerSet::spawn(2, &PoolConfig::default(), flag, |id| {
            move || {
                if id == 1 {
                    panic!("worker failure for testing");
                }
            }
        })
        .expect("spawn failed");

        match set.join() {
            Err(PoolError::WorkerPanicked { count }) => assert_eq!(count, 1),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_drop_joins_threads() {
        let flag = Arc::new(Flag::default());
        let exited = Arc::new(AtomicUsize::new(0));

        {
            let _set = WorkerSet::spawn(3, &PoolConfig::default(), flag.clone(), |_| {
                let flag = flag.clone();
                let exited = exited.clone();
                move || {
                    flag.wait();
                    exited.fetch_add(1, Ordering::SeqCst);
                }
            })
            .expect("spawn failed");
        }

        assert_eq!(exited.load(Ordering::SeqCst), 3);
    }
}
