//! Worker pool that polls a simulation host for parallel work.
//!
//! Each worker cycles through `WaitingForRun → Polling → Draining`:
//! it sleeps until the driver starts a frame with
//! [`PollingWorkerPool::reset_poll_for_work`], passes the [`PollGate`], asks
//! the host for work until the host reports the frame ended, lowers
//! `sim_running`, leaves the gate and goes back to sleep.
//!
//! The gate is what makes the driver's reset safe: the host's
//! `reset_poll_for_work` only runs once every worker is out of
//! `poll_for_work`, and workers arriving during the reset wait at the gate.

use crate::chrome_trace::{POLL_PHASE_SPAN, TraceGuard};
use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::gate::PollGate;
use crate::host::{PollResult, SimulationHost, WaitMode};
#[cfg(feature = "metrics")]
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::worker::{QuitSignal, WorkerSet};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Default)]
struct PhaseState {
    quit: bool,
    sim_running: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunSignal {
    Quit,
    Run,
}

/// The pool's `quit` and level-triggered `sim_running` signals.
#[derive(Debug, Default)]
struct Phase {
    state: Mutex<PhaseState>,
    cond: Condvar,
}

impl Phase {
    /// Blocks until quit or sim_running is raised. Quit wins when both are.
    fn wait_for_run(&self) -> RunSignal {
        let mut state = self.state.lock();
        loop {
            if state.quit {
                return RunSignal::Quit;
            }
            if state.sim_running {
                return RunSignal::Run;
            }
            self.cond.wait(&mut state);
        }
    }

    fn raise_sim_running(&self) {
        self.state.lock().sim_running = true;
        self.cond.notify_all();
    }

    /// Lowers sim_running. Returns whether this call was the one that lowered it.
    fn lower_sim_running(&self) -> bool {
        let was_running = std::mem::replace(&mut self.state.lock().sim_running, false);
        if was_running {
            self.cond.notify_all();
        }
        was_running
    }

    fn wait_sim_stopped(&self) {
        let mut state = self.state.lock();
        while state.sim_running {
            self.cond.wait(&mut state);
        }
    }

    fn is_sim_running(&self) -> bool {
        self.state.lock().sim_running
    }
}

struct Shared<H> {
    host: Arc<H>,
    gate: PollGate,
    phase: Phase,
    #[cfg(feature = "metrics")]
    metrics: Metrics,
}

impl<H: SimulationHost> QuitSignal for Shared<H> {
    fn raise_quit(&self) {
        self.phase.state.lock().quit = true;
        self.phase.cond.notify_all();
    }
}

fn worker_loop<H: SimulationHost>(shared: &Shared<H>, id: usize, trace: bool) {
    while shared.phase.wait_for_run() == RunSignal::Run {
        let _pass = shared.gate.pass();
        let _span = TraceGuard::start_if(trace, POLL_PHASE_SPAN, id);

        loop {
            let result = shared.host.poll_for_work(WaitMode::WaitForSimEnd);
            #[cfg(feature = "metrics")]
            Metrics::add(&shared.metrics.polls, 1);
            if !result.is_frame_active() {
                debug_assert_eq!(result, PollResult::SimEnded);
                break;
            }
        }

        // Still inside the gate here, so no reset can sneak in before the
        // end of this frame is recorded.
        if shared.phase.lower_sim_running() {
            trace!(worker = id, "frame ended");
        }
    }
}

/// A fixed pool of threads cooperating with a [`SimulationHost`]'s
/// poll-for-work protocol.
///
/// The host must honour the contract documented on [`SimulationHost`]: if
/// `poll_for_work` never returns [`PollResult::SimEnded`], workers never
/// drain and the next [`reset_poll_for_work`](Self::reset_poll_for_work)
/// blocks forever. There is no timeout.
pub struct PollingWorkerPool<H: SimulationHost + 'static> {
    shared: Arc<Shared<H>>,
    workers: Option<WorkerSet>,
}

impl<H: SimulationHost + 'static> PollingWorkerPool<H> {
    /// Spawns `num_threads` workers polling `host`, all waiting for the first frame.
    pub fn new(num_threads: usize, host: Arc<H>) -> Result<Self> {
        Self::with_config(num_threads, host, PoolConfig::default())
    }

    pub fn with_config(num_threads: usize, host: Arc<H>, config: PoolConfig) -> Result<Self> {
        let shared = Arc::new(Shared {
            host,
            gate: PollGate::new(),
            phase: Phase::default(),
            #[cfg(feature = "metrics")]
            metrics: Metrics::new(),
        });

        let trace = config.trace;
        let workers = WorkerSet::spawn(num_threads, &config, shared.clone(), |id| {
            let shared = shared.clone();
            move || worker_loop(&shared, id, trace)
        })?;

        debug!(threads = num_threads, "polling pool created");
        Ok(PollingWorkerPool {
            shared,
            workers: Some(workers),
        })
    }

    /// Starts a new frame.
    ///
    /// Blocks until no worker is inside the gate, resets the host, raises
    /// `sim_running` to wake every worker, then reopens the gate. Must not be
    /// called concurrently with itself.
    pub fn reset_poll_for_work(&self) {
        let _lock_out = self.shared.gate.lock_out();
        self.shared.host.reset_poll_for_work();
        self.shared.phase.raise_sim_running();

        #[cfg(feature = "metrics")]
        Metrics::add(&self.shared.metrics.frames_started, 1);
        trace!("frame started");
    }

    /// Blocks until the current frame's polling phase is over: `sim_running`
    /// has been lowered and every worker has left the gate.
    ///
    /// Returns immediately when no frame is running.
    pub fn wait_for_frame_end(&self) {
        self.shared.phase.wait_sim_stopped();
        self.shared.gate.wait_drained();
    }

    /// Notifies the host, raises quit and joins every worker.
    ///
    /// Returns [`PoolError::WorkerPanicked`] if a worker died (e.g. from a
    /// panicking host); the teardown is complete either way. Calling it again
    /// is a no-op.
    pub fn destroy(&mut self) -> Result<()> {
        let Some(mut workers) = self.workers.take() else {
            return Ok(());
        };

        self.shared.host.shutdown_worker_threads();
        let panicked = workers.shutdown();
        drop(workers);

        debug!(panicked, "polling pool destroyed");
        match panicked {
            0 => Ok(()),
            count => Err(PoolError::WorkerPanicked { count }),
        }
    }

    /// Returns the number of worker threads, 0 after `destroy`.
    pub fn num_workers(&self) -> usize {
        self.workers.as_ref().map_or(0, WorkerSet::len)
    }

    pub fn is_sim_running(&self) -> bool {
        self.shared.phase.is_sim_running()
    }

    /// The gate guarding the host's polling region.
    pub fn gate(&self) -> &PollGate {
        &self.shared.gate
    }

    pub fn host(&self) -> &Arc<H> {
        &self.shared.host
    }

    #[cfg(feature = "metrics")]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}

impl<H: SimulationHost + 'static> Drop for PollingWorkerPool<H> {
    fn drop(&mut self) {
        if let Err(err) = self.destroy() {
            tracing::error!(error = %err, "polling pool dropped with failed workers");
        }
    }
}
