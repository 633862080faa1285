//! Interface to the simulation engine driven by a [`PollingWorkerPool`].
//!
//! [`PollingWorkerPool`]: crate::PollingWorkerPool

/// How long `poll_for_work` may block inside the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitMode {
    /// Return immediately whether or not work is available.
    DontWait,
    /// Block while the frame is running and no work is available.
    WaitForSimEnd,
    /// Block until the host shuts its worker threads down.
    WaitForShutdown,
}

/// Answer of a single `poll_for_work` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollResult {
    /// A piece of work was executed; more may be available.
    MoreWork,
    /// Nothing to do right now, but the frame is still running.
    NoWork,
    /// The frame (or the host) is finished; stop polling.
    SimEnded,
}

impl PollResult {
    /// True while a worker should keep polling.
    pub fn is_frame_active(self) -> bool {
        matches!(self, PollResult::MoreWork | PollResult::NoWork)
    }
}

/// A simulation engine that hands out parallel work to polling threads.
///
/// Contract:
/// - `poll_for_work` must eventually return [`PollResult::SimEnded`] once
///   the frame's work is done, and keep returning it until the next
///   `reset_poll_for_work`. A host that never ends the frame makes the pool's
///   workers poll forever and the next reset block forever.
/// - `reset_poll_for_work` is only called while no thread is inside
///   `poll_for_work`.
/// - After `shutdown_worker_threads`, `poll_for_work` must return
///   `SimEnded` promptly.
pub trait SimulationHost: Send + Sync {
    fn poll_for_work(&self, mode: WaitMode) -> PollResult;

    /// Re-arms the host for the next frame.
    fn reset_poll_for_work(&self);

    /// Tells the host that no more polling will happen.
    fn shutdown_worker_threads(&self);
}
