//! # simpool - Threading utilities for parallel simulation stepping
//!
//! Two ways of spreading simulation work over a fixed set of OS threads:
//!
//! - [`Scheduler`]: a thread pool with a FIFO task queue. Submit
//!   [`Task`]s, then [`Scheduler::wait_all`] to block until every queued and
//!   running task is done. The waiting thread helps drain the queue.
//! - [`PollingWorkerPool`]: workers that cooperate with a [`SimulationHost`]
//!   which hands out its own parallel work through a poll-for-work protocol.
//!   A [`PollGate`] makes sure the host is only reset for the next frame once
//!   every worker has stopped polling.
//!
//! ## Example
//!
//! ```no_run
//! use simpool::Scheduler;
//!
//! let scheduler = Scheduler::new(4).expect("failed to spawn workers");
//!
//! scheduler.submit(|| {
//!     println!("Hello from a worker!");
//! });
//!
//! scheduler.wait_all();
//! ```

pub mod c_api;
pub mod chrome_trace;
pub mod config;
pub mod error;
pub mod gate;
pub mod host;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod polling;
pub mod queue;
pub mod scheduler;
pub mod task;
pub mod worker;

use serde::{Deserialize, Serialize};

/// Strategy for pinning worker threads to CPU cores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PinningStrategy {
    /// No pinning (standard OS scheduling).
    #[default]
    None,
    /// Linear pinning (worker i -> logical processor i, wrapping around).
    Linear,
}

pub use config::PoolConfig;
pub use error::{PoolError, Result};
pub use gate::PollGate;
pub use host::{PollResult, SimulationHost, WaitMode};
pub use polling::PollingWorkerPool;
pub use scheduler::{Scheduler, SchedulerHandle};
pub use task::Task;
