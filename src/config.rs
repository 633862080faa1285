//! Worker pool configuration.

use crate::PinningStrategy;
use serde::{Deserialize, Serialize};

/// Configuration shared by [`Scheduler`](crate::Scheduler) and
/// [`PollingWorkerPool`](crate::PollingWorkerPool).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Prefix for worker thread names. Workers are named `{prefix}-{index}`.
    pub thread_name: String,
    /// Stack size for each worker thread in bytes. `None` keeps the OS default.
    pub stack_size: Option<usize>,
    /// How worker threads are pinned to CPU cores.
    pub pinning: PinningStrategy,
    /// Record chrome-trace spans for task execution and poll phases.
    pub trace: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            thread_name: "simpool-worker".to_string(),
            stack_size: None,
            pinning: PinningStrategy::None,
            trace: false,
        }
    }
}

impl PoolConfig {
    /// Returns a copy with a different thread name prefix.
    pub fn with_thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name = prefix.into();
        self
    }

    /// Returns a copy with the given pinning strategy.
    pub fn with_pinning(mut self, pinning: PinningStrategy) -> Self {
        self.pinning = pinning;
        self
    }

    /// Returns a copy with chrome tracing switched on or off.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }
}
