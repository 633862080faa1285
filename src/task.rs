//! Task definitions.
//!
//! A task is a unit of work handed to the [`Scheduler`](crate::Scheduler).
//! It is executed exactly once, by whichever thread dequeues it, and is
//! consumed by execution.

use std::fmt;

/// A unit of work to be executed by the scheduler.
pub struct Task {
    work: Box<dyn FnOnce() + Send + 'static>,
}

impl Task {
    /// Creates a new task with the given work function.
    pub fn new<F>(work: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Task {
            work: Box::new(work),
        }
    }

    /// Runs the task, consuming it.
    ///
    /// Panics raised by the work function are not caught here.
    pub fn execute(self) {
        (self.work)();
    }
}

impl<F> From<F> for Task
where
    F: FnOnce() + Send + 'static,
{
    fn from(work: F) -> Self {
        Task::new(work)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}
