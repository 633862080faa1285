//! FIFO task queue shared by the scheduler and its workers.
//!
//! The queue doubles as the home of the scheduler's two worker signals:
//! `pending` is level-triggered and is simply "the queue is non-empty",
//! `quit` is a flag under the same lock. Both are waited on through one
//! condition variable so a worker can never miss a wakeup between checking
//! the predicate and going to sleep.

use crate::task::Task;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

#[derive(Default)]
struct QueueState {
    tasks: VecDeque<Task>,
    quit: bool,
}

/// What a worker observed after waiting on the queue signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    /// `quit` was raised. Takes precedence over pending work.
    Quit,
    /// The queue had at least one task when the worker woke.
    Pending,
}

/// Thread-safe FIFO of pending tasks.
#[derive(Default)]
pub struct TaskQueue {
    state: Mutex<QueueState>,
    signal: Condvar,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a task and raises `pending`.
    pub fn push(&self, task: Task) {
        self.state.lock().tasks.push_back(task);
        self.signal.notify_one();
    }

    /// Appends every task under a single lock acquisition.
    ///
    /// Returns the number of tasks pushed.
    pub fn push_batch<I>(&self, tasks: I) -> usize
    where
        I: IntoIterator<Item = Task>,
    {
        let pushed = {
            let mut state = self.state.lock();
            let before = state.tasks.len();
            state.tasks.extend(tasks);
            state.tasks.len() - before
        };

        match pushed {
            0 => {}
            1 => {
                self.signal.notify_one();
            }
            _ => {
                self.signal.notify_all();
            }
        }
        pushed
    }

    /// Pops the front task, running `claim` while the lock is still held.
    ///
    /// `claim` lets the caller account for the task (e.g. bump a working
    /// count) before any other thread can observe the queue without it.
    /// Returns `None` when the queue is empty, which lowers `pending`.
    pub fn pop_with<C>(&self, claim: C) -> Option<Task>
    where
        C: FnOnce(),
    {
        let mut state = self.state.lock();
        let task = state.tasks.pop_front()?;
        claim();
        Some(task)
    }

    /// Blocks until `quit` is raised or the queue is non-empty.
    pub fn wait(&self) -> Wakeup {
        let mut state = self.state.lock();
        loop {
            if state.quit {
                return Wakeup::Quit;
            }
            if !state.tasks.is_empty() {
                return Wakeup::Pending;
            }
            self.signal.wait(&mut state);
        }
    }

    /// Raises or lowers `quit`. Raising wakes every waiting worker.
    pub fn set_quit(&self, quit: bool) {
        self.state.lock().quit = quit;
        if quit {
            self.signal.notify_all();
        }
    }

    /// Number of queued (not yet dequeued) tasks.
    pub fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the queue is empty and `idle` holds, both checked under the lock.
    ///
    /// Pops and pushes are serialized against the check, so a caller can use
    /// this to observe "nothing queued and nothing claimed" atomically.
    pub fn is_empty_and<P>(&self, idle: P) -> bool
    where
        P: FnOnce() -> bool,
    {
        let state = self.state.lock();
        state.tasks.is_empty() && idle()
    }
}
