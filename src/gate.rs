//! Reusable entry/exit gate around a host's polling region.
//!
//! The gate is one atomic counter (starting at -1) and one binary release
//! signal (starting open). The first worker to enter takes the release
//! signal, the last worker to leave gives it back. An external owner that
//! takes the signal itself therefore runs only while no worker is inside,
//! and any worker arriving meanwhile waits at the gate until the owner is done.

use crossbeam::utils::CachePadded;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicIsize, Ordering};

/// Counter value of a gate with nobody inside.
pub const GATE_DRAINED: isize = -1;

/// Binary signal: open (available) or held.
#[derive(Debug)]
pub struct ReleaseSignal {
    open: Mutex<bool>,
    cond: Condvar,
}

impl Default for ReleaseSignal {
    fn default() -> Self {
        Self {
            open: Mutex::new(true),
            cond: Condvar::new(),
        }
    }
}

impl ReleaseSignal {
    /// Blocks until the signal is open, then holds it.
    pub fn acquire(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.cond.wait(&mut open);
        }
        *open = false;
    }

    /// Reopens the signal and wakes one waiter.
    pub fn release(&self) {
        *self.open.lock() = true;
        self.cond.notify_one();
    }

    pub fn is_open(&self) -> bool {
        *self.open.lock()
    }
}

/// Entry/exit barrier for worker threads polling a host.
#[derive(Debug)]
pub struct PollGate {
    counter: CachePadded<AtomicIsize>,
    /// Serializes entrants so none can slip past a first entrant that is
    /// still blocked on the release signal.
    entry: Mutex<()>,
    release: ReleaseSignal,
}

impl Default for PollGate {
    fn default() -> Self {
        Self::new()
    }
}

impl PollGate {
    pub fn new() -> Self {
        Self {
            counter: CachePadded::new(AtomicIsize::new(GATE_DRAINED)),
            entry: Mutex::new(()),
            release: ReleaseSignal::default(),
        }
    }

    /// Enters the gated region.
    ///
    /// The first entrant since the gate last drained blocks until the release
    /// signal is available (i.e. until any owner-side reset has finished) and
    /// keeps it held while anyone is inside.
    pub fn enter(&self) {
        let _entry = self.entry.lock();
        if self.counter.fetch_add(1, Ordering::AcqRel) == GATE_DRAINED {
            self.release.acquire();
        }
    }

    /// Leaves the gated region. The last one out reopens the release signal.
    pub fn leave(&self) {
        if self.counter.fetch_sub(1, Ordering::AcqRel) == 0 {
            self.release.release();
        }
    }

    /// Enters and returns a guard that leaves on drop.
    pub fn pass(&self) -> GatePass<'_> {
        self.enter();
        GatePass { gate: self }
    }

    /// Takes the release signal for the owner, blocking until nobody is inside.
    ///
    /// While the returned guard lives, entrants wait at the gate. Only one
    /// owner should hold it at a time; the gate does not enforce this.
    pub fn lock_out(&self) -> LockOut<'_> {
        self.release.acquire();
        LockOut { gate: self }
    }

    /// Blocks until nobody is inside, then returns immediately.
    pub fn wait_drained(&self) {
        drop(self.lock_out());
    }

    /// Current counter value: [`GATE_DRAINED`] when empty, `n - 1` with `n`
    /// threads inside or queued on the first entry.
    pub fn counter(&self) -> isize {
        self.counter.load(Ordering::Acquire)
    }

    pub fn is_drained(&self) -> bool {
        self.counter() == GATE_DRAINED
    }
}

/// A worker's presence inside the gate. Leaves on drop.
#[must_use = "dropping the pass leaves the gate immediately"]
pub struct GatePass<'a> {
    gate: &'a PollGate,
}

impl Drop for GatePass<'_> {
    fn drop(&mut self) {
        self.gate.leave();
    }
}

/// The owner's hold on the gate's release signal. Reopens it on drop.
#[must_use = "dropping the lock-out reopens the gate immediately"]
pub struct LockOut<'a> {
    gate: &'a PollGate,
}

impl Drop for LockOut<'_> {
    fn drop(&mut self) {
        self.gate.release.release();
    }
}
