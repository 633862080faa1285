//! Chrome trace capture for worker activity.
//!
//! Spans are recorded into thread-local buffers with no cross-thread
//! contention. A worker hands its buffer to the global list when it exits
//! (see [`CollectorGuard`]), and [`export_to_file`] writes everything collected
//! so far as a JSON array readable by `chrome://tracing` or ui.perfetto.dev.

use parking_lot::Mutex;
use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Span name for a task executed by a scheduler worker or waiter.
pub const TASK_SPAN: &str = "task";
/// Span name for one worker's gated polling phase.
pub const POLL_PHASE_SPAN: &str = "poll_phase";

/// Thread id used for spans run by a non-worker thread (e.g. inside `wait_all`).
pub const CALLER_TID: usize = 0xFFFF;

/// A completed span in chrome "X" (complete event) form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub name: &'static str,
    pub tid: usize,
    pub start_us: u64,
    pub duration_us: u64,
}

thread_local! {
    static TRACE_BUFFER: RefCell<Vec<TraceEvent>> = RefCell::new(Vec::with_capacity(1024));
}

lazy_static::lazy_static! {
    static ref GLOBAL_START: Instant = Instant::now();
    static ref EPOCH_START_US: u64 = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_micros() as u64)
        .unwrap_or_default();
    static ref ALL_BUFFERS: Mutex<Vec<Vec<TraceEvent>>> = Mutex::new(Vec::new());
}

/// Records a finished span on the current thread.
pub fn record_event(name: &'static str, tid: usize, start: Instant, duration: Duration) {
    let since_start = start.saturating_duration_since(*GLOBAL_START);
    let event = TraceEvent {
        name,
        tid,
        start_us: since_start.as_micros() as u64 + *EPOCH_START_US,
        duration_us: duration.as_micros() as u64,
    };

    TRACE_BUFFER.with(|buf| buf.borrow_mut().push(event));
}

/// Moves the current thread's buffer into the global list.
pub fn collect_local_trace() {
    TRACE_BUFFER.with(|buf| {
        let local = std::mem::take(&mut *buf.borrow_mut());
        if !local.is_empty() {
            ALL_BUFFERS.lock().push(local);
        }
    });
}

/// Returns a copy of every collected event.
pub fn collected_events() -> Vec<TraceEvent> {
    ALL_BUFFERS.lock().iter().flatten().cloned().collect()
}

/// Drops every collected event.
pub fn clear() {
    ALL_BUFFERS.lock().clear();
}

/// Writes all collected events to `path` in chrome trace JSON format.
pub fn export_to_file(path: impl AsRef<Path>) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_events(&mut writer, &collected_events())?;
    writer.flush()
}

fn write_events<W: Write>(writer: &mut W, events: &[TraceEvent]) -> io::Result<()> {
    writeln!(writer, "[")?;
    for (i, event) in events.iter().enumerate() {
        if i > 0 {
            writeln!(writer, ",")?;
        }
        write!(
            writer,
            "{{\"name\":\"{}\",\"ph\":\"X\",\"ts\":{},\"dur\":{},\"pid\":1,\"tid\":{}}}",
            event.name, event.start_us, event.duration_us, event.tid
        )?;
    }
    writeln!(writer, "\n]")
}

/// RAII span: records from construction until drop.
pub struct TraceGuard {
    name: &'static str,
    tid: usize,
    start: Instant,
}

impl TraceGuard {
    pub fn new(name: &'static str, tid: usize) -> Self {
        Self {
            name,
            tid,
            start: Instant::now(),
        }
    }

    /// Starts a span only when `enabled`.
    pub fn start_if(enabled: bool, name: &'static str, tid: usize) -> Option<Self> {
        enabled.then(|| Self::new(name, tid))
    }
}

impl Drop for TraceGuard {
    fn drop(&mut self) {
        record_event(self.name, self.tid, self.start, self.start.elapsed());
    }
}

/// Collects the local trace buffer when dropped. Held by each worker thread.
pub struct CollectorGuard;

impl Drop for CollectorGuard {
    fn drop(&mut self) {
        collect_local_trace();
    }
}
