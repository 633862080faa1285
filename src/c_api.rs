//! C API over [`Scheduler`] for C and C++ simulation samples.
//!
//! Handles are opaque pointers to a boxed `Scheduler`. Every function accepts
//! a null handle and does nothing with it.

use crate::Scheduler;
use std::ffi::c_void;

/// C task entry point. Receives the `arg` passed to [`Scheduler_Submit`].
pub type SchedulerTaskFn = unsafe extern "C" fn(arg: *mut c_void);

/// Opaque argument pointer moved into a task.
struct TaskArg(*mut c_void);

// SAFETY: the pool never dereferences `arg`; the submitter guarantees it may
// be used from any thread until the task function has returned.
unsafe impl Send for TaskArg {}

#[unsafe(no_mangle)]
/// Creates a scheduler. `num_threads == 0` means one worker per CPU.
///
/// Returns null if the workers could not be spawned.
///
/// # Safety
/// The returned handle must be released with [`Scheduler_Destroy`].
pub unsafe extern "C" fn Scheduler_Create(num_threads: usize) -> *mut Scheduler {
    let scheduler = if num_threads == 0 {
        Scheduler::with_default_threads()
    } else {
        Scheduler::new(num_threads)
    };

    match scheduler {
        Ok(scheduler) => Box::into_raw(Box::new(scheduler)),
        Err(err) => {
            tracing::error!(error = %err, "Scheduler_Create failed");
            std::ptr::null_mut()
        }
    }
}

#[unsafe(no_mangle)]
/// Drains queued tasks, joins the workers and frees the scheduler.
///
/// # Safety
/// `handle` must be null or a pointer returned by [`Scheduler_Create`] that
/// has not been destroyed. It must not be used after this call.
pub unsafe extern "C" fn Scheduler_Destroy(handle: *mut Scheduler) {
    if handle.is_null() {
        return;
    }
    // SAFETY: caller guarantees `handle` came from `Scheduler_Create` and
    // surrenders ownership.
    let mut scheduler = unsafe { Box::from_raw(handle) };
    if let Err(err) = scheduler.destroy() {
        tracing::error!(error = %err, "Scheduler_Destroy reported failed workers");
    }
}

#[unsafe(no_mangle)]
/// Queues `func(arg)` for execution on a worker.
///
/// Returns 0 on success, -1 if `handle` is null.
///
/// # Safety
/// `handle` must be null or a live handle from [`Scheduler_Create`]. `arg`
/// must stay valid, and be safe to use from another thread, until `func`
/// returns.
pub unsafe extern "C" fn Scheduler_Submit(
    handle: *mut Scheduler,
    func: SchedulerTaskFn,
    arg: *mut c_void,
) -> i32 {
    if handle.is_null() {
        return -1;
    }
    // SAFETY: caller guarantees `handle` is live.
    let scheduler = unsafe { &*handle };
    let arg = TaskArg(arg);
    scheduler.submit(move || {
        let arg = arg;
        // SAFETY: the submitter vouched for `func` and `arg`.
        unsafe { func(arg.0) }
    });
    0
}

#[unsafe(no_mangle)]
/// Blocks until every queued and running task has finished.
///
/// # Safety
/// `handle` must be null or a live handle from [`Scheduler_Create`].
pub unsafe extern "C" fn Scheduler_WaitAll(handle: *mut Scheduler) {
    if handle.is_null() {
        return;
    }
    // SAFETY: caller guarantees `handle` is live.
    unsafe { &*handle }.wait_all();
}
