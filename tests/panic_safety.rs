use simpool::{PoolError, Scheduler};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Waits until a worker has picked up and finished everything queued,
/// without the test thread executing anything itself.
fn wait_for_workers(scheduler: &Scheduler) {
    let start = Instant::now();
    while scheduler.queued() > 0 || scheduler.working() > 0 {
        if start.elapsed() > Duration::from_secs(5) {
            panic!("workers did not drain the queue");
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_panicking_task_releases_working_count() {
    let mut scheduler = Scheduler::new(1).unwrap();

    scheduler.submit(|| panic!("Intentional panic for testing"));
    wait_for_workers(&scheduler);
    assert_eq!(scheduler.working(), 0);

    // wait_all must not spin on the dead task.
    scheduler.wait_all();

    match scheduler.destroy() {
        Err(PoolError::WorkerPanicked { count }) => assert_eq!(count, 1),
        other => panic!("expected a panicked worker, got {other:?}"),
    }
}

#[test]
fn test_surviving_workers_keep_running() {
    let mut scheduler = Scheduler::new(2).unwrap();

    scheduler.submit(|| panic!("Boom"));
    wait_for_workers(&scheduler);

    let success = Arc::new(AtomicBool::new(false));
    let success_clone = success.clone();
    scheduler.submit(move || {
        success_clone.store(true, Ordering::SeqCst);
    });
    wait_for_workers(&scheduler);
    assert!(success.load(Ordering::SeqCst), "Subsequent task failed to run");

    assert!(matches!(
        scheduler.destroy(),
        Err(PoolError::WorkerPanicked { count: 1 })
    ));
}

#[test]
fn test_panic_on_waiting_thread_propagates() {
    let scheduler = Scheduler::without_workers(Default::default());
    scheduler.submit(|| panic!("task failure"));

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| scheduler.wait_all()));
    assert!(result.is_err());
    assert_eq!(scheduler.working(), 0);
    assert_eq!(scheduler.queued(), 0);
}

#[test]
fn test_recreate_after_panicked_worker() {
    let mut scheduler = Scheduler::new(1).unwrap();
    scheduler.submit(|| panic!("first pool dies"));
    wait_for_workers(&scheduler);

    // The old pool's failure is logged, the new pool starts cleanly.
    scheduler.create(2).expect("recreate failed");
    let executed = Arc::new(AtomicUsize::new(0));
    for _ in 0..10 {
        let executed = executed.clone();
        scheduler.submit(move || {
            executed.fetch_add(1, Ordering::SeqCst);
        });
    }
    scheduler.wait_all();
    assert_eq!(executed.load(Ordering::SeqCst), 10);
    scheduler.destroy().expect("new pool should shut down cleanly");
}
