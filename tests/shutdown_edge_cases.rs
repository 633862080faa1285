use simpool::{PoolConfig, PoolError, Scheduler};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

#[test]
fn test_create_then_destroy_for_many_sizes() {
    for threads in 1..=8 {
        let mut scheduler = Scheduler::new(threads).expect("create failed");
        assert_eq!(scheduler.num_workers(), threads);
        scheduler.destroy().expect("destroy failed");
        assert_eq!(scheduler.num_workers(), 0);
        assert!(!scheduler.is_running());
    }
}

#[test]
fn test_destroy_drains_queued_tasks() {
    let mut scheduler = Scheduler::new(2).unwrap();
    let executed = Arc::new(AtomicUsize::new(0));

    for _ in 0..50 {
        let executed = executed.clone();
        scheduler.submit(move || {
            thread::sleep(Duration::from_millis(1));
            executed.fetch_add(1, Ordering::SeqCst);
        });
    }

    // Destroy immediately: every queued task runs before the workers quit.
    scheduler.destroy().expect("destroy failed");
    assert_eq!(executed.load(Ordering::SeqCst), 50);
    assert_eq!(scheduler.queued(), 0);
    assert_eq!(scheduler.working(), 0);
}

#[test]
fn test_drop_drains_queued_tasks() {
    let executed = Arc::new(AtomicUsize::new(0));
    {
        let scheduler = Scheduler::new(3).unwrap();
        for _ in 0..30 {
            let executed = executed.clone();
            scheduler.submit(move || {
                executed.fetch_add(1, Ordering::SeqCst);
            });
        }
    }
    assert_eq!(executed.load(Ordering::SeqCst), 30);
}

#[test]
fn test_no_worker_survives_destroy() {
    let mut scheduler = Scheduler::new(4).unwrap();
    let alive = Arc::new(AtomicUsize::new(0));

    // Each task holds a clone until it ends; after destroy only ours remains.
    for _ in 0..16 {
        let alive = alive.clone();
        scheduler.submit(move || {
            alive.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(2));
        });
    }

    scheduler.destroy().unwrap();
    assert_eq!(alive.load(Ordering::SeqCst), 16);
    assert_eq!(Arc::strong_count(&alive), 1);
}

#[test]
fn test_create_twice_matches_destroy_then_create() {
    let executed = Arc::new(AtomicUsize::new(0));

    let mut recreated = Scheduler::new(2).unwrap();
    for _ in 0..10 {
        let executed = executed.clone();
        recreated.submit(move || {
            executed.fetch_add(1, Ordering::SeqCst);
        });
    }
    recreated.create(3).expect("second create failed");
    assert_eq!(executed.load(Ordering::SeqCst), 10);
    assert_eq!(recreated.num_workers(), 3);

    let mut explicit = Scheduler::new(2).unwrap();
    for _ in 0..10 {
        let executed = executed.clone();
        explicit.submit(move || {
            executed.fetch_add(1, Ordering::SeqCst);
        });
    }
    explicit.destroy().unwrap();
    explicit.create(3).unwrap();
    assert_eq!(executed.load(Ordering::SeqCst), 20);
    assert_eq!(explicit.num_workers(), 3);

    // Both pools work the same afterwards.
    for scheduler in [&recreated, &explicit] {
        let executed = executed.clone();
        scheduler.submit(move || {
            executed.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.wait_all();
    }
    assert_eq!(executed.load(Ordering::SeqCst), 22);
}

#[test]
fn test_failed_create_leaves_no_pool() {
    let mut scheduler = Scheduler::new(2).unwrap();
    let result = scheduler.create(0);
    assert!(matches!(result, Err(PoolError::InvalidThreadCount(0))));
    assert!(!scheduler.is_running());

    // The scheduler is still usable: the caller runs queued work.
    let executed = Arc::new(AtomicUsize::new(0));
    let executed_clone = executed.clone();
    scheduler.submit(move || {
        executed_clone.fetch_add(1, Ordering::SeqCst);
    });
    scheduler.wait_all();
    assert_eq!(executed.load(Ordering::SeqCst), 1);

    scheduler.create(1).unwrap();
    assert!(scheduler.is_running());
}

#[test]
fn test_destroy_covers_tasks_submitted_by_tasks() {
    let mut scheduler = Scheduler::without_workers(PoolConfig::default());
    scheduler.create(2).unwrap();
    let executed = Arc::new(AtomicUsize::new(0));
    let handle = scheduler.handle();

    for _ in 0..5 {
        let handle = handle.clone();
        let executed = executed.clone();
        scheduler.submit(move || {
            thread::sleep(Duration::from_millis(2));
            let executed = executed.clone();
            handle.submit(move || {
                executed.fetch_add(1, Ordering::SeqCst);
            });
        });
    }

    scheduler.destroy().unwrap();
    assert_eq!(executed.load(Ordering::SeqCst), 5);
}

#[test]
fn test_destroy_after_failed_create_runs_queued_tasks() {
    let mut scheduler = Scheduler::new(2).unwrap();
    assert!(scheduler.create(0).is_err());

    let executed = Arc::new(AtomicUsize::new(0));
    for _ in 0..5 {
        let executed = executed.clone();
        scheduler.submit(move || {
            executed.fetch_add(1, Ordering::SeqCst);
        });
    }

    scheduler.destroy().expect("destroy failed");
    assert_eq!(executed.load(Ordering::SeqCst), 5);
    assert_eq!(scheduler.queued(), 0);
}

#[test]
fn test_drop_after_failed_create_runs_queued_tasks() {
    let executed = Arc::new(AtomicUsize::new(0));
    {
        let mut scheduler = Scheduler::new(2).unwrap();
        assert!(scheduler.create(0).is_err());
        for _ in 0..5 {
            let executed = executed.clone();
            scheduler.submit(move || {
                executed.fetch_add(1, Ordering::SeqCst);
            });
        }
    }
    assert_eq!(executed.load(Ordering::SeqCst), 5);
}

#[test]
fn test_unspawnable_stack_reports_spawn_error() {
    let config = PoolConfig {
        stack_size: Some(1 << 50),
        ..PoolConfig::default()
    };

    match Scheduler::with_config(4, config.clone()) {
        Err(PoolError::Spawn { index, .. }) => assert_eq!(index, 0),
        Err(other) => panic!("expected a spawn error, got {other}"),
        Ok(_) => panic!("expected a spawn error, got a running pool"),
    }

    // A failed create on an existing scheduler leaves no pool behind.
    let mut scheduler = Scheduler::without_workers(config);
    assert!(matches!(
        scheduler.create(2),
        Err(PoolError::Spawn { index: 0, .. })
    ));
    assert!(!scheduler.is_running());
    assert_eq!(scheduler.num_workers(), 0);
}
