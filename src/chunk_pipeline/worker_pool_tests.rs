use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rand::Rng;

//==============================================================================
// Ordering
//==============================================================================

#[test]
fn test_results_are_delivered_in_key_order_under_random_latency() {
    let mut pool: WorkerPool<u64> = WorkerPool::new("order-test", 8, 64).unwrap();
    let mut rng = rand::rng();
    let mut delivered = Vec::new();

    for key in 0..1000u64 {
        let delay_us: u64 = rng.random_range(0..400);
        pool.submit(key, move |_| {
            thread::sleep(Duration::from_micros(delay_us));
            Ok(key * 3)
        })
        .unwrap();
        for (k, v) in pool.drain_ready().unwrap() {
            delivered.push((k, v));
        }
    }
    for item in pool.results() {
        delivered.push(item.unwrap());
    }
    pool.shutdown().unwrap();

    assert_eq!(delivered.len(), 1000);
    for (i, (key, value)) in delivered.iter().enumerate() {
        assert_eq!(*key, i as u64);
        assert_eq!(*value, i as u64 * 3);
    }
}

#[test]
fn test_reversed_completion_is_reordered() {
    let mut pool: WorkerPool<&'static str> = WorkerPool::new("reverse", 3, 3).unwrap();
    pool.submit(0, |_| {
        thread::sleep(Duration::from_millis(60));
        Ok("first")
    })
    .unwrap();
    pool.submit(1, |_| {
        thread::sleep(Duration::from_millis(30));
        Ok("second")
    })
    .unwrap();
    pool.submit(2, |_| Ok("third")).unwrap();

    let values: Vec<&str> = pool.results().map(|r| r.unwrap().1).collect();
    assert_eq!(values, vec!["first", "second", "third"]);
}

//==============================================================================
// Concurrency Bounds & Backpressure
//==============================================================================

#[test]
fn test_concurrency_never_exceeds_worker_count() {
    let workers = 3;
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let mut pool: WorkerPool<()> = WorkerPool::new("bounded", workers, 16).unwrap();

    for key in 0..48u64 {
        let running = running.clone();
        let peak = peak.clone();
        pool.submit(key, move |_| {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(2));
            running.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        assert!(pool.outstanding() <= 16);
        pool.drain_ready().unwrap();
    }
    for item in pool.results() {
        item.unwrap();
    }
    pool.shutdown().unwrap();

    assert!(peak.load(Ordering::SeqCst) <= workers);
    assert!(peak.load(Ordering::SeqCst) >= 1);
}

#[test]
fn test_submit_blocks_until_window_has_room() {
    let mut pool: WorkerPool<u64> = WorkerPool::new("window", 2, 2).unwrap();
    for key in 0..10u64 {
        pool.submit(key, move |_| Ok(key)).unwrap();
        assert!(pool.outstanding() <= 2);
    }
    let keys: Vec<u64> = pool.results().map(|r| r.unwrap().0).collect();
    assert_eq!(keys, (0..10).collect::<Vec<_>>());
}

//==============================================================================
// Failure, Shutdown & Misuse
//==============================================================================

#[test]
fn test_task_error_surfaces_with_its_key() {
    let mut pool: WorkerPool<u8> = WorkerPool::new("fail", 2, 4).unwrap();
    pool.submit(0, |_| Ok(1)).unwrap();
    pool.submit(1, |_| Err(ChromaError::SourceUnavailable("gone".to_string())))
        .unwrap();

    let mut failure = None;
    for item in pool.results() {
        if let Err(err) = item {
            failure = Some(err);
            break;
        }
    }
    match failure {
        Some(ChromaError::TaskFailed {
            key,
            message,
            source,
        }) => {
            assert_eq!(key, 1);
            assert!(message.contains("gone"));
            assert!(matches!(
                source.as_deref(),
                Some(ChromaError::SourceUnavailable(_))
            ));
        }
        other => panic!("expected TaskFailed, got {:?}", other),
    }
    pool.shutdown().unwrap();
}

#[test]
fn test_panicking_task_becomes_failure() {
    let mut pool: WorkerPool<u8> = WorkerPool::new("panic", 1, 1).unwrap();
    pool.submit(0, |_| -> Result<u8, ChromaError> { panic!("kaboom") })
        .unwrap();
    match pool.next_ordered() {
        Some(Err(ChromaError::TaskFailed {
            key: 0,
            message,
            source,
        })) => {
            assert!(message.contains("kaboom"));
            assert!(source.is_none());
        }
        other => panic!("expected TaskFailed, got {:?}", other),
    }
}

#[test]
fn test_submit_after_shutdown_is_rejected() {
    let mut pool: WorkerPool<u8> = WorkerPool::new("closed", 2, 2).unwrap();
    pool.submit(0, |_| {
        thread::sleep(Duration::from_millis(10));
        Ok(7)
    })
    .unwrap();
    pool.shutdown().unwrap();

    assert_eq!(pool.in_flight(), 0);
    assert!(pool.is_closed());
    assert!(matches!(pool.submit(1, |_| Ok(1)), Err(ChromaError::PoolClosed)));
    // Work finished before shutdown is still retrievable.
    assert_eq!(pool.drain_ready().unwrap(), vec![(0, 7)]);
}

#[test]
fn test_duplicate_and_stale_keys_are_rejected() {
    let mut pool: WorkerPool<u8> = WorkerPool::new("dupes", 1, 4).unwrap();
    pool.submit(0, |_| Ok(0)).unwrap();
    assert!(matches!(
        pool.submit(0, |_| Ok(0)),
        Err(ChromaError::InternalError(_))
    ));
    assert_eq!(pool.next_ordered().unwrap().unwrap(), (0, 0));
    assert!(matches!(
        pool.submit(0, |_| Ok(0)),
        Err(ChromaError::InternalError(_))
    ));
}

#[test]
fn test_key_gap_is_reported_instead_of_hanging() {
    let mut pool: WorkerPool<u8> = WorkerPool::new("gap", 1, 4).unwrap();
    pool.submit(1, |_| Ok(1)).unwrap();
    match pool.next_ordered() {
        Some(Err(ChromaError::InternalError(msg))) => assert!(msg.contains("never submitted")),
        other => panic!("expected gap error, got {:?}", other),
    }
}

//==============================================================================
// Progress Events
//==============================================================================

struct Totals(Arc<Mutex<u64>>);

impl ProgressObserver for Totals {
    fn on_progress(&mut self, _label: &str, completed: u64, _total: Option<u64>) {
        *self.0.lock().unwrap() = completed;
    }
}

#[test]
fn test_progress_events_reach_the_observer() {
    let seen = Arc::new(Mutex::new(0));
    let mut pool: WorkerPool<()> = WorkerPool::new("progress", 2, 8)
        .unwrap()
        .with_observer(Box::new(Totals(seen.clone())));
    pool.begin_progress("units", Some(40));

    for key in 0..4u64 {
        pool.submit(key, |progress| {
            progress.report(4);
            progress.report(6);
            Ok(())
        })
        .unwrap();
    }
    let delivered = pool.results().filter(|r| r.is_ok()).count();
    assert_eq!(delivered, 4);
    // Progress events are sent before each task's Success, so all have been absorbed.
    assert_eq!(*seen.lock().unwrap(), 40);
}
