//! Cross-variant integration tests for the queue family.
//!
//! Mirrors SPEC_FULL.md §8: FIFO ordering in a single thread, conservation of
//! values under concurrent contention, and the empty-report edge case.

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use concurrent_buffers::queue::{by_name, LockQueue, MsQueue};
use concurrent_buffers::IntQueue;

fn assert_fifo_single_thread(queue: &dyn IntQueue) {
    queue.enqueue(1);
    queue.enqueue(2);
    queue.enqueue(3);
    assert_eq!(queue.dequeue(), Some(1));
    assert_eq!(queue.dequeue(), Some(2));
    assert_eq!(queue.dequeue(), Some(3));
    assert_eq!(queue.dequeue(), None);
}

#[test]
fn lock_queue_fifo_and_empty_report() {
    let q = LockQueue::new();
    assert_fifo_single_thread(&q);
    assert_eq!(q.dequeue(), None);
}

#[test]
fn ms_queue_fifo_and_empty_report() {
    let q = MsQueue::new();
    assert_fifo_single_thread(&q);
    assert_eq!(q.dequeue(), None);
}

/// Scenario #6: if an enqueue fully precedes a dequeue in real time (observed
/// by a happens-before relationship, here a thread join), the value must be
/// observable to the dequeuer — no lost-update window.
#[test]
fn ms_queue_real_time_order_across_threads() {
    let q = Arc::new(MsQueue::new());
    q.enqueue(100);
    let q2 = Arc::clone(&q);
    let t = thread::spawn(move || q2.dequeue());
    assert_eq!(t.join().unwrap(), Some(100));
}

#[test]
fn lock_queue_real_time_order_across_threads() {
    let q = Arc::new(LockQueue::new());
    q.enqueue(100);
    let q2 = Arc::clone(&q);
    let t = thread::spawn(move || q2.dequeue());
    assert_eq!(t.join().unwrap(), Some(100));
}

fn concurrent_conservation(queue: Arc<dyn IntQueue>, n_threads: usize, n_per_thread: usize) {
    let total = n_threads * n_per_thread;

    let enqueuers: Vec<_> = (0..n_threads)
        .map(|t| {
            let q = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..n_per_thread {
                    q.enqueue((t * n_per_thread + i) as i64);
                }
            })
        })
        .collect();

    let seen = Arc::new(std::sync::Mutex::new(HashSet::new()));
    let done = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let dequeuers: Vec<_> = (0..n_threads)
        .map(|_| {
            let q = Arc::clone(&queue);
            let seen = Arc::clone(&seen);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    if let Some(v) = q.dequeue() {
                        seen.lock().unwrap().insert(v);
                    } else {
                        thread::yield_now();
                    }
                }
                while let Some(v) = q.dequeue() {
                    seen.lock().unwrap().insert(v);
                }
            })
        })
        .collect();

    for e in enqueuers {
        e.join().unwrap();
    }
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(3);
    while seen.lock().unwrap().len() < total && std::time::Instant::now() < deadline {
        thread::yield_now();
    }
    done.store(true, Ordering::Release);
    for d in dequeuers {
        d.join().unwrap();
    }

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), total, "lost or duplicated values under contention");
}

#[test]
fn lock_queue_conserves_values_under_contention() {
    concurrent_conservation(Arc::new(LockQueue::new()), 8, 200);
}

#[test]
fn ms_queue_conserves_values_under_contention() {
    concurrent_conservation(Arc::new(MsQueue::new()), 8, 200);
}

/// Hammers register/retire cycles on the hazard domain to check that the
/// queue survives sustained churn without corrupting its node chain —
/// a regression guard for the record-reuse fix in `hazard.rs`.
#[test]
fn ms_queue_survives_heavy_register_retire_churn() {
    let queue = Arc::new(MsQueue::new());
    let n_threads = 16;
    let ops_per_thread = 200;
    let total_enqueued = n_threads * ops_per_thread;
    let dequeued = Arc::new(std::sync::atomic::AtomicUsize::new(0));

    let workers: Vec<_> = (0..n_threads)
        .map(|t| {
            let q = Arc::clone(&queue);
            let dequeued = Arc::clone(&dequeued);
            thread::spawn(move || {
                for i in 0..ops_per_thread {
                    q.enqueue((t * ops_per_thread + i) as i64);
                    if q.dequeue().is_some() {
                        dequeued.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    let mut remaining = 0;
    while queue.dequeue().is_some() {
        remaining += 1;
    }
    assert_eq!(
        dequeued.load(Ordering::Relaxed) + remaining,
        total_enqueued,
        "every enqueued value must be accounted for exactly once"
    );
}

#[test]
fn by_name_constructs_every_known_variant() {
    for name in ["sgl", "mns"] {
        assert!(by_name(name).is_some(), "missing variant {name}");
    }
    assert!(by_name("bogus").is_none());
}
