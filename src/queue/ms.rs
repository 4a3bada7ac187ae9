//! Michael-Scott lock-free queue (`Q_ms`, §4.4).

use std::sync::atomic::{AtomicPtr, Ordering};

use crate::backoff::Backoff;
use crate::hazard::HazardDomain;
use crate::node::QueueNode;

use super::IntQueue;

/// A lock-free FIFO with a dummy head node and two-phase tail advance.
///
/// The dummy node detached on each successful dequeue is reclaimed through
/// [`crate::hazard`] rather than freed in place, since a concurrent dequeuer
/// may still hold a raw pointer to it via an in-flight CAS (§4.9).
pub struct MsQueue {
    head: AtomicPtr<QueueNode>,
    tail: AtomicPtr<QueueNode>,
    hazards: HazardDomain,
}

impl MsQueue {
    /// Create an empty queue, seeded with a dummy node.
    pub fn new() -> MsQueue {
        let dummy = QueueNode::alloc_dummy();
        MsQueue {
            head: AtomicPtr::new(dummy),
            tail: AtomicPtr::new(dummy),
            hazards: HazardDomain::new(),
        }
    }
}

impl Default for MsQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl IntQueue for MsQueue {
    fn enqueue(&self, v: i64) {
        let node = QueueNode::alloc(v);
        let mut backoff = Backoff::new();
        loop {
            let last = self.tail.load(Ordering::Acquire);
            // SAFETY: `last` is reachable from `tail`; the queue never frees
            // a node still reachable from `tail`.
            let lnext = unsafe { (*last).next.load(Ordering::Acquire) };

            if last == self.tail.load(Ordering::Acquire) {
                if lnext.is_null() {
                    // SAFETY: `last` is still the tail we observed; linking a
                    // freshly allocated node is safe.
                    let linked = unsafe {
                        (*last)
                            .next
                            .compare_exchange(
                                std::ptr::null_mut(),
                                node,
                                Ordering::Release,
                                Ordering::Relaxed,
                            )
                            .is_ok()
                    };
                    if linked {
                        let _ = self.tail.compare_exchange(
                            last,
                            node,
                            Ordering::Release,
                            Ordering::Relaxed,
                        );
                        return;
                    }
                } else {
                    // Help a lagging enqueuer finish swinging the tail.
                    let _ = self.tail.compare_exchange(
                        last,
                        lnext,
                        Ordering::Release,
                        Ordering::Relaxed,
                    );
                }
            }
            backoff.spin();
        }
    }

    fn dequeue(&self) -> Option<i64> {
        let guard = self.hazards.register();
        let mut backoff = Backoff::new();
        loop {
            let first = self.head.load(Ordering::Acquire);
            guard.protect(0, first);
            if first != self.head.load(Ordering::Acquire) {
                // `first` was retired between the load and the protect; retry.
                continue;
            }

            let last = self.tail.load(Ordering::Acquire);
            // SAFETY: `first` is protected by the hazard pointer above, so it
            // cannot be reclaimed while we dereference it.
            let fnext = unsafe { (*first).next.load(Ordering::Acquire) };

            if first != self.head.load(Ordering::Acquire) {
                continue;
            }

            if fnext.is_null() {
                guard.clear(0);
                return None;
            }

            if first == last {
                // Tail lags behind; help it catch up and retry.
                let _ = self.tail.compare_exchange(
                    last,
                    fnext,
                    Ordering::Release,
                    Ordering::Relaxed,
                );
                backoff.spin();
                continue;
            }

            // Read the value before detaching `first`, never after.
            // SAFETY: `fnext` is reachable from `first.next`; it cannot be
            // concurrently freed before `first` itself is unlinked.
            let value = unsafe { (*fnext).value };

            if self
                .head
                .compare_exchange(first, fnext, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                guard.clear(0);
                // SAFETY: the CAS above exclusively detached `first`; it is
                // retired rather than freed in place because a concurrent
                // dequeuer may still hold a hazard-protected reference to it
                // from the load above.
                unsafe {
                    guard.retire(first);
                }
                return Some(value);
            }
            backoff.spin();
        }
    }
}

impl Drop for MsQueue {
    fn drop(&mut self) {
        while self.dequeue().is_some() {}
        // SAFETY: no other thread can reach the queue at this point; the
        // remaining dummy node is the sole surviving allocation.
        let dummy = self.head.load(Ordering::Relaxed);
        unsafe {
            QueueNode::free(dummy);
        }
    }
}
