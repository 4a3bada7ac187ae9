//! Coarse-locked queue (`Q_lock`, §4.2).

use std::ptr;

use crate::node::QueueNode;
use crate::spinlock::SpinLock;

use super::IntQueue;

struct Inner {
    head: *mut QueueNode,
    tail: *mut QueueNode,
}

/// A FIFO queue guarded by a single spinlock over `head`/`tail`.
pub struct LockQueue {
    inner: SpinLock<Inner>,
}

// SAFETY: all access to `inner` is mediated by the spinlock, so the raw
// pointers it guards never escape to more than one thread at a time.
unsafe impl Send for LockQueue {}
unsafe impl Sync for LockQueue {}

impl LockQueue {
    /// Create an empty queue.
    pub fn new() -> LockQueue {
        LockQueue {
            inner: SpinLock::new(Inner {
                head: ptr::null_mut(),
                tail: ptr::null_mut(),
            }),
        }
    }
}

impl Default for LockQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl IntQueue for LockQueue {
    fn enqueue(&self, v: i64) {
        let node = QueueNode::alloc(v);
        let mut inner = self.inner.lock();
        if inner.tail.is_null() {
            inner.head = node;
            inner.tail = node;
        } else {
            // SAFETY: `inner.tail` is non-null and owned exclusively under the lock.
            unsafe {
                (*inner.tail)
                    .next
                    .store(node, std::sync::atomic::Ordering::Relaxed);
            }
            inner.tail = node;
        }
    }

    fn dequeue(&self) -> Option<i64> {
        let mut inner = self.inner.lock();
        if inner.head.is_null() {
            return None;
        }
        let old = inner.head;
        // SAFETY: `old` was read under the lock; it is reachable only from
        // this queue while the lock is held.
        let next = unsafe { (*old).next.load(std::sync::atomic::Ordering::Relaxed) };
        inner.head = next;
        if next.is_null() {
            inner.tail = ptr::null_mut();
        }
        let value = unsafe { (*old).value };
        drop(inner);
        unsafe {
            QueueNode::free(old);
        }
        Some(value)
    }
}

impl Drop for LockQueue {
    fn drop(&mut self) {
        while self.dequeue().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_queue_is_empty() {
        let q = LockQueue::new();
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn fifo_order_single_thread() {
        let q = LockQueue::new();
        q.enqueue(10);
        q.enqueue(20);
        q.enqueue(30);
        assert_eq!(q.dequeue(), Some(10));
        assert_eq!(q.dequeue(), Some(20));
        assert_eq!(q.dequeue(), Some(30));
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn interleaved_enqueue_dequeue() {
        let q = LockQueue::new();
        q.enqueue(1);
        assert_eq!(q.dequeue(), Some(1));
        q.enqueue(2);
        q.enqueue(3);
        assert_eq!(q.dequeue(), Some(2));
        q.enqueue(4);
        assert_eq!(q.dequeue(), Some(3));
        assert_eq!(q.dequeue(), Some(4));
        assert_eq!(q.dequeue(), None);
    }
}
