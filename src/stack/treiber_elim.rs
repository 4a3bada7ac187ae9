//! Treiber stack with an elimination fast path (`S_treiber_elim`, §4.6).

use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::backoff::Backoff;
use crate::elimination::EliminationArray;
use crate::node::StackNode;

use super::IntStack;

/// A Treiber stack that detours through a shared elimination array on CAS
/// contention, letting a push and a pop cancel out without touching `head`.
pub struct TreiberEliminationStack {
    head: AtomicPtr<StackNode>,
    elim: EliminationArray,
}

impl TreiberEliminationStack {
    /// Create an empty stack with an elimination array of `cells` slots.
    pub fn new(cells: usize) -> TreiberEliminationStack {
        TreiberEliminationStack {
            head: AtomicPtr::new(ptr::null_mut()),
            elim: EliminationArray::new(cells),
        }
    }

    fn try_cas_push(&self, node: *mut StackNode) -> bool {
        let head = self.head.load(Ordering::Acquire);
        // SAFETY: `node` is exclusively owned by this call until the CAS succeeds.
        unsafe {
            (*node).next = head;
        }
        self.head
            .compare_exchange_weak(head, node, Ordering::Release, Ordering::Acquire)
            .is_ok()
    }

    fn try_cas_pop(&self) -> Option<Option<i64>> {
        let head = self.head.load(Ordering::Acquire);
        if head.is_null() {
            return Some(None);
        }
        // SAFETY: `head` observed non-null and still reachable from `self.head`.
        let next = unsafe { (*head).next };
        if self
            .head
            .compare_exchange_weak(head, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            // SAFETY: the CAS above gives exclusive ownership of the detached node.
            let value = unsafe {
                let v = (*head).value;
                StackNode::free(head);
                v
            };
            return Some(Some(value));
        }
        None
    }
}

impl IntStack for TreiberEliminationStack {
    fn push(&self, v: i64) {
        let node = StackNode::alloc(v);
        let mut backoff = Backoff::new();
        loop {
            if self.try_cas_push(node) {
                return;
            }
            if self.elim.try_push(v) {
                // SAFETY: the elimination exchange completed; the node was
                // never linked into the stack and is solely owned here.
                unsafe {
                    StackNode::free(node);
                }
                return;
            }
            backoff.spin();
        }
    }

    fn pop(&self) -> Option<i64> {
        let mut backoff = Backoff::new();
        loop {
            match self.try_cas_pop() {
                Some(None) => {
                    // Main stack observed empty; one last elimination check
                    // before reporting empty.
                    return self.elim.try_pop();
                }
                Some(some_value) => return some_value,
                None => {
                    if let Some(v) = self.elim.try_pop() {
                        return Some(v);
                    }
                    backoff.spin();
                }
            }
        }
    }
}

impl Drop for TreiberEliminationStack {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn lifo_single_thread() {
        let s = TreiberEliminationStack::new(4);
        s.push(1);
        s.push(2);
        assert_eq!(s.pop(), Some(2));
        assert_eq!(s.pop(), Some(1));
        assert_eq!(s.pop(), None);
    }

    #[test]
    fn elimination_heavy_conserves_values() {
        let stack = Arc::new(TreiberEliminationStack::new(4));
        let values_per_thread = 200;
        let n_pushers = 4;
        let n_poppers = 4;
        let total = n_pushers * values_per_thread;

        let pushers: Vec<_> = (0..n_pushers)
            .map(|t| {
                let s = Arc::clone(&stack);
                thread::spawn(move || {
                    for i in 0..values_per_thread {
                        s.push((t * values_per_thread + i) as i64);
                    }
                })
            })
            .collect();

        let seen = Arc::new(std::sync::Mutex::new(HashSet::new()));
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let poppers: Vec<_> = (0..n_poppers)
            .map(|_| {
                let s = Arc::clone(&stack);
                let seen = Arc::clone(&seen);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    while !done.load(std::sync::atomic::Ordering::Acquire) {
                        if let Some(v) = s.pop() {
                            seen.lock().unwrap().insert(v);
                        } else {
                            thread::yield_now();
                        }
                    }
                    while let Some(v) = s.pop() {
                        seen.lock().unwrap().insert(v);
                    }
                })
            })
            .collect();

        for p in pushers {
            p.join().unwrap();
        }
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while seen.lock().unwrap().len() < total && std::time::Instant::now() < deadline {
            thread::yield_now();
        }
        done.store(true, std::sync::atomic::Ordering::Release);
        for p in poppers {
            p.join().unwrap();
        }

        assert_eq!(seen.lock().unwrap().len(), total);
    }
}
