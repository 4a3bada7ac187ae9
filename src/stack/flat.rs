//! Flat-combining stack (`S_flat`, §4.8).

use crate::elimination::EliminationArray;
use crate::node::StackNode;
use crate::spinlock::SpinLock;

use super::IntStack;

/// A coarse-locked stack in which the lock holder (the "combiner") drains the
/// shared elimination array before and after its own operation, servicing
/// contending peers' push/pop intents in one batch per lock hold.
pub struct FlatCombiningStack {
    head: SpinLock<*mut StackNode>,
    elim: EliminationArray,
}

// SAFETY: all access to `head` is mediated by the spinlock, so the raw
// pointer it guards never escapes to more than one thread at a time.
unsafe impl Send for FlatCombiningStack {}
unsafe impl Sync for FlatCombiningStack {}

impl FlatCombiningStack {
    /// Create an empty stack with an elimination array of `cells` slots.
    pub fn new(cells: usize) -> FlatCombiningStack {
        FlatCombiningStack {
            head: SpinLock::new(std::ptr::null_mut()),
            elim: EliminationArray::new(cells),
        }
    }

    /// Link a batch of freshly-allocated nodes onto `head` with a single
    /// pointer store, per the Design Notes §9 batching decision — one splice
    /// per combiner pass rather than one atomic store per matched push.
    fn link_batch(head: &mut *mut StackNode, values: &[i64]) {
        for &v in values {
            let node = StackNode::alloc(v);
            // SAFETY: `node` is freshly allocated and owned exclusively here.
            unsafe {
                (*node).next = *head;
            }
            *head = node;
        }
    }

    fn pop_from_main(head: &mut *mut StackNode) -> Option<i64> {
        if head.is_null() {
            return None;
        }
        let old = *head;
        // SAFETY: caller holds the lock guarding `head`.
        unsafe {
            *head = (*old).next;
            let v = (*old).value;
            StackNode::free(old);
            Some(v)
        }
    }

    fn combine_and<R>(&self, own_op: impl FnOnce(&mut *mut StackNode) -> R) -> R {
        let mut head = self.head.lock();
        let unmatched_pushes = self.elim.combine(|| Self::pop_from_main(&mut head));
        Self::link_batch(&mut head, &unmatched_pushes);
        own_op(&mut head)
    }
}

impl IntStack for FlatCombiningStack {
    fn push(&self, v: i64) {
        match self.head.try_lock() {
            Some(mut head) => {
                let unmatched_pushes = self.elim.combine(|| Self::pop_from_main(&mut head));
                Self::link_batch(&mut head, &unmatched_pushes);
                Self::link_batch(&mut head, &[v]);
            }
            None => {
                if self.elim.try_push(v) {
                    return;
                }
                self.combine_and(|head| Self::link_batch(head, &[v]));
            }
        }
    }

    fn pop(&self) -> Option<i64> {
        if let Some(v) = self.elim.try_pop() {
            return Some(v);
        }
        match self.head.try_lock() {
            Some(mut head) => {
                let unmatched_pushes = self.elim.combine(|| Self::pop_from_main(&mut head));
                Self::link_batch(&mut head, &unmatched_pushes);
                Self::pop_from_main(&mut head)
            }
            None => self
                .elim
                .try_pop_offer()
                .or_else(|| self.combine_and(|head| Self::pop_from_main(head))),
        }
    }
}

impl Drop for FlatCombiningStack {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}
