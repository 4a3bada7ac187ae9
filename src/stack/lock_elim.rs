//! Coarse-locked stack with an elimination fast path (`S_lock_elim`, §4.7).

use crate::elimination::EliminationArray;
use crate::node::StackNode;
use crate::spinlock::SpinLock;

use super::IntStack;

/// A coarse-locked stack whose popper may *offer* to receive a value through
/// the elimination array, not merely scan for an existing push offer — the
/// distinguishing trait from [`super::TreiberEliminationStack`].
pub struct LockEliminationStack {
    head: SpinLock<*mut StackNode>,
    elim: EliminationArray,
}

// SAFETY: all access to `head` is mediated by the spinlock, so the raw
// pointer it guards never escapes to more than one thread at a time.
unsafe impl Send for LockEliminationStack {}
unsafe impl Sync for LockEliminationStack {}

impl LockEliminationStack {
    /// Create an empty stack with an elimination array of `cells` slots.
    pub fn new(cells: usize) -> LockEliminationStack {
        LockEliminationStack {
            head: SpinLock::new(std::ptr::null_mut()),
            elim: EliminationArray::new(cells),
        }
    }

    fn try_lock_push(&self, v: i64) -> bool {
        match self.head.try_lock() {
            Some(mut head) => {
                let node = StackNode::alloc(v);
                // SAFETY: `node` is freshly allocated, not yet shared.
                unsafe {
                    (*node).next = *head;
                }
                *head = node;
                true
            }
            None => false,
        }
    }

    fn try_lock_pop(&self) -> Option<Option<i64>> {
        let mut head = self.head.try_lock()?;
        if head.is_null() {
            return Some(None);
        }
        let old = *head;
        // SAFETY: `old` was read under the lock; no concurrent mutator exists.
        unsafe {
            *head = (*old).next;
            let value = (*old).value;
            drop(head);
            StackNode::free(old);
            Some(Some(value))
        }
    }
}

impl IntStack for LockEliminationStack {
    fn push(&self, v: i64) {
        if self.try_lock_push(v) {
            return;
        }
        if self.elim.try_push(v) {
            return;
        }
        // Fall back to blocking on the lock.
        let mut head = self.head.lock();
        let node = StackNode::alloc(v);
        unsafe {
            (*node).next = *head;
        }
        *head = node;
    }

    fn pop(&self) -> Option<i64> {
        if let Some(v) = self.elim.try_pop() {
            return Some(v);
        }
        match self.try_lock_pop() {
            Some(result) => result,
            None => self.elim.try_pop_offer().or_else(|| {
                let mut head = self.head.lock();
                if head.is_null() {
                    return None;
                }
                let old = *head;
                unsafe {
                    *head = (*old).next;
                    let value = (*old).value;
                    drop(head);
                    StackNode::free(old);
                    Some(value)
                }
            }),
        }
    }
}

impl Drop for LockEliminationStack {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}
