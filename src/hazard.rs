//! Hazard pointer memory reclamation.
//!
//! Used exclusively by [`crate::queue::ms`] to defer freeing the old dummy
//! node a dequeue detaches, since a concurrent dequeuer may still hold a
//! pointer into it via an in-flight CAS. Every other container variant frees
//! nodes immediately on removal.

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

/// Hazard slots available to a single registered thread.
const HP_PER_THREAD: usize = 2;

/// Retire-list length at which a thread scans for reclaimable nodes.
const SCAN_THRESHOLD: usize = 2 * HP_PER_THREAD;

struct HpRecord {
    hazards: [AtomicPtr<()>; HP_PER_THREAD],
    next: AtomicPtr<HpRecord>,
    active: AtomicUsize,
    // Only touched by the thread currently holding this record (`active == 1`
    // guarantees exclusive access), so a plain `UnsafeCell` suffices.
    retire_list: UnsafeCell<Vec<RetiredNode>>,
}

impl HpRecord {
    fn new() -> HpRecord {
        HpRecord {
            hazards: std::array::from_fn(|_| AtomicPtr::new(ptr::null_mut())),
            next: AtomicPtr::new(ptr::null_mut()),
            active: AtomicUsize::new(1),
            retire_list: UnsafeCell::new(Vec::new()),
        }
    }
}

struct RetiredNode {
    ptr: *mut (),
    free_fn: unsafe fn(*mut ()),
}

// SAFETY: retired nodes are only accessed from the thread currently holding
// the owning record (`active == 1` serializes access).
unsafe impl Send for RetiredNode {}

/// Global hazard pointer registry for one container instance.
pub struct HazardDomain {
    records: AtomicPtr<HpRecord>,
}

impl HazardDomain {
    /// Create an empty registry.
    pub fn new() -> HazardDomain {
        HazardDomain {
            records: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Register the calling thread, returning a guard that exposes its
    /// hazard slots and retire list. Safe to call once per operation: an
    /// inactive record left behind by a previous guard is reclaimed first,
    /// so the record list grows only to the peak number of concurrently
    /// registered threads rather than the number of calls, and a record's
    /// retire list survives across reuses.
    pub fn register(&self) -> HazardGuard<'_> {
        let mut current = self.records.load(Ordering::Acquire);
        while !current.is_null() {
            // SAFETY: records are never freed while the domain is alive.
            let record = unsafe { &*current };
            if record
                .active
                .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return HazardGuard {
                    domain: self,
                    record: current,
                };
            }
            current = record.next.load(Ordering::Acquire);
        }

        let record = Box::into_raw(Box::new(HpRecord::new()));
        loop {
            let head = self.records.load(Ordering::Relaxed);
            // SAFETY: `record` was just allocated and is not yet published.
            unsafe {
                (*record).next.store(head, Ordering::Relaxed);
            }
            if self
                .records
                .compare_exchange_weak(head, record, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }
        HazardGuard {
            domain: self,
            record,
        }
    }

    fn collect_hazards(&self) -> Vec<*mut ()> {
        let mut hazards = Vec::new();
        let mut current = self.records.load(Ordering::Acquire);
        while !current.is_null() {
            // SAFETY: records form a singly-linked list that is never
            // unlinked or freed while the domain is alive.
            let record = unsafe { &*current };
            if record.active.load(Ordering::Acquire) != 0 {
                for hp in &record.hazards {
                    let p = hp.load(Ordering::Acquire);
                    if !p.is_null() {
                        hazards.push(p);
                    }
                }
            }
            current = record.next.load(Ordering::Acquire);
        }
        hazards
    }
}

impl Default for HazardDomain {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: the record list is managed entirely through atomics; records are
// never freed while the domain is alive (a fixed, small leak bounded by the
// peak number of concurrently registered threads, not by call count).
unsafe impl Send for HazardDomain {}
unsafe impl Sync for HazardDomain {}

/// Handle into a [`HazardDomain`] held for the duration of one operation.
pub struct HazardGuard<'a> {
    domain: &'a HazardDomain,
    record: *mut HpRecord,
}

impl<'a> HazardGuard<'a> {
    /// Publish `ptr` into hazard slot `slot` (must be `< HP_PER_THREAD`).
    pub fn protect<T>(&self, slot: usize, ptr: *const T) {
        if slot >= HP_PER_THREAD {
            return;
        }
        // SAFETY: `record` is exclusively owned by this guard (active == 1)
        // for the guard's entire lifetime.
        let record = unsafe { &*self.record };
        record.hazards[slot].store(ptr as *mut (), Ordering::Release);
        crate::pr::fence_acquire();
    }

    /// Clear hazard slot `slot`.
    pub fn clear(&self, slot: usize) {
        if slot >= HP_PER_THREAD {
            return;
        }
        let record = unsafe { &*self.record };
        record.hazards[slot].store(ptr::null_mut(), Ordering::Release);
    }

    /// Defer reclamation of `ptr` until no registered thread's hazard slot
    /// names it.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live `QueueNode` pointer that has been fully unlinked
    /// from the queue and will not be dereferenced again by the caller.
    pub unsafe fn retire(&self, ptr: *mut crate::node::QueueNode) {
        let record = &*self.record;
        let retire_list = &mut *record.retire_list.get();
        retire_list.push(RetiredNode {
            ptr: ptr as *mut (),
            free_fn: |p| crate::node::QueueNode::free(p as *mut crate::node::QueueNode),
        });
        if retire_list.len() >= SCAN_THRESHOLD {
            self.scan();
        }
    }

    /// Reclaim any retired nodes no longer named by a live hazard pointer.
    pub fn scan(&self) {
        let hazards = self.domain.collect_hazards();
        // SAFETY: the retire list is only touched by the thread currently
        // holding this record.
        let record = unsafe { &*self.record };
        let retire_list = unsafe { &mut *record.retire_list.get() };
        retire_list.retain(|node| {
            if hazards.contains(&node.ptr) {
                true
            } else {
                // SAFETY: no hazard slot names this pointer, so no thread can
                // be mid-dereference of it.
                unsafe {
                    (node.free_fn)(node.ptr);
                }
                false
            }
        });
    }
}

impl Drop for HazardGuard<'_> {
    fn drop(&mut self) {
        self.clear(0);
        self.clear(1);
        self.scan();
        // SAFETY: record is exclusively owned by this guard until the
        // active flag is released below.
        let record = unsafe { &*self.record };
        record.active.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_clear() {
        let domain = HazardDomain::new();
        let guard = domain.register();
        guard.clear(0);
    }

    #[test]
    fn protect_then_clear() {
        let domain = HazardDomain::new();
        let guard = domain.register();
        let value = Box::into_raw(Box::new(7i32));
        guard.protect(0, value);
        guard.clear(0);
        unsafe {
            drop(Box::from_raw(value));
        }
    }

    #[test]
    fn retire_without_hazard_reclaims_immediately() {
        let domain = HazardDomain::new();
        let guard = domain.register();
        let ptr = crate::node::QueueNode::alloc(5);
        unsafe {
            guard.retire(ptr);
        }
        guard.scan();
        // Not directly observable without instrumentation, but this must not
        // double free or crash.
    }

    #[test]
    fn registration_reuses_inactive_records() {
        let domain = HazardDomain::new();
        {
            let _guard = domain.register();
        }
        let _guard2 = domain.register();
        // The second registration should have reused the first record rather
        // than growing the list; exercised indirectly via collect_hazards
        // not panicking or growing unbounded across many cycles.
        for _ in 0..1000 {
            let g = domain.register();
            drop(g);
        }
    }
}
