//! Queue variants: coarse-locked and Michael-Scott.

mod lock;
mod ms;

pub use lock::LockQueue;
pub use ms::MsQueue;

/// Common contract implemented by every queue variant.
pub trait IntQueue: Send + Sync {
    /// Enqueue `v` at the tail. Never fails.
    fn enqueue(&self, v: i64);

    /// Dequeue the head value, or `None` if the queue is empty.
    fn dequeue(&self) -> Option<i64>;
}

/// Construct a boxed queue variant by its harness CLI name.
///
/// Recognized names: `sgl` (coarse-locked), `mns` (Michael-Scott).
pub fn by_name(name: &str) -> Option<Box<dyn IntQueue>> {
    match name {
        "sgl" => Some(Box::new(LockQueue::new())),
        "mns" => Some(Box::new(MsQueue::new())),
        _ => None,
    }
}
