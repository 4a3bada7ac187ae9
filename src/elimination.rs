//! Shared push/pop rendezvous array used by the elimination-augmented variants.
//!
//! A cell lets a pusher and a popper cancel each other out without touching
//! the main stack. See [`CellStatus`] for the state diagram.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU8, Ordering};

use rand::Rng;

use crate::backoff::Backoff;

/// Status of a single elimination cell.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStatus {
    /// No pending operation.
    Empty = 0,
    /// A pusher has deposited a value and is waiting for a popper.
    Push = 1,
    /// A popper has claimed a deposited value (or is offering to receive one).
    Pop = 2,
}

impl CellStatus {
    fn from_u8(v: u8) -> CellStatus {
        match v {
            0 => CellStatus::Empty,
            1 => CellStatus::Push,
            2 => CellStatus::Pop,
            _ => unreachable!("elimination cell status out of range"),
        }
    }
}

struct Cell {
    status: AtomicU8,
    value: UnsafeCell<i64>,
}

// SAFETY: `value` is only read/written by a thread that has just won an
// atomic CAS on `status` granting it exclusive access to the slot.
unsafe impl Sync for Cell {}

impl Cell {
    fn new() -> Cell {
        Cell {
            status: AtomicU8::new(CellStatus::Empty as u8),
            value: UnsafeCell::new(0),
        }
    }

    fn status(&self) -> CellStatus {
        CellStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn cas_status(&self, expected: CellStatus, new: CellStatus) -> bool {
        self.status
            .compare_exchange(
                expected as u8,
                new as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// The default number of cells in a container's elimination array.
pub const DEFAULT_CELLS: usize = 8;

/// Number of bounded `snooze` iterations a pusher or popper waits on a
/// claimed cell before checking whether the peer has completed the handshake.
const SPIN_ROUNDS: u32 = 16;

/// A fixed-size array of elimination cells shared by push and pop attempts.
pub struct EliminationArray {
    cells: Vec<Cell>,
}

impl EliminationArray {
    /// Create an elimination array with `cells` slots (at least 1).
    pub fn new(cells: usize) -> EliminationArray {
        let cells = cells.max(1);
        let mut v = Vec::with_capacity(cells);
        for _ in 0..cells {
            v.push(Cell::new());
        }
        EliminationArray { cells: v }
    }

    fn random_index(&self) -> usize {
        rand::thread_rng().gen_range(0..self.cells.len())
    }

    /// Attempt to hand `value` off to a waiting popper via the elimination
    /// array. Returns `true` if a popper completed the exchange.
    ///
    /// Used by the Treiber-elimination and lock-elimination pushers (§4.6/§4.7):
    /// claim a random cell, publish the value, wait briefly, then check
    /// whether a popper claimed it.
    pub fn try_push(&self, value: i64) -> bool {
        let idx = self.random_index();
        let cell = &self.cells[idx];

        if !cell.cas_status(CellStatus::Empty, CellStatus::Push) {
            return false;
        }

        // SAFETY: we hold exclusive write access to this cell's value, having
        // just transitioned it from Empty to Push.
        unsafe {
            *cell.value.get() = value;
        }

        let mut backoff = Backoff::new();
        for _ in 0..SPIN_ROUNDS {
            if cell.status() == CellStatus::Pop {
                break;
            }
            backoff.snooze();
        }

        if cell.cas_status(CellStatus::Pop, CellStatus::Empty) {
            true
        } else {
            // No popper arrived in time; withdraw the offer.
            cell.status.store(CellStatus::Empty as u8, Ordering::Release);
            false
        }
    }

    /// Attempt to claim a value already posted by a pusher.
    ///
    /// Used by every variant's popper: scan a random cell for `Push` and
    /// claim it.
    pub fn try_pop(&self) -> Option<i64> {
        let idx = self.random_index();
        let cell = &self.cells[idx];

        if !cell.cas_status(CellStatus::Push, CellStatus::Pop) {
            return None;
        }

        // SAFETY: the CAS above transferred ownership of `value` to us.
        let value = unsafe { *cell.value.get() };
        Some(value)
    }

    /// Offer to receive a value, waiting briefly for a pusher to complete the
    /// handshake.
    ///
    /// Used only by the locked+elimination popper (§4.7), which may initiate
    /// the rendezvous instead of merely scanning for an existing offer.
    ///
    /// `try_push` only ever completes a cell it put into `Push` itself; it
    /// never inspects or completes a cell some other thread already set to
    /// `Pop`. So the wait loop below never actually observes a pusher
    /// handing off a value through a `Pop`-status cell — this mirrors
    /// `stack_elim::pop`'s identical gap in the original implementation,
    /// where the equivalent wait is also never satisfied by `stack_elim::push`.
    /// This method still serves its purpose as a bounded-wait withdrawal
    /// primitive for callers that fall back to the main stack on `None`.
    pub fn try_pop_offer(&self) -> Option<i64> {
        let idx = self.random_index();
        let cell = &self.cells[idx];

        if !cell.cas_status(CellStatus::Empty, CellStatus::Pop) {
            return self.try_pop();
        }

        let mut backoff = Backoff::new();
        for _ in 0..SPIN_ROUNDS {
            if cell.status() == CellStatus::Empty {
                // SAFETY: a pusher observed our Pop offer, wrote `value`, and
                // released the cell back to Empty to hand it to us.
                let value = unsafe { *cell.value.get() };
                return Some(value);
            }
            backoff.snooze();
        }

        // Nobody arrived; withdraw the offer.
        cell.cas_status(CellStatus::Pop, CellStatus::Empty);
        None
    }

    /// Drain the array for one flat-combining pass (§4.8).
    ///
    /// Every `Push` cell is paired with a waiting `Pop` cell directly
    /// (transferring the value and resetting both to `Empty`); any leftover
    /// `Pop` cell is serviced by calling `pop_from_main`, whose result is
    /// written back into the cell. Leftover `Push` values (no waiting
    /// popper) are returned for the caller to link onto the main stack in a
    /// single batch.
    pub fn combine(&self, mut pop_from_main: impl FnMut() -> Option<i64>) -> Vec<i64> {
        let pushes: Vec<usize> = self
            .cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.status() == CellStatus::Push)
            .map(|(i, _)| i)
            .collect();
        let pops: Vec<usize> = self
            .cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.status() == CellStatus::Pop)
            .map(|(i, _)| i)
            .collect();

        let mut unmatched_pushes = Vec::new();
        let mut pop_iter = pops.into_iter();
        for push_idx in pushes {
            let push_cell = &self.cells[push_idx];
            match pop_iter.next() {
                Some(pop_idx) => {
                    let pop_cell = &self.cells[pop_idx];
                    // SAFETY: both cells are held in their claimed states and
                    // the combiner is the sole mutator while holding the lock.
                    let value = unsafe { *push_cell.value.get() };
                    unsafe {
                        *pop_cell.value.get() = value;
                    }
                    pop_cell.status.store(CellStatus::Empty as u8, Ordering::Release);
                    push_cell.status.store(CellStatus::Empty as u8, Ordering::Release);
                }
                None => {
                    let value = unsafe { *push_cell.value.get() };
                    push_cell.status.store(CellStatus::Empty as u8, Ordering::Release);
                    unmatched_pushes.push(value);
                }
            }
        }
        for pop_idx in pop_iter {
            let pop_cell = &self.cells[pop_idx];
            if let Some(value) = pop_from_main() {
                unsafe {
                    *pop_cell.value.get() = value;
                }
                pop_cell.status.store(CellStatus::Empty as u8, Ordering::Release);
            }
            // If the main stack was also empty, leave the cell in `Pop`
            // state rather than fabricate a value — the waiting popper's own
            // backoff will time out and it withdraws its offer itself.
        }

        unmatched_pushes
    }
}
