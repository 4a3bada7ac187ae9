//! # Concurrent Buffers
//!
//! A library of concurrent LIFO (stack) and FIFO (queue) containers holding
//! `i64` payloads, built around the same CAS/backoff/spinlock primitives used
//! throughout the Concurrency Kit family of data structures.
//!
//! ## Module Organization
//!
//! ### Foundation
//! - [`pr`] - Atomic primitives and memory barriers
//! - [`backoff`] - Exponential backoff for contention management
//! - [`spinlock`] - Fetch-and-store spinlock used by the coarse-locked variants
//! - [`node`] - Singly-linked node types shared by the stack and queue variants
//! - [`error`] - Error types for the harness/CLI boundary
//!
//! ### Elimination & Reclamation
//! - [`elimination`] - Shared push/pop rendezvous array used by the elimination variants
//! - [`hazard`] - Hazard pointer reclamation for the Michael-Scott queue's dummy node
//!
//! ### Containers
//! - [`stack`] - `IntStack` trait and the five stack variants
//! - [`queue`] - `IntQueue` trait and the two queue variants

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![allow(clippy::module_inception)]

/// Atomic primitives and memory barriers.
pub mod pr;

/// Exponential backoff for contention management.
pub mod backoff;

/// Fetch-and-store spinlock used by the coarse-locked variants.
pub mod spinlock;

/// Singly-linked node types shared by the stack and queue variants.
pub mod node;

/// Error types for the harness/CLI boundary.
pub mod error;

/// Shared push/pop rendezvous array used by the elimination variants.
pub mod elimination;

/// Hazard pointer reclamation for the Michael-Scott queue's dummy node.
pub mod hazard;

/// Stack variants: coarse-locked, Treiber, Treiber+elimination, locked+elimination, flat-combining.
pub mod stack;

/// Queue variants: coarse-locked and Michael-Scott.
pub mod queue;

pub use error::HarnessError;
pub use queue::IntQueue;
pub use stack::IntStack;
