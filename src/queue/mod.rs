//! Bounded blocking FIFO queue.
//!
//! The queue is the only state shared between submitters and workers. All of
//! it lives behind one mutex; `not_full` and `not_empty` condition variables
//! park producers and consumers until the predicate they wait on changes.

pub mod bounded;
pub(crate) mod ring;

pub use bounded::{BoundedQueue, QueueState};
