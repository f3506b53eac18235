//! workpool - bounded task queue drained by a fixed pool of worker threads
//!
//! Producers hand self-contained tasks to a [`WorkerPool`]; the tasks wait in a
//! fixed-capacity FIFO [`BoundedQueue`](queue::BoundedQueue) until one of the
//! pool's workers picks them up.
//!
//! # Quick Start
//!
//! ```no_run
//! use workpool::prelude::*;
//!
//! let pool = WorkerPool::new(4, 64).unwrap();
//!
//! for i in 0..10 {
//!     pool.execute(move || println!("task {}", i)).unwrap();
//! }
//!
//! // run whatever is still queued, then stop the workers
//! pool.shutdown(ShutdownMode::Drain);
//! ```
//!
//! # Features
//!
//! - **Backpressure**: submitters block while the queue is full
//! - **Global FIFO**: tasks start in the order they were queued
//! - **Failure isolation**: panics and task errors go to a hook, never kill a worker
//! - **Graceful or immediate shutdown**: drain the queue or hand back unstarted tasks
//! - **Telemetry**: execution and queue-wait histograms (optional)

// Lint configuration
#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod queue;
pub mod telemetry;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder};
pub use error::{Closed, Error, Result, TryDequeueError, TryEnqueueError};
pub use executor::{ShutdownMode, Task, TaskFailure, TaskId, WorkerPool};
pub use queue::{BoundedQueue, QueueState};
