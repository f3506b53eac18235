//! Task execution infrastructure.
//!
//! This module provides the worker pool, the worker loop that drains the
//! shared queue, the task type carried through it, and panic isolation for
//! task bodies.

pub mod panic_handler;
pub mod pool;
pub mod task;
pub mod worker;

pub use panic_handler::{PanicHandler, PanicInfo, PanicStrategy};
pub use pool::{PoolStats, ShutdownMode, WorkerPool};
pub use task::{FailureHook, Task, TaskError, TaskFailure, TaskId};
pub use worker::{WorkerId, WorkerState};
