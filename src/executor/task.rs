//! Task representation and execution.

use crate::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Global task ID counter
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Error produced by a fallible task body, reduced to its description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskError(pub String);

/// Why a task did not complete normally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure {
    Panicked { message: String },
    Failed { message: String },
}

impl TaskFailure {
    pub fn message(&self) -> &str {
        match self {
            TaskFailure::Panicked { message } | TaskFailure::Failed { message } => message,
        }
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFailure::Panicked { message } => write!(f, "panicked: {}", message),
            TaskFailure::Failed { message } => write!(f, "failed: {}", message),
        }
    }
}

impl From<TaskFailure> for Error {
    fn from(failure: TaskFailure) -> Self {
        Error::TaskFailed(failure.to_string())
    }
}

/// Callback receiving every task failure observed by a worker.
pub type FailureHook = Arc<dyn Fn(TaskId, &TaskFailure) + Send + Sync + 'static>;

type TaskFn = Box<dyn FnOnce() -> Result<(), TaskError> + Send + 'static>;

/// A unit of work: the operation plus everything it captured.
///
/// Owned by exactly one party at a time: the submitter, then the queue,
/// then the worker that runs it.
pub struct Task {
    id: TaskId,
    func: TaskFn,
    spawn_time: Instant,
}

impl Task {
    /// Create a task from an infallible closure
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::from_fn(Box::new(move || {
            f();
            Ok(())
        }))
    }

    /// Create a task whose error is reported through the pool's failure hook
    pub fn fallible<F, E>(f: F) -> Self
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: fmt::Display,
    {
        Self::from_fn(Box::new(move || f().map_err(|e| TaskError(e.to_string()))))
    }

    fn from_fn(func: TaskFn) -> Self {
        Task {
            id: TaskId::next(),
            func,
            spawn_time: Instant::now(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn spawn_time(&self) -> Instant {
        self.spawn_time
    }

    /// Execute the task
    pub(crate) fn run(self) -> Result<(), TaskError> {
        (self.func)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("spawn_time", &self.spawn_time)
            .finish()
    }
}
