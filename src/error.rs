use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("queue closed")]
    QueueClosed,

    #[error("config error: {0}")]
    Config(String),

    #[error("executor error: {0}")]
    Executor(String),

    #[error("task failed: {0}")]
    TaskFailed(String),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }
}

/// Returned when a queue no longer accepts or offers items.
///
/// On the enqueue side the rejected item is handed back so the caller
/// decides what happens to it.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Closed<T = ()>(pub T);

impl<T> Closed<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Closed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("Closed { .. }")
    }
}

impl<T> fmt::Display for Closed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("queue closed")
    }
}

impl<T> std::error::Error for Closed<T> {}

impl<T> From<Closed<T>> for Error {
    fn from(_: Closed<T>) -> Self {
        Error::QueueClosed
    }
}

/// Failure of a non-blocking enqueue.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum TryEnqueueError<T> {
    Full(T),
    Closed(T),
}

impl<T> TryEnqueueError<T> {
    pub fn into_inner(self) -> T {
        match self {
            TryEnqueueError::Full(item) | TryEnqueueError::Closed(item) => item,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, TryEnqueueError::Full(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, TryEnqueueError::Closed(_))
    }
}

impl<T> fmt::Debug for TryEnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryEnqueueError::Full(_) => f.pad("Full(..)"),
            TryEnqueueError::Closed(_) => f.pad("Closed(..)"),
        }
    }
}

impl<T> fmt::Display for TryEnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryEnqueueError::Full(_) => f.pad("queue full"),
            TryEnqueueError::Closed(_) => f.pad("queue closed"),
        }
    }
}

impl<T> std::error::Error for TryEnqueueError<T> {}

/// Failure of a non-blocking dequeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TryDequeueError {
    #[error("queue empty")]
    Empty,

    #[error("queue closed")]
    Closed,
}
