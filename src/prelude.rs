pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Closed, Error, Result, TryDequeueError, TryEnqueueError};
pub use crate::executor::{PanicStrategy, PoolStats, ShutdownMode, Task, TaskFailure, TaskId, WorkerPool};
pub use crate::queue::{BoundedQueue, QueueState};

pub use crate::telemetry::MetricsSnapshot;
