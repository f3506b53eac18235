use crate::error::{Error, Result};
use crate::executor::{FailureHook, PanicStrategy, TaskFailure, TaskId};
use std::fmt;
use std::sync::Arc;

/// Default queue capacity, matching the fixed task array the pool replaces.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

const MAX_THREADS: usize = 1024;
const MAX_QUEUE_CAPACITY: usize = 1 << 20;

#[derive(Clone)]
pub struct Config {
    pub num_threads: Option<usize>,
    pub queue_capacity: usize,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
    pub pin_workers: bool,
    pub panic_strategy: PanicStrategy,
    pub on_task_failure: Option<FailureHook>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            thread_name_prefix: "workpool-worker".to_string(),
            stack_size: Some(2 * 1024 * 1024),
            pin_workers: false,
            panic_strategy: PanicStrategy::default(),
            on_task_failure: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("num_threads", &self.num_threads)
            .field("queue_capacity", &self.queue_capacity)
            .field("thread_name_prefix", &self.thread_name_prefix)
            .field("stack_size", &self.stack_size)
            .field("pin_workers", &self.pin_workers)
            .field("panic_strategy", &self.panic_strategy)
            .field("on_task_failure", &self.on_task_failure.is_some())
            .finish()
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.num_threads {
            if n == 0 {
                return Err(Error::config("num_threads must be > 0"));
            }
            if n > MAX_THREADS {
                return Err(Error::config(format!(
                    "num_threads too large (max {})",
                    MAX_THREADS
                )));
            }
        }

        if self.queue_capacity == 0 {
            return Err(Error::config("queue_capacity must be > 0"));
        }
        if self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(Error::config(format!(
                "queue_capacity too large (max {})",
                MAX_QUEUE_CAPACITY
            )));
        }

        Ok(())
    }

    pub fn worker_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get)
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = Some(n);
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn pin_workers(mut self, pin: bool) -> Self {
        self.config.pin_workers = pin;
        self
    }

    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.config.panic_strategy = strategy;
        self
    }

    /// Install the callback invoked for every task that panics or returns an error.
    pub fn on_task_failure<F>(mut self, hook: F) -> Self
    where
        F: Fn(TaskId, &TaskFailure) + Send + Sync + 'static,
    {
        self.config.on_task_failure = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert!(config.worker_threads() >= 1);
    }

    #[test]
    fn test_rejects_zero_threads() {
        let err = Config::builder().num_threads(0).build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = Config::builder().queue_capacity(0).build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_oversized_values() {
        assert!(Config::builder().num_threads(MAX_THREADS + 1).build().is_err());
        assert!(Config::builder()
            .queue_capacity(MAX_QUEUE_CAPACITY + 1)
            .build()
            .is_err());
    }

    #[test]
    fn test_builder_sets_fields() {
        let config = Config::builder()
            .num_threads(3)
            .queue_capacity(8)
            .thread_name_prefix("io")
            .panic_strategy(PanicStrategy::Isolate)
            .on_task_failure(|_, _| {})
            .build()
            .unwrap();

        assert_eq!(config.worker_threads(), 3);
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.thread_name_prefix, "io");
        assert!(config.on_task_failure.is_some());
        assert!(format!("{:?}", config).contains("on_task_failure: true"));
    }
}
