use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

/// What a worker does when a task body panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanicStrategy {
    /// Log and abort the whole process.
    Abort,
    /// Turn the panic into a task failure and keep the worker running.
    #[default]
    Isolate,
}

#[derive(Debug)]
pub struct PanicHandler {
    strategy: PanicStrategy,
    panic_count: AtomicUsize,
}

impl PanicHandler {
    pub fn new(strategy: PanicStrategy) -> Self {
        Self {
            strategy,
            panic_count: AtomicUsize::new(0),
        }
    }

    pub fn execute<F, R>(&self, f: F) -> Result<R, PanicInfo>
    where
        F: FnOnce() -> R,
    {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => Ok(result),
            Err(payload) => {
                self.panic_count.fetch_add(1, Ordering::Relaxed);

                let info = PanicInfo::from_payload(payload);

                if self.strategy == PanicStrategy::Abort {
                    tracing::error!(message = %info.message, "task panicked, aborting");
                    std::process::abort();
                }

                Err(info)
            }
        }
    }

    pub fn panic_count(&self) -> usize {
        self.panic_count.load(Ordering::Relaxed)
    }

    pub fn reset_count(&self) {
        self.panic_count.store(0, Ordering::Relaxed);
    }

    pub fn strategy(&self) -> PanicStrategy {
        self.strategy
    }
}

impl Default for PanicHandler {
    fn default() -> Self {
        Self::new(PanicStrategy::default())
    }
}

#[derive(Debug, Clone)]
pub struct PanicInfo {
    pub message: String,
}

impl PanicInfo {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        Self { message }
    }
}
