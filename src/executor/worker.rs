//! Worker loop: pull tasks off the shared queue and run them until it closes.

use super::panic_handler::PanicHandler;
use super::task::{FailureHook, Task, TaskFailure, TaskId};
use crate::queue::BoundedQueue;
use crate::telemetry::Metrics;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub type WorkerId = usize;

// stats for each worker
#[derive(Debug)]
pub struct WorkerState {
    pub tasks_executed: AtomicU64,
    pub tasks_failed: AtomicU64,
    pub busy_time_ns: AtomicU64,
}

impl WorkerState {
    pub(crate) fn new() -> Self {
        Self {
            tasks_executed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            busy_time_ns: AtomicU64::new(0),
        }
    }
}

/// Routes task failures to the user hook, or to the log when there is none.
pub(crate) struct FailureReporter {
    hook: Option<FailureHook>,
}

impl FailureReporter {
    pub fn new(hook: Option<FailureHook>) -> Self {
        Self { hook }
    }

    pub fn report(&self, worker: WorkerId, task: TaskId, failure: &TaskFailure) {
        let Some(hook) = &self.hook else {
            tracing::warn!(worker, %task, %failure, "task failed");
            return;
        };

        // a panicking hook must not take the worker down with it
        if catch_unwind(AssertUnwindSafe(|| hook(task, failure))).is_err() {
            tracing::error!(worker, %task, %failure, "failure hook panicked");
        }
    }
}

pub(crate) struct Worker {
    pub id: WorkerId,
    pub state: Arc<WorkerState>,
    pub panic_handler: Arc<PanicHandler>,
    pub reporter: Arc<FailureReporter>,
    pub metrics: Arc<Metrics>,
}

impl Worker {
    // main loop: wait for a task, run it, repeat until the queue is closed and empty
    pub fn run(&self, queue: &BoundedQueue<Task>) {
        tracing::debug!(worker = self.id, "worker started");

        while let Ok(task) = queue.dequeue() {
            self.execute_task(task);
        }

        tracing::debug!(worker = self.id, "worker exiting");
    }

    fn execute_task(&self, task: Task) {
        let tid = task.id();
        let start = Instant::now();
        self.metrics
            .record_queue_wait(start.saturating_duration_since(task.spawn_time()).as_nanos() as u64);

        let failure = match self.panic_handler.execute(|| task.run()) {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(TaskFailure::Failed { message: err.0 }),
            Err(info) => Some(TaskFailure::Panicked {
                message: info.message,
            }),
        };

        let duration_ns = start.elapsed().as_nanos() as u64;
        self.state
            .busy_time_ns
            .fetch_add(duration_ns, Ordering::Relaxed);
        self.metrics.record_task_execution(duration_ns);

        if let Some(failure) = failure {
            self.state.tasks_failed.fetch_add(1, Ordering::Relaxed);
            self.metrics.record_task_failure();
            self.reporter.report(self.id, tid, &failure);
        }

        self.state.tasks_executed.fetch_add(1, Ordering::Relaxed);
    }
}
