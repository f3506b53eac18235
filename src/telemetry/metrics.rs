//! Metrics collection for pool monitoring.

use hdrhistogram::Histogram;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

// one hour in nanoseconds
const HISTOGRAM_MAX_NS: u64 = 3_600_000_000_000;

/// Pool metrics collector
#[derive(Debug)]
pub struct Metrics {
    tasks_executed: AtomicU64,
    tasks_failed: AtomicU64,
    tasks_abandoned: AtomicU64,

    // time from submission until a worker picked the task up
    queue_wait: RwLock<Histogram<u64>>,
    execution: RwLock<Histogram<u64>>,

    start_time: Instant,
}

fn new_histogram() -> Histogram<u64> {
    // only fails for sigfig > 5 or a max below 2 * low
    Histogram::new_with_max(HISTOGRAM_MAX_NS, 3).expect("valid histogram bounds")
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            tasks_executed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            tasks_abandoned: AtomicU64::new(0),
            queue_wait: RwLock::new(new_histogram()),
            execution: RwLock::new(new_histogram()),
            start_time: Instant::now(),
        }
    }

    /// Record a finished task (successful or not) with its run time
    pub fn record_task_execution(&self, duration_ns: u64) {
        self.tasks_executed.fetch_add(1, Ordering::Relaxed);
        self.execution.write().saturating_record(duration_ns);
    }

    pub fn record_queue_wait(&self, wait_ns: u64) {
        self.queue_wait.write().saturating_record(wait_ns);
    }

    pub fn record_task_failure(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tasks_abandoned(&self, count: usize) {
        self.tasks_abandoned
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let execution = self.execution.read();
        let queue_wait = self.queue_wait.read();

        MetricsSnapshot {
            uptime: self.start_time.elapsed(),
            tasks_executed: self.tasks_executed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_abandoned: self.tasks_abandoned.load(Ordering::Relaxed),
            avg_latency_ns: if execution.len() > 0 {
                execution.mean() as u64
            } else {
                0
            },
            p50_latency_ns: execution.value_at_quantile(0.50),
            p99_latency_ns: execution.value_at_quantile(0.99),
            max_latency_ns: execution.max(),
            avg_queue_wait_ns: if queue_wait.len() > 0 {
                queue_wait.mean() as u64
            } else {
                0
            },
            p99_queue_wait_ns: queue_wait.value_at_quantile(0.99),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.tasks_executed.store(0, Ordering::Relaxed);
        self.tasks_failed.store(0, Ordering::Relaxed);
        self.tasks_abandoned.store(0, Ordering::Relaxed);
        self.execution.write().reset();
        self.queue_wait.write().reset();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub uptime: Duration,
    pub tasks_executed: u64,
    pub tasks_failed: u64,
    pub tasks_abandoned: u64,
    pub avg_latency_ns: u64,
    pub p50_latency_ns: u64,
    pub p99_latency_ns: u64,
    pub max_latency_ns: u64,
    pub avg_queue_wait_ns: u64,
    pub p99_queue_wait_ns: u64,
}

impl MetricsSnapshot {
    /// Calculate tasks per second
    pub fn tasks_per_second(&self) -> f64 {
        let seconds = self.uptime.as_secs_f64();
        if seconds == 0.0 {
            return 0.0;
        }
        self.tasks_executed as f64 / seconds
    }

    /// Fraction of executed tasks that failed (0.0 to 1.0)
    pub fn failure_rate(&self) -> f64 {
        if self.tasks_executed == 0 {
            return 0.0;
        }
        self.tasks_failed as f64 / self.tasks_executed as f64
    }
}
