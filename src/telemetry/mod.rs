//! Telemetry and observability subsystem.
//!
//! Counters and latency histograms for a worker pool. With the `telemetry`
//! feature disabled a no-op collector with the same recording surface is
//! compiled instead.

#[cfg(feature = "telemetry")]
pub mod metrics;

#[cfg(feature = "telemetry")]
pub use metrics::{Metrics, MetricsSnapshot};

// Stub implementations when telemetry is disabled
#[cfg(not(feature = "telemetry"))]
pub mod metrics {
    #[derive(Debug, Clone, Default)]
    pub struct Metrics;

    impl Metrics {
        pub fn new() -> Self {
            Self
        }
        pub fn record_task_execution(&self, _: u64) {}
        pub fn record_queue_wait(&self, _: u64) {}
        pub fn record_task_failure(&self) {}
        pub fn record_tasks_abandoned(&self, _: usize) {}
        pub fn snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot::default()
        }
        pub fn reset(&self) {}
    }

    #[derive(Debug, Clone, Default)]
    pub struct MetricsSnapshot {
        pub tasks_executed: u64,
        pub tasks_failed: u64,
        pub tasks_abandoned: u64,
    }
}

#[cfg(not(feature = "telemetry"))]
pub use metrics::{Metrics, MetricsSnapshot};
