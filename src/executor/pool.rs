use super::panic_handler::PanicHandler;
use super::task::{Task, TaskId};
use super::worker::{FailureReporter, Worker, WorkerId, WorkerState};
use crate::config::Config;
use crate::error::{Closed, Error, Result, TryEnqueueError};
use crate::queue::BoundedQueue;
use crate::telemetry::{Metrics, MetricsSnapshot};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

#[cfg(target_os = "linux")]
fn pin_thread_to_core(core_id: usize) {
    unsafe {
        let mut cpuset: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(core_id, &mut cpuset);
        let result = libc::sched_setaffinity(
            0, // current thread
            std::mem::size_of::<libc::cpu_set_t>(),
            &cpuset,
        );
        if result != 0 {
            tracing::warn!(
                thread = std::thread::current().name().unwrap_or("unknown"),
                core_id,
                "failed to pin worker to core"
            );
        }
    }
}

/// How [`WorkerPool::shutdown`] treats work that is still queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Close the queue at once; queued tasks are handed back unexecuted.
    Immediate,
    /// Refuse new tasks, run everything already queued, then close.
    Drain,
}

/// Aggregated per-worker counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub workers: usize,
    pub tasks_executed: u64,
    pub tasks_failed: u64,
    /// Total time workers spent running task bodies.
    pub busy_time_ns: u64,
    pub queued: usize,
}

struct WorkerHandle {
    id: WorkerId,
    thread: Option<JoinHandle<()>>,
}

/// A fixed set of worker threads draining one shared [`BoundedQueue`].
///
/// The pool owns thread lifecycle only; what a task does is entirely up to
/// the closure it carries.
pub struct WorkerPool {
    queue: Arc<BoundedQueue<Task>>,
    workers: Mutex<Vec<WorkerHandle>>,
    // fixed at construction, read without taking `workers`
    worker_threads: Vec<ThreadId>,
    states: Vec<Arc<WorkerState>>,
    panic_handler: Arc<PanicHandler>,
    shutdown: AtomicBool,
    num_threads: usize,
    metrics: Arc<Metrics>,
}

impl WorkerPool {
    /// Start `worker_count` workers over a queue holding at most `queue_capacity` tasks.
    pub fn new(worker_count: usize, queue_capacity: usize) -> Result<Self> {
        let config = Config::builder()
            .num_threads(worker_count)
            .queue_capacity(queue_capacity)
            .build()?;
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;

        let num_threads = config.worker_threads();
        if num_threads == 0 {
            return Err(Error::config("need at least 1 thread"));
        }

        let queue = Arc::new(BoundedQueue::new(config.queue_capacity)?);
        let panic_handler = Arc::new(PanicHandler::new(config.panic_strategy));
        let reporter = Arc::new(FailureReporter::new(config.on_task_failure.clone()));
        let metrics = Arc::new(Metrics::new());

        let mut handles = Vec::with_capacity(num_threads);
        let mut worker_threads = Vec::with_capacity(num_threads);
        let mut states = Vec::with_capacity(num_threads);

        for id in 0..num_threads {
            let worker = Worker {
                id,
                state: Arc::new(WorkerState::new()),
                panic_handler: panic_handler.clone(),
                reporter: reporter.clone(),
                metrics: metrics.clone(),
            };
            states.push(worker.state.clone());

            let queue_clone = queue.clone();
            let name = format!("{}-{}", config.thread_name_prefix, id);

            let mut builder = thread::Builder::new().name(name);

            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            let pin_workers = config.pin_workers;
            let spawned = builder.spawn(move || {
                // Pin worker to core if requested
                #[cfg(target_os = "linux")]
                if pin_workers {
                    pin_thread_to_core(id);
                }
                #[cfg(not(target_os = "linux"))]
                let _ = pin_workers;

                worker.run(&queue_clone);
            });

            match spawned {
                Ok(thread) => {
                    worker_threads.push(thread.thread().id());
                    handles.push(WorkerHandle {
                        id,
                        thread: Some(thread),
                    });
                }
                Err(e) => {
                    tracing::error!(worker = id, error = %e, "failed to spawn worker");
                    // release the workers already running before giving up
                    queue.close();
                    for handle in handles {
                        if let Some(thread) = handle.thread {
                            let _ = thread.join();
                        }
                    }
                    return Err(Error::executor(format!("spawn failed: {}", e)));
                }
            }
        }

        tracing::debug!(
            workers = num_threads,
            capacity = config.queue_capacity,
            "worker pool started"
        );

        Ok(Self {
            queue,
            workers: Mutex::new(handles),
            worker_threads,
            states,
            panic_handler,
            shutdown: AtomicBool::new(false),
            num_threads,
            metrics,
        })
    }

    /// Queue a task, waiting while the queue is full.
    ///
    /// Fails once the pool is shutting down; the task is handed back.
    pub fn submit(&self, task: Task) -> std::result::Result<(), Closed<Task>> {
        self.queue.enqueue(task)
    }

    /// Queue a task only if there is room right now.
    pub fn try_submit(&self, task: Task) -> std::result::Result<(), TryEnqueueError<Task>> {
        self.queue.try_enqueue(task)
    }

    pub fn execute<F>(&self, f: F) -> std::result::Result<TaskId, Closed<Task>>
    where
        F: FnOnce() + Send + 'static,
    {
        let task = Task::new(f);
        let id = task.id();
        self.submit(task).map(|()| id)
    }

    /// Queue a closure whose `Err` is reported through the failure hook.
    pub fn execute_fallible<F, E>(&self, f: F) -> std::result::Result<TaskId, Closed<Task>>
    where
        F: FnOnce() -> std::result::Result<(), E> + Send + 'static,
        E: fmt::Display,
    {
        let task = Task::fallible(f);
        let id = task.id();
        self.submit(task).map(|()| id)
    }

    /// Stop the pool and wait for every worker to exit.
    ///
    /// Returns the tasks that were queued but never started; always empty for
    /// [`ShutdownMode::Drain`]. Safe to call repeatedly and from several threads
    /// at once: every caller outside the pool returns only after all workers
    /// are joined.
    ///
    /// Called from inside a task, it stops the queue and returns without
    /// joining; a later call from outside the pool (or `Drop`) does the joins.
    pub fn shutdown(&self, mode: ShutdownMode) -> Vec<Task> {
        let first = !self.shutdown.swap(true, Ordering::AcqRel);

        let abandoned = match mode {
            ShutdownMode::Drain => {
                self.queue.drain();
                Vec::new()
            }
            ShutdownMode::Immediate => self.queue.close_and_take(),
        };

        if !abandoned.is_empty() {
            self.metrics.record_tasks_abandoned(abandoned.len());
            tracing::debug!(count = abandoned.len(), "abandoning queued tasks");
        }

        if self.is_worker_thread() {
            tracing::warn!("shutdown called from inside a task; leaving workers to a later join");
            return abandoned;
        }

        self.join_workers();
        self.queue.close();

        if first {
            tracing::debug!(?mode, "worker pool stopped");
        }

        abandoned
    }

    fn is_worker_thread(&self) -> bool {
        let current = thread::current().id();
        self.worker_threads.contains(&current)
    }

    // Only reached from outside the pool, so no worker ever waits on this lock.
    fn join_workers(&self) {
        // held across the joins so a concurrent caller waits for them too
        let mut workers = self.workers.lock();
        for worker in workers.iter_mut() {
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    tracing::error!(worker = worker.id, "worker thread panicked");
                }
            }
        }
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Number of tasks waiting in the queue (a snapshot).
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub fn panic_count(&self) -> usize {
        self.panic_handler.panic_count()
    }

    pub fn stats(&self) -> PoolStats {
        let (executed, failed, busy) = self.states.iter().fold((0, 0, 0), |(e, f, b), s| {
            (
                e + s.tasks_executed.load(Ordering::Relaxed),
                f + s.tasks_failed.load(Ordering::Relaxed),
                b + s.busy_time_ns.load(Ordering::Relaxed),
            )
        });

        PoolStats {
            workers: self.num_threads,
            tasks_executed: executed,
            tasks_failed: failed,
            busy_time_ns: busy,
            queued: self.queue.len(),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("num_threads", &self.num_threads)
            .field("queue", &self.queue)
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // also joins any worker a shutdown from inside a task left running
        self.shutdown(ShutdownMode::Drain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::TaskFailure;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_rejects_invalid_sizes() {
        assert!(matches!(WorkerPool::new(0, 4), Err(Error::Config(_))));
        assert!(matches!(WorkerPool::new(2, 0), Err(Error::Config(_))));
    }

    #[test]
    fn test_counter_scenario() {
        let pool = WorkerPool::new(4, 16).unwrap();
        let counter = Arc::new(Mutex::new(0));

        for _ in 0..4 {
            let counter = counter.clone();
            pool.execute(move || *counter.lock() += 1).unwrap();
        }

        let abandoned = pool.shutdown(ShutdownMode::Drain);
        assert!(abandoned.is_empty());
        assert_eq!(*counter.lock(), 4);
        assert_eq!(pool.stats().tasks_executed, 4);
    }

    #[test]
    fn test_submit_after_shutdown_is_rejected() {
        let pool = WorkerPool::new(2, 4).unwrap();
        pool.shutdown(ShutdownMode::Drain);

        let task = Task::new(|| {});
        let id = task.id();
        let rejected = pool.submit(task).unwrap_err().into_inner();
        assert_eq!(rejected.id(), id);
        assert!(pool.is_shutdown());
    }

    #[test]
    fn test_immediate_shutdown_returns_unstarted_tasks() {
        let pool = WorkerPool::new(1, 8).unwrap();
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        // occupy the only worker so the rest stay queued
        pool.execute(move || {
            started_tx.send(()).unwrap();
            let _ = release_rx.recv();
        })
        .unwrap();
        started_rx.recv().unwrap();

        let ran = Arc::new(AtomicUsize::new(0));
        let mut queued_ids = Vec::new();
        for _ in 0..3 {
            let ran = ran.clone();
            queued_ids.push(
                pool.execute(move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap(),
            );
        }

        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            release_tx.send(()).unwrap();
        });

        let abandoned = pool.shutdown(ShutdownMode::Immediate);
        releaser.join().unwrap();

        let abandoned_ids: Vec<TaskId> = abandoned.iter().map(Task::id).collect();
        assert_eq!(abandoned_ids, queued_ids);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(pool.metrics().tasks_abandoned, 3);
    }

    #[test]
    fn test_failure_hook_receives_task_id() {
        let failures = Arc::new(Mutex::new(Vec::new()));
        let config = {
            let failures = failures.clone();
            Config::builder()
                .num_threads(2)
                .queue_capacity(4)
                .on_task_failure(move |id, failure| failures.lock().push((id, failure.clone())))
                .build()
                .unwrap()
        };
        let pool = WorkerPool::with_config(config).unwrap();

        let failing = pool
            .execute_fallible(|| Err::<(), _>("out of widgets"))
            .unwrap();
        pool.execute(|| {}).unwrap();
        pool.shutdown(ShutdownMode::Drain);

        let failures = failures.lock();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, failing);
        assert_eq!(
            failures[0].1,
            TaskFailure::Failed {
                message: "out of widgets".into()
            }
        );
        assert_eq!(pool.stats().tasks_failed, 1);
        assert_eq!(pool.stats().tasks_executed, 2);
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let pool = WorkerPool::new(1, 4).unwrap();
        let done = Arc::new(AtomicBool::new(false));

        pool.execute(|| panic!("task blew up")).unwrap();
        {
            let done = done.clone();
            pool.execute(move || done.store(true, Ordering::SeqCst))
                .unwrap();
        }
        pool.shutdown(ShutdownMode::Drain);

        assert!(done.load(Ordering::SeqCst));
        assert_eq!(pool.panic_count(), 1);
    }

    #[test]
    fn test_shutdown_from_inside_task() {
        let pool = Arc::new(WorkerPool::new(2, 4).unwrap());
        let (tx, rx) = mpsc::channel();

        {
            let inner = pool.clone();
            pool.execute(move || {
                inner.shutdown(ShutdownMode::Drain);
                tx.send(()).unwrap();
            })
            .unwrap();
        }

        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        pool.shutdown(ShutdownMode::Drain);
        assert!(pool.is_shutdown());
    }

    #[test]
    fn test_inner_shutdown_races_outer_shutdown() {
        let pool = Arc::new(WorkerPool::new(2, 4).unwrap());
        let (inner_tx, inner_rx) = mpsc::channel();
        let (outer_tx, outer_rx) = mpsc::channel();

        {
            let inner = pool.clone();
            pool.execute(move || {
                // let the outer caller take the handle lock first
                thread::sleep(Duration::from_millis(100));
                inner.shutdown(ShutdownMode::Drain);
                inner_tx.send(()).unwrap();
            })
            .unwrap();
        }

        let outer = {
            let pool = pool.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                pool.shutdown(ShutdownMode::Drain);
                outer_tx.send(()).unwrap();
            })
        };

        inner_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        outer_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        outer.join().unwrap();
        assert!(pool.is_shutdown());
    }

    #[test]
    fn test_drop_joins_worker_after_inner_shutdown() {
        let finished = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let pool = Arc::new(WorkerPool::new(1, 4).unwrap());

        {
            let inner = pool.clone();
            let finished = finished.clone();
            pool.execute(move || {
                inner.shutdown(ShutdownMode::Drain);
                drop(inner);
                tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(50));
                finished.store(true, Ordering::SeqCst);
            })
            .unwrap();
        }

        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        // last reference: drop has to wait for the task to finish
        drop(pool);
        assert!(finished.load(Ordering::SeqCst));
    }

    #[test]
    fn test_stats_accumulate_busy_time() {
        let pool = WorkerPool::new(2, 4).unwrap();
        for _ in 0..2 {
            pool.execute(|| thread::sleep(Duration::from_millis(5)))
                .unwrap();
        }
        pool.shutdown(ShutdownMode::Drain);

        let stats = pool.stats();
        assert_eq!(stats.tasks_executed, 2);
        assert!(stats.busy_time_ns >= 10_000_000);
    }

    #[test]
    fn test_worker_threads_are_named() {
        let config = Config::builder()
            .num_threads(1)
            .queue_capacity(1)
            .thread_name_prefix("named")
            .build()
            .unwrap();
        let pool = WorkerPool::with_config(config).unwrap();
        let (tx, rx) = mpsc::channel();

        pool.execute(move || {
            tx.send(thread::current().name().map(str::to_owned)).unwrap();
        })
        .unwrap();

        assert_eq!(rx.recv().unwrap().as_deref(), Some("named-0"));
    }

    #[test]
    fn test_drop_drains_queue() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = WorkerPool::new(2, 64).unwrap();
            for _ in 0..50 {
                let counter = counter.clone();
                pool.execute(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }
}
