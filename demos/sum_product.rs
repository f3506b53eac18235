use rand::Rng;
use std::thread;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use workpool::prelude::*;

fn sum(a: i32, b: i32) {
    thread::sleep(Duration::from_millis(50));
    println!("Sum of {} and {} is {}", a, b, a + b);
}

fn product(a: i32, b: i32) {
    thread::sleep(Duration::from_millis(50));
    println!("Product of {} and {} is {}", a, b, a * b);
}

fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    println!("=== Sum / Product Task Pool ===\n");

    let config = Config::builder()
        .num_threads(4)
        .queue_capacity(16)
        .on_task_failure(|id, failure| tracing::warn!(%id, %failure, "task failed"))
        .build()
        .expect("valid config");
    let pool = WorkerPool::with_config(config).expect("Failed to start pool");

    let mut rng = rand::thread_rng();
    for i in 0..100 {
        let op: fn(i32, i32) = if i % 2 == 0 { sum } else { product };
        let (a, b) = (rng.gen_range(0..100), rng.gen_range(0..100));
        pool.execute(move || op(a, b)).expect("pool is running");
    }

    // one task that refuses its input, reported through the hook
    pool.execute_fallible(|| Err::<(), _>("negative operand"))
        .expect("pool is running");

    pool.shutdown(ShutdownMode::Drain);

    let stats = pool.stats();
    println!(
        "\nexecuted {} tasks on {} workers ({} failed)",
        stats.tasks_executed, stats.workers, stats.tasks_failed
    );
    println!("\n=== Example Complete ===");
}
