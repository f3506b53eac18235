use rand::Rng;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use workpool::BoundedQueue;

const PRODUCERS: usize = 2;
const CONSUMERS: usize = 2;
const ITEMS_PER_PRODUCER: usize = 20;

fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    println!("=== Bounded Producer / Consumer ===\n");

    let buffer = Arc::new(BoundedQueue::new(10).expect("capacity is non-zero"));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let buffer = buffer.clone();
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for _ in 0..ITEMS_PER_PRODUCER {
                    let x: u32 = rng.gen_range(0..100);
                    if buffer.enqueue(x).is_err() {
                        break;
                    }
                }
                tracing::info!(producer = p, "producer done");
            })
        })
        .collect();

    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|c| {
            let buffer = buffer.clone();
            thread::spawn(move || {
                let mut consumed = 0;
                while let Ok(y) = buffer.dequeue() {
                    println!("consumer {} got {}", c, y);
                    consumed += 1;
                    thread::sleep(Duration::from_millis(10));
                }
                consumed
            })
        })
        .collect();

    for producer in producers {
        producer.join().expect("producer panicked");
    }
    // consumers finish what is buffered, then see the queue closed
    buffer.drain();

    let total: usize = consumers
        .into_iter()
        .map(|c| c.join().expect("consumer panicked"))
        .sum();

    println!("\nconsumed {} items", total);
    println!("\n=== Example Complete ===");
}
