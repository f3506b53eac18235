//! Throughput of submitting small tasks through a bounded pool

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use workpool::{BoundedQueue, ShutdownMode, WorkerPool};

fn bench_pool_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_drain_10k");

    for workers in [1usize, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &workers| {
            b.iter(|| {
                let pool = WorkerPool::new(workers, 256).unwrap();
                let sum = Arc::new(AtomicU64::new(0));
                for i in 0..10_000u64 {
                    let sum = sum.clone();
                    pool.execute(move || {
                        sum.fetch_add(black_box(i), Ordering::Relaxed);
                    })
                    .unwrap();
                }
                pool.shutdown(ShutdownMode::Drain);
                black_box(sum.load(Ordering::Relaxed))
            });
        });
    }

    group.finish();
}

fn bench_queue_capacity(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_spsc_100k");

    for capacity in [1usize, 16, 1024] {
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &capacity,
            |b, &capacity| {
                b.iter(|| {
                    let queue = Arc::new(BoundedQueue::new(capacity).unwrap());
                    let producer = {
                        let queue = queue.clone();
                        thread::spawn(move || {
                            for i in 0..100_000u64 {
                                queue.enqueue(i).unwrap();
                            }
                            queue.close();
                        })
                    };

                    let mut total = 0u64;
                    while let Ok(v) = queue.dequeue() {
                        total += v;
                    }
                    producer.join().unwrap();
                    black_box(total)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_pool_drain, bench_queue_capacity);
criterion_main!(benches);
