use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use futures::executor::block_on;
use pulse_stream::*;
use std::time::Duration;

fn bench_basic_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("basic_operations");

    for size in [1_000, 10_000, 100_000].iter() {
        group.bench_with_input(BenchmarkId::new("map_filter", size), size, |b, &size| {
            b.iter(|| {
                let result = from_iter::<_, ()>(0..size)
                    .map(|x| black_box(x * 2))
                    .filter(|&x| black_box(x % 4 == 0))
                    .collect(&());
                black_box(block_on(result))
            });
        });

        group.bench_with_input(BenchmarkId::new("scan", size), size, |b, &size| {
            b.iter(|| {
                let result = from_iter::<_, ()>(0..size)
                    .scan(0i64, |acc, x| black_box(acc + x as i64))
                    .collect(&());
                black_box(block_on(result))
            });
        });
    }

    group.finish();
}

fn bench_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("join");

    for inner in [10, 100, 1_000].iter() {
        group.bench_with_input(BenchmarkId::new("flat_map", inner), inner, |b, &inner| {
            b.iter(|| {
                let result = from_iter::<_, ()>(0..inner)
                    .flat_map(|x| from_iter(vec![x; 10]))
                    .collect(&());
                black_box(block_on(result))
            });
        });

        group.bench_with_input(BenchmarkId::new("concat_map_timed", inner), inner, |b, &inner| {
            b.iter(|| {
                let env = VirtualEnv::new();
                let result = from_iter::<_, VirtualEnv>(0..inner)
                    .concat_map(|x| at(Duration::from_millis(1), x))
                    .collect(&env);
                black_box(env.block_on(result))
            });
        });
    }

    group.finish();
}

fn bench_multicast(c: &mut Criterion) {
    let mut group = c.benchmark_group("multicast");

    for subscribers in [1, 10, 100].iter() {
        group.bench_with_input(
            BenchmarkId::new("dispatch", subscribers),
            subscribers,
            |b, &subscribers| {
                b.iter(|| {
                    let (dispatch, stream) = create_adapter::<u64, ()>();
                    let handles: Vec<Disposable> = (0..subscribers)
                        .map(|_| stream.clone().subscribe(sink(|x| {
                            black_box(x);
                        }, |_| {}), &()))
                        .collect();
                    for i in 0..1_000 {
                        dispatch.dispatch(i);
                    }
                    for handle in handles {
                        handle.dispose();
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_basic_operations, bench_join, bench_multicast);
criterion_main!(benches);
