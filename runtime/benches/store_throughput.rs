//! Store Performance Benchmarks
//!
//! - Reducer execution in isolation
//! - Action throughput through middleware and reducer
//! - Fan-out of states to many subscribers
//!
//! Run with: `cargo bench`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used)] // Benchmarks can use expect for setup
#![allow(dead_code)] // Benchmark data structures may have unused fields

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use futures::StreamExt;
use gemini_core::{EffectStream, Reducer, effects};
use gemini_runtime::Store;

#[derive(Clone, Debug)]
struct BenchState {
    counter: i64,
    data: Vec<u8>, // For testing state size impact
}

impl Default for BenchState {
    fn default() -> Self {
        Self {
            counter: 0,
            data: vec![0; 1024],
        }
    }
}

#[derive(Clone, Debug)]
enum BenchAction {
    Increment,
    Burst(usize),
    NoOp,
}

#[derive(Clone, Debug)]
enum BenchEffect {
    Incremented,
}

struct BenchReducer;

impl Reducer<BenchState, BenchEffect> for BenchReducer {
    fn reduce(&self, state: &BenchState, effect: &BenchEffect) -> anyhow::Result<BenchState> {
        match effect {
            BenchEffect::Incremented => Ok(BenchState {
                counter: state.counter + 1,
                ..state.clone()
            }),
        }
    }
}

fn bench_middleware(
    action: BenchAction,
    _state: &BenchState,
) -> anyhow::Result<EffectStream<BenchEffect>> {
    Ok(match action {
        BenchAction::Increment => effects::just(BenchEffect::Incremented),
        BenchAction::Burst(count) => {
            effects::from_iter(std::iter::repeat_n(BenchEffect::Incremented, count))
        },
        BenchAction::NoOp => effects::none(),
    })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

/// Benchmark reducer execution in isolation (no Store overhead)
fn benchmark_reducer(c: &mut Criterion) {
    let mut group = c.benchmark_group("reducer");
    group.throughput(Throughput::Elements(1));

    let state = BenchState::default();
    group.bench_function("increment", |b| {
        b.iter(|| BenchReducer.reduce(black_box(&state), black_box(&BenchEffect::Incremented)));
    });

    group.finish();
}

/// Benchmark actions per second through a running store
fn benchmark_store_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_throughput");
    let runtime = runtime();

    for batch in [1_u64, 100, 1_000] {
        group.throughput(Throughput::Elements(batch));
        group.bench_function(format!("send_{batch}"), |b| {
            b.to_async(&runtime).iter_batched(
                || {
                    let _guard = runtime.enter();
                    Store::new(BenchState::default(), BenchReducer, bench_middleware)
                },
                |store| async move {
                    let mut states = store.states();
                    for _ in 0..batch {
                        let _ = store.send(black_box(BenchAction::Increment));
                    }
                    // Initial state plus one per action
                    for _ in 0..=batch {
                        let _ = states.next().await;
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.bench_function("send_noop", |b| {
        let store = {
            let _guard = runtime.enter();
            Store::new(BenchState::default(), BenchReducer, bench_middleware)
        };
        b.to_async(&runtime).iter(|| async {
            let _ = store.send(black_box(BenchAction::NoOp));
            tokio::task::yield_now().await;
        });
    });

    group.bench_function("burst_100", |b| {
        b.to_async(&runtime).iter_batched(
            || {
                let _guard = runtime.enter();
                Store::new(BenchState::default(), BenchReducer, bench_middleware)
            },
            |store| async move {
                let mut states = store.states();
                let _ = store.send(black_box(BenchAction::Burst(100)));
                for _ in 0..=100 {
                    let _ = states.next().await;
                }
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

/// Benchmark state fan-out to many subscribers
fn benchmark_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");
    let runtime = runtime();

    for subscribers in [1_usize, 10, 100] {
        group.throughput(Throughput::Elements(subscribers as u64));
        group.bench_function(format!("subscribers_{subscribers}"), |b| {
            b.to_async(&runtime).iter_batched(
                || {
                    let _guard = runtime.enter();
                    let store = Store::new(BenchState::default(), BenchReducer, bench_middleware);
                    let streams: Vec<_> = (0..subscribers).map(|_| store.states()).collect();
                    (store, streams)
                },
                |(store, mut streams)| async move {
                    let _ = store.send(BenchAction::Increment);
                    for stream in &mut streams {
                        // Replayed initial state, then the increment
                        let _ = stream.next().await;
                        let _ = stream.next().await;
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_reducer,
    benchmark_store_throughput,
    benchmark_fan_out
);
criterion_main!(benches);
