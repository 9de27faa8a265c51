use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use partyline::{patchable, Projection, Selector, Store, Subscriber};

patchable! {
    #[derive(Clone, Debug, PartialEq)]
    struct State {
        counter: usize,
        name: String,
    }
}

fn state() -> State {
    State {
        counter: 0,
        name: "test".to_string(),
    }
}

fn store_creation_benchmark(c: &mut Criterion) {
    c.bench_function("store_creation", |b| {
        b.iter(|| Store::new(black_box(state())));
    });
}

fn store_read_benchmark(c: &mut Criterion) {
    let store = Store::new(state());

    c.bench_function("store_read", |b| {
        b.iter(|| {
            black_box(store.read(|state| state.counter));
        });
    });
}

fn store_patch_benchmark(c: &mut Criterion) {
    let store = Store::new(state());

    c.bench_function("store_patch", |b| {
        let mut i = 0usize;
        b.iter(|| {
            store.patch(StatePatch::default().counter(black_box(i)));
            i += 1;
        });
    });
}

fn reducer_benchmark(c: &mut Criterion) {
    let store = Store::with_reducer(0u64, |count: &u64, delta: u64| count + delta);

    c.bench_function("store_reducer", |b| {
        b.iter(|| store.set(black_box(1)));
    });
}

fn store_subscribe_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_subscribe");

    for subscriber_count in [1, 10, 100].iter() {
        let store = Store::new(state());

        for _ in 0..*subscriber_count {
            store.subscribe(&Subscriber::new(|_: &State| {
                // Empty subscriber
            }))
            .forget();
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(subscriber_count),
            subscriber_count,
            |b, _| {
                let mut i = 0usize;
                b.iter(|| {
                    store.patch(StatePatch::default().counter(black_box(i)));
                    i += 1;
                });
            },
        );
    }
    group.finish();
}

fn projection_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection");

    for projection_count in [1, 10, 100].iter() {
        let store = Store::new(state());
        let name = Selector::map(|state: &State| state.name.clone());
        let projections: Vec<Projection<State, String>> = (0..*projection_count)
            .map(|_| {
                let mut projection = Projection::new();
                projection.attach(&store, &name);
                projection
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(projection_count),
            projection_count,
            |b, _| {
                let mut i = 0usize;
                b.iter(|| {
                    store.patch(StatePatch::default().counter(black_box(i)));
                    i += 1;
                });
            },
        );
        drop(projections);
    }
    group.finish();
}

criterion_group!(
    benches,
    store_creation_benchmark,
    store_read_benchmark,
    store_patch_benchmark,
    reducer_benchmark,
    store_subscribe_benchmark,
    projection_benchmark,
);
criterion_main!(benches);
