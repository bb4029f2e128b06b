use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use dirtyscope::runtime::TurnQueue;
use dirtyscope::{Scope, Value};

fn bench_scope() -> Scope {
    Scope::builder().scheduler(TurnQueue::new()).build()
}

fn scope_creation_benchmark(c: &mut Criterion) {
    c.bench_function("scope_creation", |b| {
        b.iter(|| {
            let scope = bench_scope();
            black_box(scope.new_child())
        });
    });
}

fn clean_digest_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("clean_digest");

    for watcher_count in [10, 100, 1000].iter() {
        let scope = bench_scope();
        scope.set("array", Value::array(0..*watcher_count));
        for i in 0..*watcher_count as usize {
            scope.watch(move |s| s.get("array").index(i), |_, _, _| {});
        }
        scope.digest().unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(watcher_count),
            watcher_count,
            |b, _| {
                b.iter(|| {
                    scope.digest().unwrap();
                });
            },
        );
    }
    group.finish();
}

fn single_change_digest_benchmark(c: &mut Criterion) {
    let scope = bench_scope();
    scope.set("array", Value::array(0..100));
    for i in 0..100 {
        scope.watch(move |s| s.get("array").index(i), |_, _, _| {});
    }
    scope.digest().unwrap();

    c.bench_function("single_change_digest", |b| {
        let mut i = 0;
        b.iter(|| {
            scope.get("array").set_index(0, black_box(i));
            scope.digest().unwrap();
            i += 1;
        });
    });
}

fn deep_watch_benchmark(c: &mut Criterion) {
    let scope = bench_scope();
    scope.set("items", Value::array(0..256));
    scope.watch_deep(|s| s.get("items"), |_, _, _| {});
    scope.digest().unwrap();

    c.bench_function("deep_watch_digest", |b| {
        b.iter(|| {
            scope.digest().unwrap();
        });
    });
}

fn tree_digest_benchmark(c: &mut Criterion) {
    let root = bench_scope();
    root.set("value", 0);
    let mut parent = root.clone();
    for _ in 0..50 {
        let child = parent.new_child();
        child.watch(|s| s.get("value"), |_, _, _| {});
        parent = child;
    }
    root.digest().unwrap();

    c.bench_function("tree_digest", |b| {
        let mut i = 0;
        b.iter(|| {
            root.apply(|s| s.set("value", black_box(i))).unwrap();
            i += 1;
        });
    });
}

criterion_group!(
    benches,
    scope_creation_benchmark,
    clean_digest_benchmark,
    single_change_digest_benchmark,
    deep_watch_benchmark,
    tree_digest_benchmark,
);
criterion_main!(benches);
