//! Benchmarks for stratalog-incremental.
//!
//! Target: single edge update on a 1000-node chain < 1ms

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use stratalog_core::schema::RelationBuilder;
use stratalog_core::{tuple, DataType, KeyProjection, Tuple};
use stratalog_incremental::{
    join_changes, ArrangementStore, Change, ChangeBatch, ChangeBatchExt, DataflowState, EvalStats,
    Journal, JoinSide, Program, ProgramBuilder, RelId, Scheduler, Timestamp,
};

const T: Timestamp = Timestamp::at_epoch(1);

fn inserts(size: i64) -> ChangeBatch<Tuple> {
    (0..size).map(|i| Change::insert(tuple![i, i % 10], T)).collect()
}

fn bench_consolidate(c: &mut Criterion) {
    let mut group = c.benchmark_group("consolidate");

    for size in [10, 100, 1000] {
        // Every tuple inserted and deleted once
        let mut changes = inserts(size);
        changes.extend(inserts(size).into_iter().map(|c| Change::delete(c.data, c.time)));

        group.bench_with_input(BenchmarkId::new("cancelling", size), &changes, |b, changes| {
            b.iter(|| black_box(changes.clone()).consolidate())
        });
    }

    group.finish();
}

fn bench_arrangement_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("arrangement");

    for size in [10, 100, 1000] {
        let changes = inserts(size);
        group.bench_with_input(BenchmarkId::new("apply", size), &changes, |b, changes| {
            b.iter_batched(
                || {
                    let mut store = ArrangementStore::new();
                    let handle = store.get_or_create(0, KeyProjection::new(vec![1]));
                    (store, handle)
                },
                |(mut store, handle)| store.apply(handle, black_box(changes.clone())),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("join");

    // 1000 employees over 10 departments
    let key = KeyProjection::new(vec![1]);
    let dept_key = KeyProjection::new(vec![0]);
    let mut store = ArrangementStore::new();
    let employees = store.get_or_create(0, key.clone());
    let departments = store.get_or_create(1, dept_key.clone());
    store.apply(employees, inserts(1000));
    store.apply(
        departments,
        (0..10i64).map(|d| Change::insert(tuple![d, "dept"], T)).collect(),
    );

    for size in [1, 10, 100] {
        let delta: ChangeBatch<Tuple> = (0..size as i64)
            .map(|i| Change::insert(tuple![i % 10, "renamed"], T))
            .collect();
        group.bench_with_input(BenchmarkId::new("department_change", size), &delta, |b, delta| {
            b.iter(|| {
                let mut stats = EvalStats::default();
                join_changes(
                    0,
                    JoinSide {
                        delta: &[],
                        key: &key,
                        arrangement: store.get(employees),
                    },
                    JoinSide {
                        delta: black_box(delta),
                        key: &dept_key,
                        arrangement: store.get(departments),
                    },
                    |l: &Tuple, r: &Tuple| Ok(l.concat(r)),
                    &mut stats,
                )
            })
        });
    }

    group.finish();
}

fn closure_program() -> (Program, RelId) {
    let pair = |name: &str| {
        RelationBuilder::new(name)
            .and_then(|r| r.add_column("src", DataType::Int))
            .and_then(|r| r.add_column("dst", DataType::Int))
    };
    let mut builder = ProgramBuilder::new();
    let edge = builder
        .relation(pair("edge").unwrap().input().build().unwrap())
        .unwrap();
    let path = builder
        .relation(pair("path").unwrap().output().build().unwrap())
        .unwrap();
    let base = builder.scan(edge).unwrap();
    builder.rule(path, base).unwrap();
    let step = builder
        .join_with(path, [1], edge, [0], |p: &Tuple, e: &Tuple| {
            Ok(Tuple::new(vec![p[0].clone(), e[1].clone()]))
        })
        .unwrap();
    builder.rule(path, step).unwrap();
    (builder.build().unwrap(), edge)
}

fn bench_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit");
    group.sample_size(20);

    for size in [10, 50] {
        let (program, edge) = closure_program();
        let mut state = DataflowState::new(&program);
        let chain: Vec<_> = (0..size as i64).map(|i| (edge, tuple![i, i + 1], 1)).collect();
        Scheduler::new()
            .run(&program, &mut state, &mut Journal::new(), 1, &chain)
            .unwrap();

        // Appending one edge to the end of the chain extends every path
        let append = [(edge, tuple![size as i64, size as i64 + 1], 1)];
        group.bench_with_input(BenchmarkId::new("chain_append", size), &append, |b, append| {
            b.iter_batched(
                || state.clone(),
                |mut state| {
                    Scheduler::new()
                        .run(&program, &mut state, &mut Journal::new(), 2, black_box(append))
                        .unwrap()
                },
                BatchSize::LargeInput,
            )
        });

        // Cutting the chain in the middle removes a quarter of the paths
        let cut = [(edge, tuple![size as i64 / 2, size as i64 / 2 + 1], -1)];
        group.bench_with_input(BenchmarkId::new("chain_cut", size), &cut, |b, cut| {
            b.iter_batched(
                || state.clone(),
                |mut state| {
                    Scheduler::new()
                        .run(&program, &mut state, &mut Journal::new(), 2, black_box(cut))
                        .unwrap()
                },
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_consolidate,
    bench_arrangement_apply,
    bench_join,
    bench_commit,
);

criterion_main!(benches);
