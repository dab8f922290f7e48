//! Benchmarks for vireo-engine maintenance paths.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vireo_core::{DataType, Row, TableDef, Value};
use vireo_engine::{
    AggFunc, CmpOp, Delta, MergeEngine, Predicate, Propagator, QueryNode, ResultDelta,
    TransitionLog, ViewDescriptor, ViewState,
};
use vireo_storage::TableSet;

fn make_tables(rows: i64) -> TableSet {
    let mut tables = TableSet::new();
    tables
        .create_table(
            TableDef::builder("orders")
                .column("user_id", DataType::Int64)
                .column("amount", DataType::Int64)
                .build()
                .unwrap(),
        )
        .unwrap();
    for i in 0..rows {
        tables
            .table_mut("orders")
            .unwrap()
            .insert(Row::create(vec![
                Value::Int64(i % 50),
                Value::Int64(i * 10),
            ]))
            .unwrap();
    }
    tables
}

fn bench_propagate_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagate/filter");
    let tables = make_tables(1000);
    let descriptor = ViewDescriptor::new(
        "v",
        QueryNode::scan("orders").filter(Predicate::compare(1, CmpOp::Gt, Value::Int64(100))),
    );

    for size in [1, 10, 100] {
        let mut log = TransitionLog::new();
        for i in 0..size {
            log.table_mut("orders")
                .record_insert(Row::create(vec![Value::Int64(i), Value::Int64(i * 10)]));
        }
        group.bench_with_input(BenchmarkId::new("statement", size), &log, |b, log| {
            let propagator = Propagator::new(&tables);
            b.iter(|| propagator.propagate(black_box(&descriptor), black_box(log)).unwrap())
        });
    }
    group.finish();
}

fn bench_merge_grouped(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge/grouped");
    let descriptor = ViewDescriptor::new(
        "v",
        QueryNode::scan("orders").aggregate(vec![0], vec![AggFunc::CountStar, AggFunc::Sum(1)]),
    );

    struct NoRescan;
    impl vireo_engine::GroupRescan for NoRescan {
        fn rescan(
            &self,
            _: &ViewDescriptor,
            _: &[Value],
            _: usize,
        ) -> vireo_core::Result<Vec<Value>> {
            Ok(Vec::new())
        }
    }

    for size in [10, 100, 1000] {
        let input: Vec<Delta> = (0..size)
            .map(|i| {
                Delta::insert(Row::detached(vec![
                    Value::Int64(i % 50),
                    Value::Int64(i * 10),
                ]))
            })
            .collect();
        group.bench_with_input(BenchmarkId::new("insert_batch", size), &input, |b, input| {
            b.iter(|| {
                let mut state = ViewState::new(&descriptor);
                MergeEngine::apply(
                    &descriptor,
                    &mut state,
                    &ResultDelta::Grouped {
                        input: input.clone(),
                    },
                    &NoRescan,
                )
                .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_full_refresh(c: &mut Criterion) {
    let mut group = c.benchmark_group("refresh");

    for size in [100, 1000] {
        let tables = make_tables(size);
        let descriptor = ViewDescriptor::new(
            "v",
            QueryNode::scan("orders").aggregate(vec![0], vec![AggFunc::CountStar, AggFunc::Avg(1)]),
        );
        group.bench_with_input(
            BenchmarkId::new("full_delta", size),
            &tables,
            |b, tables| {
                let propagator = Propagator::new(tables);
                b.iter(|| propagator.full_delta(black_box(&descriptor)).unwrap())
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_propagate_filter,
    bench_merge_grouped,
    bench_full_refresh,
);

criterion_main!(benches);
