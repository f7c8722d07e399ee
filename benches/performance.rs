use criterion::{criterion_group, criterion_main, Criterion};
use quiver_compute::{
    add, col, filter_record_batch, grouped_aggregate, lit, sort_indices_batch, take, AggregateFunc,
    AggregateSpec, SortKey,
};
use quiver_core::array::{PrimitiveArray, StringArray};
use quiver_core::{Array, Datum, RecordBatch, Scalar};

fn make_batch(rows: usize) -> RecordBatch {
    let groups: Vec<String> = (0..rows).map(|i| format!("group-{}", i % 16)).collect();
    let group_refs: Vec<&str> = groups.iter().map(String::as_str).collect();
    // Deterministic shuffle so sorts do real work.
    let orders: Vec<i64> = (0..rows as i64).map(|i| (i * 7919) % rows as i64).collect();
    let values: Vec<f64> = (0..rows).map(|i| (i % 10) as f64).collect();
    RecordBatch::try_from_iter([
        ("group", Array::from(StringArray::from(group_refs))),
        ("order", Array::from(PrimitiveArray::<i64>::from_vec(orders))),
        ("value", Array::from(PrimitiveArray::<f64>::from_vec(values))),
    ])
    .unwrap()
}

fn bench_kernels(c: &mut Criterion) {
    let batch = make_batch(64 * 1024);
    let order = batch.column_by_name("order").unwrap().clone();

    c.bench_function("add_scalar", |b| {
        b.iter(|| add(&order, &Datum::Scalar(Scalar::I64(10))).unwrap())
    });

    c.bench_function("sort_indices", |b| {
        b.iter(|| sort_indices_batch(&batch, &[SortKey::ascending("order")]).unwrap())
    });

    let indices = sort_indices_batch(&batch, &[SortKey::ascending("order")]).unwrap();
    c.bench_function("take", |b| b.iter(|| take(&order, &indices).unwrap()));

    let predicate = col("value").gt(lit(4.0));
    c.bench_function("filter", |b| {
        b.iter(|| {
            let mask = predicate.evaluate(&batch).unwrap();
            filter_record_batch(&batch, mask.as_boolean().unwrap()).unwrap()
        })
    });
}

fn bench_grouped_aggregate(c: &mut Criterion) {
    let batch = make_batch(64 * 1024);
    let keys = vec!["group".to_string()];
    let aggregates = vec![
        AggregateSpec::new(AggregateFunc::Sum, "value", "total"),
        AggregateSpec::new(AggregateFunc::Mean, "value", "mean"),
    ];
    c.bench_function("grouped_aggregate", |b| {
        b.iter(|| grouped_aggregate(&batch, &keys, &aggregates).unwrap())
    });
}

criterion_group!(kernels, bench_kernels, bench_grouped_aggregate);
criterion_main!(kernels);
