//! Array, builder, and batch construction tests

mod test_data_gen;

use quiver_compute::take;
use quiver_core::array::PrimitiveArray;
use quiver_core::builder::{array_from_scalars, ArrayBuilder, StringBuilder, StructBuilder};
use quiver_core::{Array, DataType, Error, Field, RecordBatch, Scalar, Schema};
use std::sync::Arc;
use test_data_gen::int64_batch;

#[test]
fn test_take_full_range_is_identity() {
    let mut builder = ArrayBuilder::new(&DataType::Utf8);
    for v in [Some("a"), None, Some("c"), Some("")] {
        builder
            .append_scalar(&v.map(Scalar::from).unwrap_or(Scalar::Null))
            .expect("Append failed");
    }
    let array = builder.finish().expect("Finish failed");

    let all = PrimitiveArray::<u64>::from_vec((0..array.len() as u64).collect());
    let taken = take(&array, &all).expect("Take failed");
    assert_eq!(taken, array);
    assert_eq!(taken.null_count(), 1);
}

#[test]
fn test_builder_records_nulls() {
    let mut builder = StringBuilder::new();
    builder.append("x");
    builder.append_null();
    builder.append_option(Some("z"));
    let array = builder.finish();

    assert_eq!(array.len(), 3);
    assert_eq!(array.null_count(), 1);
    assert!(array.is_null(1));
    assert_eq!(array.value_at(2).expect("In bounds"), Scalar::Str("z".into()));
    // Builders reset after finish.
    assert!(builder.is_empty());
}

#[test]
fn test_value_at_out_of_bounds() {
    let batch = int64_batch("v", vec![Some(1), None]);
    let column = batch.column(0).expect("Column exists");
    assert_eq!(column.value_at(1).expect("In bounds"), Scalar::Null);
    assert!(matches!(column.value_at(2), Err(Error::Index(_))));
}

#[test]
fn test_struct_builder_child_length_mismatch() {
    let fields = vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, true),
    ];
    let mut builder = StructBuilder::new(fields);
    builder
        .field_builder(0)
        .and_then(|b| b.as_primitive_mut::<i64>())
        .expect("Int64 child")
        .append(1);
    builder
        .field_builder(1)
        .and_then(|b| b.as_string_mut())
        .expect("Utf8 child")
        .append("one");
    builder.append(true);

    // Second row only advances the first child.
    builder
        .field_builder(0)
        .and_then(|b| b.as_primitive_mut::<i64>())
        .expect("Int64 child")
        .append(2);
    builder.append(true);

    assert!(matches!(builder.finish(), Err(Error::SchemaMismatch(_))));
}

#[test]
fn test_struct_builder_from_scalars() {
    let data_type = DataType::Struct(vec![
        Field::new("min", DataType::Int64, true),
        Field::new("max", DataType::Int64, true),
    ]);
    let array = array_from_scalars(
        &data_type,
        &[
            Scalar::Struct(vec![Scalar::I64(1), Scalar::I64(9)]),
            Scalar::Null,
        ],
    )
    .expect("Build failed");

    assert_eq!(array.len(), 2);
    assert_eq!(array.null_count(), 1);
    let s = array.as_struct().expect("Struct array");
    assert_eq!(
        s.child_by_name("max").expect("Child exists").value_at(0).expect("In bounds"),
        Scalar::I64(9)
    );
}

#[test]
fn test_record_batch_rejects_ragged_columns() {
    let schema = Arc::new(Schema::new(vec![
        Field::new("a", DataType::Int64, true),
        Field::new("b", DataType::Int64, true),
    ]));
    let result = RecordBatch::try_new(
        schema,
        vec![
            Array::from(PrimitiveArray::<i64>::from_vec(vec![1, 2])),
            Array::from(PrimitiveArray::<i64>::from_vec(vec![1])),
        ],
    );
    assert!(result.is_err());
}

#[test]
fn test_batch_slice_shares_buffers() {
    let batch = int64_batch("v", vec![Some(1), Some(2), Some(3), Some(4)]);
    let sliced = batch.slice(1, 2).expect("Slice failed");
    let full = batch.column(0).and_then(|c| c.as_primitive::<i64>()).expect("Int64");
    let part = sliced.column(0).and_then(|c| c.as_primitive::<i64>()).expect("Int64");
    assert_eq!(part.values(), &[2, 3]);
    assert!(part.values_buffer().ptr_eq(full.values_buffer()));
}
