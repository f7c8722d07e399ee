//! Shared data builders for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use quiver_core::array::{PrimitiveArray, StringArray};
use quiver_core::{Array, DataType, Field, RecordBatch, Schema, SchemaRef};

pub fn int64_schema(name: &str) -> SchemaRef {
    Arc::new(Schema::new(vec![Field::new(name, DataType::Int64, true)]))
}

/// Single nullable Int64 column named `name`.
pub fn int64_batch(name: &str, values: Vec<Option<i64>>) -> RecordBatch {
    RecordBatch::try_new(
        int64_schema(name),
        vec![Array::from(PrimitiveArray::<i64>::from(values))],
    )
    .expect("Failed to build batch")
}

pub fn int64_values(name: &str, values: &[i64]) -> RecordBatch {
    int64_batch(name, values.iter().copied().map(Some).collect())
}

/// `key` (Int64) and `value` (Int64) columns.
pub fn keyed_batch(keys: &[i64], values: &[i64]) -> RecordBatch {
    RecordBatch::try_from_iter([
        ("key", Array::from(PrimitiveArray::<i64>::from_vec(keys.to_vec()))),
        ("value", Array::from(PrimitiveArray::<i64>::from_vec(values.to_vec()))),
    ])
    .expect("Failed to build keyed batch")
}

/// `rows` rows cycling through `groups` string keys with float values.
pub fn generate_grouped_batch(rows: usize, groups: usize) -> RecordBatch {
    let names: Vec<String> = (0..rows).map(|i| format!("group-{}", i % groups)).collect();
    let keys: Vec<&str> = names.iter().map(String::as_str).collect();
    let values: Vec<f64> = (0..rows).map(|i| (i % 10) as f64).collect();
    RecordBatch::try_from_iter([
        ("group", Array::from(StringArray::from(keys))),
        ("value", Array::from(PrimitiveArray::<f64>::from_vec(values))),
    ])
    .expect("Failed to build grouped batch")
}

/// Collect an Int64 column's values, nulls included.
pub fn int64_column(batch: &RecordBatch, name: &str) -> Vec<Option<i64>> {
    batch
        .column_by_name(name)
        .expect("Missing column")
        .as_primitive::<i64>()
        .expect("Not an int64 column")
        .iter()
        .collect()
}
