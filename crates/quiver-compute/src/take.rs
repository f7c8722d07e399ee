//! Gather rows by index.
//!
//! Every non-null index must be in bounds; a null index produces a null
//! output row.

use std::sync::Arc;

use quiver_core::array::{NativeType, PrimitiveArray};
use quiver_core::buffer::{BitmapBuilder, ScalarBuffer};
use quiver_core::builder::{ArrayBuilder, BooleanBuilder, StringBuilder};
use quiver_core::{Array, Error, RecordBatch, Result, Table};

fn check_bounds(indices: &PrimitiveArray<u64>, len: usize) -> Result<()> {
    for i in indices.iter().flatten() {
        match usize::try_from(i) {
            Ok(i) if i < len => {}
            _ => {
                return Err(Error::Index(format!(
                    "take index {i} out of bounds for length {len}"
                )))
            }
        }
    }
    Ok(())
}

fn take_primitive<T: NativeType>(
    values: &PrimitiveArray<T>,
    indices: &PrimitiveArray<u64>,
) -> Result<PrimitiveArray<T>> {
    let needs_validity = values.null_count() > 0 || indices.null_count() > 0;
    let mut out = Vec::with_capacity(indices.len());
    let mut validity = BitmapBuilder::with_capacity(if needs_validity { indices.len() } else { 0 });
    for idx in indices.iter() {
        match idx {
            Some(i) => {
                let i = i as usize;
                out.push(values.value(i));
                if needs_validity {
                    validity.append(values.is_valid(i));
                }
            }
            None => {
                out.push(T::default());
                validity.append(false);
            }
        }
    }
    let validity = needs_validity.then(|| validity.finish());
    PrimitiveArray::try_new(ScalarBuffer::from_vec(out), validity)
}

/// Rows of `values` at `indices`, in index order.
pub fn take(values: &Array, indices: &PrimitiveArray<u64>) -> Result<Array> {
    check_bounds(indices, values.len())?;
    downcast_numeric!(values, a => Ok(take_primitive(a, indices)?.into()), _ => match values {
        Array::Boolean(a) => {
            let mut builder = BooleanBuilder::with_capacity(indices.len());
            for idx in indices.iter() {
                builder.append_option(idx.and_then(|i| a.get(i as usize)));
            }
            Ok(builder.finish())
        }
        Array::Utf8(a) => {
            let mut builder = StringBuilder::with_capacity(indices.len());
            for idx in indices.iter() {
                builder.append_option(idx.and_then(|i| a.get(i as usize)));
            }
            Ok(builder.finish())
        }
        _ => {
            let mut builder = ArrayBuilder::with_capacity(&values.data_type(), indices.len());
            for idx in indices.iter() {
                match idx {
                    Some(i) => builder.append_from(values, i as usize)?,
                    None => builder.append_null(),
                }
            }
            builder.finish()
        }
    })
}

pub fn take_record_batch(batch: &RecordBatch, indices: &PrimitiveArray<u64>) -> Result<RecordBatch> {
    check_bounds(indices, batch.num_rows())?;
    let columns = batch
        .columns()
        .iter()
        .map(|c| take(c, indices))
        .collect::<Result<Vec<_>>>()?;
    RecordBatch::try_new(Arc::clone(batch.schema()), columns)
}

/// Gathers across batch boundaries; the result is a single-batch table.
pub fn take_table(table: &Table, indices: &PrimitiveArray<u64>) -> Result<Table> {
    check_bounds(indices, table.num_rows())?;
    let combined = table.combine_chunks()?;
    let batch = match combined.batches().first() {
        Some(b) => take_record_batch(b, indices)?,
        None => RecordBatch::new_empty(Arc::clone(table.schema()))?,
    };
    Table::from_batches(Arc::clone(table.schema()), vec![batch])
}
