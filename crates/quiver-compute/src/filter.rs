//! Selection by boolean mask.
//!
//! The mask is turned into a selection vector of kept row indices and the
//! rows are gathered with `take`. A null mask entry drops its row.

use std::sync::Arc;

use quiver_core::array::{BooleanArray, PrimitiveArray};
use quiver_core::{Array, RecordBatch, Result, Table};

use crate::take::{take, take_record_batch};
use crate::util::check_same_len;

fn selection(mask: &BooleanArray) -> PrimitiveArray<u64> {
    let kept: Vec<u64> = (0..mask.len())
        .filter(|&i| mask.is_valid(i) && mask.value(i))
        .map(|i| i as u64)
        .collect();
    PrimitiveArray::from_vec(kept)
}

pub fn filter(values: &Array, mask: &BooleanArray) -> Result<Array> {
    check_same_len(values.len(), mask.len())?;
    if mask.true_count() == values.len() {
        return Ok(values.clone());
    }
    take(values, &selection(mask))
}

pub fn filter_record_batch(batch: &RecordBatch, mask: &BooleanArray) -> Result<RecordBatch> {
    check_same_len(batch.num_rows(), mask.len())?;
    if mask.true_count() == batch.num_rows() {
        return Ok(batch.clone());
    }
    take_record_batch(batch, &selection(mask))
}

/// Filters batch by batch, slicing the mask to each batch's rows.
pub fn filter_table(table: &Table, mask: &BooleanArray) -> Result<Table> {
    check_same_len(table.num_rows(), mask.len())?;
    let mut offset = 0;
    let mut batches = Vec::with_capacity(table.batches().len());
    for batch in table.batches() {
        let part = mask.slice(offset, batch.num_rows())?;
        offset += batch.num_rows();
        let kept = filter_record_batch(batch, &part)?;
        if kept.num_rows() > 0 {
            batches.push(kept);
        }
    }
    Table::from_batches(Arc::clone(table.schema()), batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_core::Error;

    #[test]
    fn null_mask_entries_drop_rows() {
        let a: Array = PrimitiveArray::<i64>::from_vec(vec![1, 2, 3, 4]).into();
        let mask = BooleanArray::from(vec![Some(true), None, Some(false), Some(true)]);
        let out = filter(&a, &mask).unwrap();
        assert_eq!(out, PrimitiveArray::<i64>::from_vec(vec![1, 4]).into());
    }

    #[test]
    fn mask_length_must_match() {
        let a: Array = PrimitiveArray::<i64>::from_vec(vec![1, 2]).into();
        let mask = BooleanArray::from(vec![true]);
        assert!(matches!(filter(&a, &mask), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn table_filter_spans_batches() {
        let b1 = RecordBatch::try_from_iter([(
            "v",
            Array::from(PrimitiveArray::<i32>::from_vec(vec![1, 2])),
        )])
        .unwrap();
        let b2 = RecordBatch::try_from_iter([(
            "v",
            Array::from(PrimitiveArray::<i32>::from_vec(vec![3, 4, 5])),
        )])
        .unwrap();
        let t = Table::try_from_batches(vec![b1, b2]).unwrap();
        let mask = BooleanArray::from(vec![false, false, true, false, true]);
        let out = filter_table(&t, &mask).unwrap();
        assert_eq!(out.batches().len(), 1);
        assert_eq!(
            out.column("v").unwrap().concat().unwrap(),
            PrimitiveArray::<i32>::from_vec(vec![3, 5]).into()
        );
    }
}
