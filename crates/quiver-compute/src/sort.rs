//! Stable multi-key sort producing row indices.
//!
//! Nulls sort last for both orders. Rows whose keys compare equal keep their
//! input order.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use quiver_core::array::PrimitiveArray;
use quiver_core::{Array, Datum, Error, RecordBatch, Result, Table};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub name: String,
    pub order: SortOrder,
}

impl SortKey {
    pub fn ascending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: SortOrder::Ascending,
        }
    }

    pub fn descending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: SortOrder::Descending,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.order {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        };
        write!(f, "{} {dir}", self.name)
    }
}

fn compare_slots(column: &Array, order: SortOrder, i: usize, j: usize) -> Ordering {
    match (column.is_valid(i), column.is_valid(j)) {
        (false, false) => Ordering::Equal,
        (false, true) => Ordering::Greater,
        (true, false) => Ordering::Less,
        (true, true) => {
            let ord = column.cmp_rows(i, j);
            match order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            }
        }
    }
}

fn sort_columns(len: usize, columns: &[(Array, SortOrder)]) -> PrimitiveArray<u64> {
    let mut indices: Vec<usize> = (0..len).collect();
    indices.sort_by(|&i, &j| {
        for (column, order) in columns {
            match compare_slots(column, *order, i, j) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        Ordering::Equal
    });
    PrimitiveArray::from_vec(indices.into_iter().map(|i| i as u64).collect())
}

pub fn sort_indices_array(array: &Array, order: SortOrder) -> PrimitiveArray<u64> {
    sort_columns(array.len(), &[(array.clone(), order)])
}

pub fn sort_indices_batch(batch: &RecordBatch, keys: &[SortKey]) -> Result<PrimitiveArray<u64>> {
    if keys.is_empty() {
        return Err(Error::InvalidArgument("sort_indices needs at least one key".into()));
    }
    let columns = keys
        .iter()
        .map(|k| Ok((batch.column_by_name(&k.name)?.clone(), k.order)))
        .collect::<Result<Vec<_>>>()?;
    Ok(sort_columns(batch.num_rows(), &columns))
}

pub fn sort_indices_table(table: &Table, keys: &[SortKey]) -> Result<PrimitiveArray<u64>> {
    if keys.is_empty() {
        return Err(Error::InvalidArgument("sort_indices needs at least one key".into()));
    }
    let columns = keys
        .iter()
        .map(|k| Ok((table.column(&k.name)?.concat()?, k.order)))
        .collect::<Result<Vec<_>>>()?;
    Ok(sort_columns(table.num_rows(), &columns))
}

/// Sort a table, batch (as a one-batch table), array, or chunked array.
/// Arrays take their order from the first key, ascending if none is given;
/// key names are ignored for them.
pub fn sort_indices(input: &Datum, keys: &[SortKey]) -> Result<PrimitiveArray<u64>> {
    let order = keys.first().map_or(SortOrder::Ascending, |k| k.order);
    match input {
        Datum::Array(a) => Ok(sort_indices_array(a, order)),
        Datum::ChunkedArray(c) => Ok(sort_indices_array(&c.concat()?, order)),
        Datum::Table(t) => sort_indices_table(t, keys),
        Datum::Scalar(_) => Err(Error::Type("cannot sort a scalar".into())),
    }
}
