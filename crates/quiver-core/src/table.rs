//! Chunked columns and tables.
//!
//! A `Table` is an ordered list of record batches sharing one logical schema.
//! Columns of a table are `ChunkedArray`s: one chunk per batch, never copied
//! until someone asks for a contiguous array.

use std::fmt;
use std::sync::Arc;

use crate::array::{Array, NativeType};
use crate::batch::RecordBatch;
use crate::builder::{ArrayBuilder, PrimitiveBuilder};
use crate::error::{Error, Result};
use crate::scalar::Scalar;
use crate::schema::{DataType, Schema, SchemaRef};

/// Copy `arrays` into one contiguous array. All inputs must share a type.
pub fn concat_arrays(data_type: &DataType, arrays: &[Array]) -> Result<Array> {
    if let Some(array) = arrays.iter().find(|a| &a.data_type() != data_type) {
        return Err(Error::Type(format!(
            "cannot concatenate {} into {}",
            array.data_type(),
            data_type
        )));
    }
    let total = arrays.iter().map(Array::len).sum();
    let primitive = match data_type {
        DataType::Int16 => concat_primitive::<i16>(arrays, total),
        DataType::Int32 => concat_primitive::<i32>(arrays, total),
        DataType::Int64 => concat_primitive::<i64>(arrays, total),
        DataType::UInt64 => concat_primitive::<u64>(arrays, total),
        DataType::Float32 => concat_primitive::<f32>(arrays, total),
        DataType::Float64 => concat_primitive::<f64>(arrays, total),
        _ => None,
    };
    if let Some(array) = primitive {
        return Ok(array);
    }
    let mut builder = ArrayBuilder::with_capacity(data_type, total);
    for array in arrays {
        for i in 0..array.len() {
            builder.append_from(array, i)?;
        }
    }
    builder.finish()
}

/// Copies value slices directly; chunks without nulls skip validity checks.
fn concat_primitive<T: NativeType>(arrays: &[Array], total: usize) -> Option<Array> {
    let mut builder = PrimitiveBuilder::<T>::with_capacity(total);
    for array in arrays {
        let a = T::downcast(array)?;
        if a.null_count() == 0 {
            builder.append_values(a.values());
        } else {
            for v in a.iter() {
                builder.append_option(v);
            }
        }
    }
    Some(builder.finish())
}

/// A logical column split across several arrays of the same type.
#[derive(Clone, Debug)]
pub struct ChunkedArray {
    data_type: DataType,
    chunks: Vec<Array>,
}

impl ChunkedArray {
    pub fn try_new(data_type: DataType, chunks: Vec<Array>) -> Result<Self> {
        if let Some(bad) = chunks.iter().find(|c| c.data_type() != data_type) {
            return Err(Error::Type(format!(
                "chunk of type {} in a {} column",
                bad.data_type(),
                data_type
            )));
        }
        Ok(Self { data_type, chunks })
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn len(&self) -> usize {
        self.chunks.iter().map(Array::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn null_count(&self) -> usize {
        self.chunks.iter().map(Array::null_count).sum()
    }

    pub fn chunks(&self) -> &[Array] {
        &self.chunks
    }

    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Logical row `i`, crossing chunk boundaries.
    pub fn value_at(&self, i: usize) -> Result<Scalar> {
        let mut rest = i;
        for chunk in &self.chunks {
            if rest < chunk.len() {
                return chunk.value_at(rest);
            }
            rest -= chunk.len();
        }
        Err(Error::index_out_of_bounds(i, self.len()))
    }

    /// Contiguous copy of all chunks. A single chunk is returned as-is.
    pub fn concat(&self) -> Result<Array> {
        match self.chunks.as_slice() {
            [only] => Ok(only.clone()),
            chunks => concat_arrays(&self.data_type, chunks),
        }
    }
}

impl PartialEq for ChunkedArray {
    fn eq(&self, other: &Self) -> bool {
        self.data_type == other.data_type
            && self.len() == other.len()
            && match (self.concat(), other.concat()) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            }
    }
}

impl From<Array> for ChunkedArray {
    fn from(array: Array) -> Self {
        Self {
            data_type: array.data_type(),
            chunks: vec![array],
        }
    }
}

#[derive(Clone, Debug)]
pub struct Table {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl Table {
    /// Every batch must be type-compatible with `schema`.
    pub fn from_batches(schema: SchemaRef, batches: Vec<RecordBatch>) -> Result<Self> {
        for batch in &batches {
            schema.check_compatible(batch.schema())?;
        }
        Ok(Self { schema, batches })
    }

    /// Table with the first batch's schema. Fails on an empty list.
    pub fn try_from_batches(batches: Vec<RecordBatch>) -> Result<Self> {
        let schema = batches
            .first()
            .map(|b| Arc::clone(b.schema()))
            .ok_or_else(|| Error::InvalidArgument("cannot infer a schema from zero batches".into()))?;
        Self::from_batches(schema, batches)
    }

    pub fn empty(schema: SchemaRef) -> Self {
        Self {
            schema,
            batches: Vec::new(),
        }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn into_batches(self) -> Vec<RecordBatch> {
        self.batches
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    pub fn num_columns(&self) -> usize {
        self.schema.len()
    }

    /// Column at position `i` as a chunked array.
    pub fn column_at(&self, i: usize) -> Result<ChunkedArray> {
        let field = self
            .schema
            .field(i)
            .ok_or_else(|| Error::index_out_of_bounds(i, self.schema.len()))?;
        let chunks = self
            .batches
            .iter()
            .filter_map(|b| b.column(i).cloned())
            .collect();
        ChunkedArray::try_new(field.data_type.clone(), chunks)
    }

    /// First column named `name`.
    pub fn column(&self, name: &str) -> Result<ChunkedArray> {
        let idx = self.schema.try_index_of(name)?;
        self.column_at(idx)
    }

    /// Zero-copy view of `len` rows starting at `offset`. Only the batches
    /// overlapping the range are kept; boundary batches are sliced.
    pub fn slice(&self, offset: usize, len: usize) -> Result<Self> {
        let total = self.num_rows();
        match offset.checked_add(len) {
            Some(end) if end <= total => {}
            _ => {
                return Err(Error::Index(format!(
                    "slice [{offset}, {offset}+{len}) out of bounds for {total} rows"
                )))
            }
        }

        let mut skip = offset;
        let mut remaining = len;
        let mut batches = Vec::new();
        for batch in &self.batches {
            if remaining == 0 {
                break;
            }
            let rows = batch.num_rows();
            if skip >= rows {
                skip -= rows;
                continue;
            }
            let take = (rows - skip).min(remaining);
            batches.push(if skip == 0 && take == rows {
                batch.clone()
            } else {
                batch.slice(skip, take)?
            });
            remaining -= take;
            skip = 0;
        }
        Ok(Self {
            schema: Arc::clone(&self.schema),
            batches,
        })
    }

    /// Append tables row-wise. Field count, names, and types must all match
    /// the first table's schema; nothing is cast or widened.
    pub fn concat(tables: &[Table]) -> Result<Self> {
        let first = tables
            .first()
            .ok_or_else(|| Error::InvalidArgument("concat of zero tables".into()))?;
        let mut batches = Vec::with_capacity(tables.iter().map(|t| t.batches.len()).sum());
        for table in tables {
            first.schema.check_compatible(&table.schema)?;
            batches.extend(table.batches.iter().cloned());
        }
        Ok(Self {
            schema: Arc::clone(&first.schema),
            batches,
        })
    }

    /// Table holding a single contiguous batch.
    pub fn combine_chunks(&self) -> Result<Self> {
        let columns = (0..self.num_columns())
            .map(|i| self.column_at(i)?.concat())
            .collect::<Result<Vec<_>>>()?;
        let batch = if self.batches.is_empty() {
            RecordBatch::new_empty(Arc::clone(&self.schema))?
        } else {
            RecordBatch::try_new(Arc::clone(&self.schema), columns)?
        };
        Ok(Self {
            schema: Arc::clone(&self.schema),
            batches: vec![batch],
        })
    }

    /// Bytes held by the buffers backing this table. Buffers shared between
    /// batches are counted once per batch.
    pub fn nbytes(&self) -> usize {
        self.batches
            .iter()
            .map(RecordBatch::get_array_memory_size)
            .sum()
    }

    /// Same rows, reordered/selected columns.
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        let fields = indices
            .iter()
            .map(|&i| {
                self.schema
                    .field(i)
                    .cloned()
                    .ok_or_else(|| Error::index_out_of_bounds(i, self.schema.len()))
            })
            .collect::<Result<Vec<_>>>()?;
        let batches = self
            .batches
            .iter()
            .map(|b| b.project(indices))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            schema: Arc::new(Schema::new(fields)),
            batches,
        })
    }
}

impl From<RecordBatch> for Table {
    fn from(batch: RecordBatch) -> Self {
        Self {
            schema: Arc::clone(batch.schema()),
            batches: vec![batch],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.schema)?;
        for (i, batch) in self.batches.iter().enumerate() {
            writeln!(f, "-- batch {i} ({} rows)", batch.num_rows())?;
            write!(f, "{batch}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{PrimitiveArray, StringArray};
    use crate::schema::Field;

    fn batch(ids: Vec<i64>, names: Vec<&str>) -> RecordBatch {
        RecordBatch::try_from_iter([
            ("id", Array::from(PrimitiveArray::<i64>::from_vec(ids))),
            ("name", Array::from(StringArray::from(names))),
        ])
        .unwrap()
    }

    #[test]
    fn slice_keeps_minimal_batches() {
        let t = Table::try_from_batches(vec![
            batch(vec![1, 2, 3], vec!["a", "b", "c"]),
            batch(vec![4, 5], vec!["d", "e"]),
            batch(vec![6], vec!["f"]),
        ])
        .unwrap();
        assert_eq!(t.num_rows(), 6);

        let s = t.slice(2, 3).unwrap();
        assert_eq!(s.batches().len(), 2);
        assert_eq!(s.num_rows(), 3);
        let ids = s.column("id").unwrap().concat().unwrap();
        assert_eq!(ids, PrimitiveArray::<i64>::from_vec(vec![3, 4, 5]).into());

        // the second batch is taken whole and shares its buffers
        let original = t.batches()[1].column(0).unwrap().as_primitive::<i64>().unwrap();
        let kept = s.batches()[1].column(0).unwrap().as_primitive::<i64>().unwrap();
        assert!(original.values_buffer().ptr_eq(kept.values_buffer()));

        assert!(t.slice(5, 2).is_err());
        assert_eq!(t.slice(6, 0).unwrap().num_rows(), 0);
    }

    #[test]
    fn concat_arrays_mixes_sliced_and_nullable_chunks() {
        let dense: Array = PrimitiveArray::<i32>::from_vec(vec![1, 2, 3, 4]).into();
        let sparse: Array = PrimitiveArray::<i32>::from(vec![None, Some(6)]).into();
        let out = concat_arrays(&DataType::Int32, &[dense.slice(1, 2).unwrap(), sparse]).unwrap();
        assert_eq!(out.to_string(), "[2, 3, null, 6]");
        assert_eq!(out.null_count(), 1);

        let words: Array = StringArray::from(vec![Some("a"), None]).into();
        let joined = concat_arrays(&DataType::Utf8, &[words.clone(), words]).unwrap();
        assert_eq!(joined.to_string(), "[\"a\", null, \"a\", null]");
    }

    #[test]
    fn concat_checks_names_and_types() {
        let a = Table::from(batch(vec![1], vec!["a"]));
        let b = Table::from(batch(vec![2, 3], vec!["b", "c"]));
        let joined = Table::concat(&[a.clone(), b]).unwrap();
        assert_eq!(joined.num_rows(), 3);

        let renamed = Table::from(
            RecordBatch::try_from_iter([
                ("key", Array::from(PrimitiveArray::<i64>::from_vec(vec![1]))),
                ("name", Array::from(StringArray::from(vec!["x"]))),
            ])
            .unwrap(),
        );
        assert!(matches!(
            Table::concat(&[a.clone(), renamed]),
            Err(Error::SchemaMismatch(_))
        ));

        let retyped = Table::from(
            RecordBatch::try_from_iter([
                ("id", Array::from(PrimitiveArray::<i32>::from_vec(vec![1]))),
                ("name", Array::from(StringArray::from(vec!["x"]))),
            ])
            .unwrap(),
        );
        assert!(matches!(Table::concat(&[a, retyped]), Err(Error::Type(_))));
    }

    #[test]
    fn column_lookup_and_combine() {
        let t = Table::try_from_batches(vec![
            batch(vec![1, 2], vec!["a", "b"]),
            batch(vec![3], vec!["c"]),
        ])
        .unwrap();
        assert!(matches!(t.column("missing"), Err(Error::NoSuchField(_))));

        let names = t.column("name").unwrap();
        assert_eq!(names.num_chunks(), 2);
        assert_eq!(names.value_at(2).unwrap(), Scalar::Str("c".into()));
        match names.value_at(7) {
            Err(Error::Index(m)) => assert_eq!(m, "index 7 out of bounds for length 3"),
            other => panic!("expected an index error, got {other:?}"),
        }

        let combined = t.combine_chunks().unwrap();
        assert_eq!(combined.batches().len(), 1);
        assert_eq!(combined.num_rows(), 3);
        assert!(combined.nbytes() > 0);
    }

    #[test]
    fn from_batches_rejects_incompatible_batch() {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        let err = Table::from_batches(schema, vec![batch(vec![1], vec!["a"])]);
        assert!(matches!(err, Err(Error::SchemaMismatch(_))));
    }
}
