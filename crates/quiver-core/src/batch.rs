//! Record batches: row-aligned columns under one schema.

use std::fmt;
use std::sync::Arc;

use crate::array::Array;
use crate::error::{Error, Result};
use crate::schema::{Field, Schema, SchemaRef};

#[derive(Clone, Debug, PartialEq)]
pub struct RecordBatch {
    schema: SchemaRef,
    columns: Vec<Array>,
    num_rows: usize,
}

impl RecordBatch {
    /// Checks that there is one column per field, that every column has the
    /// field's type, and that all columns have the same length.
    pub fn try_new(schema: SchemaRef, columns: Vec<Array>) -> Result<Self> {
        if columns.len() != schema.fields.len() {
            return Err(Error::SchemaMismatch(format!(
                "schema has {} fields but {} columns were given",
                schema.fields.len(),
                columns.len()
            )));
        }
        let num_rows = columns.first().map_or(0, Array::len);
        for (field, column) in schema.fields.iter().zip(columns.iter()) {
            if column.data_type() != field.data_type {
                return Err(Error::SchemaMismatch(format!(
                    "column '{}' is {}, schema declares {}",
                    field.name,
                    column.data_type(),
                    field.data_type
                )));
            }
            if column.len() != num_rows {
                return Err(Error::SchemaMismatch(format!(
                    "column '{}' has {} rows, expected {}",
                    field.name,
                    column.len(),
                    num_rows
                )));
            }
        }
        Ok(Self {
            schema,
            columns,
            num_rows,
        })
    }

    /// Infer a nullable schema from named columns.
    pub fn try_from_iter<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Array)>,
        S: Into<String>,
    {
        let (fields, arrays): (Vec<Field>, Vec<Array>) = columns
            .into_iter()
            .map(|(name, array)| (Field::new(name, array.data_type(), true), array))
            .unzip();
        Self::try_new(Arc::new(Schema::new(fields)), arrays)
    }

    /// Batch with no rows.
    pub fn new_empty(schema: SchemaRef) -> Result<Self> {
        let columns = schema
            .fields
            .iter()
            .map(|f| crate::builder::ArrayBuilder::new(&f.data_type).finish())
            .collect::<Result<Vec<_>>>()?;
        Self::try_new(schema, columns)
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, i: usize) -> Option<&Array> {
        self.columns.get(i)
    }

    pub fn columns(&self) -> &[Array] {
        &self.columns
    }

    /// First column named `name`.
    pub fn column_by_name(&self, name: &str) -> Result<&Array> {
        let idx = self.schema.try_index_of(name)?;
        Ok(&self.columns[idx])
    }

    /// Zero-copy view over `len` rows starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Result<Self> {
        let columns = self
            .columns
            .iter()
            .map(|c| c.slice(offset, len))
            .collect::<Result<Vec<_>>>()?;
        if columns.is_empty() && offset + len > self.num_rows {
            return Err(Error::index_out_of_bounds(offset + len, self.num_rows));
        }
        Ok(Self {
            schema: Arc::clone(&self.schema),
            columns,
            num_rows: len,
        })
    }

    /// Keep the columns at `indices`, in that order.
    pub fn project(&self, indices: &[usize]) -> Result<Self> {
        let mut fields = Vec::with_capacity(indices.len());
        let mut columns = Vec::with_capacity(indices.len());
        for &i in indices {
            let field = self
                .schema
                .field(i)
                .ok_or_else(|| Error::index_out_of_bounds(i, self.columns.len()))?;
            fields.push(field.clone());
            columns.push(self.columns[i].clone());
        }
        Ok(Self {
            schema: Arc::new(Schema::new(fields)),
            columns,
            num_rows: self.num_rows,
        })
    }

    /// Same columns under a different (type-compatible) schema.
    pub fn with_schema(self, schema: SchemaRef) -> Result<Self> {
        Self::try_new(schema, self.columns)
    }

    pub fn get_array_memory_size(&self) -> usize {
        self.columns.iter().map(Array::get_array_memory_size).sum()
    }
}

impl fmt::Display for RecordBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (field, column) in self.schema.fields.iter().zip(self.columns.iter()) {
            writeln!(f, "{}: {}", field.name, column)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{PrimitiveArray, StringArray};
    use crate::schema::DataType;

    #[test]
    fn try_new_enforces_shape() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("a", DataType::Int64, false),
            Field::new("b", DataType::Utf8, true),
        ]));
        let ok = RecordBatch::try_new(
            schema.clone(),
            vec![
                PrimitiveArray::<i64>::from_vec(vec![1, 2]).into(),
                StringArray::from(vec!["x", "y"]).into(),
            ],
        )
        .unwrap();
        assert_eq!(ok.num_rows(), 2);

        let short = RecordBatch::try_new(
            schema.clone(),
            vec![
                PrimitiveArray::<i64>::from_vec(vec![1, 2]).into(),
                StringArray::from(vec!["x"]).into(),
            ],
        );
        assert!(matches!(short, Err(Error::SchemaMismatch(_))));

        let wrong_type = RecordBatch::try_new(
            schema,
            vec![
                PrimitiveArray::<i32>::from_vec(vec![1, 2]).into(),
                StringArray::from(vec!["x", "y"]).into(),
            ],
        );
        assert!(matches!(wrong_type, Err(Error::SchemaMismatch(_))));
    }

    #[test]
    fn slice_and_project() {
        let batch = RecordBatch::try_from_iter([
            ("k", Array::from(PrimitiveArray::<i64>::from_vec(vec![1, 2, 3]))),
            ("v", Array::from(StringArray::from(vec!["a", "b", "c"]))),
        ])
        .unwrap();
        let s = batch.slice(1, 2).unwrap();
        assert_eq!(s.num_rows(), 2);
        assert_eq!(s.column(1).unwrap().to_string(), "[\"b\", \"c\"]");

        let p = batch.project(&[1]).unwrap();
        assert_eq!(p.schema().fields[0].name, "v");
        assert!(batch.column_by_name("zzz").is_err());
    }
}
