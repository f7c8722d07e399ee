//! Polymorphic kernel argument / result.

use crate::array::Array;
use crate::batch::RecordBatch;
use crate::error::{Error, Result};
use crate::scalar::Scalar;
use crate::table::{ChunkedArray, Table};

#[derive(Clone, Debug)]
pub enum Datum {
    Scalar(Scalar),
    Array(Array),
    ChunkedArray(ChunkedArray),
    Table(Table),
}

impl Datum {
    pub fn kind(&self) -> &'static str {
        match self {
            Datum::Scalar(_) => "scalar",
            Datum::Array(_) => "array",
            Datum::ChunkedArray(_) => "chunked array",
            Datum::Table(_) => "table",
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Datum::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Datum::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_chunked(&self) -> Option<&ChunkedArray> {
        match self {
            Datum::ChunkedArray(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Datum::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn into_scalar(self) -> Result<Scalar> {
        match self {
            Datum::Scalar(s) => Ok(s),
            other => Err(other.unexpected("scalar")),
        }
    }

    /// Array, or a chunked array flattened into one.
    pub fn into_array(self) -> Result<Array> {
        match self {
            Datum::Array(a) => Ok(a),
            Datum::ChunkedArray(c) => c.concat(),
            other => Err(other.unexpected("array")),
        }
    }

    pub fn into_table(self) -> Result<Table> {
        match self {
            Datum::Table(t) => Ok(t),
            other => Err(other.unexpected("table")),
        }
    }

    fn unexpected(&self, wanted: &str) -> Error {
        Error::Type(format!("expected a {wanted} datum, got a {}", self.kind()))
    }
}

impl From<Scalar> for Datum {
    fn from(s: Scalar) -> Self {
        Datum::Scalar(s)
    }
}

impl From<Array> for Datum {
    fn from(a: Array) -> Self {
        Datum::Array(a)
    }
}

impl From<ChunkedArray> for Datum {
    fn from(c: ChunkedArray) -> Self {
        Datum::ChunkedArray(c)
    }
}

impl From<Table> for Datum {
    fn from(t: Table) -> Self {
        Datum::Table(t)
    }
}

impl From<RecordBatch> for Datum {
    fn from(b: RecordBatch) -> Self {
        Datum::Table(Table::from(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::PrimitiveArray;

    #[test]
    fn accessors_reject_the_wrong_kind() {
        let d = Datum::from(Scalar::I64(3));
        assert_eq!(d.as_scalar(), Some(&Scalar::I64(3)));
        assert!(d.clone().into_array().is_err());

        let c = ChunkedArray::try_new(
            crate::schema::DataType::Int32,
            vec![
                PrimitiveArray::<i32>::from_vec(vec![1]).into(),
                PrimitiveArray::<i32>::from_vec(vec![2, 3]).into(),
            ],
        )
        .unwrap();
        let flat = Datum::from(c).into_array().unwrap();
        assert_eq!(flat, PrimitiveArray::<i32>::from_vec(vec![1, 2, 3]).into());
    }
}
