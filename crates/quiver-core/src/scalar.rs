//! Single logical values.
//!
//! Scalars are the boxed, row-at-a-time view of array slots. Kernels stay on
//! the columnar path; scalars show up at the edges (literals, aggregate
//! results, dynamic builders, and row gathers).

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::DataType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(String),
    Struct(Vec<Scalar>),
}

impl Scalar {
    /// Type of a non-null primitive scalar. `Null` carries no type and a
    /// struct scalar does not know its field names.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Scalar::Null | Scalar::Struct(_) => None,
            Scalar::Bool(_) => Some(DataType::Boolean),
            Scalar::I16(_) => Some(DataType::Int16),
            Scalar::I32(_) => Some(DataType::Int32),
            Scalar::I64(_) => Some(DataType::Int64),
            Scalar::U64(_) => Some(DataType::UInt64),
            Scalar::F32(_) => Some(DataType::Float32),
            Scalar::F64(_) => Some(DataType::Float64),
            Scalar::Str(_) => Some(DataType::Utf8),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::I16(v) => Some(*v as f64),
            Scalar::I32(v) => Some(*v as f64),
            Scalar::I64(v) => Some(*v as f64),
            Scalar::U64(v) => Some(*v as f64),
            Scalar::F32(v) => Some(*v as f64),
            Scalar::F64(v) => Some(*v),
            _ => None,
        }
    }

    fn as_i128(&self) -> Option<i128> {
        match self {
            Scalar::I16(v) => Some(*v as i128),
            Scalar::I32(v) => Some(*v as i128),
            Scalar::I64(v) => Some(*v as i128),
            Scalar::U64(v) => Some(*v as i128),
            _ => None,
        }
    }

    /// Convert to `target`. Integers convert to any integer type that can
    /// hold the value and to any float type; floats only convert between
    /// float types. `Null` converts to anything.
    pub fn cast_to(&self, target: &DataType) -> Result<Scalar> {
        if self.is_null() {
            return Ok(Scalar::Null);
        }
        if self.data_type().as_ref() == Some(target) {
            return Ok(self.clone());
        }
        let out_of_range = || Error::Type(format!("{self} does not fit in {target}"));
        if let Some(v) = self.as_i128() {
            return match target {
                DataType::Int16 => i16::try_from(v).map(Scalar::I16).map_err(|_| out_of_range()),
                DataType::Int32 => i32::try_from(v).map(Scalar::I32).map_err(|_| out_of_range()),
                DataType::Int64 => i64::try_from(v).map(Scalar::I64).map_err(|_| out_of_range()),
                DataType::UInt64 => u64::try_from(v).map(Scalar::U64).map_err(|_| out_of_range()),
                DataType::Float32 => Ok(Scalar::F32(v as f32)),
                DataType::Float64 => Ok(Scalar::F64(v as f64)),
                _ => Err(Error::Type(format!("cannot cast {self} to {target}"))),
            };
        }
        match (self, target) {
            (Scalar::F32(v), DataType::Float64) => Ok(Scalar::F64(*v as f64)),
            (Scalar::F64(v), DataType::Float32) => Ok(Scalar::F32(*v as f32)),
            _ => Err(Error::Type(format!("cannot cast {self} to {target}"))),
        }
    }

    /// Total order used by sorting and min/max.
    ///
    /// Nulls sort first, floats use IEEE total ordering, and values of
    /// different kinds fall back to a fixed kind order.
    pub fn total_cmp(&self, other: &Scalar) -> Ordering {
        use Scalar::*;

        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,
            (Bool(x), Bool(y)) => x.cmp(y),
            (I16(x), I16(y)) => x.cmp(y),
            (I32(x), I32(y)) => x.cmp(y),
            (I64(x), I64(y)) => x.cmp(y),
            (U64(x), U64(y)) => x.cmp(y),
            (F32(x), F32(y)) => x.total_cmp(y),
            (F64(x), F64(y)) => x.total_cmp(y),
            (Str(x), Str(y)) => x.cmp(y),
            (Struct(x), Struct(y)) => {
                for (a, b) in x.iter().zip(y.iter()) {
                    match a.total_cmp(b) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                x.len().cmp(&y.len())
            }
            // Mixed types: order by variant order
            _ => self.kind_order().cmp(&other.kind_order()),
        }
    }

    /// Numeric kind order for mixed-type comparisons.
    pub fn kind_order(&self) -> u8 {
        use Scalar::*;
        match self {
            Null => 0,
            Bool(_) => 1,
            I16(_) => 2,
            I32(_) => 3,
            I64(_) => 4,
            U64(_) => 5,
            F32(_) => 6,
            F64(_) => 7,
            Str(_) => 8,
            Struct(_) => 9,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(v) => write!(f, "{v}"),
            Scalar::I16(v) => write!(f, "{v}"),
            Scalar::I32(v) => write!(f, "{v}"),
            Scalar::I64(v) => write!(f, "{v}"),
            Scalar::U64(v) => write!(f, "{v}"),
            Scalar::F32(v) => write!(f, "{v}"),
            Scalar::F64(v) => write!(f, "{v}"),
            Scalar::Str(v) => write!(f, "\"{v}\""),
            Scalar::Struct(children) => {
                write!(f, "{{")?;
                for (i, c) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{c}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

macro_rules! scalar_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Scalar {
                fn from(v: $t) -> Self {
                    Scalar::$variant(v)
                }
            }
        )*
    };
}

scalar_from!(
    bool => Bool,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => Str,
);

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map_or(Scalar::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_casts_are_range_checked() {
        assert_eq!(Scalar::I32(10).cast_to(&DataType::Int64), Ok(Scalar::I64(10)));
        assert_eq!(Scalar::I32(10).cast_to(&DataType::Float64), Ok(Scalar::F64(10.0)));
        assert!(Scalar::I32(-1).cast_to(&DataType::UInt64).is_err());
        assert!(Scalar::I64(70_000).cast_to(&DataType::Int16).is_err());
        assert!(Scalar::F64(1.5).cast_to(&DataType::Int64).is_err());
        assert!(Scalar::Str("x".into()).cast_to(&DataType::Int64).is_err());
        assert_eq!(Scalar::Null.cast_to(&DataType::Utf8), Ok(Scalar::Null));
    }

    #[test]
    fn total_cmp_puts_nulls_first_and_orders_nan() {
        assert_eq!(Scalar::Null.total_cmp(&Scalar::I64(-5)), Ordering::Less);
        assert_eq!(
            Scalar::F64(f64::NAN).total_cmp(&Scalar::F64(1.0)),
            Ordering::Greater
        );
        assert_eq!(
            Scalar::Str("a".into()).total_cmp(&Scalar::Str("b".into())),
            Ordering::Less
        );
    }
}
