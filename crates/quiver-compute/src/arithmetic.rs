//! Elementwise arithmetic.
//!
//! The left operand is always an array and normally fixes the output type: a
//! scalar right operand that fits that type (range-checked) is cast to it.
//! Otherwise mixed numeric operands are widened to a common type, `Float64`
//! when either side is floating point and `Int64` when both are integers.
//! Array operands must have equal length. Integer arithmetic wraps around.
//! Only non-numeric operands are a type error.

use quiver_core::array::{NativeType, PrimitiveArray};
use quiver_core::buffer::ScalarBuffer;
use quiver_core::builder::new_null_array;
use quiver_core::{Array, DataType, Datum, Error, Result, Scalar};

use crate::util::{check_same_len, combine_validity};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
}

impl ArithmeticOp {
    pub fn name(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "add",
            ArithmeticOp::Subtract => "subtract",
            ArithmeticOp::Multiply => "multiply",
        }
    }

    #[inline]
    fn apply<T: NativeType>(self, a: T, b: T) -> T {
        match self {
            ArithmeticOp::Add => a.add_wrapping(b),
            ArithmeticOp::Subtract => a.sub_wrapping(b),
            ArithmeticOp::Multiply => a.mul_wrapping(b),
        }
    }
}

pub fn add(lhs: &Array, rhs: &Datum) -> Result<Array> {
    arithmetic(ArithmeticOp::Add, lhs, rhs)
}

pub fn subtract(lhs: &Array, rhs: &Datum) -> Result<Array> {
    arithmetic(ArithmeticOp::Subtract, lhs, rhs)
}

pub fn multiply(lhs: &Array, rhs: &Datum) -> Result<Array> {
    arithmetic(ArithmeticOp::Multiply, lhs, rhs)
}

pub fn arithmetic(op: ArithmeticOp, lhs: &Array, rhs: &Datum) -> Result<Array> {
    let data_type = lhs.data_type();
    if !data_type.is_numeric() {
        return Err(Error::Type(format!(
            "{} expects numeric input, got {}",
            op.name(),
            data_type
        )));
    }
    match rhs {
        Datum::Scalar(s) if s.is_null() => new_null_array(&data_type, lhs.len()),
        Datum::Scalar(s) => {
            let (lhs, s) = match s.cast_to(&data_type) {
                Ok(cast) => (lhs.clone(), cast),
                Err(e) => {
                    let Some(rhs_type) = s.data_type().filter(DataType::is_numeric) else {
                        return Err(e);
                    };
                    let target = promoted_type(&data_type, &rhs_type);
                    (widen(lhs, &target)?, s.cast_to(&target)?)
                }
            };
            let data_type = lhs.data_type();
            downcast_numeric!(&lhs, a => Ok(with_scalar(op, a, &s)?.into()), _ => unreachable_type(&data_type))
        }
        Datum::Array(r) => {
            let rhs_type = r.data_type();
            if !rhs_type.is_numeric() {
                return Err(Error::Type(format!(
                    "{} of {} and {} is not supported",
                    op.name(),
                    data_type,
                    rhs_type
                )));
            }
            check_same_len(lhs.len(), r.len())?;
            let (lhs, r) = if rhs_type == data_type {
                (lhs.clone(), r.clone())
            } else {
                let target = promoted_type(&data_type, &rhs_type);
                (widen(lhs, &target)?, widen(r, &target)?)
            };
            let data_type = lhs.data_type();
            downcast_numeric!(&lhs, a => Ok(with_array(op, a, &r)?.into()), _ => unreachable_type(&data_type))
        }
        Datum::ChunkedArray(c) => arithmetic(op, lhs, &Datum::Array(c.concat()?)),
        Datum::Table(_) => Err(Error::Type(format!(
            "{} does not accept a table operand",
            op.name()
        ))),
    }
}

fn unreachable_type(data_type: &DataType) -> Result<Array> {
    Err(Error::Invariant(format!("{data_type} passed the numeric check")))
}

/// Common type for two numeric operands of different types.
pub fn promoted_type(lhs: &DataType, rhs: &DataType) -> DataType {
    if lhs.is_floating() || rhs.is_floating() {
        DataType::Float64
    } else {
        DataType::Int64
    }
}

/// Convert a numeric array to `Float64` or `Int64`, keeping its validity.
fn widen(array: &Array, target: &DataType) -> Result<Array> {
    if &array.data_type() == target {
        return Ok(array.clone());
    }
    match target {
        DataType::Float64 => {
            downcast_numeric!(array, a => Ok(to_float64(a)?.into()), _ => unreachable_type(target))
        }
        DataType::Int64 => {
            downcast_numeric!(array, a => Ok(to_int64(a)?.into()), _ => unreachable_type(target))
        }
        other => Err(Error::Invariant(format!("cannot widen to {other}"))),
    }
}

fn to_float64<T: NativeType>(a: &PrimitiveArray<T>) -> Result<PrimitiveArray<f64>> {
    let values: Vec<f64> = a.values().iter().map(|v| v.to_f64()).collect();
    PrimitiveArray::try_new(ScalarBuffer::from_vec(values), a.validity().cloned())
}

/// Range-checked; null slots are not inspected.
fn to_int64<T: NativeType>(a: &PrimitiveArray<T>) -> Result<PrimitiveArray<i64>> {
    let values = a
        .values()
        .iter()
        .enumerate()
        .map(|(i, v)| {
            if !a.is_valid(i) {
                return Ok(0);
            }
            match v.into_scalar().cast_to(&DataType::Int64)? {
                Scalar::I64(x) => Ok(x),
                other => Err(Error::Invariant(format!("{other} did not cast to int64"))),
            }
        })
        .collect::<Result<Vec<i64>>>()?;
    PrimitiveArray::try_new(ScalarBuffer::from_vec(values), a.validity().cloned())
}

fn with_scalar<T: NativeType>(
    op: ArithmeticOp,
    lhs: &PrimitiveArray<T>,
    rhs: &Scalar,
) -> Result<PrimitiveArray<T>> {
    let b = T::from_scalar(rhs)
        .ok_or_else(|| Error::Type(format!("{rhs} is not a {}", T::DATA_TYPE)))?;
    let values: Vec<T> = lhs.values().iter().map(|&a| op.apply(a, b)).collect();
    PrimitiveArray::try_new(ScalarBuffer::from_vec(values), lhs.validity().cloned())
}

fn with_array<T: NativeType>(
    op: ArithmeticOp,
    lhs: &PrimitiveArray<T>,
    rhs: &Array,
) -> Result<PrimitiveArray<T>> {
    let rhs = rhs
        .as_primitive::<T>()
        .ok_or_else(|| Error::Type(format!("right operand is not {}", T::DATA_TYPE)))?;
    let values: Vec<T> = lhs
        .values()
        .iter()
        .zip(rhs.values().iter())
        .map(|(&a, &b)| op.apply(a, b))
        .collect();
    let validity = combine_validity(lhs.validity(), rhs.validity(), lhs.len());
    PrimitiveArray::try_new(ScalarBuffer::from_vec(values), validity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_core::array::StringArray;

    #[test]
    fn add_scalar_keeps_nulls() {
        let a: Array = PrimitiveArray::<i32>::from(vec![Some(1), Some(2), Some(3), None, Some(5)]).into();
        let out = add(&a, &Datum::Scalar(Scalar::I64(10))).unwrap();
        let expected: Array =
            PrimitiveArray::<i32>::from(vec![Some(11), Some(12), Some(13), None, Some(15)]).into();
        assert_eq!(out, expected);
    }

    #[test]
    fn integer_overflow_wraps() {
        let a: Array = PrimitiveArray::<i16>::from_vec(vec![i16::MAX]).into();
        let out = add(&a, &Datum::Scalar(Scalar::I16(1))).unwrap();
        assert_eq!(out.value_at(0).unwrap(), Scalar::I16(i16::MIN));
    }

    #[test]
    fn array_operands_must_match() {
        let a: Array = PrimitiveArray::<f64>::from_vec(vec![1.5, 2.0]).into();
        let b: Array = PrimitiveArray::<f64>::from(vec![Some(2.0), None]).into();
        let out = multiply(&a, &Datum::Array(b)).unwrap();
        assert_eq!(out.to_string(), "[3, null]");

        let short: Array = PrimitiveArray::<f64>::from_vec(vec![1.0]).into();
        assert!(matches!(
            subtract(&a, &Datum::Array(short)),
            Err(Error::InvalidArgument(_))
        ));
        let strings: Array = StringArray::from(vec!["a", "b"]).into();
        assert!(matches!(add(&a, &Datum::Array(strings)), Err(Error::Type(_))));
    }

    #[test]
    fn mixed_numeric_operands_widen() {
        let ints: Array = PrimitiveArray::<i64>::from(vec![Some(1), None, Some(3)]).into();
        let out = add(&ints, &Datum::Scalar(Scalar::F64(0.5))).unwrap();
        assert_eq!(out.data_type(), DataType::Float64);
        assert_eq!(out.to_string(), "[1.5, null, 3.5]");

        let small: Array = PrimitiveArray::<i32>::from_vec(vec![1, 2, 3]).into();
        let floats: Array = PrimitiveArray::<f64>::from(vec![Some(0.25), Some(0.5), None]).into();
        let out = multiply(&small, &Datum::Array(floats)).unwrap();
        assert_eq!(out.data_type(), DataType::Float64);
        assert_eq!(out.to_string(), "[0.25, 1, null]");

        let wide: Array = PrimitiveArray::<i64>::from_vec(vec![10, 20, 30]).into();
        let out = subtract(&small, &Datum::Array(wide)).unwrap();
        assert_eq!(out.data_type(), DataType::Int64);
        assert_eq!(out.to_string(), "[-9, -18, -27]");

        let short: Array = PrimitiveArray::<i16>::from_vec(vec![1]).into();
        let out = add(&short, &Datum::Scalar(Scalar::I64(100_000))).unwrap();
        assert_eq!(out.value_at(0).unwrap(), Scalar::I64(100_001));

        let huge: Array = PrimitiveArray::<u64>::from_vec(vec![u64::MAX]).into();
        assert!(matches!(add(&huge, &Datum::Scalar(Scalar::I64(-1))), Err(Error::Type(_))));
    }

    #[test]
    fn non_numeric_input_is_a_type_error() {
        let s: Array = StringArray::from(vec!["a"]).into();
        assert!(matches!(add(&s, &Datum::Scalar(Scalar::I64(1))), Err(Error::Type(_))));
        let a: Array = PrimitiveArray::<i64>::from_vec(vec![1]).into();
        assert!(matches!(add(&a, &Datum::Scalar("x".into())), Err(Error::Type(_))));
    }
}
