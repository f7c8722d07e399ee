//! Comparison and boolean kernels.
//!
//! Comparisons produce a `BooleanArray` that is null wherever either side is
//! null. Float comparisons follow IEEE semantics: NaN is unequal to
//! everything, including itself.

use std::cmp::Ordering;

use quiver_core::array::{BooleanArray, NativeType, PrimitiveArray};
use quiver_core::buffer::{Bitmap, BitmapBuilder};
use quiver_core::{Array, Datum, Error, Result, Scalar};

use crate::util::{check_same_len, combine_validity};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtEq => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtEq => ">=",
        }
    }

    #[inline]
    fn matches(self, ord: Option<Ordering>) -> bool {
        match self {
            CmpOp::Eq => ord == Some(Ordering::Equal),
            CmpOp::NotEq => ord != Some(Ordering::Equal),
            CmpOp::Lt => ord == Some(Ordering::Less),
            CmpOp::LtEq => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
            CmpOp::Gt => ord == Some(Ordering::Greater),
            CmpOp::GtEq => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

pub fn eq(lhs: &Array, rhs: &Datum) -> Result<BooleanArray> {
    compare(CmpOp::Eq, lhs, rhs)
}

pub fn neq(lhs: &Array, rhs: &Datum) -> Result<BooleanArray> {
    compare(CmpOp::NotEq, lhs, rhs)
}

pub fn lt(lhs: &Array, rhs: &Datum) -> Result<BooleanArray> {
    compare(CmpOp::Lt, lhs, rhs)
}

pub fn lt_eq(lhs: &Array, rhs: &Datum) -> Result<BooleanArray> {
    compare(CmpOp::LtEq, lhs, rhs)
}

pub fn gt(lhs: &Array, rhs: &Datum) -> Result<BooleanArray> {
    compare(CmpOp::Gt, lhs, rhs)
}

pub fn gt_eq(lhs: &Array, rhs: &Datum) -> Result<BooleanArray> {
    compare(CmpOp::GtEq, lhs, rhs)
}

/// Compare `lhs` against a scalar (cast to `lhs`'s type) or a same-typed,
/// same-length array.
pub fn compare(op: CmpOp, lhs: &Array, rhs: &Datum) -> Result<BooleanArray> {
    let data_type = lhs.data_type();
    match rhs {
        Datum::Scalar(s) if s.is_null() => all_null(lhs.len()),
        Datum::Scalar(s) => {
            let s = if data_type.is_numeric() {
                s.cast_to(&data_type)?
            } else {
                s.clone()
            };
            match (lhs, &s) {
                (Array::Boolean(a), Scalar::Bool(b)) => {
                    with_fn(op, a.len(), a.validity(), None, |i| Some(a.value(i).cmp(b)))
                }
                (Array::Utf8(a), Scalar::Str(b)) => with_fn(op, a.len(), a.validity(), None, |i| {
                    Some(a.value(i).cmp(b.as_str()))
                }),
                _ => downcast_numeric!(lhs, a => primitive_scalar(op, a, &s), _ => Err(Error::Type(format!(
                    "cannot compare {data_type} with {s}"
                )))),
            }
        }
        Datum::Array(r) => {
            if r.data_type() != data_type {
                return Err(Error::Type(format!(
                    "cannot compare {} with {}",
                    data_type,
                    r.data_type()
                )));
            }
            check_same_len(lhs.len(), r.len())?;
            match (lhs, r) {
                (Array::Boolean(a), Array::Boolean(b)) => with_fn(op, a.len(), a.validity(), b.validity(), |i| {
                    Some(a.value(i).cmp(&b.value(i)))
                }),
                (Array::Utf8(a), Array::Utf8(b)) => with_fn(op, a.len(), a.validity(), b.validity(), |i| {
                    Some(a.value(i).cmp(b.value(i)))
                }),
                _ => downcast_numeric!(lhs, a => primitive_array(op, a, r), _ => Err(Error::Type(format!(
                    "comparison is not supported for {data_type}"
                )))),
            }
        }
        Datum::ChunkedArray(c) => compare(op, lhs, &Datum::Array(c.concat()?)),
        Datum::Table(_) => Err(Error::Type("cannot compare against a table".into())),
    }
}

fn primitive_scalar<T: NativeType>(
    op: CmpOp,
    lhs: &PrimitiveArray<T>,
    rhs: &Scalar,
) -> Result<BooleanArray> {
    let b = T::from_scalar(rhs)
        .ok_or_else(|| Error::Type(format!("{rhs} is not a {}", T::DATA_TYPE)))?;
    let values = lhs.values();
    with_fn(op, lhs.len(), lhs.validity(), None, |i| {
        values[i].partial_cmp(&b)
    })
}

fn primitive_array<T: NativeType>(
    op: CmpOp,
    lhs: &PrimitiveArray<T>,
    rhs: &Array,
) -> Result<BooleanArray> {
    let rhs = rhs
        .as_primitive::<T>()
        .ok_or_else(|| Error::Type(format!("right operand is not {}", T::DATA_TYPE)))?;
    let (l, r) = (lhs.values(), rhs.values());
    with_fn(op, lhs.len(), lhs.validity(), rhs.validity(), |i| {
        l[i].partial_cmp(&r[i])
    })
}

fn with_fn<F>(
    op: CmpOp,
    len: usize,
    left: Option<&Bitmap>,
    right: Option<&Bitmap>,
    ord: F,
) -> Result<BooleanArray>
where
    F: Fn(usize) -> Option<Ordering>,
{
    let mut values = BitmapBuilder::with_capacity(len);
    for i in 0..len {
        values.append(op.matches(ord(i)));
    }
    BooleanArray::try_new(values.finish(), combine_validity(left, right, len))
}

fn all_null(len: usize) -> Result<BooleanArray> {
    let mut values = BitmapBuilder::with_capacity(len);
    values.append_n(len, false);
    let mut validity = BitmapBuilder::with_capacity(len);
    validity.append_n(len, false);
    BooleanArray::try_new(values.finish(), Some(validity.finish()))
}

fn check_bool_lengths(a: &BooleanArray, b: &BooleanArray) -> Result<()> {
    check_same_len(a.len(), b.len())
}

pub fn and(lhs: &BooleanArray, rhs: &BooleanArray) -> Result<BooleanArray> {
    check_bool_lengths(lhs, rhs)?;
    let mut values = BitmapBuilder::with_capacity(lhs.len());
    for i in 0..lhs.len() {
        values.append(lhs.value(i) && rhs.value(i));
    }
    let validity = combine_validity(lhs.validity(), rhs.validity(), lhs.len());
    BooleanArray::try_new(values.finish(), validity)
}

pub fn or(lhs: &BooleanArray, rhs: &BooleanArray) -> Result<BooleanArray> {
    check_bool_lengths(lhs, rhs)?;
    let mut values = BitmapBuilder::with_capacity(lhs.len());
    for i in 0..lhs.len() {
        values.append(lhs.value(i) || rhs.value(i));
    }
    let validity = combine_validity(lhs.validity(), rhs.validity(), lhs.len());
    BooleanArray::try_new(values.finish(), validity)
}

pub fn not(input: &BooleanArray) -> Result<BooleanArray> {
    let mut values = BitmapBuilder::with_capacity(input.len());
    for i in 0..input.len() {
        values.append(!input.value(i));
    }
    BooleanArray::try_new(values.finish(), input.validity().cloned())
}

/// True where `input` is null. Never null itself.
pub fn is_null(input: &Array) -> Result<BooleanArray> {
    let mut values = BitmapBuilder::with_capacity(input.len());
    for i in 0..input.len() {
        values.append(input.is_null(i));
    }
    BooleanArray::try_new(values.finish(), None)
}
