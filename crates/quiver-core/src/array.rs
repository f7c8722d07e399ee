//! Immutable, null-aware columnar arrays.
//!
//! `Array` is a closed tagged variant over the supported `DataType`s. Each
//! variant owns reference-counted buffers, so `clone` and `slice` never copy
//! values. A missing validity bitmap means "no nulls".

use std::cmp::Ordering;
use std::fmt;

use crate::buffer::{Bitmap, ScalarBuffer};
use crate::error::{Error, Result};
use crate::scalar::Scalar;
use crate::schema::{DataType, Field};

/// Fixed-width native value type stored in a `PrimitiveArray`.
pub trait NativeType:
    Copy + Default + PartialEq + PartialOrd + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    const DATA_TYPE: DataType;

    fn into_scalar(self) -> Scalar;

    /// Extract a value of exactly this type (no casting).
    fn from_scalar(scalar: &Scalar) -> Option<Self>;

    /// Addition with wraparound for integers, IEEE semantics for floats.
    fn add_wrapping(self, rhs: Self) -> Self;
    fn sub_wrapping(self, rhs: Self) -> Self;
    fn mul_wrapping(self, rhs: Self) -> Self;

    fn total_cmp(&self, other: &Self) -> Ordering;

    fn to_f64(self) -> f64;

    /// `as i64`: exact for signed integers, bit-preserving for `u64`,
    /// truncating for floats.
    fn to_i64_wrapping(self) -> i64;

    fn into_array(array: PrimitiveArray<Self>) -> Array;

    fn downcast(array: &Array) -> Option<&PrimitiveArray<Self>>;
}

macro_rules! native_int {
    ($t:ty, $dt:ident, $variant:ident) => {
        impl NativeType for $t {
            const DATA_TYPE: DataType = DataType::$dt;

            fn into_scalar(self) -> Scalar {
                Scalar::$variant(self)
            }
            fn from_scalar(scalar: &Scalar) -> Option<Self> {
                match scalar {
                    Scalar::$variant(v) => Some(*v),
                    _ => None,
                }
            }
            fn add_wrapping(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }
            fn sub_wrapping(self, rhs: Self) -> Self {
                self.wrapping_sub(rhs)
            }
            fn mul_wrapping(self, rhs: Self) -> Self {
                self.wrapping_mul(rhs)
            }
            fn total_cmp(&self, other: &Self) -> Ordering {
                self.cmp(other)
            }
            fn to_f64(self) -> f64 {
                self as f64
            }
            fn to_i64_wrapping(self) -> i64 {
                self as i64
            }
            fn into_array(array: PrimitiveArray<Self>) -> Array {
                Array::$dt(array)
            }
            fn downcast(array: &Array) -> Option<&PrimitiveArray<Self>> {
                match array {
                    Array::$dt(a) => Some(a),
                    _ => None,
                }
            }
        }
    };
}

macro_rules! native_float {
    ($t:ty, $dt:ident, $variant:ident) => {
        impl NativeType for $t {
            const DATA_TYPE: DataType = DataType::$dt;

            fn into_scalar(self) -> Scalar {
                Scalar::$variant(self)
            }
            fn from_scalar(scalar: &Scalar) -> Option<Self> {
                match scalar {
                    Scalar::$variant(v) => Some(*v),
                    _ => None,
                }
            }
            fn add_wrapping(self, rhs: Self) -> Self {
                self + rhs
            }
            fn sub_wrapping(self, rhs: Self) -> Self {
                self - rhs
            }
            fn mul_wrapping(self, rhs: Self) -> Self {
                self * rhs
            }
            fn total_cmp(&self, other: &Self) -> Ordering {
                <$t>::total_cmp(self, other)
            }
            fn to_f64(self) -> f64 {
                self as f64
            }
            fn to_i64_wrapping(self) -> i64 {
                self as i64
            }
            fn into_array(array: PrimitiveArray<Self>) -> Array {
                Array::$dt(array)
            }
            fn downcast(array: &Array) -> Option<&PrimitiveArray<Self>> {
                match array {
                    Array::$dt(a) => Some(a),
                    _ => None,
                }
            }
        }
    };
}

native_int!(i16, Int16, I16);
native_int!(i32, Int32, I32);
native_int!(i64, Int64, I64);
native_int!(u64, UInt64, U64);
native_float!(f32, Float32, F32);
native_float!(f64, Float64, F64);

fn check_validity_len(validity: &Option<Bitmap>, len: usize) -> Result<()> {
    match validity {
        Some(v) if v.len() != len => Err(Error::Invariant(format!(
            "validity bitmap has {} bits for {} values",
            v.len(),
            len
        ))),
        _ => Ok(()),
    }
}

fn slice_validity(validity: &Option<Bitmap>, offset: usize, len: usize) -> Result<Option<Bitmap>> {
    validity.as_ref().map(|v| v.slice(offset, len)).transpose()
}

#[inline]
fn bit_valid(validity: &Option<Bitmap>, i: usize) -> bool {
    validity.as_ref().map_or(true, |v| v.get(i))
}

fn null_count_of(validity: &Option<Bitmap>) -> usize {
    validity.as_ref().map_or(0, Bitmap::count_unset_bits)
}

// ---------------------------------------------------------------------------
// Primitive

#[derive(Clone)]
pub struct PrimitiveArray<T: NativeType> {
    values: ScalarBuffer<T>,
    validity: Option<Bitmap>,
}

impl<T: NativeType> PrimitiveArray<T> {
    pub fn try_new(values: ScalarBuffer<T>, validity: Option<Bitmap>) -> Result<Self> {
        check_validity_len(&validity, values.len())?;
        Ok(Self { values, validity })
    }

    pub fn from_vec(values: Vec<T>) -> Self {
        Self {
            values: ScalarBuffer::from_vec(values),
            validity: None,
        }
    }

    /// Builders append values and validity in lockstep.
    pub(crate) fn from_parts(values: ScalarBuffer<T>, validity: Option<Bitmap>) -> Self {
        debug_assert!(validity.as_ref().map_or(true, |v| v.len() == values.len()));
        Self { values, validity }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw values; slots that are null hold unspecified values.
    pub fn values(&self) -> &[T] {
        self.values.as_slice()
    }

    pub fn values_buffer(&self) -> &ScalarBuffer<T> {
        &self.values
    }

    pub fn validity(&self) -> Option<&Bitmap> {
        self.validity.as_ref()
    }

    #[inline]
    pub fn is_valid(&self, i: usize) -> bool {
        bit_valid(&self.validity, i)
    }

    pub fn null_count(&self) -> usize {
        null_count_of(&self.validity)
    }

    /// Value at `i`, ignoring validity. Panics when `i >= len`.
    #[inline]
    pub fn value(&self, i: usize) -> T {
        self.values[i]
    }

    pub fn get(&self, i: usize) -> Option<T> {
        (i < self.len() && self.is_valid(i)).then(|| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<T>> + '_ {
        (0..self.len()).map(move |i| self.is_valid(i).then(|| self.values[i]))
    }

    pub fn slice(&self, offset: usize, len: usize) -> Result<Self> {
        Ok(Self {
            values: self.values.slice(offset, len)?,
            validity: slice_validity(&self.validity, offset, len)?,
        })
    }

    pub fn memory_size(&self) -> usize {
        self.values.memory_size() + self.validity.as_ref().map_or(0, Bitmap::memory_size)
    }
}

impl<T: NativeType> From<Vec<T>> for PrimitiveArray<T> {
    fn from(values: Vec<T>) -> Self {
        Self::from_vec(values)
    }
}

impl<T: NativeType> From<Vec<Option<T>>> for PrimitiveArray<T> {
    fn from(values: Vec<Option<T>>) -> Self {
        let mut builder = crate::builder::PrimitiveBuilder::<T>::with_capacity(values.len());
        for v in values {
            builder.append_option(v);
        }
        builder.finish_typed()
    }
}

impl<T: NativeType> fmt::Debug for PrimitiveArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrimitiveArray<{}>", T::DATA_TYPE)?;
        f.debug_list().entries(self.iter()).finish()
    }
}

// ---------------------------------------------------------------------------
// Boolean

#[derive(Clone)]
pub struct BooleanArray {
    values: Bitmap,
    validity: Option<Bitmap>,
}

impl BooleanArray {
    pub fn try_new(values: Bitmap, validity: Option<Bitmap>) -> Result<Self> {
        check_validity_len(&validity, values.len())?;
        Ok(Self { values, validity })
    }

    pub(crate) fn from_parts(values: Bitmap, validity: Option<Bitmap>) -> Self {
        debug_assert!(validity.as_ref().map_or(true, |v| v.len() == values.len()));
        Self { values, validity }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &Bitmap {
        &self.values
    }

    pub fn validity(&self) -> Option<&Bitmap> {
        self.validity.as_ref()
    }

    #[inline]
    pub fn is_valid(&self, i: usize) -> bool {
        bit_valid(&self.validity, i)
    }

    pub fn null_count(&self) -> usize {
        null_count_of(&self.validity)
    }

    #[inline]
    pub fn value(&self, i: usize) -> bool {
        self.values.get(i)
    }

    pub fn get(&self, i: usize) -> Option<bool> {
        (i < self.len() && self.is_valid(i)).then(|| self.values.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<bool>> + '_ {
        (0..self.len()).map(move |i| self.is_valid(i).then(|| self.values.get(i)))
    }

    /// Number of slots that are valid and true.
    pub fn true_count(&self) -> usize {
        (0..self.len())
            .filter(|&i| self.is_valid(i) && self.value(i))
            .count()
    }

    pub fn slice(&self, offset: usize, len: usize) -> Result<Self> {
        Ok(Self {
            values: self.values.slice(offset, len)?,
            validity: slice_validity(&self.validity, offset, len)?,
        })
    }

    pub fn memory_size(&self) -> usize {
        self.values.memory_size() + self.validity.as_ref().map_or(0, Bitmap::memory_size)
    }
}

impl From<Vec<bool>> for BooleanArray {
    fn from(values: Vec<bool>) -> Self {
        Self {
            values: Bitmap::from_bools(&values),
            validity: None,
        }
    }
}

impl From<Vec<Option<bool>>> for BooleanArray {
    fn from(values: Vec<Option<bool>>) -> Self {
        let mut builder = crate::builder::BooleanBuilder::with_capacity(values.len());
        for v in values {
            builder.append_option(v);
        }
        builder.finish_typed()
    }
}

impl fmt::Debug for BooleanArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BooleanArray")?;
        f.debug_list().entries(self.iter()).finish()
    }
}

// ---------------------------------------------------------------------------
// Utf8

/// Variable-width UTF-8 strings: `len + 1` offsets into one byte buffer.
#[derive(Clone)]
pub struct StringArray {
    offsets: ScalarBuffer<i64>,
    data: ScalarBuffer<u8>,
    validity: Option<Bitmap>,
}

impl StringArray {
    pub fn try_new(
        offsets: ScalarBuffer<i64>,
        data: ScalarBuffer<u8>,
        validity: Option<Bitmap>,
    ) -> Result<Self> {
        if offsets.is_empty() {
            return Err(Error::Invariant("string offsets must hold len + 1 entries".into()));
        }
        let text = std::str::from_utf8(data.as_slice())
            .map_err(|e| Error::Invariant(format!("string data is not valid UTF-8: {e}")))?;
        if offsets.windows(2).any(|w| w[0] > w[1])
            || offsets
                .iter()
                .any(|&o| o < 0 || !text.is_char_boundary(o as usize))
        {
            return Err(Error::Invariant(
                "string offsets must be monotonic char boundaries".into(),
            ));
        }
        check_validity_len(&validity, offsets.len() - 1)?;
        Ok(Self {
            offsets,
            data,
            validity,
        })
    }

    /// Offsets come from whole `&str` appends.
    pub(crate) fn from_parts(
        offsets: ScalarBuffer<i64>,
        data: ScalarBuffer<u8>,
        validity: Option<Bitmap>,
    ) -> Self {
        Self {
            offsets,
            data,
            validity,
        }
    }

    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn offsets(&self) -> &ScalarBuffer<i64> {
        &self.offsets
    }

    pub fn data(&self) -> &ScalarBuffer<u8> {
        &self.data
    }

    pub fn validity(&self) -> Option<&Bitmap> {
        self.validity.as_ref()
    }

    #[inline]
    pub fn is_valid(&self, i: usize) -> bool {
        bit_valid(&self.validity, i)
    }

    pub fn null_count(&self) -> usize {
        null_count_of(&self.validity)
    }

    /// String at `i`, ignoring validity. Panics when `i >= len`.
    pub fn value(&self, i: usize) -> &str {
        let start = self.offsets[i] as usize;
        let end = self.offsets[i + 1] as usize;
        // Offsets were checked against whole-string boundaries on construction.
        std::str::from_utf8(&self.data[start..end]).unwrap_or_default()
    }

    pub fn get(&self, i: usize) -> Option<&str> {
        (i < self.len() && self.is_valid(i)).then(|| self.value(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> + '_ {
        (0..self.len()).map(move |i| self.is_valid(i).then(|| self.value(i)))
    }

    pub fn slice(&self, offset: usize, len: usize) -> Result<Self> {
        Ok(Self {
            offsets: self.offsets.slice(offset, len + 1)?,
            data: self.data.clone(),
            validity: slice_validity(&self.validity, offset, len)?,
        })
    }

    pub fn memory_size(&self) -> usize {
        self.offsets.memory_size()
            + self.data.memory_size()
            + self.validity.as_ref().map_or(0, Bitmap::memory_size)
    }
}

impl From<Vec<&str>> for StringArray {
    fn from(values: Vec<&str>) -> Self {
        let mut builder = crate::builder::StringBuilder::with_capacity(values.len());
        for v in values {
            builder.append(v);
        }
        builder.finish_typed()
    }
}

impl From<Vec<Option<&str>>> for StringArray {
    fn from(values: Vec<Option<&str>>) -> Self {
        let mut builder = crate::builder::StringBuilder::with_capacity(values.len());
        for v in values {
            builder.append_option(v);
        }
        builder.finish_typed()
    }
}

impl fmt::Debug for StringArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StringArray")?;
        f.debug_list().entries(self.iter()).finish()
    }
}

// ---------------------------------------------------------------------------
// Struct

/// Positional children sharing the parent's row count.
#[derive(Clone, Debug)]
pub struct StructArray {
    fields: Vec<Field>,
    children: Vec<Array>,
    len: usize,
    validity: Option<Bitmap>,
}

impl StructArray {
    pub fn try_new(
        fields: Vec<Field>,
        children: Vec<Array>,
        len: usize,
        validity: Option<Bitmap>,
    ) -> Result<Self> {
        if fields.len() != children.len() {
            return Err(Error::SchemaMismatch(format!(
                "struct declares {} fields but has {} children",
                fields.len(),
                children.len()
            )));
        }
        for (field, child) in fields.iter().zip(children.iter()) {
            if child.len() != len {
                return Err(Error::SchemaMismatch(format!(
                    "struct child '{}' has {} rows, expected {}",
                    field.name,
                    child.len(),
                    len
                )));
            }
            if child.data_type() != field.data_type {
                return Err(Error::SchemaMismatch(format!(
                    "struct child '{}' is {}, declared {}",
                    field.name,
                    child.data_type(),
                    field.data_type
                )));
            }
        }
        check_validity_len(&validity, len)?;
        Ok(Self {
            fields,
            children,
            len,
            validity,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn children(&self) -> &[Array] {
        &self.children
    }

    pub fn child_by_name(&self, name: &str) -> Option<&Array> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .map(|i| &self.children[i])
    }

    pub fn validity(&self) -> Option<&Bitmap> {
        self.validity.as_ref()
    }

    #[inline]
    pub fn is_valid(&self, i: usize) -> bool {
        bit_valid(&self.validity, i)
    }

    pub fn null_count(&self) -> usize {
        null_count_of(&self.validity)
    }

    pub fn slice(&self, offset: usize, len: usize) -> Result<Self> {
        let children = self
            .children
            .iter()
            .map(|c| c.slice(offset, len))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            fields: self.fields.clone(),
            children,
            len,
            validity: slice_validity(&self.validity, offset, len)?,
        })
    }

    pub fn memory_size(&self) -> usize {
        self.children.iter().map(Array::get_array_memory_size).sum::<usize>()
            + self.validity.as_ref().map_or(0, Bitmap::memory_size)
    }
}

// ---------------------------------------------------------------------------
// Array

#[derive(Clone)]
pub enum Array {
    Boolean(BooleanArray),
    Int16(PrimitiveArray<i16>),
    Int32(PrimitiveArray<i32>),
    Int64(PrimitiveArray<i64>),
    UInt64(PrimitiveArray<u64>),
    Float32(PrimitiveArray<f32>),
    Float64(PrimitiveArray<f64>),
    Utf8(StringArray),
    Struct(StructArray),
}

/// Run `$body` with `$a` bound to the concrete array of any variant.
#[macro_export]
macro_rules! dispatch_array {
    ($array:expr, $a:ident => $body:expr) => {
        match $array {
            $crate::array::Array::Boolean($a) => $body,
            $crate::array::Array::Int16($a) => $body,
            $crate::array::Array::Int32($a) => $body,
            $crate::array::Array::Int64($a) => $body,
            $crate::array::Array::UInt64($a) => $body,
            $crate::array::Array::Float32($a) => $body,
            $crate::array::Array::Float64($a) => $body,
            $crate::array::Array::Utf8($a) => $body,
            $crate::array::Array::Struct($a) => $body,
        }
    };
}

impl Array {
    pub fn data_type(&self) -> DataType {
        match self {
            Array::Boolean(_) => DataType::Boolean,
            Array::Int16(_) => DataType::Int16,
            Array::Int32(_) => DataType::Int32,
            Array::Int64(_) => DataType::Int64,
            Array::UInt64(_) => DataType::UInt64,
            Array::Float32(_) => DataType::Float32,
            Array::Float64(_) => DataType::Float64,
            Array::Utf8(_) => DataType::Utf8,
            Array::Struct(a) => DataType::Struct(a.fields().to_vec()),
        }
    }

    pub fn len(&self) -> usize {
        dispatch_array!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn null_count(&self) -> usize {
        dispatch_array!(self, a => a.null_count())
    }

    pub fn validity(&self) -> Option<&Bitmap> {
        dispatch_array!(self, a => a.validity())
    }

    /// Caller guarantees `i < len`.
    #[inline]
    pub fn is_valid(&self, i: usize) -> bool {
        dispatch_array!(self, a => a.is_valid(i))
    }

    #[inline]
    pub fn is_null(&self, i: usize) -> bool {
        !self.is_valid(i)
    }

    /// Value at `i` as a scalar; null slots yield `Scalar::Null`.
    pub fn value_at(&self, i: usize) -> Result<Scalar> {
        if i >= self.len() {
            return Err(Error::index_out_of_bounds(i, self.len()));
        }
        if !self.is_valid(i) {
            return Ok(Scalar::Null);
        }
        Ok(match self {
            Array::Boolean(a) => Scalar::Bool(a.value(i)),
            Array::Int16(a) => Scalar::I16(a.value(i)),
            Array::Int32(a) => Scalar::I32(a.value(i)),
            Array::Int64(a) => Scalar::I64(a.value(i)),
            Array::UInt64(a) => Scalar::U64(a.value(i)),
            Array::Float32(a) => Scalar::F32(a.value(i)),
            Array::Float64(a) => Scalar::F64(a.value(i)),
            Array::Utf8(a) => Scalar::Str(a.value(i).to_string()),
            Array::Struct(a) => Scalar::Struct(
                a.children()
                    .iter()
                    .map(|c| c.value_at(i))
                    .collect::<Result<Vec<_>>>()?,
            ),
        })
    }

    /// Zero-copy view of `len` rows starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Result<Array> {
        Ok(match self {
            Array::Boolean(a) => Array::Boolean(a.slice(offset, len)?),
            Array::Int16(a) => Array::Int16(a.slice(offset, len)?),
            Array::Int32(a) => Array::Int32(a.slice(offset, len)?),
            Array::Int64(a) => Array::Int64(a.slice(offset, len)?),
            Array::UInt64(a) => Array::UInt64(a.slice(offset, len)?),
            Array::Float32(a) => Array::Float32(a.slice(offset, len)?),
            Array::Float64(a) => Array::Float64(a.slice(offset, len)?),
            Array::Utf8(a) => Array::Utf8(a.slice(offset, len)?),
            Array::Struct(a) => Array::Struct(a.slice(offset, len)?),
        })
    }

    /// Bytes held by the backing buffers.
    pub fn get_array_memory_size(&self) -> usize {
        dispatch_array!(self, a => a.memory_size())
    }

    /// Compare two slots of this array with nulls last.
    pub fn cmp_rows(&self, i: usize, j: usize) -> Ordering {
        match (self.is_valid(i), self.is_valid(j)) {
            (false, false) => Ordering::Equal,
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (true, true) => match self {
                Array::Boolean(a) => a.value(i).cmp(&a.value(j)),
                Array::Int16(a) => a.value(i).cmp(&a.value(j)),
                Array::Int32(a) => a.value(i).cmp(&a.value(j)),
                Array::Int64(a) => a.value(i).cmp(&a.value(j)),
                Array::UInt64(a) => a.value(i).cmp(&a.value(j)),
                Array::Float32(a) => a.value(i).total_cmp(&a.value(j)),
                Array::Float64(a) => a.value(i).total_cmp(&a.value(j)),
                Array::Utf8(a) => a.value(i).cmp(a.value(j)),
                Array::Struct(a) => {
                    for child in a.children() {
                        match child.cmp_rows(i, j) {
                            Ordering::Equal => continue,
                            other => return other,
                        }
                    }
                    Ordering::Equal
                }
            },
        }
    }

    pub fn as_primitive<T: NativeType>(&self) -> Option<&PrimitiveArray<T>> {
        T::downcast(self)
    }

    pub fn as_boolean(&self) -> Option<&BooleanArray> {
        match self {
            Array::Boolean(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&StringArray> {
        match self {
            Array::Utf8(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructArray> {
        match self {
            Array::Struct(a) => Some(a),
            _ => None,
        }
    }

    /// Iterate all slots as scalars.
    pub fn iter_scalars(&self) -> impl Iterator<Item = Scalar> + '_ {
        (0..self.len()).map(move |i| self.value_at(i).unwrap_or(Scalar::Null))
    }
}

/// Logical equality: same type and length, same validity per slot, and equal
/// values at valid slots. Physical layout (offsets, absent vs. all-set
/// validity) is not compared.
impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        if self.data_type() != other.data_type() || self.len() != other.len() {
            return false;
        }
        (0..self.len()).all(|i| match (self.value_at(i), other.value_at(i)) {
            (Ok(a), Ok(b)) => a.total_cmp(&b) == Ordering::Equal,
            _ => false,
        })
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        dispatch_array!(self, a => fmt::Debug::fmt(a, f))
    }
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.iter_scalars().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, "]")
    }
}

impl<T: NativeType> From<PrimitiveArray<T>> for Array {
    fn from(array: PrimitiveArray<T>) -> Self {
        T::into_array(array)
    }
}

impl From<BooleanArray> for Array {
    fn from(array: BooleanArray) -> Self {
        Array::Boolean(array)
    }
}

impl From<StringArray> for Array {
    fn from(array: StringArray) -> Self {
        Array::Utf8(array)
    }
}

impl From<StructArray> for Array {
    fn from(array: StructArray) -> Self {
        Array::Struct(array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_at_checks_bounds_and_nulls() {
        let a: Array = PrimitiveArray::<i64>::from(vec![Some(1), None, Some(3)]).into();
        assert_eq!(a.len(), 3);
        assert_eq!(a.null_count(), 1);
        assert_eq!(a.value_at(0).unwrap(), Scalar::I64(1));
        assert_eq!(a.value_at(1).unwrap(), Scalar::Null);
        assert!(matches!(a.value_at(3), Err(Error::Index(_))));
    }

    #[test]
    fn slicing_is_zero_copy() {
        let prim = PrimitiveArray::<i32>::from_vec((0..10).collect());
        let sliced = prim.slice(2, 5).unwrap();
        assert!(sliced.values_buffer().ptr_eq(prim.values_buffer()));
        assert_eq!(sliced.values(), &[2, 3, 4, 5, 6]);

        let strings: Array = StringArray::from(vec![Some("a"), None, Some("ccc"), Some("dd")]).into();
        let s = strings.slice(1, 3).unwrap();
        assert_eq!(s.value_at(0).unwrap(), Scalar::Null);
        assert_eq!(s.value_at(1).unwrap(), Scalar::Str("ccc".into()));
        assert_eq!(s.value_at(2).unwrap(), Scalar::Str("dd".into()));
        assert!(strings.slice(3, 2).is_err());
    }

    #[test]
    fn equality_is_logical() {
        let with_validity: Array = PrimitiveArray::<i64>::from(vec![Some(1), Some(2)]).into();
        let without: Array = PrimitiveArray::<i64>::from_vec(vec![1, 2]).into();
        assert_eq!(with_validity, without);
        let other: Array = PrimitiveArray::<i32>::from_vec(vec![1, 2]).into();
        assert_ne!(without, other);
    }

    #[test]
    fn struct_children_must_share_length() {
        let fields = vec![
            Field::new("a", DataType::Int64, true),
            Field::new("b", DataType::Utf8, true),
        ];
        let children: Vec<Array> = vec![
            PrimitiveArray::<i64>::from_vec(vec![1, 2]).into(),
            StringArray::from(vec!["x"]).into(),
        ];
        assert!(matches!(
            StructArray::try_new(fields, children, 2, None),
            Err(Error::SchemaMismatch(_))
        ));
    }

    #[test]
    fn display_renders_nulls() {
        let a: Array = PrimitiveArray::<i64>::from(vec![Some(1), None]).into();
        assert_eq!(a.to_string(), "[1, null]");
    }
}
