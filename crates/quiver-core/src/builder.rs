//! Append-only array builders.
//!
//! Builders own their in-progress buffers exclusively and are not meant to be
//! shared across threads while appending. `finish` moves the buffers into an
//! immutable array and leaves the builder empty and reusable. Validity is
//! only materialized once the first null is appended.

use crate::array::{Array, BooleanArray, NativeType, PrimitiveArray, StringArray, StructArray};
use crate::buffer::{BitmapBuilder, ScalarBuffer};
use crate::error::{Error, Result};
use crate::scalar::Scalar;
use crate::schema::{DataType, Field};

/// Lazily materialized validity: `None` until the first null.
#[derive(Debug, Default)]
struct ValidityBuilder {
    bits: Option<BitmapBuilder>,
}

impl ValidityBuilder {
    #[inline]
    fn append_valid(&mut self) {
        if let Some(bits) = self.bits.as_mut() {
            bits.append(true);
        }
    }

    /// `len` is the number of slots appended before this null.
    fn append_null(&mut self, len: usize) {
        let bits = self.bits.get_or_insert_with(|| {
            let mut b = BitmapBuilder::with_capacity(len + 1);
            b.append_n(len, true);
            b
        });
        bits.append(false);
    }

    fn finish(&mut self) -> Option<crate::buffer::Bitmap> {
        self.bits.take().map(|mut b| b.finish())
    }
}

// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct PrimitiveBuilder<T: NativeType> {
    values: Vec<T>,
    validity: ValidityBuilder,
}

impl<T: NativeType> PrimitiveBuilder<T> {
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            validity: ValidityBuilder::default(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            validity: ValidityBuilder::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn append(&mut self, v: T) {
        self.validity.append_valid();
        self.values.push(v);
    }

    pub fn append_null(&mut self) {
        self.validity.append_null(self.values.len());
        self.values.push(T::default());
    }

    pub fn append_option(&mut self, v: Option<T>) {
        match v {
            Some(v) => self.append(v),
            None => self.append_null(),
        }
    }

    pub fn append_values(&mut self, values: &[T]) {
        self.values.reserve(values.len());
        for v in values {
            self.append(*v);
        }
    }

    pub fn finish_typed(&mut self) -> PrimitiveArray<T> {
        let values = ScalarBuffer::from_vec(std::mem::take(&mut self.values));
        PrimitiveArray::from_parts(values, self.validity.finish())
    }

    pub fn finish(&mut self) -> Array {
        self.finish_typed().into()
    }
}

#[derive(Debug, Default)]
pub struct BooleanBuilder {
    values: BitmapBuilder,
    validity: ValidityBuilder,
}

impl BooleanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: BitmapBuilder::with_capacity(capacity),
            validity: ValidityBuilder::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn append(&mut self, v: bool) {
        self.validity.append_valid();
        self.values.append(v);
    }

    pub fn append_null(&mut self) {
        self.validity.append_null(self.values.len());
        self.values.append(false);
    }

    pub fn append_option(&mut self, v: Option<bool>) {
        match v {
            Some(v) => self.append(v),
            None => self.append_null(),
        }
    }

    pub fn finish_typed(&mut self) -> BooleanArray {
        let values = self.values.finish();
        BooleanArray::from_parts(values, self.validity.finish())
    }

    pub fn finish(&mut self) -> Array {
        self.finish_typed().into()
    }
}

#[derive(Debug)]
pub struct StringBuilder {
    offsets: Vec<i64>,
    data: Vec<u8>,
    validity: ValidityBuilder,
}

impl Default for StringBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StringBuilder {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut offsets = Vec::with_capacity(capacity + 1);
        offsets.push(0);
        Self {
            offsets,
            data: Vec::new(),
            validity: ValidityBuilder::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn append(&mut self, v: &str) {
        self.validity.append_valid();
        self.data.extend_from_slice(v.as_bytes());
        self.offsets.push(self.data.len() as i64);
    }

    pub fn append_null(&mut self) {
        self.validity.append_null(self.len());
        self.offsets.push(self.data.len() as i64);
    }

    pub fn append_option(&mut self, v: Option<&str>) {
        match v {
            Some(v) => self.append(v),
            None => self.append_null(),
        }
    }

    pub fn append_values<S: AsRef<str>>(&mut self, values: &[S]) {
        for v in values {
            self.append(v.as_ref());
        }
    }

    pub fn finish_typed(&mut self) -> StringArray {
        let offsets = std::mem::replace(&mut self.offsets, vec![0]);
        let data = std::mem::take(&mut self.data);
        StringArray::from_parts(
            ScalarBuffer::from_vec(offsets),
            ScalarBuffer::from_vec(data),
            self.validity.finish(),
        )
    }

    pub fn finish(&mut self) -> Array {
        self.finish_typed().into()
    }
}

/// Builds a `StructArray` from positional child builders.
///
/// The parent row count advances only through `append`/`append_null`; each
/// child must be advanced separately (including for null parent rows) and
/// `finish` fails with `SchemaMismatch` when any child is out of step.
#[derive(Debug)]
pub struct StructBuilder {
    fields: Vec<Field>,
    children: Vec<ArrayBuilder>,
    len: usize,
    validity: ValidityBuilder,
}

impl StructBuilder {
    pub fn new(fields: Vec<Field>) -> Self {
        Self::with_capacity(fields, 0)
    }

    pub fn with_capacity(fields: Vec<Field>, capacity: usize) -> Self {
        let children = fields
            .iter()
            .map(|f| ArrayBuilder::with_capacity(&f.data_type, capacity))
            .collect();
        Self {
            fields,
            children,
            len: 0,
            validity: ValidityBuilder::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn num_fields(&self) -> usize {
        self.children.len()
    }

    pub fn field_builder(&mut self, i: usize) -> Option<&mut ArrayBuilder> {
        self.children.get_mut(i)
    }

    /// Advance the parent by one row.
    pub fn append(&mut self, is_valid: bool) {
        if is_valid {
            self.validity.append_valid();
        } else {
            self.validity.append_null(self.len);
        }
        self.len += 1;
    }

    pub fn append_null(&mut self) {
        self.append(false);
    }

    pub fn finish_typed(&mut self) -> Result<StructArray> {
        for (field, child) in self.fields.iter().zip(self.children.iter()) {
            if child.len() != self.len {
                return Err(Error::SchemaMismatch(format!(
                    "struct child '{}' has {} values but the struct has {} rows",
                    field.name,
                    child.len(),
                    self.len
                )));
            }
        }
        let children = self
            .children
            .iter_mut()
            .map(ArrayBuilder::finish)
            .collect::<Result<Vec<_>>>()?;
        let len = std::mem::take(&mut self.len);
        let validity = self.validity.finish();
        StructArray::try_new(self.fields.clone(), children, len, validity)
    }

    pub fn finish(&mut self) -> Result<Array> {
        Ok(self.finish_typed()?.into())
    }
}

// ---------------------------------------------------------------------------

/// Type-tagged builder over every supported `DataType`.
#[derive(Debug)]
pub enum ArrayBuilder {
    Boolean(BooleanBuilder),
    Int16(PrimitiveBuilder<i16>),
    Int32(PrimitiveBuilder<i32>),
    Int64(PrimitiveBuilder<i64>),
    UInt64(PrimitiveBuilder<u64>),
    Float32(PrimitiveBuilder<f32>),
    Float64(PrimitiveBuilder<f64>),
    Utf8(StringBuilder),
    Struct(StructBuilder),
}

/// Typed access from the dynamic builder to a concrete primitive builder.
pub trait PrimitiveBuilderAccess: NativeType {
    fn builder_mut(builder: &mut ArrayBuilder) -> Option<&mut PrimitiveBuilder<Self>>;
}

macro_rules! builder_access {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl PrimitiveBuilderAccess for $t {
                fn builder_mut(builder: &mut ArrayBuilder) -> Option<&mut PrimitiveBuilder<Self>> {
                    match builder {
                        ArrayBuilder::$variant(b) => Some(b),
                        _ => None,
                    }
                }
            }
        )*
    };
}

builder_access!(i16 => Int16, i32 => Int32, i64 => Int64, u64 => UInt64, f32 => Float32, f64 => Float64);

fn append_primitive<T: NativeType>(b: &mut PrimitiveBuilder<T>, scalar: &Scalar) -> Result<()> {
    if scalar.is_null() {
        b.append_null();
        return Ok(());
    }
    let cast = scalar.cast_to(&T::DATA_TYPE)?;
    let v = T::from_scalar(&cast)
        .ok_or_else(|| Error::Type(format!("cannot append {scalar} to a {} builder", T::DATA_TYPE)))?;
    b.append(v);
    Ok(())
}

/// Whether `append_scalar` on a builder of `data_type` would accept `scalar`.
/// Struct children are checked before any of them is touched.
fn check_scalar(data_type: &DataType, scalar: &Scalar) -> Result<()> {
    match (data_type, scalar) {
        (_, s) if s.is_null() => Ok(()),
        (DataType::Boolean, Scalar::Bool(_)) | (DataType::Utf8, Scalar::Str(_)) => Ok(()),
        (dt, s) if dt.is_numeric() => s.cast_to(dt).map(|_| ()),
        (DataType::Struct(fields), Scalar::Struct(values)) => {
            if values.len() != fields.len() {
                return Err(Error::Type(format!(
                    "struct scalar has {} values, builder has {} fields",
                    values.len(),
                    fields.len()
                )));
            }
            fields
                .iter()
                .zip(values)
                .try_for_each(|(f, v)| check_scalar(&f.data_type, v))
        }
        (dt, s) => Err(Error::Type(format!("cannot append {s} to a {dt} builder"))),
    }
}

impl ArrayBuilder {
    pub fn new(data_type: &DataType) -> Self {
        Self::with_capacity(data_type, 0)
    }

    pub fn with_capacity(data_type: &DataType, capacity: usize) -> Self {
        match data_type {
            DataType::Boolean => ArrayBuilder::Boolean(BooleanBuilder::with_capacity(capacity)),
            DataType::Int16 => ArrayBuilder::Int16(PrimitiveBuilder::with_capacity(capacity)),
            DataType::Int32 => ArrayBuilder::Int32(PrimitiveBuilder::with_capacity(capacity)),
            DataType::Int64 => ArrayBuilder::Int64(PrimitiveBuilder::with_capacity(capacity)),
            DataType::UInt64 => ArrayBuilder::UInt64(PrimitiveBuilder::with_capacity(capacity)),
            DataType::Float32 => ArrayBuilder::Float32(PrimitiveBuilder::with_capacity(capacity)),
            DataType::Float64 => ArrayBuilder::Float64(PrimitiveBuilder::with_capacity(capacity)),
            DataType::Utf8 => ArrayBuilder::Utf8(StringBuilder::with_capacity(capacity)),
            DataType::Struct(fields) => {
                ArrayBuilder::Struct(StructBuilder::with_capacity(fields.clone(), capacity))
            }
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ArrayBuilder::Boolean(_) => DataType::Boolean,
            ArrayBuilder::Int16(_) => DataType::Int16,
            ArrayBuilder::Int32(_) => DataType::Int32,
            ArrayBuilder::Int64(_) => DataType::Int64,
            ArrayBuilder::UInt64(_) => DataType::UInt64,
            ArrayBuilder::Float32(_) => DataType::Float32,
            ArrayBuilder::Float64(_) => DataType::Float64,
            ArrayBuilder::Utf8(_) => DataType::Utf8,
            ArrayBuilder::Struct(b) => DataType::Struct(b.fields.clone()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayBuilder::Boolean(b) => b.len(),
            ArrayBuilder::Int16(b) => b.len(),
            ArrayBuilder::Int32(b) => b.len(),
            ArrayBuilder::Int64(b) => b.len(),
            ArrayBuilder::UInt64(b) => b.len(),
            ArrayBuilder::Float32(b) => b.len(),
            ArrayBuilder::Float64(b) => b.len(),
            ArrayBuilder::Utf8(b) => b.len(),
            ArrayBuilder::Struct(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a null. For structs the children are advanced with nulls too.
    pub fn append_null(&mut self) {
        match self {
            ArrayBuilder::Boolean(b) => b.append_null(),
            ArrayBuilder::Int16(b) => b.append_null(),
            ArrayBuilder::Int32(b) => b.append_null(),
            ArrayBuilder::Int64(b) => b.append_null(),
            ArrayBuilder::UInt64(b) => b.append_null(),
            ArrayBuilder::Float32(b) => b.append_null(),
            ArrayBuilder::Float64(b) => b.append_null(),
            ArrayBuilder::Utf8(b) => b.append_null(),
            ArrayBuilder::Struct(b) => {
                for child in b.children.iter_mut() {
                    child.append_null();
                }
                b.append_null();
            }
        }
    }

    /// Appends a scalar, casting numeric values to the builder's type.
    pub fn append_scalar(&mut self, scalar: &Scalar) -> Result<()> {
        if scalar.is_null() {
            self.append_null();
            return Ok(());
        }
        match (self, scalar) {
            (ArrayBuilder::Boolean(b), Scalar::Bool(v)) => b.append(*v),
            (ArrayBuilder::Int16(b), s) => append_primitive(b, s)?,
            (ArrayBuilder::Int32(b), s) => append_primitive(b, s)?,
            (ArrayBuilder::Int64(b), s) => append_primitive(b, s)?,
            (ArrayBuilder::UInt64(b), s) => append_primitive(b, s)?,
            (ArrayBuilder::Float32(b), s) => append_primitive(b, s)?,
            (ArrayBuilder::Float64(b), s) => append_primitive(b, s)?,
            (ArrayBuilder::Utf8(b), Scalar::Str(v)) => b.append(v),
            (ArrayBuilder::Struct(b), Scalar::Struct(values)) => {
                check_scalar(&DataType::Struct(b.fields.clone()), scalar)?;
                for (child, v) in b.children.iter_mut().zip(values.iter()) {
                    child.append_scalar(v)?;
                }
                b.append(true);
            }
            (builder, s) => {
                return Err(Error::Type(format!(
                    "cannot append {s} to a {} builder",
                    builder.data_type()
                )))
            }
        }
        Ok(())
    }

    /// Appends slot `i` of `array`, which must have the builder's type.
    ///
    /// Values are copied through the typed builders without going through
    /// `Scalar`. Nothing is appended when the type or the index is wrong.
    pub fn append_from(&mut self, array: &Array, i: usize) -> Result<()> {
        if self.data_type() != array.data_type() {
            return Err(Error::Type(format!(
                "cannot append from a {} array to a {} builder",
                array.data_type(),
                self.data_type()
            )));
        }
        if i >= array.len() {
            return Err(Error::index_out_of_bounds(i, array.len()));
        }
        match (self, array) {
            (ArrayBuilder::Boolean(b), Array::Boolean(a)) => b.append_option(a.get(i)),
            (ArrayBuilder::Int16(b), Array::Int16(a)) => b.append_option(a.get(i)),
            (ArrayBuilder::Int32(b), Array::Int32(a)) => b.append_option(a.get(i)),
            (ArrayBuilder::Int64(b), Array::Int64(a)) => b.append_option(a.get(i)),
            (ArrayBuilder::UInt64(b), Array::UInt64(a)) => b.append_option(a.get(i)),
            (ArrayBuilder::Float32(b), Array::Float32(a)) => b.append_option(a.get(i)),
            (ArrayBuilder::Float64(b), Array::Float64(a)) => b.append_option(a.get(i)),
            (ArrayBuilder::Utf8(b), Array::Utf8(a)) => b.append_option(a.get(i)),
            (ArrayBuilder::Struct(b), Array::Struct(src)) => {
                // Children share the struct's length and types, so none of
                // these appends can fail once the checks above passed.
                for (child, src_child) in b.children.iter_mut().zip(src.children()) {
                    child.append_from(src_child, i)?;
                }
                b.append(src.is_valid(i));
            }
            (builder, _) => {
                return Err(Error::Invariant(format!(
                    "{} builder matched a {} array",
                    builder.data_type(),
                    array.data_type()
                )))
            }
        }
        Ok(())
    }

    pub fn as_primitive_mut<T: PrimitiveBuilderAccess>(&mut self) -> Option<&mut PrimitiveBuilder<T>> {
        T::builder_mut(self)
    }

    pub fn as_boolean_mut(&mut self) -> Option<&mut BooleanBuilder> {
        match self {
            ArrayBuilder::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_string_mut(&mut self) -> Option<&mut StringBuilder> {
        match self {
            ArrayBuilder::Utf8(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_struct_mut(&mut self) -> Option<&mut StructBuilder> {
        match self {
            ArrayBuilder::Struct(b) => Some(b),
            _ => None,
        }
    }

    pub fn finish(&mut self) -> Result<Array> {
        Ok(match self {
            ArrayBuilder::Boolean(b) => b.finish(),
            ArrayBuilder::Int16(b) => b.finish(),
            ArrayBuilder::Int32(b) => b.finish(),
            ArrayBuilder::Int64(b) => b.finish(),
            ArrayBuilder::UInt64(b) => b.finish(),
            ArrayBuilder::Float32(b) => b.finish(),
            ArrayBuilder::Float64(b) => b.finish(),
            ArrayBuilder::Utf8(b) => b.finish(),
            ArrayBuilder::Struct(b) => b.finish()?,
        })
    }
}

/// Array of `len` nulls of `data_type`.
pub fn new_null_array(data_type: &DataType, len: usize) -> Result<Array> {
    let mut builder = ArrayBuilder::with_capacity(data_type, len);
    for _ in 0..len {
        builder.append_null();
    }
    builder.finish()
}

/// Build an array of `data_type` from scalars.
pub fn array_from_scalars(data_type: &DataType, scalars: &[Scalar]) -> Result<Array> {
    let mut builder = ArrayBuilder::with_capacity(data_type, scalars.len());
    for s in scalars {
        builder.append_scalar(s)?;
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_resets_the_builder() {
        let mut b = PrimitiveBuilder::<i64>::new();
        b.append(1);
        b.append_null();
        b.append(3);
        let a = b.finish();
        assert_eq!(a.len(), 3);
        assert_eq!(a.null_count(), 1);
        assert!(b.is_empty());

        b.append(7);
        let second = b.finish();
        assert_eq!(second.len(), 1);
        assert_eq!(second.null_count(), 0);
        assert!(second.validity().is_none());
    }

    #[test]
    fn validity_is_backfilled_on_first_null() {
        let mut b = StringBuilder::new();
        b.append("a");
        b.append("b");
        b.append_null();
        let a = b.finish_typed();
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![Some("a"), Some("b"), None]);
    }

    #[test]
    fn struct_builder_composes_children() {
        let fields = vec![
            Field::new("archer", DataType::Utf8, true),
            Field::new("year", DataType::Int16, true),
        ];
        let mut sb = StructBuilder::new(fields);
        for (name, year) in [("Legolas", 1954i16), ("Merida", 2012)] {
            sb.field_builder(0).unwrap().as_string_mut().unwrap().append(name);
            sb.field_builder(1)
                .unwrap()
                .as_primitive_mut::<i16>()
                .unwrap()
                .append(year);
            sb.append(true);
        }
        let arr = sb.finish().unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(
            arr.value_at(1).unwrap(),
            Scalar::Struct(vec![Scalar::Str("Merida".into()), Scalar::I16(2012)])
        );
    }

    #[test]
    fn rejected_struct_scalar_leaves_children_untouched() {
        let mut b = ArrayBuilder::new(&DataType::Struct(vec![
            Field::new("a", DataType::Int64, true),
            Field::new("b", DataType::Utf8, true),
        ]));
        let bad = Scalar::Struct(vec![Scalar::I64(1), Scalar::I64(2)]);
        assert!(matches!(b.append_scalar(&bad), Err(Error::Type(_))));
        assert!(b.is_empty());

        b.append_scalar(&Scalar::Struct(vec![Scalar::I64(5), Scalar::Str("x".into())]))
            .unwrap();
        let arr = b.finish().unwrap();
        assert_eq!(arr.len(), 1);
        assert_eq!(
            arr.value_at(0).unwrap(),
            Scalar::Struct(vec![Scalar::I64(5), Scalar::Str("x".into())])
        );
    }

    #[test]
    fn append_from_checks_type_before_touching_children() {
        let fields = vec![
            Field::new("a", DataType::Int64, true),
            Field::new("b", DataType::Int64, true),
        ];
        let source = array_from_scalars(
            &DataType::Struct(fields.clone()),
            &[Scalar::Null, Scalar::Struct(vec![Scalar::I64(1), Scalar::I64(2)])],
        )
        .unwrap();
        let mut other = ArrayBuilder::new(&DataType::Struct(vec![
            Field::new("a", DataType::Int64, true),
            Field::new("b", DataType::Utf8, true),
        ]));
        assert!(matches!(other.append_from(&source, 0), Err(Error::Type(_))));
        assert!(other.is_empty());

        let mut same = ArrayBuilder::new(&DataType::Struct(fields));
        same.append_from(&source, 0).unwrap();
        same.append_from(&source, 1).unwrap();
        let arr = same.finish().unwrap();
        assert_eq!(arr.null_count(), 1);
        assert_eq!(
            arr.value_at(1).unwrap(),
            Scalar::Struct(vec![Scalar::I64(1), Scalar::I64(2)])
        );
    }

    #[test]
    fn struct_builder_rejects_unbalanced_children() {
        let mut sb = StructBuilder::new(vec![
            Field::new("a", DataType::Int64, true),
            Field::new("b", DataType::Int64, true),
        ]);
        sb.field_builder(0).unwrap().append_scalar(&Scalar::I64(1)).unwrap();
        sb.append(true);
        assert!(matches!(sb.finish(), Err(Error::SchemaMismatch(_))));
    }

    #[test]
    fn append_scalar_casts_and_rejects_mismatches() {
        let mut b = ArrayBuilder::new(&DataType::Float64);
        b.append_scalar(&Scalar::I32(2)).unwrap();
        b.append_scalar(&Scalar::Null).unwrap();
        assert!(matches!(
            b.append_scalar(&Scalar::Str("x".into())),
            Err(Error::Type(_))
        ));
        let a = b.finish().unwrap();
        assert_eq!(a.value_at(0).unwrap(), Scalar::F64(2.0));
        assert!(a.is_null(1));
    }
}
