//! Hash-grouped aggregation.
//!
//! Rows are grouped on the tuple of their key values; null is an ordinary
//! key value. Groups are numbered in first-seen order and the output keeps
//! that order. Output columns are the aggregates (in declaration order)
//! followed by the keys.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use quiver_core::array::{NativeType, PrimitiveArray};
use quiver_core::builder::ArrayBuilder;
use quiver_core::{Array, Field, RecordBatch, Result, Scalar, Schema, SchemaRef};

use crate::aggregate::{Accumulator, ScalarAggregateOptions};

pub use crate::aggregate::AggregateFunc;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSpec {
    pub func: AggregateFunc,
    pub input: String,
    pub output_name: String,
}

impl AggregateSpec {
    pub fn new(func: AggregateFunc, input: impl Into<String>, output_name: impl Into<String>) -> Self {
        Self {
            func,
            input: input.into(),
            output_name: output_name.into(),
        }
    }
}

/// Hashable image of a key scalar. Floats hash by their bits with NaN and
/// `-0.0` canonicalized.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum KeyValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(u64),
    Str(String),
    Struct(Box<[KeyValue]>),
}

fn canonical_f64_bits(v: f64) -> u64 {
    if v.is_nan() {
        f64::NAN.to_bits()
    } else if v == 0.0 {
        0.0f64.to_bits()
    } else {
        v.to_bits()
    }
}

impl From<Scalar> for KeyValue {
    fn from(s: Scalar) -> Self {
        match s {
            Scalar::Null => KeyValue::Null,
            Scalar::Bool(v) => KeyValue::Bool(v),
            Scalar::I16(v) => KeyValue::Int(v as i64),
            Scalar::I32(v) => KeyValue::Int(v as i64),
            Scalar::I64(v) => KeyValue::Int(v),
            Scalar::U64(v) => KeyValue::UInt(v),
            Scalar::F32(v) => KeyValue::Float(canonical_f64_bits(v as f64)),
            Scalar::F64(v) => KeyValue::Float(canonical_f64_bits(v)),
            Scalar::Str(v) => KeyValue::Str(v),
            Scalar::Struct(children) => {
                KeyValue::Struct(children.into_iter().map(KeyValue::from).collect())
            }
        }
    }
}

/// Group identity. A single key column skips the boxed tuple.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum GroupKey {
    One(KeyValue),
    Many(Box<[KeyValue]>),
}

impl GroupKey {
    fn size(&self) -> usize {
        match self {
            GroupKey::One(k) => key_size(k),
            GroupKey::Many(ks) => ks.iter().map(key_size).sum(),
        }
    }
}

fn primitive_keys<T: NativeType>(a: &PrimitiveArray<T>, f: impl Fn(T) -> KeyValue) -> Vec<KeyValue> {
    a.iter().map(|v| v.map_or(KeyValue::Null, &f)).collect()
}

/// Key image of every row of `array`, dispatching on the type once.
fn key_column(array: &Array) -> Result<Vec<KeyValue>> {
    Ok(match array {
        Array::Boolean(a) => a.iter().map(|v| v.map_or(KeyValue::Null, KeyValue::Bool)).collect(),
        Array::Int16(a) => primitive_keys(a, |v| KeyValue::Int(v as i64)),
        Array::Int32(a) => primitive_keys(a, |v| KeyValue::Int(v as i64)),
        Array::Int64(a) => primitive_keys(a, KeyValue::Int),
        Array::UInt64(a) => primitive_keys(a, KeyValue::UInt),
        Array::Float32(a) => primitive_keys(a, |v| KeyValue::Float(canonical_f64_bits(v as f64))),
        Array::Float64(a) => primitive_keys(a, |v| KeyValue::Float(canonical_f64_bits(v))),
        Array::Utf8(a) => a
            .iter()
            .map(|v| v.map_or(KeyValue::Null, |s| KeyValue::Str(s.to_owned())))
            .collect(),
        Array::Struct(_) => (0..array.len())
            .map(|i| array.value_at(i).map(KeyValue::from))
            .collect::<Result<_>>()?,
    })
}

/// Feed one aggregate's input column to the groups its rows belong to.
fn update_grouped(accs: &mut [Accumulator], groups: &[usize], values: &Array) -> Result<()> {
    downcast_numeric!(values, a => {
        for (v, &g) in a.iter().zip(groups) {
            match v {
                Some(v) => accs[g].update_native(v),
                None => accs[g].update_null(),
            }
        }
        Ok(())
    }, _ => {
        for (row, &g) in groups.iter().enumerate() {
            accs[g].update(&values.value_at(row)?);
        }
        Ok(())
    })
}

/// Partial grouped-aggregation state, fed batch by batch.
pub struct GroupedAggregator {
    input_schema: Schema,
    key_indices: Vec<usize>,
    agg_inputs: Vec<usize>,
    output_schema: SchemaRef,
    groups: HashMap<GroupKey, usize>,
    key_builders: Vec<ArrayBuilder>,
    // [aggregate][group]
    accumulators: Vec<Vec<Accumulator>>,
    templates: Vec<Accumulator>,
    group_count: usize,
    key_bytes: usize,
}

impl GroupedAggregator {
    /// Resolve keys and aggregate inputs against `input`. Unknown names fail
    /// with `NoSuchField`, unsupported input types with `Type`.
    pub fn try_new(input: &Schema, keys: &[String], aggregates: &[AggregateSpec]) -> Result<Self> {
        let mut fields = Vec::with_capacity(aggregates.len() + keys.len());
        let mut agg_inputs = Vec::with_capacity(aggregates.len());
        let mut templates = Vec::with_capacity(aggregates.len());
        for spec in aggregates {
            let idx = input.try_index_of(&spec.input)?;
            let data_type = &input.fields[idx].data_type;
            let output = spec.func.output_type(data_type)?;
            templates.push(Accumulator::try_new(spec.func, data_type)?);
            fields.push(Field::new(
                spec.output_name.clone(),
                output,
                spec.func != AggregateFunc::Count,
            ));
            agg_inputs.push(idx);
        }

        let mut key_indices = Vec::with_capacity(keys.len());
        let mut key_builders = Vec::with_capacity(keys.len());
        for key in keys {
            let idx = input.try_index_of(key)?;
            let field = &input.fields[idx];
            key_builders.push(ArrayBuilder::new(&field.data_type));
            fields.push(field.clone());
            key_indices.push(idx);
        }

        let mut aggregator = Self {
            input_schema: input.clone(),
            key_indices,
            agg_inputs,
            output_schema: Arc::new(Schema::new(fields)),
            groups: HashMap::new(),
            key_builders,
            accumulators: vec![Vec::new(); aggregates.len()],
            templates,
            group_count: 0,
            key_bytes: 0,
        };
        // Without keys there is exactly one group, even over no rows.
        if aggregator.key_indices.is_empty() {
            aggregator.new_group(None);
        }
        Ok(aggregator)
    }

    pub fn output_schema(&self) -> &SchemaRef {
        &self.output_schema
    }

    pub fn num_groups(&self) -> usize {
        self.group_count
    }

    /// Approximate bytes of state held so far.
    pub fn state_size(&self) -> usize {
        let per_group: usize = self.templates.iter().map(Accumulator::size).sum::<usize>()
            + std::mem::size_of::<(GroupKey, usize)>();
        self.group_count * per_group + self.key_bytes
    }

    fn new_group(&mut self, key: Option<GroupKey>) -> usize {
        let id = self.group_count;
        self.group_count += 1;
        for (accs, template) in self.accumulators.iter_mut().zip(self.templates.iter()) {
            accs.push(template.clone());
        }
        if let Some(key) = key {
            self.groups.insert(key, id);
        }
        id
    }

    /// Group id of every row, creating groups in first-seen order.
    fn assign_groups(&mut self, batch: &RecordBatch) -> Result<Vec<usize>> {
        let rows = batch.num_rows();
        if self.key_indices.is_empty() {
            return Ok(vec![0; rows]);
        }
        let columns = batch.columns();
        let mut key_columns = self
            .key_indices
            .iter()
            .map(|&k| key_column(&columns[k]))
            .collect::<Result<Vec<_>>>()?;
        let mut groups = Vec::with_capacity(rows);
        for row in 0..rows {
            let key = match key_columns.as_mut_slice() {
                [only] => GroupKey::One(std::mem::replace(&mut only[row], KeyValue::Null)),
                many => GroupKey::Many(
                    many.iter_mut()
                        .map(|c| std::mem::replace(&mut c[row], KeyValue::Null))
                        .collect(),
                ),
            };
            let group = match self.groups.get(&key) {
                Some(&g) => g,
                None => {
                    for (builder, &k) in self.key_builders.iter_mut().zip(self.key_indices.iter()) {
                        builder.append_from(&columns[k], row)?;
                    }
                    self.key_bytes += key.size();
                    self.new_group(Some(key))
                }
            };
            groups.push(group);
        }
        Ok(groups)
    }

    pub fn update(&mut self, batch: &RecordBatch) -> Result<()> {
        self.input_schema.check_compatible(batch.schema())?;
        let groups = self.assign_groups(batch)?;
        let columns = batch.columns();
        for (accs, &input) in self.accumulators.iter_mut().zip(self.agg_inputs.iter()) {
            update_grouped(accs, &groups, &columns[input])?;
        }
        Ok(())
    }

    /// One row per group. Leaves the aggregator empty.
    pub fn finish(&mut self) -> Result<RecordBatch> {
        let options = ScalarAggregateOptions {
            skip_nulls: true,
            min_count: 1,
        };
        let mut columns: Vec<Array> = Vec::with_capacity(self.output_schema.len());
        for (i, accs) in self.accumulators.iter_mut().enumerate() {
            let data_type = &self.output_schema.fields[i].data_type;
            let mut builder = ArrayBuilder::with_capacity(data_type, accs.len());
            for acc in accs.drain(..) {
                builder.append_scalar(&acc.finish(&options))?;
            }
            columns.push(builder.finish()?);
        }
        for builder in &mut self.key_builders {
            columns.push(builder.finish()?);
        }
        self.groups.clear();
        self.group_count = 0;
        self.key_bytes = 0;
        if self.key_indices.is_empty() {
            self.new_group(None);
        }
        RecordBatch::try_new(Arc::clone(&self.output_schema), columns)
    }
}

fn key_size(k: &KeyValue) -> usize {
    std::mem::size_of::<KeyValue>()
        + match k {
            KeyValue::Str(s) => s.capacity(),
            KeyValue::Struct(children) => children.iter().map(key_size).sum(),
            _ => 0,
        }
}

/// Group `batch` by `keys` and compute `aggregates` in one call.
pub fn grouped_aggregate(
    batch: &RecordBatch,
    keys: &[String],
    aggregates: &[AggregateSpec],
) -> Result<RecordBatch> {
    let mut aggregator = GroupedAggregator::try_new(batch.schema(), keys, aggregates)?;
    aggregator.update(batch)?;
    aggregator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_core::array::{PrimitiveArray, StringArray};
    use quiver_core::{DataType, Error};

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn grouped_mean_in_first_seen_order() {
        let batch = RecordBatch::try_from_iter([
            ("k", Array::from(PrimitiveArray::<i64>::from_vec(vec![1, 2, 1]))),
            ("v", Array::from(PrimitiveArray::<i64>::from_vec(vec![10, 20, 30]))),
        ])
        .unwrap();
        let out = grouped_aggregate(
            &batch,
            &keys(&["k"]),
            &[AggregateSpec::new(AggregateFunc::Mean, "v", "v_mean")],
        )
        .unwrap();
        assert_eq!(out.schema().fields[0].name, "v_mean");
        assert_eq!(out.schema().fields[1].name, "k");
        assert_eq!(out.column(0).unwrap().to_string(), "[20, 20]");
        assert_eq!(out.column(1).unwrap().to_string(), "[1, 2]");
    }

    #[test]
    fn null_is_its_own_group_and_state_spans_batches() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("k", DataType::Utf8, true),
            Field::new("v", DataType::Float64, true),
        ]));
        let b1 = RecordBatch::try_new(
            schema.clone(),
            vec![
                StringArray::from(vec![Some("a"), None]).into(),
                PrimitiveArray::<f64>::from_vec(vec![1.0, 2.0]).into(),
            ],
        )
        .unwrap();
        let b2 = RecordBatch::try_new(
            schema.clone(),
            vec![
                StringArray::from(vec![None, Some("a")]).into(),
                PrimitiveArray::<f64>::from(vec![Some(5.0), None]).into(),
            ],
        )
        .unwrap();
        let mut agg = GroupedAggregator::try_new(
            &schema,
            &keys(&["k"]),
            &[
                AggregateSpec::new(AggregateFunc::Count, "v", "n"),
                AggregateSpec::new(AggregateFunc::Sum, "v", "total"),
                AggregateSpec::new(AggregateFunc::Max, "v", "hi"),
            ],
        )
        .unwrap();
        agg.update(&b1).unwrap();
        agg.update(&b2).unwrap();
        assert_eq!(agg.num_groups(), 2);
        let out = agg.finish().unwrap();
        assert_eq!(out.column(0).unwrap().to_string(), "[1, 2]");
        assert_eq!(out.column(1).unwrap().to_string(), "[1, 7]");
        assert_eq!(out.column(2).unwrap().to_string(), "[1, 5]");
        assert_eq!(out.column(3).unwrap().to_string(), "[\"a\", null]");
    }

    #[test]
    fn composite_keys_over_sliced_columns() {
        use quiver_core::array::BooleanArray;
        let k1: Array = PrimitiveArray::<i32>::from(vec![Some(9), Some(1), None, Some(1), None, Some(2)]).into();
        let k2: Array = BooleanArray::from(vec![true, false, true, false, true, false]).into();
        let v: Array = PrimitiveArray::<i16>::from(vec![Some(100), Some(3), Some(4), None, Some(6), Some(-1)]).into();
        let batch = RecordBatch::try_from_iter([
            ("k1", k1.slice(1, 5).unwrap()),
            ("k2", k2.slice(1, 5).unwrap()),
            ("v", v.slice(1, 5).unwrap()),
        ])
        .unwrap();
        let out = grouped_aggregate(
            &batch,
            &keys(&["k1", "k2"]),
            &[
                AggregateSpec::new(AggregateFunc::Count, "v", "n"),
                AggregateSpec::new(AggregateFunc::Sum, "v", "total"),
                AggregateSpec::new(AggregateFunc::Min, "v", "lo"),
            ],
        )
        .unwrap();
        assert_eq!(out.num_rows(), 3);
        assert_eq!(out.column(0).unwrap().to_string(), "[1, 2, 1]");
        assert_eq!(out.column(1).unwrap().to_string(), "[3, 10, -1]");
        assert_eq!(out.column(2).unwrap().to_string(), "[3, 4, -1]");
        assert_eq!(out.column(3).unwrap().to_string(), "[1, null, 2]");
        assert_eq!(out.column(4).unwrap().to_string(), "[false, true, false]");
    }

    #[test]
    fn no_keys_yields_one_row_even_without_input() {
        let schema = Schema::new(vec![Field::new("v", DataType::Int32, true)]);
        let mut agg = GroupedAggregator::try_new(
            &schema,
            &[],
            &[
                AggregateSpec::new(AggregateFunc::Count, "v", "n"),
                AggregateSpec::new(AggregateFunc::Sum, "v", "s"),
            ],
        )
        .unwrap();
        let out = agg.finish().unwrap();
        assert_eq!(out.num_rows(), 1);
        assert_eq!(out.column(0).unwrap().value_at(0).unwrap(), Scalar::I64(0));
        assert!(out.column(1).unwrap().is_null(0));
    }

    #[test]
    fn unknown_column_and_bad_type() {
        let schema = Schema::new(vec![Field::new("s", DataType::Utf8, true)]);
        assert!(matches!(
            GroupedAggregator::try_new(&schema, &keys(&["zz"]), &[]),
            Err(Error::NoSuchField(_))
        ));
        assert!(matches!(
            GroupedAggregator::try_new(
                &schema,
                &[],
                &[AggregateSpec::new(AggregateFunc::Mean, "s", "m")]
            ),
            Err(Error::Type(_))
        ));
    }
}
