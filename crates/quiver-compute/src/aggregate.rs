//! Scalar aggregates: min/max, sum, mean, count.
//!
//! The same `Accumulator` drives these kernels, their chunked variants, and
//! the per-group state of the grouped aggregator.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use quiver_core::array::NativeType;
use quiver_core::{Array, ChunkedArray, DataType, Error, Result, Scalar};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalarAggregateOptions {
    /// When false, a single null input makes the result null.
    pub skip_nulls: bool,
    /// Results over fewer non-null values than this are null.
    pub min_count: usize,
}

impl Default for ScalarAggregateOptions {
    fn default() -> Self {
        Self {
            skip_nulls: true,
            min_count: 1,
        }
    }
}

impl ScalarAggregateOptions {
    pub fn keep_nulls() -> Self {
        Self {
            skip_nulls: false,
            ..Self::default()
        }
    }
}

/// Which slots `count` counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountMode {
    #[default]
    OnlyValid,
    OnlyNull,
    All,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MinMax {
    pub min: Scalar,
    pub max: Scalar,
}

impl MinMax {
    fn null() -> Self {
        Self {
            min: Scalar::Null,
            max: Scalar::Null,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateFunc {
    Count,
    Sum,
    Mean,
    Min,
    Max,
}

impl AggregateFunc {
    pub fn name(self) -> &'static str {
        match self {
            AggregateFunc::Count => "count",
            AggregateFunc::Sum => "sum",
            AggregateFunc::Mean => "mean",
            AggregateFunc::Min => "min",
            AggregateFunc::Max => "max",
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        Ok(match name {
            "count" => AggregateFunc::Count,
            "sum" => AggregateFunc::Sum,
            "mean" => AggregateFunc::Mean,
            "min" => AggregateFunc::Min,
            "max" => AggregateFunc::Max,
            other => {
                return Err(Error::InvalidArgument(format!(
                    "unknown aggregate function '{other}'"
                )))
            }
        })
    }

    /// Result type of this function over `input`.
    pub fn output_type(self, input: &DataType) -> Result<DataType> {
        let unsupported = || {
            Error::Type(format!(
                "{} is not supported for {input}",
                self.name()
            ))
        };
        match self {
            AggregateFunc::Count => Ok(DataType::Int64),
            AggregateFunc::Sum => match input {
                DataType::Int16 | DataType::Int32 | DataType::Int64 => Ok(DataType::Int64),
                DataType::UInt64 => Ok(DataType::UInt64),
                DataType::Float32 | DataType::Float64 => Ok(DataType::Float64),
                _ => Err(unsupported()),
            },
            AggregateFunc::Mean if input.is_numeric() => Ok(DataType::Float64),
            AggregateFunc::Mean => Err(unsupported()),
            AggregateFunc::Min | AggregateFunc::Max => match input {
                DataType::Struct(_) => Err(unsupported()),
                other => Ok(other.clone()),
            },
        }
    }
}

impl fmt::Display for AggregateFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug)]
enum State {
    Count,
    Int(i64),
    UInt(u64),
    Float(f64),
    Extreme(Option<Scalar>),
}

/// Running state of one aggregate over one group.
#[derive(Clone, Debug)]
pub(crate) struct Accumulator {
    func: AggregateFunc,
    valid: u64,
    nulls: u64,
    state: State,
}

impl Accumulator {
    pub(crate) fn try_new(func: AggregateFunc, input: &DataType) -> Result<Self> {
        let output = func.output_type(input)?;
        let state = match (func, &output) {
            (AggregateFunc::Count, _) => State::Count,
            (AggregateFunc::Sum, DataType::Int64) => State::Int(0),
            (AggregateFunc::Sum, DataType::UInt64) => State::UInt(0),
            (AggregateFunc::Sum, _) | (AggregateFunc::Mean, _) => State::Float(0.0),
            (AggregateFunc::Min, _) | (AggregateFunc::Max, _) => State::Extreme(None),
        };
        Ok(Self {
            func,
            valid: 0,
            nulls: 0,
            state,
        })
    }

    pub(crate) fn update(&mut self, value: &Scalar) {
        if value.is_null() {
            self.nulls += 1;
            return;
        }
        self.valid += 1;
        match &mut self.state {
            State::Count => {}
            State::Int(sum) => {
                let v = match value {
                    Scalar::I16(v) => *v as i64,
                    Scalar::I32(v) => *v as i64,
                    Scalar::I64(v) => *v,
                    _ => 0,
                };
                *sum = sum.wrapping_add(v);
            }
            State::UInt(sum) => {
                if let Scalar::U64(v) = value {
                    *sum = sum.wrapping_add(*v);
                }
            }
            State::Float(sum) => *sum += value.as_f64().unwrap_or(0.0),
            State::Extreme(best) => {
                let wanted = if self.func == AggregateFunc::Min {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                let replace = match best {
                    None => true,
                    Some(b) => value.total_cmp(b) == wanted,
                };
                if replace {
                    *best = Some(value.clone());
                }
            }
        }
    }

    /// Typed counterpart of `update` for one valid primitive value.
    #[inline]
    pub(crate) fn update_native<T: NativeType>(&mut self, v: T) {
        self.valid += 1;
        let wanted = if self.func == AggregateFunc::Min {
            Ordering::Less
        } else {
            Ordering::Greater
        };
        match &mut self.state {
            State::Count => {}
            State::Int(sum) => *sum = sum.wrapping_add(v.to_i64_wrapping()),
            State::UInt(sum) => *sum = sum.wrapping_add(v.to_i64_wrapping() as u64),
            State::Float(sum) => *sum += v.to_f64(),
            State::Extreme(best) => {
                let replace = match best.as_ref().and_then(T::from_scalar) {
                    None => true,
                    Some(b) => v.total_cmp(&b) == wanted,
                };
                if replace {
                    *best = Some(v.into_scalar());
                }
            }
        }
    }

    pub(crate) fn update_null(&mut self) {
        self.nulls += 1;
    }

    pub(crate) fn update_array(&mut self, array: &Array) -> Result<()> {
        downcast_numeric!(array, a => {
            for v in a.iter() {
                match v {
                    Some(v) => self.update_native(v),
                    None => self.update_null(),
                }
            }
            Ok(())
        }, _ => {
            for i in 0..array.len() {
                self.update(&array.value_at(i)?);
            }
            Ok(())
        })
    }

    pub(crate) fn finish(&self, options: &ScalarAggregateOptions) -> Scalar {
        if self.func == AggregateFunc::Count {
            return Scalar::I64(self.valid as i64);
        }
        if (!options.skip_nulls && self.nulls > 0) || (self.valid as usize) < options.min_count {
            return Scalar::Null;
        }
        match &self.state {
            State::Count => Scalar::I64(self.valid as i64),
            State::Int(sum) => Scalar::I64(*sum),
            State::UInt(sum) => Scalar::U64(*sum),
            State::Float(sum) if self.func == AggregateFunc::Mean => {
                if self.valid == 0 {
                    Scalar::Null
                } else {
                    Scalar::F64(*sum / self.valid as f64)
                }
            }
            State::Float(sum) => Scalar::F64(*sum),
            State::Extreme(best) => best.clone().unwrap_or(Scalar::Null),
        }
    }

    /// Rough bytes held by this state, for memory accounting.
    pub(crate) fn size(&self) -> usize {
        let heap = match &self.state {
            State::Extreme(Some(Scalar::Str(s))) => s.capacity(),
            _ => 0,
        };
        std::mem::size_of::<Self>() + heap
    }
}

fn accumulate(func: AggregateFunc, data_type: &DataType, chunks: &[Array]) -> Result<Accumulator> {
    let mut acc = Accumulator::try_new(func, data_type)?;
    for chunk in chunks {
        acc.update_array(chunk)?;
    }
    Ok(acc)
}

/// Smallest and largest value in one pass. Empty input, too few values, or
/// a null with `skip_nulls == false` yield nulls for both.
pub fn min_max(array: &Array, options: &ScalarAggregateOptions) -> Result<MinMax> {
    if let DataType::Struct(_) = array.data_type() {
        return Err(Error::Type("min_max is not supported for struct arrays".into()));
    }
    let nulls = array.null_count();
    let valid = array.len() - nulls;
    if (!options.skip_nulls && nulls > 0) || valid < options.min_count || valid == 0 {
        return Ok(MinMax::null());
    }

    let mut lo: Option<usize> = None;
    let mut hi: Option<usize> = None;
    for i in (0..array.len()).filter(|&i| array.is_valid(i)) {
        if lo.map_or(true, |j| array.cmp_rows(i, j) == Ordering::Less) {
            lo = Some(i);
        }
        if hi.map_or(true, |j| array.cmp_rows(i, j) == Ordering::Greater) {
            hi = Some(i);
        }
    }
    match (lo, hi) {
        (Some(lo), Some(hi)) => Ok(MinMax {
            min: array.value_at(lo)?,
            max: array.value_at(hi)?,
        }),
        _ => Ok(MinMax::null()),
    }
}

/// `min_max` across every chunk of a chunked array.
pub fn min_max_chunked(array: &ChunkedArray, options: &ScalarAggregateOptions) -> Result<MinMax> {
    let nulls = array.null_count();
    let valid = array.len() - nulls;
    if (!options.skip_nulls && nulls > 0) || valid < options.min_count || valid == 0 {
        if let DataType::Struct(_) = array.data_type() {
            return Err(Error::Type("min_max is not supported for struct arrays".into()));
        }
        return Ok(MinMax::null());
    }
    let mut out = MinMax::null();
    for chunk in array.chunks() {
        let part = min_max(chunk, &ScalarAggregateOptions::default())?;
        if part.min.is_null() {
            continue;
        }
        if out.min.is_null() || part.min.total_cmp(&out.min) == Ordering::Less {
            out.min = part.min;
        }
        if out.max.is_null() || part.max.total_cmp(&out.max) == Ordering::Greater {
            out.max = part.max;
        }
    }
    Ok(out)
}

/// Sum of the non-null values. Signed integers sum into `I64`, `UInt64`
/// into `U64` (both wrapping), floats into `F64`.
pub fn sum(array: &Array, options: &ScalarAggregateOptions) -> Result<Scalar> {
    sum_chunks(&array.data_type(), std::slice::from_ref(array), options)
}

pub(crate) fn sum_chunks(
    data_type: &DataType,
    chunks: &[Array],
    options: &ScalarAggregateOptions,
) -> Result<Scalar> {
    Ok(accumulate(AggregateFunc::Sum, data_type, chunks)?.finish(options))
}

/// Arithmetic mean as `F64`.
pub fn mean(array: &Array, options: &ScalarAggregateOptions) -> Result<Scalar> {
    mean_chunks(&array.data_type(), std::slice::from_ref(array), options)
}

pub(crate) fn mean_chunks(
    data_type: &DataType,
    chunks: &[Array],
    options: &ScalarAggregateOptions,
) -> Result<Scalar> {
    Ok(accumulate(AggregateFunc::Mean, data_type, chunks)?.finish(options))
}

pub fn count(array: &Array, mode: CountMode) -> i64 {
    let nulls = array.null_count();
    (match mode {
        CountMode::OnlyValid => array.len() - nulls,
        CountMode::OnlyNull => nulls,
        CountMode::All => array.len(),
    }) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_core::array::{PrimitiveArray, StringArray};

    #[test]
    fn min_max_respects_null_options() {
        let a: Array = PrimitiveArray::<i64>::from(vec![Some(3), None, Some(-2), Some(9)]).into();
        let mm = min_max(&a, &ScalarAggregateOptions::default()).unwrap();
        assert_eq!(mm.min, Scalar::I64(-2));
        assert_eq!(mm.max, Scalar::I64(9));

        let strict = min_max(&a, &ScalarAggregateOptions::keep_nulls()).unwrap();
        assert_eq!(strict, MinMax::null());

        let empty: Array = PrimitiveArray::<i64>::from_vec(vec![]).into();
        assert_eq!(min_max(&empty, &ScalarAggregateOptions::default()).unwrap(), MinMax::null());
    }

    #[test]
    fn min_max_over_strings_and_chunks() {
        let s: Array = StringArray::from(vec!["pear", "apple", "zucchini"]).into();
        let mm = min_max(&s, &ScalarAggregateOptions::default()).unwrap();
        assert_eq!(mm.min, Scalar::Str("apple".into()));
        assert_eq!(mm.max, Scalar::Str("zucchini".into()));

        let chunked = ChunkedArray::try_new(
            DataType::Float64,
            vec![
                PrimitiveArray::<f64>::from_vec(vec![1.5, 4.0]).into(),
                PrimitiveArray::<f64>::from(vec![None, Some(-1.0)]).into(),
            ],
        )
        .unwrap();
        let mm = min_max_chunked(&chunked, &ScalarAggregateOptions::default()).unwrap();
        assert_eq!(mm.min, Scalar::F64(-1.0));
        assert_eq!(mm.max, Scalar::F64(4.0));
    }

    #[test]
    fn sum_mean_count() {
        let a: Array = PrimitiveArray::<i32>::from(vec![Some(1), Some(2), None, Some(3)]).into();
        let opts = ScalarAggregateOptions::default();
        assert_eq!(sum(&a, &opts).unwrap(), Scalar::I64(6));
        assert_eq!(mean(&a, &opts).unwrap(), Scalar::F64(2.0));
        assert_eq!(sum(&a, &ScalarAggregateOptions::keep_nulls()).unwrap(), Scalar::Null);
        assert_eq!(count(&a, CountMode::OnlyValid), 3);
        assert_eq!(count(&a, CountMode::OnlyNull), 1);
        assert_eq!(count(&a, CountMode::All), 4);

        let s: Array = StringArray::from(vec!["x"]).into();
        assert!(matches!(sum(&s, &opts), Err(Error::Type(_))));
    }
}
