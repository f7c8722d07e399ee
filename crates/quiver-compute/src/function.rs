//! Name-based kernel dispatch over `Datum` arguments.
//!
//! Array kernels are applied chunk-wise when the first argument is a
//! `ChunkedArray`, so the result keeps the input's chunk layout.

use quiver_core::array::{BooleanArray, PrimitiveArray};
use quiver_core::{Array, ChunkedArray, DataType, Datum, Error, Result, Scalar};

use crate::aggregate::{self, CountMode, ScalarAggregateOptions};
use crate::arithmetic::{arithmetic, ArithmeticOp};
use crate::filter::{filter, filter_table};
use crate::sort::{sort_indices, SortKey};
use crate::take::{take, take_table};

#[derive(Clone, Debug, Default, PartialEq)]
pub enum FunctionOptions {
    #[default]
    None,
    ScalarAggregate(ScalarAggregateOptions),
    Count(CountMode),
    Sort(Vec<SortKey>),
}

impl FunctionOptions {
    fn scalar_aggregate(&self, name: &str) -> Result<ScalarAggregateOptions> {
        match self {
            FunctionOptions::None => Ok(ScalarAggregateOptions::default()),
            FunctionOptions::ScalarAggregate(o) => Ok(*o),
            other => Err(mismatched(name, other)),
        }
    }
}

fn mismatched(name: &str, options: &FunctionOptions) -> Error {
    Error::InvalidArgument(format!("{name} does not accept options {options:?}"))
}

fn arity(name: &str, args: &[Datum], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(Error::InvalidArgument(format!(
            "{name} expects {expected} argument(s), got {}",
            args.len()
        )));
    }
    Ok(())
}

fn expect_array(name: &str, datum: &Datum) -> Result<Array> {
    match datum {
        Datum::Array(a) => Ok(a.clone()),
        Datum::ChunkedArray(c) => c.concat(),
        other => Err(Error::Type(format!("{name} expects an array, got a {}", other.kind()))),
    }
}

fn indices_arg(datum: &Datum) -> Result<PrimitiveArray<u64>> {
    let array = expect_array("take", datum)?;
    array
        .as_primitive::<u64>()
        .cloned()
        .ok_or_else(|| Error::Type(format!("take indices must be uint64, got {}", array.data_type())))
}

fn mask_arg(datum: &Datum) -> Result<BooleanArray> {
    let array = expect_array("filter", datum)?;
    array
        .as_boolean()
        .cloned()
        .ok_or_else(|| Error::Type(format!("filter mask must be boolean, got {}", array.data_type())))
}

/// Apply `f` to every chunk, keeping the chunk layout.
fn map_chunks(input: &ChunkedArray, f: impl Fn(&Array) -> Result<Array>) -> Result<ChunkedArray> {
    let chunks = input.chunks().iter().map(f).collect::<Result<Vec<_>>>()?;
    let data_type = match chunks.first() {
        Some(c) => c.data_type(),
        None => input.data_type().clone(),
    };
    ChunkedArray::try_new(data_type, chunks)
}

fn chunks_of(name: &str, datum: &Datum) -> Result<(DataType, Vec<Array>)> {
    match datum {
        Datum::Array(a) => Ok((a.data_type(), vec![a.clone()])),
        Datum::ChunkedArray(c) => Ok((c.data_type().clone(), c.chunks().to_vec())),
        other => Err(Error::Type(format!("{name} expects an array, got a {}", other.kind()))),
    }
}

fn call_arithmetic(op: ArithmeticOp, args: &[Datum]) -> Result<Datum> {
    arity(op.name(), args, 2)?;
    match (&args[0], &args[1]) {
        (Datum::Array(lhs), rhs) => Ok(arithmetic(op, lhs, rhs)?.into()),
        (Datum::ChunkedArray(lhs), Datum::Scalar(s)) => {
            let rhs = Datum::Scalar(s.clone());
            Ok(map_chunks(lhs, |chunk| arithmetic(op, chunk, &rhs))?.into())
        }
        (Datum::ChunkedArray(lhs), rhs) => Ok(arithmetic(op, &lhs.concat()?, rhs)?.into()),
        (lhs, _) => Err(Error::Type(format!(
            "{} expects an array on the left, got a {}",
            op.name(),
            lhs.kind()
        ))),
    }
}

/// Run the kernel registered under `name`.
///
/// Unknown names and wrong argument counts fail with `InvalidArgument`.
pub fn call_function(name: &str, args: &[Datum], options: &FunctionOptions) -> Result<Datum> {
    match name {
        "add" => call_arithmetic(ArithmeticOp::Add, args),
        "subtract" => call_arithmetic(ArithmeticOp::Subtract, args),
        "multiply" => call_arithmetic(ArithmeticOp::Multiply, args),
        "min_max" => {
            arity(name, args, 1)?;
            let opts = options.scalar_aggregate(name)?;
            let mm = match &args[0] {
                Datum::Array(a) => aggregate::min_max(a, &opts)?,
                Datum::ChunkedArray(c) => aggregate::min_max_chunked(c, &opts)?,
                other => {
                    return Err(Error::Type(format!("min_max expects an array, got a {}", other.kind())))
                }
            };
            Ok(Scalar::Struct(vec![mm.min, mm.max]).into())
        }
        "sum" => {
            arity(name, args, 1)?;
            let opts = options.scalar_aggregate(name)?;
            let (dt, chunks) = chunks_of(name, &args[0])?;
            Ok(aggregate::sum_chunks(&dt, &chunks, &opts)?.into())
        }
        "mean" => {
            arity(name, args, 1)?;
            let opts = options.scalar_aggregate(name)?;
            let (dt, chunks) = chunks_of(name, &args[0])?;
            Ok(aggregate::mean_chunks(&dt, &chunks, &opts)?.into())
        }
        "count" => {
            arity(name, args, 1)?;
            let mode = match options {
                FunctionOptions::None => CountMode::default(),
                FunctionOptions::Count(m) => *m,
                other => return Err(mismatched(name, other)),
            };
            let (_, chunks) = chunks_of(name, &args[0])?;
            let total: i64 = chunks.iter().map(|c| aggregate::count(c, mode)).sum();
            Ok(Scalar::I64(total).into())
        }
        "sort_indices" => {
            arity(name, args, 1)?;
            let keys: &[SortKey] = match options {
                FunctionOptions::None => &[],
                FunctionOptions::Sort(keys) => keys,
                other => return Err(mismatched(name, other)),
            };
            Ok(Array::from(sort_indices(&args[0], keys)?).into())
        }
        "take" => {
            arity(name, args, 2)?;
            let indices = indices_arg(&args[1])?;
            match &args[0] {
                Datum::Array(a) => Ok(take(a, &indices)?.into()),
                Datum::ChunkedArray(c) => {
                    let out = take(&c.concat()?, &indices)?;
                    Ok(ChunkedArray::from(out).into())
                }
                Datum::Table(t) => Ok(take_table(t, &indices)?.into()),
                Datum::Scalar(_) => Err(Error::Type("cannot take from a scalar".into())),
            }
        }
        "filter" => {
            arity(name, args, 2)?;
            let mask = mask_arg(&args[1])?;
            match &args[0] {
                Datum::Array(a) => Ok(filter(a, &mask)?.into()),
                Datum::ChunkedArray(c) => {
                    let out = filter(&c.concat()?, &mask)?;
                    Ok(ChunkedArray::from(out).into())
                }
                Datum::Table(t) => Ok(filter_table(t, &mask)?.into()),
                Datum::Scalar(_) => Err(Error::Type("cannot filter a scalar".into())),
            }
        }
        other => Err(Error::InvalidArgument(format!("unknown function '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunked() -> ChunkedArray {
        ChunkedArray::try_new(
            DataType::Int64,
            vec![
                PrimitiveArray::<i64>::from(vec![Some(1), None]).into(),
                PrimitiveArray::<i64>::from_vec(vec![3, 4, 5]).into(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn add_keeps_chunk_layout() {
        let out = call_function(
            "add",
            &[chunked().into(), Scalar::I64(10).into()],
            &FunctionOptions::None,
        )
        .unwrap();
        let out = out.as_chunked().unwrap();
        assert_eq!(out.num_chunks(), 2);
        assert_eq!(out.concat().unwrap().to_string(), "[11, null, 13, 14, 15]");
    }

    #[test]
    fn aggregates_over_chunks() {
        let mm = call_function("min_max", &[chunked().into()], &FunctionOptions::None).unwrap();
        assert_eq!(
            mm.as_scalar(),
            Some(&Scalar::Struct(vec![Scalar::I64(1), Scalar::I64(5)]))
        );
        let total = call_function("sum", &[chunked().into()], &FunctionOptions::None).unwrap();
        assert_eq!(total.as_scalar(), Some(&Scalar::I64(13)));
        let n = call_function(
            "count",
            &[chunked().into()],
            &FunctionOptions::Count(CountMode::All),
        )
        .unwrap();
        assert_eq!(n.as_scalar(), Some(&Scalar::I64(5)));
        let strict = call_function(
            "sum",
            &[chunked().into()],
            &FunctionOptions::ScalarAggregate(ScalarAggregateOptions::keep_nulls()),
        )
        .unwrap();
        assert_eq!(strict.as_scalar(), Some(&Scalar::Null));
    }

    #[test]
    fn take_and_filter_dispatch() {
        let values: Datum = Array::from(PrimitiveArray::<i32>::from_vec(vec![7, 8, 9])).into();
        let idx: Datum = Array::from(PrimitiveArray::<u64>::from_vec(vec![2, 0])).into();
        let out = call_function("take", &[values.clone(), idx], &FunctionOptions::None).unwrap();
        assert_eq!(out.as_array().unwrap().to_string(), "[9, 7]");

        let mask: Datum = Array::from(BooleanArray::from(vec![true, false, true])).into();
        let out = call_function("filter", &[values, mask], &FunctionOptions::None).unwrap();
        assert_eq!(out.as_array().unwrap().to_string(), "[7, 9]");
    }

    #[test]
    fn unknown_function_and_bad_arity() {
        assert!(matches!(
            call_function("nope", &[], &FunctionOptions::None),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            call_function("add", &[chunked().into()], &FunctionOptions::None),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            call_function("sum", &[chunked().into()], &FunctionOptions::Count(CountMode::All)),
            Err(Error::InvalidArgument(_))
        ));
    }
}
