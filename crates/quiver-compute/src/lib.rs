#![forbid(unsafe_code)]
//! quiver-compute: vectorized kernels over `quiver-core` arrays.
//!
//! Every kernel is pure: inputs are borrowed, outputs are freshly built
//! arrays, and a failure never leaves a partial result behind. Nulls
//! propagate unless a kernel documents otherwise.

/// Match the numeric variants of an `Array`, binding the typed array to `$a`.
macro_rules! downcast_numeric {
    ($array:expr, $a:ident => $body:expr, _ => $other:expr) => {
        match $array {
            quiver_core::Array::Int16($a) => $body,
            quiver_core::Array::Int32($a) => $body,
            quiver_core::Array::Int64($a) => $body,
            quiver_core::Array::UInt64($a) => $body,
            quiver_core::Array::Float32($a) => $body,
            quiver_core::Array::Float64($a) => $body,
            #[allow(unreachable_patterns)]
            _ => $other,
        }
    };
}

pub mod aggregate;
pub mod arithmetic;
pub mod compare;
pub mod expr;
pub mod filter;
pub mod function;
pub mod group;
pub mod sort;
pub mod take;

mod util;

pub use aggregate::{
    count, mean, min_max, min_max_chunked, sum, AggregateFunc, CountMode, MinMax,
    ScalarAggregateOptions,
};
pub use arithmetic::{add, multiply, subtract};
pub use compare::{and, eq, gt, gt_eq, is_null, lt, lt_eq, neq, not, or};
pub use expr::{col, lit, BinaryOp, Expr};
pub use filter::{filter, filter_record_batch, filter_table};
pub use function::{call_function, FunctionOptions};
pub use group::{grouped_aggregate, AggregateSpec, GroupedAggregator};
pub use sort::{
    sort_indices, sort_indices_array, sort_indices_batch, sort_indices_table, SortKey, SortOrder,
};
pub use take::{take, take_record_batch, take_table};
