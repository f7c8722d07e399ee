//! Convenient re-exports for downstream crates.

pub use crate::array::{
    Array, BooleanArray, NativeType, PrimitiveArray, StringArray, StructArray,
};
pub use crate::batch::RecordBatch;
pub use crate::builder::{
    ArrayBuilder, BooleanBuilder, PrimitiveBuilder, StringBuilder, StructBuilder,
};
pub use crate::config::{BackpressureOptions, EngineConfig};
pub use crate::datum::Datum;
pub use crate::error::{Error, Result};
pub use crate::id::NodeId;
pub use crate::scalar::Scalar;
pub use crate::schema::{DataType, Field, Schema, SchemaRef};
pub use crate::table::{ChunkedArray, Table};
