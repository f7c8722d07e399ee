#![forbid(unsafe_code)]
//! quiver-core: the columnar data model.
//!
//! Reference-counted buffers and bitmaps, immutable null-aware arrays and
//! their builders, scalars, schemas, record batches, chunked tables, the
//! `Datum` kernel argument, and foreign array interchange. Also the shared
//! error type, engine configuration, ids, and memory budget traits.
//!
//! No async or IO lives here.

pub mod array;
pub mod batch;
pub mod budget;
pub mod buffer;
pub mod builder;
pub mod config;
pub mod datum;
pub mod error;
pub mod ffi;
pub mod id;
pub mod prelude;
pub mod scalar;
pub mod schema;
pub mod table;

pub use array::Array;
pub use batch::RecordBatch;
pub use datum::Datum;
pub use error::{Error, Result};
pub use scalar::Scalar;
pub use schema::{DataType, Field, Schema, SchemaRef};
pub use table::{ChunkedArray, Table};
