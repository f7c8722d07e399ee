#![forbid(unsafe_code)]
//! quiver-mem: the memory pool behind `quiver_core::budget`.
//!
//! Operators that hold state across batches reserve it here so a plan never
//! grows past its configured memory cap. The pool also keeps a high-water
//! mark that the plan logs when it finishes.

pub mod error;
pub mod pool;

pub use error::{Error, Result};
pub use pool::{MemoryPool, Reservation};
