#![forbid(unsafe_code)]
//! quiver: a columnar batch execution engine.
//!
//! Umbrella crate over the workspace members: `quiver_core` holds the data
//! model, `quiver_compute` the kernels and expressions, `quiver_operators`
//! the per-batch plan operators, `quiver_mem` the memory budget, and
//! `quiver_exec` streaming execution plans.

pub use quiver_compute;
pub use quiver_core;
pub use quiver_exec;
pub use quiver_mem;
pub use quiver_operators;

pub mod prelude {
    pub use quiver_compute::{call_function, col, lit, Expr, FunctionOptions};
    pub use quiver_core::prelude::*;
    pub use quiver_exec::{Declaration, ExecContext, ExecPlan, SinkNodeOptions};
}
