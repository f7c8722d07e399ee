//! Operator trait + common interfaces.
//!
//! The exec runtime calls `plan(...)` during validation to obtain an
//! `OpPlan`, then `open(...)` once per task, then `push(...)` for every
//! input batch in arrival order, and finally `finish(...)` when the input
//! closes.

pub use quiver_core::budget::MemoryBudget;
use quiver_core::{Error, RecordBatch, Schema};
use quiver_mem::Reservation;

use crate::plan::OpPlan;

use thiserror::Error;

/// Budget handle operators account their state against.
pub type Budget = dyn MemoryBudget<Guard = Reservation>;

#[derive(Debug, Clone, Error)]
pub enum OpError {
    #[error("planning error: {0}")]
    Plan(String),

    #[error("execution error: {0}")]
    Exec(String),

    #[error(transparent)]
    Core(#[from] Error),
}

impl From<quiver_mem::Error> for OpError {
    fn from(e: quiver_mem::Error) -> Self {
        OpError::Core(e.into())
    }
}

impl From<OpError> for Error {
    fn from(e: OpError) -> Self {
        match e {
            OpError::Plan(m) => Error::Plan(m),
            OpError::Exec(m) => Error::Invariant(m),
            OpError::Core(e) => e,
        }
    }
}

/// Trait that all operators must implement.
///
/// Invariants:
/// - State kept across `push` calls is accounted against the budget.
/// - Output order follows input order for non-blocking operators.
pub trait Operator: Send + 'static {
    /// Human-readable operator name (stable).
    fn name(&self) -> &'static str;

    /// Given input schemas, return the output schema and planning hints.
    fn plan(&self, input_schemas: &[Schema]) -> Result<OpPlan, OpError>;

    /// Prepare per-run state for the given inputs.
    fn open(&mut self, _input_schemas: &[Schema]) -> Result<(), OpError> {
        Ok(())
    }

    /// Consume one input batch, returning any output it completes.
    fn push(&mut self, batch: RecordBatch, budget: &Budget) -> Result<Vec<RecordBatch>, OpError>;

    /// Flush after the input closed.
    fn finish(&mut self, budget: &Budget) -> Result<Vec<RecordBatch>, OpError>;
}

pub(crate) fn single_input<'a>(name: &str, input_schemas: &'a [Schema]) -> Result<&'a Schema, OpError> {
    match input_schemas {
        [schema] => Ok(schema),
        other => Err(OpError::Plan(format!(
            "{name} expects one input, got {}",
            other.len()
        ))),
    }
}
