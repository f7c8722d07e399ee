//! Execution errors.
//!
//! Every error a node raises is tagged with the node's label. `ExecError` is
//! `Clone` so the completion handle can give the same first error to every
//! observer.

use quiver_core::Error;
use quiver_operators::OpError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExecError>;

#[derive(Debug, Clone, Error)]
pub enum ExecError {
    #[error(transparent)]
    Core(#[from] Error),

    #[error("node {node} failed: {source}")]
    Node {
        node: String,
        #[source]
        source: Error,
    },

    #[error("task join: {0}")]
    Join(String),

    #[error("runtime: {0}")]
    Runtime(String),
}

impl ExecError {
    pub fn node(node: impl Into<String>, source: impl Into<Error>) -> Self {
        ExecError::Node {
            node: node.into(),
            source: source.into(),
        }
    }

    /// Underlying engine error, when there is one.
    pub fn as_core(&self) -> Option<&Error> {
        match self {
            ExecError::Core(e) | ExecError::Node { source: e, .. } => Some(e),
            _ => None,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.as_core(), Some(Error::Aborted(_)))
    }
}

impl From<OpError> for ExecError {
    fn from(e: OpError) -> Self {
        ExecError::Core(e.into())
    }
}

impl From<ExecError> for Error {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::Core(e) | ExecError::Node { source: e, .. } => e,
            ExecError::Join(m) | ExecError::Runtime(m) => Error::Invariant(m),
        }
    }
}
