use thiserror::Error;

/// Canonical result for core.
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds shared by arrays, builders, kernels, and the execution plan.
///
/// Errors are `Clone` so a single failure can be handed to every observer of
/// a plan's completion handle.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Operand type mismatch in a kernel or builder.
    #[error("Type error: {0}")]
    Type(String),

    #[error("Index out of bounds: {0}")]
    Index(String),

    /// Structural incompatibility between batches, tables, or operators.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("No such field: {0}")]
    NoSuchField(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Planning error: {0}")]
    Plan(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    // The core crate does not do I/O; batch sources map their failures here
    // and the engine surfaces them unchanged.
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Aborted: {0}")]
    Aborted(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal invariant failed: {0}")]
    Invariant(String),
}

impl Error {
    /// Shorthand for the common out-of-range case.
    pub fn index_out_of_bounds(index: usize, len: usize) -> Self {
        Error::Index(format!("index {index} out of bounds for length {len}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
