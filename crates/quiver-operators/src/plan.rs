//! Operator planning result.

use quiver_core::schema::Schema;
use serde::{Deserialize, Serialize};

/// Output schema of an operator and whether it is a barrier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpPlan {
    pub output_schema: Schema,

    /// A blocking operator emits nothing until its input closes. The
    /// runtime fails the node if `push` returns output anyway.
    pub blocking: bool,
}

impl OpPlan {
    pub fn new(output_schema: Schema) -> Self {
        Self {
            output_schema,
            blocking: false,
        }
    }

    pub fn blocking(mut self) -> Self {
        self.blocking = true;
        self
    }
}
