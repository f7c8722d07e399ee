//! Node identifiers handed out by a plan.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a node in its plan, assigned in insertion order.
///
/// Ids are only meaningful for the plan that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Index into the plan's node list.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_order_by_position() {
        let a = NodeId::new(0);
        let b = NodeId::new(3);
        assert!(a < b);
        assert_eq!(b.index(), 3);
        assert_eq!(b.to_string(), "node#3");
    }
}
