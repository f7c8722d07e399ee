//! Accounting interface for operator state that outlives a single batch.
//!
//! `quiver-mem` provides the implementation; operators only see these traits.

/// Bytes held against a budget. Dropping the guard gives them back.
pub trait BudgetGuard: Send {
    fn bytes(&self) -> usize;

    /// Label of the operator that holds the reservation.
    fn tag(&self) -> &'static str {
        "guard"
    }
}

/// A shared cap on the bytes that blocking operators may retain.
///
/// The aggregate barrier asks for more as its accumulated batches grow and
/// fails the node with `ResourceExhausted` once `try_acquire` says no.
pub trait MemoryBudget: Send + Sync + 'static {
    type Guard: BudgetGuard;

    /// Reserve `bytes`, or `None` if that would go past the cap.
    fn try_acquire(&self, bytes: usize, tag: &'static str) -> Option<Self::Guard>;

    fn capacity_bytes(&self) -> usize;

    /// Bytes currently reserved. Advisory under concurrent use.
    fn used_bytes(&self) -> usize;

    fn remaining_bytes(&self) -> usize {
        self.capacity_bytes().saturating_sub(self.used_bytes())
    }
}
