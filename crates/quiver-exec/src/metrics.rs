//! Per-node counters.
//!
//! This module purposefully avoids pulling heavy telemetry stacks; counters
//! are plain atomics, reported through `tracing` when a node finishes.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct NodeMetrics {
    batches_in: AtomicU64,
    batches_out: AtomicU64,
    rows_out: AtomicU64,
}

/// Point-in-time copy of a node's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    pub batches_in: u64,
    pub batches_out: u64,
    pub rows_out: u64,
}

impl NodeMetrics {
    pub fn record_input(&self) {
        self.batches_in.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_output(&self, rows: usize) {
        self.batches_out.fetch_add(1, Ordering::Relaxed);
        self.rows_out.fetch_add(rows as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> NodeStats {
        NodeStats {
            batches_in: self.batches_in.load(Ordering::Relaxed),
            batches_out: self.batches_out.load(Ordering::Relaxed),
            rows_out: self.rows_out.load(Ordering::Relaxed),
        }
    }

    pub fn emit(&self, node: &str) {
        let s = self.snapshot();
        tracing::debug!(
            node,
            batches_in = s.batches_in,
            batches_out = s.batches_out,
            rows_out = s.rows_out,
            "node finished"
        );
    }
}
