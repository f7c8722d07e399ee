//! Batch sources feeding scan nodes.
//!
//! A source is pulled on the blocking pool, one call at a time, so
//! implementations may block (file reads, remote fetches).

use std::collections::VecDeque;
use std::sync::Arc;

use quiver_core::{RecordBatch, Result, SchemaRef, Table};

/// One scan partition. `Ok(None)` ends the stream.
pub trait BatchSource: Send + 'static {
    fn next_batch(&mut self) -> Result<Option<RecordBatch>>;
}

/// In-memory batches, yielded in order.
pub struct VecSource {
    batches: VecDeque<RecordBatch>,
}

impl VecSource {
    pub fn new(batches: Vec<RecordBatch>) -> Self {
        Self {
            batches: batches.into(),
        }
    }

    pub fn from_table(table: &Table) -> Self {
        Self::new(table.batches().to_vec())
    }
}

impl BatchSource for VecSource {
    fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        Ok(self.batches.pop_front())
    }
}

/// Closure-backed source; may never end.
pub struct GeneratorSource<F> {
    generate: F,
}

impl<F> GeneratorSource<F>
where
    F: FnMut() -> Result<Option<RecordBatch>> + Send + 'static,
{
    pub fn new(generate: F) -> Self {
        Self { generate }
    }
}

impl<F> BatchSource for GeneratorSource<F>
where
    F: FnMut() -> Result<Option<RecordBatch>> + Send + 'static,
{
    fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        (self.generate)()
    }
}

/// Options for a scan node: the declared output schema and one source per
/// partition.
pub struct ScanNodeOptions {
    pub schema: SchemaRef,
    pub partitions: Vec<Box<dyn BatchSource>>,
    pub toggle: Option<crate::backpressure::BackpressureToggle>,
}

impl ScanNodeOptions {
    pub fn new(schema: SchemaRef, partitions: Vec<Box<dyn BatchSource>>) -> Self {
        Self {
            schema,
            partitions,
            toggle: None,
        }
    }

    /// Single in-memory partition over `table`.
    pub fn from_table(table: &Table) -> Self {
        Self::new(
            Arc::clone(table.schema()),
            vec![Box::new(VecSource::from_table(table))],
        )
    }

    /// Pause pulling while `toggle` is paused.
    pub fn with_toggle(mut self, toggle: crate::backpressure::BackpressureToggle) -> Self {
        self.toggle = Some(toggle);
        self
    }
}
