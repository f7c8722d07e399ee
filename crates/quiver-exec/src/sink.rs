//! Terminal sink: a depth-monitored queue plus the reader that drains it.
//!
//! The queue never blocks the sink task; instead its depth drives the
//! backpressure toggle that scans observe.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use quiver_core::config::BackpressureOptions;
use quiver_core::{Datum, Error, RecordBatch, SchemaRef, Table};
use tokio::sync::Notify;

use crate::backpressure::{BackpressureMonitor, BackpressureToggle};
use crate::error::{ExecError, Result};

#[derive(Default)]
struct QueueState {
    batches: VecDeque<RecordBatch>,
    closed: bool,
    error: Option<ExecError>,
    error_delivered: bool,
    schema: Option<SchemaRef>,
}

pub(crate) struct SinkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    monitor: Option<BackpressureMonitor>,
}

impl SinkQueue {
    fn new(monitor: Option<BackpressureMonitor>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            monitor,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // A poisoned queue only means a reader panicked; the state is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn observe(&self, depth: usize) {
        if let Some(m) = &self.monitor {
            m.on_depth(depth);
        }
    }

    pub(crate) fn set_schema(&self, schema: SchemaRef) {
        self.lock().schema = Some(schema);
    }

    pub(crate) fn push(&self, batch: RecordBatch) {
        let depth = {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.batches.push_back(batch);
            state.batches.len()
        };
        self.observe(depth);
        self.notify.notify_one();
    }

    /// Clean end of stream.
    pub(crate) fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_one();
    }

    /// End of stream with an error, delivered once after buffered batches.
    pub(crate) fn fail(&self, error: ExecError) {
        {
            let mut state = self.lock();
            state.closed = true;
            if state.error.is_none() {
                state.error = Some(error);
            }
        }
        self.notify.notify_one();
    }

    /// Drop undelivered batches and refuse new ones.
    pub(crate) fn discard(&self) {
        let dropped = {
            let mut state = self.lock();
            state.closed = true;
            std::mem::take(&mut state.batches).len()
        };
        if dropped > 0 {
            tracing::debug!(dropped, "sink: discarded undelivered batches");
        }
        self.observe(0);
        self.notify.notify_one();
    }

    fn depth(&self) -> usize {
        self.lock().batches.len()
    }

    async fn next(&self) -> Option<Result<RecordBatch>> {
        loop {
            let popped = {
                let mut state = self.lock();
                if let Some(batch) = state.batches.pop_front() {
                    Some((Some(Ok(batch)), state.batches.len()))
                } else if state.error.is_some() && !state.error_delivered {
                    state.error_delivered = true;
                    Some((state.error.clone().map(Err), 0))
                } else if state.closed {
                    return None;
                } else {
                    None
                }
            };
            match popped {
                Some((item, depth)) => {
                    self.observe(depth);
                    return item;
                }
                None => self.notify.notified().await,
            }
        }
    }
}

/// Options for a sink node. The paired [`SinkReader`] is available from
/// [`SinkNodeOptions::reader`] before the node is added to a plan.
pub struct SinkNodeOptions {
    pub(crate) queue: Arc<SinkQueue>,
    pub(crate) expected_schema: Option<SchemaRef>,
}

impl Default for SinkNodeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SinkNodeOptions {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(SinkQueue::new(None)),
            expected_schema: None,
        }
    }

    /// Drive `toggle` from this sink's queue depth.
    pub fn with_backpressure(options: BackpressureOptions, toggle: BackpressureToggle) -> Self {
        Self {
            queue: Arc::new(SinkQueue::new(Some(BackpressureMonitor::new(options, toggle)))),
            expected_schema: None,
        }
    }

    /// Validation fails unless the sink's input matches `schema`.
    pub fn expect_schema(mut self, schema: SchemaRef) -> Self {
        self.expected_schema = Some(schema);
        self
    }

    pub fn reader(&self) -> SinkReader {
        SinkReader {
            queue: Arc::clone(&self.queue),
        }
    }
}

/// Pull handle over a sink's output.
pub struct SinkReader {
    queue: Arc<SinkQueue>,
}

impl SinkReader {
    /// `Some(Ok(batch))` per batch, `Some(Err(e))` once if the plan failed or
    /// was stopped, then `None`.
    pub async fn next(&mut self) -> Option<Result<RecordBatch>> {
        self.queue.next().await
    }

    /// Batches buffered and not yet read.
    pub fn depth(&self) -> usize {
        self.queue.depth()
    }

    /// Schema of the sink's input, known once the plan is validated.
    pub fn schema(&self) -> Option<SchemaRef> {
        self.queue.lock().schema.clone()
    }

    /// Collect every remaining batch.
    pub async fn to_table(&mut self, schema: SchemaRef) -> Result<Table> {
        let mut batches = Vec::new();
        while let Some(batch) = self.next().await {
            batches.push(batch?);
        }
        Ok(Table::from_batches(schema, batches)?)
    }

    /// Collect the output as a `Datum`: a 1x1 result becomes a `Scalar`,
    /// anything else a `Table`.
    pub async fn reduce(&mut self) -> Result<Datum> {
        let schema = self.schema().ok_or_else(|| {
            ExecError::Core(Error::InvalidState("sink schema is unknown until the plan is validated".into()))
        })?;
        let table = self.to_table(schema).await?;
        if table.num_rows() == 1 && table.num_columns() == 1 {
            return Ok(Datum::Scalar(table.column_at(0)?.value_at(0)?));
        }
        Ok(Datum::Table(table))
    }
}
