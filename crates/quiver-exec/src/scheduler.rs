//! Task bodies for plan nodes.
//!
//! Every node runs as one task (one per partition for scans) connected by
//! bounded `tokio::sync::mpsc` channels. Each await races the plan's stop
//! signal, so a stop is observed within one batch step. A task returns
//! `Ok(true)` when its input ran to completion and `Ok(false)` when it was cut
//! short by a stop.

use std::sync::Arc;

use quiver_core::{Error, RecordBatch, Schema, SchemaRef};
use quiver_mem::MemoryPool;
use quiver_operators::Operator;
use tokio::sync::{mpsc, Semaphore};

use crate::backpressure::{BackpressureToggle, StopSignal};
use crate::error::{ExecError, Result};
use crate::metrics::NodeMetrics;
use crate::sink::SinkQueue;
use crate::source::BatchSource;

/// Fan-out to every consumer of a node.
pub(crate) struct Outputs {
    senders: Vec<mpsc::Sender<RecordBatch>>,
    metrics: Arc<NodeMetrics>,
}

impl Outputs {
    pub(crate) fn new(senders: Vec<mpsc::Sender<RecordBatch>>, metrics: Arc<NodeMetrics>) -> Self {
        Self { senders, metrics }
    }

    /// Waits while a consumer's channel is full. Returns false if the plan
    /// was stopped first.
    async fn send(&self, batch: RecordBatch, stop: &StopSignal) -> bool {
        self.metrics.record_output(batch.num_rows());
        for tx in &self.senders {
            tokio::select! {
                _ = stop.stopped() => return false,
                sent = tx.send(batch.clone()) => {
                    if sent.is_err() {
                        tracing::trace!("consumer went away");
                    }
                }
            }
        }
        true
    }
}

pub(crate) struct ScanTask {
    pub source: Box<dyn BatchSource>,
    pub schema: SchemaRef,
    pub toggle: Option<BackpressureToggle>,
    pub outputs: Outputs,
    pub stop: StopSignal,
    pub permits: Arc<Semaphore>,
}

impl ScanTask {
    /// Pull until the source ends. Pulls run on the blocking pool and race
    /// the stop signal, so a slow source cannot delay a stop.
    pub(crate) async fn run(self) -> Result<bool> {
        let ScanTask {
            source,
            schema,
            toggle,
            outputs,
            stop,
            permits,
        } = self;
        let mut source = Some(source);
        loop {
            if stop.is_stopped() {
                return Ok(false);
            }
            if let Some(toggle) = toggle.as_ref().filter(|t| t.is_paused()) {
                tracing::debug!("scan paused");
                tokio::select! {
                    _ = toggle.wait_until_resumed() => tracing::debug!("scan resumed"),
                    _ = stop.stopped() => return Ok(false),
                }
            }
            let permit = tokio::select! {
                p = Arc::clone(&permits).acquire_owned() => p.map_err(|e| ExecError::Runtime(e.to_string()))?,
                _ = stop.stopped() => return Ok(false),
            };
            let mut current = source
                .take()
                .ok_or_else(|| Error::Invariant("scan source missing".into()))?;
            let pull = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let next = current.next_batch();
                (current, next)
            });
            let (current, next) = tokio::select! {
                joined = pull => joined.map_err(|e| ExecError::Join(e.to_string()))?,
                _ = stop.stopped() => return Ok(false),
            };
            source = Some(current);

            let Some(batch) = next? else {
                return Ok(true);
            };
            schema.check_compatible(batch.schema())?;
            outputs.metrics.record_input();
            if batch.num_rows() == 0 {
                continue;
            }
            if !outputs.send(batch, &stop).await {
                return Ok(false);
            }
        }
    }
}

pub(crate) struct OperatorTask {
    pub operator: Box<dyn Operator>,
    pub input_schema: Schema,
    pub input: mpsc::Receiver<RecordBatch>,
    pub outputs: Outputs,
    pub stop: StopSignal,
    pub budget: MemoryPool,
    pub blocking: bool,
}

impl OperatorTask {
    pub(crate) async fn run(self) -> Result<bool> {
        let OperatorTask {
            mut operator,
            input_schema,
            mut input,
            outputs,
            stop,
            budget,
            blocking,
        } = self;
        operator.open(std::slice::from_ref(&input_schema))?;
        loop {
            let next = tokio::select! {
                batch = input.recv() => batch,
                _ = stop.stopped() => return Ok(false),
            };
            let Some(batch) = next else { break };
            outputs.metrics.record_input();
            let emitted = operator.push(batch, &budget)?;
            if blocking && !emitted.is_empty() {
                return Err(Error::Invariant(format!(
                    "{} is a barrier but emitted output before its input closed",
                    operator.name()
                ))
                .into());
            }
            for out in emitted {
                if !outputs.send(out, &stop).await {
                    return Ok(false);
                }
            }
        }
        if stop.is_stopped() {
            return Ok(false);
        }
        for out in operator.finish(&budget)? {
            if !outputs.send(out, &stop).await {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

pub(crate) struct SinkTask {
    pub input: mpsc::Receiver<RecordBatch>,
    pub queue: Arc<SinkQueue>,
    pub metrics: Arc<NodeMetrics>,
    pub stop: StopSignal,
}

impl SinkTask {
    pub(crate) async fn run(mut self) -> Result<bool> {
        loop {
            let next = tokio::select! {
                batch = self.input.recv() => batch,
                _ = self.stop.stopped() => return Ok(false),
            };
            match next {
                Some(batch) => {
                    self.metrics.record_input();
                    self.queue.push(batch);
                }
                None => return Ok(true),
            }
        }
    }
}
