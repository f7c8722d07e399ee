//! The execution plan: a DAG of nodes with a lifecycle.
//!
//! ```text
//! Built -> Validated -> Producing -> Draining -> Finished
//!                            \            \
//!                             +------------+--> Aborted
//! ```
//!
//! `validate` checks the graph and propagates schemas along every edge.
//! `start_producing` spawns one task per node (one per partition for scans)
//! on the context's worker pool. The first error any node raises stops the
//! whole plan and becomes the plan's outcome.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use quiver_core::id::NodeId;
use quiver_core::{Error, Schema};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::backpressure::StopSignal;
use crate::context::ExecContext;
use crate::declaration::NodeKind;
use crate::error::{ExecError, Result};
use crate::metrics::{NodeMetrics, NodeStats};
use crate::scheduler::{OperatorTask, Outputs, ScanTask, SinkTask};
use crate::sink::SinkQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanState {
    Built,
    Validated,
    Producing,
    Draining,
    Finished,
    Aborted,
}

impl fmt::Display for PlanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlanState::Built => "built",
            PlanState::Validated => "validated",
            PlanState::Producing => "producing",
            PlanState::Draining => "draining",
            PlanState::Finished => "finished",
            PlanState::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

struct Node {
    label: String,
    // Taken when the plan starts producing.
    kind: Option<NodeKind>,
    inputs: Vec<NodeId>,
    output_schema: Option<Schema>,
    // Set during validation for barrier operators.
    blocking: bool,
    metrics: Arc<NodeMetrics>,
}

impl Node {
    fn is_sink(&self) -> bool {
        matches!(self.kind, Some(NodeKind::Sink(_)))
    }
}

type Outcome = Option<Result<()>>;

/// State shared between the plan handle and its tasks.
struct Shared {
    state: Mutex<PlanState>,
    first_error: Mutex<Option<ExecError>>,
    stop: StopSignal,
    interrupted: AtomicBool,
    sources_pending: AtomicUsize,
    sinks: Mutex<Vec<Arc<SinkQueue>>>,
    done: watch::Sender<Outcome>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl Shared {
    fn new() -> Self {
        let (done, _) = watch::channel(None);
        Self {
            state: Mutex::new(PlanState::Built),
            first_error: Mutex::new(None),
            stop: StopSignal::new(),
            interrupted: AtomicBool::new(false),
            sources_pending: AtomicUsize::new(0),
            sinks: Mutex::new(Vec::new()),
            done,
        }
    }

    fn state(&self) -> PlanState {
        *lock(&self.state)
    }

    fn set_state(&self, to: PlanState) {
        let mut state = lock(&self.state);
        if *state != to {
            tracing::debug!(from = %*state, to = %to, "plan state");
            *state = to;
        }
    }

    /// Keeps only the first error; recording one stops the plan.
    fn record_error(&self, error: ExecError) {
        {
            let mut slot = lock(&self.first_error);
            if slot.is_some() {
                tracing::debug!(%error, "ignoring error after the first");
                return;
            }
            tracing::error!(%error, "plan failed; stopping");
            *slot = Some(error);
        }
        self.stop.stop();
    }

    fn source_exhausted(&self) {
        if self.sources_pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.sources_done();
        }
    }

    fn sources_done(&self) {
        let mut state = lock(&self.state);
        if *state == PlanState::Producing {
            tracing::debug!("plan sources exhausted; draining");
            *state = PlanState::Draining;
        }
    }

    fn outcome(&self) -> Result<()> {
        if let Some(e) = lock(&self.first_error).clone() {
            return Err(e);
        }
        if self.interrupted.load(Ordering::Acquire) {
            return Err(Error::Aborted("plan stopped before its sources were exhausted".into()).into());
        }
        Ok(())
    }

    /// Settle sinks, the final state, and the completion handle.
    fn complete(&self, outcome: Result<()>) {
        for sink in lock(&self.sinks).iter() {
            match &outcome {
                Ok(()) => sink.close(),
                Err(e) => sink.fail(e.clone()),
            }
        }
        self.set_state(if outcome.is_ok() {
            PlanState::Finished
        } else {
            PlanState::Aborted
        });
        self.done.send_replace(Some(outcome));
    }
}

pub struct ExecPlan {
    ctx: ExecContext,
    nodes: Vec<Node>,
    shared: Arc<Shared>,
}

impl ExecPlan {
    pub fn new(ctx: ExecContext) -> Self {
        Self {
            ctx,
            nodes: Vec::new(),
            shared: Arc::new(Shared::new()),
        }
    }

    pub fn context(&self) -> &ExecContext {
        &self.ctx
    }

    pub fn state(&self) -> PlanState {
        self.shared.state()
    }

    /// Add a node fed by `inputs`, which must already be in the plan.
    pub fn add_node(&mut self, kind: NodeKind, inputs: &[NodeId]) -> Result<NodeId> {
        let label = format!("{}#{}", kind.name(), self.nodes.len());
        self.add_labeled_node(kind, inputs, label)
    }

    pub fn add_labeled_node(
        &mut self,
        kind: NodeKind,
        inputs: &[NodeId],
        label: impl Into<String>,
    ) -> Result<NodeId> {
        let state = self.state();
        if state != PlanState::Built {
            return Err(Error::InvalidState(format!("cannot add nodes to a {state} plan")).into());
        }
        let label = label.into();
        if let Some(missing) = inputs.iter().find(|i| i.index() >= self.nodes.len()) {
            return Err(Error::Plan(format!("{label}: unknown input {missing}")).into());
        }
        let id = NodeId::new(self.nodes.len() as u64);
        self.nodes.push(Node {
            label,
            kind: Some(kind),
            inputs: inputs.to_vec(),
            output_schema: None,
            blocking: false,
            metrics: Arc::new(NodeMetrics::default()),
        });
        Ok(id)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_label(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(id.index()).map(|n| n.label.as_str())
    }

    /// Output schema of a node, known after validation.
    pub fn node_schema(&self, id: NodeId) -> Option<&Schema> {
        self.nodes.get(id.index()).and_then(|n| n.output_schema.as_ref())
    }

    pub fn node_stats(&self, id: NodeId) -> Option<NodeStats> {
        self.nodes.get(id.index()).map(|n| n.metrics.snapshot())
    }

    fn edge_error(&self, producer: NodeId, consumer: usize, reason: impl fmt::Display) -> ExecError {
        Error::Plan(format!(
            "{} -> {}: {reason}",
            self.nodes[producer.index()].label,
            self.nodes[consumer].label
        ))
        .into()
    }

    /// Kahn's algorithm over the input edges.
    fn topological_order(&self) -> Result<Vec<usize>> {
        let n = self.nodes.len();
        let mut indegree: Vec<usize> = self.nodes.iter().map(|node| node.inputs.len()).collect();
        let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, node) in self.nodes.iter().enumerate() {
            for input in &node.inputs {
                consumers[input.index()].push(i);
            }
        }
        let mut ready: Vec<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = ready.pop() {
            order.push(i);
            for &c in &consumers[i] {
                indegree[c] -= 1;
                if indegree[c] == 0 {
                    ready.push(c);
                }
            }
        }
        if order.len() != n {
            let stuck: Vec<&str> = (0..n)
                .filter(|&i| indegree[i] > 0)
                .map(|i| self.nodes[i].label.as_str())
                .collect();
            return Err(Error::Plan(format!("cycle through {}", stuck.join(", "))).into());
        }
        Ok(order)
    }

    /// The schema flowing into node `idx`; every input must agree on it.
    fn input_schema(&self, idx: usize) -> Result<Schema> {
        let node = &self.nodes[idx];
        let mut merged: Option<&Schema> = None;
        for &input in &node.inputs {
            let schema = self.nodes[input.index()]
                .output_schema
                .as_ref()
                .ok_or_else(|| self.edge_error(input, idx, "producer schema unknown"))?;
            match merged {
                None => merged = Some(schema),
                Some(first) => first
                    .check_compatible(schema)
                    .map_err(|e| self.edge_error(input, idx, e))?,
            }
        }
        merged
            .cloned()
            .ok_or_else(|| Error::Plan(format!("{}: needs at least one input", node.label)).into())
    }

    /// Check arity, acyclicity, sinks, and every edge's schema.
    pub fn validate(&mut self) -> Result<()> {
        let state = self.state();
        if state != PlanState::Built {
            return Err(Error::InvalidState(format!("cannot validate a {state} plan")).into());
        }
        if !self.nodes.iter().any(Node::is_sink) {
            return Err(Error::Plan("plan has no sink".into()).into());
        }

        let mut consumers = vec![0usize; self.nodes.len()];
        for node in &self.nodes {
            for input in &node.inputs {
                consumers[input.index()] += 1;
            }
        }
        for (node, &consumed) in self.nodes.iter().zip(consumers.iter()) {
            let problem = match (&node.kind, node.inputs.is_empty(), consumed) {
                (Some(NodeKind::Scan(_)), false, _) => Some("a scan takes no inputs"),
                (Some(NodeKind::Operator(_) | NodeKind::Sink(_)), true, _) => {
                    Some("needs at least one input")
                }
                (Some(NodeKind::Sink(_)), _, c) if c > 0 => Some("a sink cannot feed other nodes"),
                (Some(NodeKind::Scan(_) | NodeKind::Operator(_)), _, 0) => {
                    Some("output is never consumed")
                }
                (None, _, _) => Some("node was already started"),
                _ => None,
            };
            if let Some(problem) = problem {
                return Err(Error::Plan(format!("{}: {problem}", node.label)).into());
            }
        }

        for idx in self.topological_order()? {
            let schema = match &self.nodes[idx].kind {
                Some(NodeKind::Scan(options)) => options.schema.as_ref().clone(),
                Some(NodeKind::Operator(op)) => {
                    let input = self.input_schema(idx)?;
                    let plan = op
                        .plan(std::slice::from_ref(&input))
                        .map_err(|e| self.edge_error(self.nodes[idx].inputs[0], idx, e))?;
                    tracing::trace!(
                        node = %self.nodes[idx].label,
                        blocking = plan.blocking,
                        "planned operator"
                    );
                    self.nodes[idx].blocking = plan.blocking;
                    plan.output_schema
                }
                Some(NodeKind::Sink(options)) => {
                    let input = self.input_schema(idx)?;
                    if let Some(expected) = &options.expected_schema {
                        expected
                            .check_compatible(&input)
                            .map_err(|e| self.edge_error(self.nodes[idx].inputs[0], idx, e))?;
                    }
                    options.queue.set_schema(Arc::new(input.clone()));
                    input
                }
                None => already_started(&self.nodes[idx].label)?,
            };
            self.nodes[idx].output_schema = Some(schema);
        }

        self.shared.set_state(PlanState::Validated);
        Ok(())
    }

    /// Spawn every node's task. Legal once, from `Validated`.
    pub fn start_producing(&mut self) -> Result<()> {
        {
            let mut state = lock(&self.shared.state);
            match *state {
                PlanState::Validated => *state = PlanState::Producing,
                PlanState::Built => {
                    return Err(Error::InvalidState("plan must be validated before producing".into()).into())
                }
                other => {
                    return Err(Error::InvalidState(format!("plan already started ({other})")).into())
                }
            }
        }
        tracing::info!(nodes = self.nodes.len(), "plan producing");

        let capacity = self.ctx.config().channel_capacity;
        let n = self.nodes.len();
        let mut input_tx: Vec<Option<mpsc::Sender<_>>> = Vec::with_capacity(n);
        let mut input_rx: Vec<Option<mpsc::Receiver<_>>> = Vec::with_capacity(n);
        for node in &self.nodes {
            if node.inputs.is_empty() {
                input_tx.push(None);
                input_rx.push(None);
            } else {
                let (tx, rx) = mpsc::channel(capacity);
                input_tx.push(Some(tx));
                input_rx.push(Some(rx));
            }
        }
        let mut outputs: Vec<Vec<mpsc::Sender<_>>> = vec![Vec::new(); n];
        for (i, node) in self.nodes.iter().enumerate() {
            if let Some(tx) = &input_tx[i] {
                for input in &node.inputs {
                    outputs[input.index()].push(tx.clone());
                }
            }
        }
        // Channels close once every producer's clone is gone.
        drop(input_tx);

        let partitions: usize = self
            .nodes
            .iter()
            .map(|node| match &node.kind {
                Some(NodeKind::Scan(options)) => options.partitions.len(),
                _ => 0,
            })
            .sum();
        self.shared.sources_pending.store(partitions, Ordering::Release);

        let mut handles = Vec::new();
        for idx in 0..n {
            let input_schema = match &self.nodes[idx].kind {
                Some(NodeKind::Operator(_)) => Some(self.input_schema(idx)?),
                _ => None,
            };
            let node = &mut self.nodes[idx];
            let senders = std::mem::take(&mut outputs[idx]);
            let metrics = Arc::clone(&node.metrics);
            let stop = self.shared.stop.clone();
            let kind = node
                .kind
                .take()
                .ok_or_else(|| Error::InvalidState(format!("{} was already started", node.label)))?;
            let label = node.label.clone();
            let blocking = node.blocking;
            match kind {
                NodeKind::Scan(options) => {
                    for (p, source) in options.partitions.into_iter().enumerate() {
                        let task = ScanTask {
                            source,
                            schema: Arc::clone(&options.schema),
                            toggle: options.toggle.clone(),
                            outputs: Outputs::new(senders.clone(), Arc::clone(&metrics)),
                            stop: stop.clone(),
                            permits: self.ctx.pull_permits(),
                        };
                        let part_label = format!("{label}/p{p}");
                        let shared = Arc::clone(&self.shared);
                        handles.push(spawn_node(&self.ctx, &self.shared, part_label, async move {
                            let exhausted = task.run().await?;
                            if exhausted {
                                shared.source_exhausted();
                            }
                            Ok(exhausted)
                        }));
                    }
                }
                NodeKind::Operator(operator) => {
                    let task = OperatorTask {
                        operator,
                        input_schema: input_schema
                            .ok_or_else(|| Error::Invariant(format!("{label}: input schema missing")))?,
                        input: input_rx[idx]
                            .take()
                            .ok_or_else(|| Error::Invariant(format!("{label}: input channel missing")))?,
                        outputs: Outputs::new(senders, metrics),
                        stop,
                        budget: self.ctx.budget().clone(),
                        blocking,
                    };
                    handles.push(spawn_node(&self.ctx, &self.shared, label, task.run()));
                }
                NodeKind::Sink(options) => {
                    lock(&self.shared.sinks).push(Arc::clone(&options.queue));
                    let task = SinkTask {
                        input: input_rx[idx]
                            .take()
                            .ok_or_else(|| Error::Invariant(format!("{label}: input channel missing")))?,
                        queue: options.queue,
                        metrics,
                        stop,
                    };
                    handles.push(spawn_node(&self.ctx, &self.shared, label, task.run()));
                }
            }
        }
        if partitions == 0 {
            self.shared.sources_done();
        }

        let shared = Arc::clone(&self.shared);
        let budget = self.ctx.budget().clone();
        self.ctx.handle().spawn(async move {
            for handle in handles {
                if let Err(e) = handle.await {
                    shared.record_error(ExecError::Join(e.to_string()));
                }
            }
            let outcome = shared.outcome();
            match &outcome {
                Ok(()) => tracing::info!(peak_bytes = budget.peak_bytes(), "plan finished"),
                Err(e) => tracing::info!(peak_bytes = budget.peak_bytes(), error = %e, "plan aborted"),
            }
            shared.complete(outcome);
        });
        Ok(())
    }

    /// Ask every node to stop, dropping batches not yet read from sinks.
    /// Idempotent.
    pub fn stop_producing(&self) {
        let state = self.state();
        match state {
            PlanState::Finished | PlanState::Aborted => return,
            PlanState::Built | PlanState::Validated => {
                self.shared.stop.stop();
                self.shared
                    .complete(Err(Error::Aborted("plan stopped before it started".into()).into()));
                return;
            }
            PlanState::Producing | PlanState::Draining => self.shared.set_state(PlanState::Draining),
        }
        if self.shared.stop.stop() {
            tracing::info!("plan stop requested");
            for sink in lock(&self.shared.sinks).iter() {
                sink.discard();
            }
        }
    }

    /// Completion handle; await it (or call `wait`).
    pub fn finished(&self) -> Finished {
        match self.state() {
            PlanState::Built | PlanState::Validated => Finished::Ready(Err(Error::InvalidState(
                "plan was never started".into(),
            )
            .into())),
            _ => Finished::Pending(self.shared.done.subscribe()),
        }
    }
}

fn already_started(label: &str) -> Result<Schema> {
    Err(Error::InvalidState(format!("{label} was already started")).into())
}

impl Drop for ExecPlan {
    fn drop(&mut self) {
        if matches!(self.state(), PlanState::Producing | PlanState::Draining) {
            self.stop_producing();
        }
    }
}

/// Wrap a node body: instrument it, label its error, and note interruption.
fn spawn_node<F>(ctx: &ExecContext, shared: &Arc<Shared>, label: String, body: F) -> JoinHandle<()>
where
    F: Future<Output = Result<bool>> + Send + 'static,
{
    let shared = Arc::clone(shared);
    let span = tracing::debug_span!("node", node = %label);
    ctx.handle().spawn(
        async move {
            tracing::debug!("node started");
            match body.await {
                Ok(true) => {}
                Ok(false) => shared.interrupted.store(true, Ordering::Release),
                Err(ExecError::Core(e)) => shared.record_error(ExecError::node(label, e)),
                Err(other) => shared.record_error(other),
            }
        }
        .instrument(span),
    )
}

/// Resolves to the plan's outcome: `Ok` when every sink closed cleanly, the
/// first error otherwise, or `Aborted` when stopped early.
pub enum Finished {
    Pending(watch::Receiver<Outcome>),
    Ready(Result<()>),
}

impl Finished {
    pub async fn wait(self) -> Result<()> {
        match self {
            Finished::Ready(outcome) => outcome,
            Finished::Pending(mut rx) => {
                let outcome = match rx.wait_for(Option::is_some).await {
                    Ok(v) => (*v).clone(),
                    Err(_) => None,
                };
                outcome.unwrap_or_else(|| Err(ExecError::Runtime("plan dropped before it finished".into())))
            }
        }
    }
}

impl IntoFuture for Finished {
    type Output = Result<()>;
    type IntoFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}
