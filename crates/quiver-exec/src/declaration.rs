//! Node kinds and declarative plan construction.

use quiver_compute::{AggregateSpec, Expr};
use quiver_core::id::NodeId;
use quiver_core::Error;
use quiver_operators::{Aggregate, Filter, Operator, Project};

use crate::error::Result;
use crate::plan::ExecPlan;
use crate::sink::SinkNodeOptions;
use crate::source::ScanNodeOptions;

pub enum NodeKind {
    Scan(ScanNodeOptions),
    Operator(Box<dyn Operator>),
    Sink(SinkNodeOptions),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Scan(_) => "scan",
            NodeKind::Operator(op) => op.name(),
            NodeKind::Sink(_) => "sink",
        }
    }
}

/// A node plus the declarations feeding it.
pub struct Declaration {
    kind: NodeKind,
    inputs: Vec<Declaration>,
    label: Option<String>,
}

impl Declaration {
    pub fn new(kind: NodeKind, inputs: Vec<Declaration>) -> Self {
        Self {
            kind,
            inputs,
            label: None,
        }
    }

    pub fn scan(options: ScanNodeOptions) -> Self {
        Self::new(NodeKind::Scan(options), Vec::new())
    }

    pub fn filter(predicate: Expr) -> Self {
        Self::operator(Filter::new(predicate))
    }

    pub fn project(exprs: Vec<Expr>, names: Vec<String>) -> Self {
        Self::operator(Project::new(exprs, names))
    }

    pub fn aggregate(keys: Vec<String>, aggregates: Vec<AggregateSpec>) -> Self {
        Self::operator(Aggregate::new(keys, aggregates))
    }

    pub fn sink(options: SinkNodeOptions) -> Self {
        Self::new(NodeKind::Sink(options), Vec::new())
    }

    pub fn operator(op: impl Operator) -> Self {
        Self::new(NodeKind::Operator(Box::new(op)), Vec::new())
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_inputs(mut self, inputs: Vec<Declaration>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Chain `declarations` so each one consumes the previous one. Inputs
    /// already attached to later declarations are kept, after the chained one.
    pub fn sequence(declarations: impl IntoIterator<Item = Declaration>) -> Result<Self> {
        let mut iter = declarations.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| Error::InvalidArgument("cannot sequence zero declarations".into()))?;
        Ok(iter.fold(first, |acc, mut next| {
            next.inputs.insert(0, acc);
            next
        }))
    }

    /// Add this declaration and everything feeding it to `plan`, returning
    /// the id of this declaration's node.
    pub fn add_to_plan(self, plan: &mut ExecPlan) -> Result<NodeId> {
        let mut inputs = Vec::with_capacity(self.inputs.len());
        for input in self.inputs {
            inputs.push(input.add_to_plan(plan)?);
        }
        match self.label {
            Some(label) => plan.add_labeled_node(self.kind, &inputs, label),
            None => plan.add_node(self.kind, &inputs),
        }
    }
}
