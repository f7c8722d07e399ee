#![forbid(unsafe_code)]
//! quiver-exec: streaming execution plans.
//!
//! A plan is a DAG of scan, operator, and sink nodes. Each node runs as a
//! tokio task connected to its consumers by bounded channels; sinks expose a
//! pull-based [`SinkReader`]. A backpressure toggle driven by sink queue
//! depth pauses scans, and a stop signal reaches every node within one batch.

pub mod backpressure;
pub mod context;
pub mod declaration;
pub mod error;
pub mod metrics;
pub mod plan;
pub mod sink;
pub mod source;

mod scheduler;

pub use backpressure::{BackpressureMonitor, BackpressureToggle, StopSignal};
pub use context::ExecContext;
pub use declaration::{Declaration, NodeKind};
pub use error::{ExecError, Result};
pub use metrics::NodeStats;
pub use plan::{ExecPlan, Finished, PlanState};
pub use sink::{SinkNodeOptions, SinkReader};
pub use source::{BatchSource, GeneratorSource, ScanNodeOptions, VecSource};
