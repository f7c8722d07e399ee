#![forbid(unsafe_code)]
//! quiver-operators: per-batch operators (filter/project/aggregate).
//!
//! Design intent:
//! - Keep this crate pure and synchronous; the exec crate owns tasks and
//!   channels and drives operators one batch at a time.
//! - State held across batches MUST be accounted through `quiver-mem`.
//! - Each operator exposes a planning surface (`OpPlan`) so the plan can
//!   check every edge's schema before any data flows.

pub mod plan;
pub mod traits;

pub mod aggregate;
pub mod filter;
pub mod project;

pub use aggregate::Aggregate;
pub use filter::Filter;
pub use plan::OpPlan;
pub use project::Project;
pub use traits::{OpError, Operator};
