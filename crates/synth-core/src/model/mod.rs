//! Plain value records persisted by a `RecordStore`.
//!
//! None of these types hold references to each other: cross-entity reads go
//! through explicit store calls taking ids.

pub mod linkage;
pub mod node;
pub mod run;
pub mod step;

pub use linkage::{LinkRole, StepNode};
pub use node::{Node, NodeId};
pub use run::{Run, RunId, RunStatus};
pub use step::{Step, StepId, StepStatus};

/// Error returned when a status string read back from storage is unknown.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseStatusError {
    pub kind: &'static str,
    pub value: String,
}
