//! Record store: durable Run / Step / Node / linkage entities.
//!
//! Every method is one commit. Multi-row writes (`create_run_with_steps`,
//! `begin_step`, `complete_step`) are atomic: either all rows are visible to
//! subsequent reads or none are. Implementations do not cache; an update is
//! visible to the next read.
//!
//! Status writes are compare-and-set. The caller names the status it read
//! (`expected`) and the store applies the write only if the row still holds
//! it, inside the same lock or transaction as the write. Two callers racing
//! on the same transition (two resumes of one ERRORED run, say) therefore
//! cannot both win: the second one gets `StoreError::Conflict` and has
//! written nothing. The engine checks its guards against a copy it read
//! earlier, so this is the only place the race is actually closed.

mod memory;

pub use memory::InMemoryRecordStore;

use thiserror::Error;
use uuid::Uuid;

use crate::model::{LinkRole, Node, NodeId, Run, RunId, RunStatus, Step, StepId, StepNode, StepStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

pub trait RecordStore: Send + Sync {
    /// Inserts `run` and all of its steps in one transaction. Steps must
    /// belong to `run` and carry positions 1..N.
    fn create_run_with_steps(&self, run: &Run, steps: &[Step]) -> Result<(), StoreError>;

    fn get_run(&self, id: RunId) -> Result<Run, StoreError>;

    fn list_runs(&self) -> Result<Vec<Run>, StoreError>;

    /// Sets the run's status, provided the stored status is still
    /// `expected`. Any other stored status is `Conflict` and nothing is
    /// written.
    fn update_run(&self, run: &Run, expected: RunStatus) -> Result<(), StoreError>;

    fn get_step(&self, id: StepId) -> Result<Step, StoreError>;

    /// Steps of a run ordered by position.
    fn list_steps(&self, run_id: RunId) -> Result<Vec<Step>, StoreError>;

    /// Overwrites the mutable columns of a step (status, timestamps,
    /// metadata) if its stored status is `expected`, else `Conflict`. Type,
    /// method, position and parameters never change.
    fn update_step(&self, step: &Step, expected: StepStatus) -> Result<(), StoreError>;

    /// Step status update plus its input linkage rows, in one commit, guarded
    /// like `update_step`. Links that already exist are left as they are.
    fn begin_step(&self, step: &Step, expected: StepStatus, inputs: &[StepNode]) -> Result<(), StoreError>;

    /// Produced nodes, output linkage rows and the step update, in one commit,
    /// guarded like `update_step`.
    fn complete_step(&self,
                     step: &Step,
                     expected: StepStatus,
                     produced: &[Node],
                     outputs: &[StepNode])
                     -> Result<(), StoreError>;

    fn insert_nodes(&self, nodes: &[Node]) -> Result<(), StoreError>;

    fn get_node(&self, id: NodeId) -> Result<Node, StoreError>;

    /// Nodes for `ids`, in the order of `ids`. Any missing id is `NotFound`.
    fn get_nodes(&self, ids: &[NodeId]) -> Result<Vec<Node>, StoreError>;

    /// Direct children of a node.
    fn list_children(&self, id: NodeId) -> Result<Vec<Node>, StoreError>;

    /// Linkage rows of a step for one role, ordered by ordinal.
    fn list_step_nodes(&self, step_id: StepId, role: LinkRole) -> Result<Vec<StepNode>, StoreError>;
}
