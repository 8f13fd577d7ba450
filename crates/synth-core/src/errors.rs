//! Errors surfaced by the engine.
//!
//! Every variant carries enough context (run id, step position, cause) for
//! the caller to decide whether to resume.

use thiserror::Error;
use uuid::Uuid;

use crate::executor::{CollaboratorError, ExecutorError};
use crate::lineage::LineageError;
use crate::model::{RunId, StepId};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum CoreEngineError {
    #[error("configuration differs from the snapshot stored on run {run_id}")]
    ConfigMismatch { run_id: RunId },
    #[error("cannot resume run {run_id}: {reason}")]
    InvalidResumeTarget {
        run_id: RunId,
        step_id: Option<StepId>,
        reason: String,
    },
    #[error("step {position} ({step_type}/{method}) of run {run_id} failed: {source}")]
    StepFailed {
        run_id: RunId,
        position: u32,
        step_type: String,
        method: String,
        #[source]
        source: ExecutorError,
    },
    #[error("input loader failed for run {run_id}: {source}")]
    InputFailed {
        run_id: RunId,
        #[source]
        source: CollaboratorError,
    },
    #[error("output saver failed for run {run_id}: {source}")]
    OutputFailed {
        run_id: RunId,
        #[source]
        source: CollaboratorError,
    },
    #[error("no executor registered for {step_type}/{method}")]
    UnknownExecutor { step_type: String, method: String },
    #[error("invalid descriptor {step_type}/{method}: {reason}")]
    InvalidDescriptor {
        step_type: String,
        method: String,
        reason: String,
    },
    #[error("invalid {entity} transition for {id}: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        id: Uuid,
        from: String,
        to: String,
    },
    #[error("step {position} of run {run_id} cannot start: {reason}")]
    OutOfOrder {
        run_id: RunId,
        position: u32,
        reason: String,
    },
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error(transparent)]
    Lineage(#[from] LineageError),
}

impl CoreEngineError {
    /// True for errors raised by a resume guard before any state was touched.
    pub fn is_rejection(&self) -> bool {
        matches!(self,
                 CoreEngineError::ConfigMismatch { .. } | CoreEngineError::InvalidResumeTarget { .. })
    }

    /// Run the error belongs to, when known.
    pub fn run_id(&self) -> Option<RunId> {
        match self {
            CoreEngineError::ConfigMismatch { run_id }
            | CoreEngineError::InvalidResumeTarget { run_id, .. }
            | CoreEngineError::StepFailed { run_id, .. }
            | CoreEngineError::InputFailed { run_id, .. }
            | CoreEngineError::OutputFailed { run_id, .. }
            | CoreEngineError::OutOfOrder { run_id, .. } => Some(*run_id),
            _ => None,
        }
    }
}
