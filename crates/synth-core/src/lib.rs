//! synth-core: execution and recovery engine for record pipelines.
//!
//! A pipeline is an ordered list of steps. Each step turns the current
//! working set of text nodes into a new one, and every node remembers the
//! node it was derived from. Runs, steps, nodes and the step↔node linkage
//! are persisted through a `RecordStore`, which is what makes a failed run
//! resumable from its failed step.
pub mod engine;
pub mod errors;
pub mod executor;
pub mod hashing;
pub mod lineage;
pub mod model;
pub mod spec;
pub mod state;
pub mod store;

pub use engine::{EngineBuilder, EngineConfig, PipelineEngine, RunReport};
pub use errors::CoreEngineError;
pub use executor::{CollaboratorError, ExecutionContext, Executor, ExecutorError, ExecutorFactory, InputLoader,
                   OutputSaver, PipelineContext, StepOutcome};
pub use lineage::{LineageError, LineageTracker};
pub use model::{LinkRole, Node, NodeId, Run, RunId, RunStatus, Step, StepId, StepNode, StepStatus};
pub use spec::{PipelineSpec, StepDescriptor};
pub use state::StateMachine;
pub use store::{InMemoryRecordStore, RecordStore, StoreError};
