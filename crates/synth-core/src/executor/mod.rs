//! Executor contract.
//!
//! An executor is the behavior of one step variant (split, generation,
//! ablation, ...). It reads the working node set from an
//! `ExecutionContext`, accumulates produced nodes and metadata on it, and
//! never touches Run/Step state: persistence and status transitions belong to
//! the engine.

mod io;

pub use io::{CollaboratorError, InputLoader, OutputSaver, PipelineContext};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::errors::CoreEngineError;
use crate::model::{Node, Step};
use crate::spec::StepDescriptor;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("{0}")]
    Failed(String),
}

/// Behavior of one step variant.
pub trait Executor: Send + Sync {
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<(), ExecutorError>;
}

/// Maps a descriptor's (type, method) to its executor.
///
/// Must be total over every descriptor of a specification the engine is
/// asked to run; the engine builds all executors before creating a run.
pub trait ExecutorFactory: Send + Sync {
    fn create(&self, descriptor: &StepDescriptor) -> Result<Box<dyn Executor>, CoreEngineError>;
}

/// What an executor sees while it runs.
pub struct ExecutionContext<'a> {
    step: &'a Step,
    input: &'a [Node],
    produced: Vec<Node>,
    metadata: Map<String, Value>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(step: &'a Step, input: &'a [Node]) -> Self {
        Self { step,
               input,
               produced: Vec::new(),
               metadata: Map::new() }
    }

    /// The step being executed (frozen parameters included).
    pub fn step(&self) -> &'a Step {
        self.step
    }

    /// Current working data. The slice outlives the context borrow, so
    /// executors can iterate it while deriving children.
    pub fn input(&self) -> &'a [Node] {
        self.input
    }

    /// Adds an already built node to the step's output.
    pub fn emit(&mut self, node: Node) {
        self.produced.push(node);
    }

    /// Derives a child of `parent` and adds it to the step's output.
    pub fn derive(&mut self, parent: &Node, value: impl Into<String>) -> &Node {
        self.produced.push(parent.derive(value));
        &self.produced[self.produced.len() - 1]
    }

    /// Records a metadata entry; a later call with the same key replaces it.
    pub fn annotate(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }

    pub fn produced(&self) -> &[Node] {
        &self.produced
    }

    pub fn into_outcome(self) -> StepOutcome {
        StepOutcome { produced: self.produced,
                      metadata: Value::Object(self.metadata) }
    }
}

/// Result of a successful executor call.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub produced: Vec<Node>,
    pub metadata: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Step;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn context_accumulates_children_and_metadata() {
        let step = Step::pending(Uuid::new_v4(), 1, &StepDescriptor::new("split", "chunk", json!({})));
        let input = vec![Node::root("hello world")];
        let mut ctx = ExecutionContext::new(&step, &input);
        let parent = &ctx.input()[0];
        let child_id = ctx.derive(parent, "hello").id;
        ctx.annotate("chunks", json!(1));
        let outcome = ctx.into_outcome();
        assert_eq!(outcome.produced.len(), 1);
        assert_eq!(outcome.produced[0].id, child_id);
        assert_eq!(outcome.produced[0].parent_id, Some(input[0].id));
        assert_eq!(outcome.metadata, json!({"chunks": 1}));
    }
}
