//! Input/output collaborators and the pipeline-level context they share.

use thiserror::Error;

use crate::model::{Node, RunId};

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("{0}")]
    Other(String),
}

/// Working data of one run: the node set flowing from step to step.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    run_id: RunId,
    working: Vec<Node>,
}

impl PipelineContext {
    pub fn new(run_id: RunId) -> Self {
        Self { run_id,
               working: Vec::new() }
    }

    /// Context seeded with an existing working set (resume).
    pub fn seeded(run_id: RunId, working: Vec<Node>) -> Self {
        Self { run_id, working }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Adds a root node (no parent) holding `value`.
    pub fn push_root(&mut self, value: impl Into<String>) -> &Node {
        self.working.push(Node::root(value));
        &self.working[self.working.len() - 1]
    }

    pub fn working(&self) -> &[Node] {
        &self.working
    }

    pub fn replace_working(&mut self, nodes: Vec<Node>) {
        self.working = nodes;
    }

    pub fn into_working(self) -> Vec<Node> {
        self.working
    }
}

/// Produces the initial working set.
pub trait InputLoader {
    fn load(&self, ctx: &mut PipelineContext) -> Result<(), CollaboratorError>;
}

/// Consumes the final working set.
pub trait OutputSaver {
    fn save(&self, ctx: &PipelineContext) -> Result<(), CollaboratorError>;
}
