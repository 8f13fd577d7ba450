//! Pipeline engine: runs a `PipelineSpec` step by step, persisting every
//! transition, and resumes failed runs.

mod builder;
mod core;

pub use builder::EngineBuilder;
pub use self::core::PipelineEngine;

use crate::model::{Node, Run, Step, StepStatus};

/// Engine options. Passed explicitly to the engine instead of being read
/// from the process environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Logs per-step parameters and node counts at `info` instead of `debug`.
    pub debug: bool,
}

/// Outcome of a completed (fresh or resumed) execution.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run: Run,
    /// All steps of the run in position order, as stored.
    pub steps: Vec<Step>,
    /// Final working set handed to the output saver.
    pub output: Vec<Node>,
}

impl RunReport {
    pub fn step_statuses(&self) -> Vec<StepStatus> {
        self.steps.iter().map(|s| s.status).collect()
    }
}
