use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{ParseStatusError, RunId};
use crate::spec::StepDescriptor;

pub type StepId = Uuid;

/// Status of a step within a run.
///
/// Valid transitions:
/// - `Pending` -> `Running`
/// - `Running` -> `Finished`
/// - `Running` -> `Errored`
/// - `Errored` -> `Running` (resume only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Finished,
    Errored,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Finished => "finished",
            StepStatus::Errored => "errored",
        }
    }

    pub fn can_transition_to(self, next: StepStatus) -> bool {
        matches!((self, next),
                 (StepStatus::Pending, StepStatus::Running)
                 | (StepStatus::Running, StepStatus::Finished)
                 | (StepStatus::Running, StepStatus::Errored)
                 | (StepStatus::Errored, StepStatus::Running))
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StepStatus::Pending),
            "running" => Ok(StepStatus::Running),
            "finished" => Ok(StepStatus::Finished),
            "errored" => Ok(StepStatus::Errored),
            other => Err(ParseStatusError { kind: "step status",
                                            value: other.to_string() }),
        }
    }
}

/// One stage of a run, fixed when the run is created.
///
/// `parameters` is a historical copy of the descriptor's parameters, not live
/// configuration. `metadata` is whatever the executor annotated on its last
/// successful attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub run_id: RunId,
    pub position: u32,
    pub step_type: String,
    pub method: String,
    pub name: Option<String>,
    pub parameters: Value,
    pub status: StepStatus,
    pub run_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub metadata: Option<Value>,
}

impl Step {
    /// A PENDING step for `descriptor` at 1-based `position`.
    pub fn pending(run_id: RunId, position: u32, descriptor: &StepDescriptor) -> Self {
        Self { id: Uuid::new_v4(),
               run_id,
               position,
               step_type: descriptor.step_type.clone(),
               method: descriptor.method.clone(),
               name: descriptor.name.clone(),
               parameters: descriptor.parameters.clone(),
               status: StepStatus::Pending,
               run_at: Utc::now(),
               finished_at: None,
               metadata: None }
    }

    /// Label used in logs: the name when set, else `type/method`.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}/{}", self.step_type, self.method),
        }
    }
}
