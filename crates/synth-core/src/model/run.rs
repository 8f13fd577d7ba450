use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::ParseStatusError;
use crate::hashing::hash_value;

pub type RunId = Uuid;

/// Status of a pipeline execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Finished,
    Errored,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Finished => "finished",
            RunStatus::Errored => "errored",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunStatus::Running),
            "finished" => Ok(RunStatus::Finished),
            "errored" => Ok(RunStatus::Errored),
            other => Err(ParseStatusError { kind: "run status",
                                            value: other.to_string() }),
        }
    }
}

/// One execution attempt of a full pipeline.
///
/// `config` is the frozen snapshot of the configuration the run was created
/// from; `config_hash` is the blake3 hash of its canonical JSON. Neither is
/// ever rewritten after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub status: RunStatus,
    pub config: Value,
    pub config_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Run {
    /// A new RUNNING run holding `config` as its snapshot.
    pub fn new(config: Value) -> Self {
        let config_hash = hash_value(&config);
        Self { id: Uuid::new_v4(),
               status: RunStatus::Running,
               config,
               config_hash,
               created_at: Utc::now() }
    }

    pub fn with_status(&self, status: RunStatus) -> Self {
        Self { status, ..self.clone() }
    }
}
