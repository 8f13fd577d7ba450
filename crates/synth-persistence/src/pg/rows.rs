//! Row structs and their mapping to core records.
//!
//! Field order matches the column order in `schema.rs`, which is what
//! `Queryable` relies on when whole tables are loaded.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use synth_core::{LinkRole, Node, Run, Step, StepNode};
use uuid::Uuid;

use crate::error::PersistenceError;
use crate::schema::{nodes, runs, step_nodes, steps};

#[derive(Queryable, Insertable, Debug, Clone)]
#[diesel(table_name = runs)]
pub struct RunRow {
    pub id: Uuid,
    pub status: String,
    pub config: Value,
    pub config_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Insertable, Debug, Clone)]
#[diesel(table_name = steps)]
pub struct StepRow {
    pub id: Uuid,
    pub run_id: Uuid,
    pub position: i32,
    pub step_type: String,
    pub method: String,
    pub name: Option<String>,
    pub parameters: Value,
    pub status: String,
    pub run_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub metadata: Option<Value>,
}

#[derive(Queryable, Insertable, Debug, Clone)]
#[diesel(table_name = nodes)]
pub struct NodeRow {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub value: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Insertable, Debug, Clone)]
#[diesel(table_name = step_nodes)]
pub struct StepNodeRow {
    pub step_id: Uuid,
    pub node_id: Uuid,
    pub role: String,
    pub ordinal: i32,
}

fn corrupt(e: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::Corrupt(e.to_string())
}

impl From<&Run> for RunRow {
    fn from(r: &Run) -> Self {
        Self { id: r.id,
               status: r.status.as_str().to_string(),
               config: r.config.clone(),
               config_hash: r.config_hash.clone(),
               created_at: r.created_at }
    }
}

impl TryFrom<RunRow> for Run {
    type Error = PersistenceError;

    fn try_from(r: RunRow) -> Result<Self, Self::Error> {
        Ok(Run { id: r.id,
                 status: r.status.parse().map_err(corrupt)?,
                 config: r.config,
                 config_hash: r.config_hash,
                 created_at: r.created_at })
    }
}

impl TryFrom<&Step> for StepRow {
    type Error = PersistenceError;

    fn try_from(s: &Step) -> Result<Self, Self::Error> {
        let position = i32::try_from(s.position).map_err(|_| {
                                                    PersistenceError::Rejected(format!("step position {} out of range",
                                                                                       s.position))
                                                })?;
        Ok(Self { id: s.id,
                  run_id: s.run_id,
                  position,
                  step_type: s.step_type.clone(),
                  method: s.method.clone(),
                  name: s.name.clone(),
                  parameters: s.parameters.clone(),
                  status: s.status.as_str().to_string(),
                  run_at: s.run_at,
                  finished_at: s.finished_at,
                  metadata: s.metadata.clone() })
    }
}

impl TryFrom<StepRow> for Step {
    type Error = PersistenceError;

    fn try_from(s: StepRow) -> Result<Self, Self::Error> {
        Ok(Step { id: s.id,
                  run_id: s.run_id,
                  position: u32::try_from(s.position).map_err(corrupt)?,
                  step_type: s.step_type,
                  method: s.method,
                  name: s.name,
                  parameters: s.parameters,
                  status: s.status.parse().map_err(corrupt)?,
                  run_at: s.run_at,
                  finished_at: s.finished_at,
                  metadata: s.metadata })
    }
}

impl From<&Node> for NodeRow {
    fn from(n: &Node) -> Self {
        Self { id: n.id,
               parent_id: n.parent_id,
               value: n.value.clone(),
               created_at: n.created_at }
    }
}

impl From<NodeRow> for Node {
    fn from(n: NodeRow) -> Self {
        Node { id: n.id,
               parent_id: n.parent_id,
               value: n.value,
               created_at: n.created_at }
    }
}

impl From<&StepNode> for StepNodeRow {
    fn from(l: &StepNode) -> Self {
        Self { step_id: l.step_id,
               node_id: l.node_id,
               role: l.role.as_str().to_string(),
               ordinal: l.ordinal as i32 }
    }
}

impl TryFrom<StepNodeRow> for StepNode {
    type Error = PersistenceError;

    fn try_from(l: StepNodeRow) -> Result<Self, Self::Error> {
        Ok(StepNode { step_id: l.step_id,
                      node_id: l.node_id,
                      role: l.role.parse::<LinkRole>().map_err(corrupt)?,
                      ordinal: u32::try_from(l.ordinal).map_err(corrupt)? })
    }
}
