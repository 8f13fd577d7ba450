use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use indexmap::IndexMap;
use log::debug;

use super::{RecordStore, StoreError};
use crate::model::{LinkRole, Node, NodeId, Run, RunId, RunStatus, Step, StepId, StepNode, StepStatus};

#[derive(Default)]
struct Tables {
    runs: IndexMap<RunId, Run>,
    steps: IndexMap<StepId, Step>,
    nodes: IndexMap<NodeId, Node>,
    /// Links of one step and role, keyed by node.
    links: HashMap<(StepId, LinkRole), IndexMap<NodeId, StepNode>>,
}

impl Tables {
    fn step_mut(&mut self, id: StepId) -> Result<&mut Step, StoreError> {
        self.steps
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "step", id })
    }

    fn expect_step(&self, id: StepId, expected: StepStatus) -> Result<(), StoreError> {
        let stored = self.steps
                         .get(&id)
                         .ok_or(StoreError::NotFound { entity: "step", id })?;
        if stored.status != expected {
            return Err(StoreError::Conflict(format!("step {id} is {}, expected {expected}", stored.status)));
        }
        Ok(())
    }

    fn check_links(&self, step_id: StepId, links: &[StepNode], extra_nodes: &[Node]) -> Result<(), StoreError> {
        let extra: HashSet<NodeId> = extra_nodes.iter().map(|n| n.id).collect();
        for link in links {
            if link.step_id != step_id {
                return Err(StoreError::Conflict(format!("link for step {} passed with step {step_id}", link.step_id)));
            }
            if !self.nodes.contains_key(&link.node_id) && !extra.contains(&link.node_id) {
                return Err(StoreError::NotFound { entity: "node", id: link.node_id });
            }
        }
        Ok(())
    }

    fn check_nodes(&self, nodes: &[Node]) -> Result<(), StoreError> {
        let mut batch: HashSet<NodeId> = HashSet::with_capacity(nodes.len());
        for node in nodes {
            if self.nodes.contains_key(&node.id) || !batch.insert(node.id) {
                return Err(StoreError::Conflict(format!("node {} already exists", node.id)));
            }
            if let Some(parent) = node.parent_id {
                if !self.nodes.contains_key(&parent) && !batch.contains(&parent) {
                    return Err(StoreError::NotFound { entity: "node", id: parent });
                }
            }
        }
        Ok(())
    }

    /// Inserts links not yet present. Returns how many were new.
    fn add_links(&mut self, links: &[StepNode]) -> usize {
        let mut inserted = 0;
        for link in links {
            let slot = self.links.entry((link.step_id, link.role)).or_default();
            if !slot.contains_key(&link.node_id) {
                slot.insert(link.node_id, link.clone());
                inserted += 1;
            }
        }
        inserted
    }

    fn apply_step_update(&mut self, step: &Step) -> Result<(), StoreError> {
        let stored = self.step_mut(step.id)?;
        stored.status = step.status;
        stored.run_at = step.run_at;
        stored.finished_at = step.finished_at;
        stored.metadata = step.metadata.clone();
        Ok(())
    }
}

/// In-process record store.
///
/// All tables sit behind one mutex, so every trait method is a single atomic
/// commit. Validation mirrors the Postgres constraints (foreign keys, unique
/// run/position) so both backends reject the same writes.
#[derive(Default)]
pub struct InMemoryRecordStore {
    inner: Mutex<Tables>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".into()))
    }

    /// Number of stored nodes.
    pub fn node_count(&self) -> Result<usize, StoreError> {
        Ok(self.tables()?.nodes.len())
    }
}

impl RecordStore for InMemoryRecordStore {
    fn create_run_with_steps(&self, run: &Run, steps: &[Step]) -> Result<(), StoreError> {
        let mut t = self.tables()?;
        if t.runs.contains_key(&run.id) {
            return Err(StoreError::Conflict(format!("run {} already exists", run.id)));
        }
        for (i, step) in steps.iter().enumerate() {
            if step.run_id != run.id {
                return Err(StoreError::Conflict(format!("step {} belongs to run {}", step.id, step.run_id)));
            }
            if step.position != i as u32 + 1 {
                return Err(StoreError::Conflict(format!("step positions must be 1..{} in order, got {} at index {i}",
                                                        steps.len(),
                                                        step.position)));
            }
            if t.steps.contains_key(&step.id) {
                return Err(StoreError::Conflict(format!("step {} already exists", step.id)));
            }
        }
        t.runs.insert(run.id, run.clone());
        for step in steps {
            t.steps.insert(step.id, step.clone());
        }
        debug!("create_run_with_steps run_id={} steps={}", run.id, steps.len());
        Ok(())
    }

    fn get_run(&self, id: RunId) -> Result<Run, StoreError> {
        self.tables()?
            .runs
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { entity: "run", id })
    }

    fn list_runs(&self) -> Result<Vec<Run>, StoreError> {
        Ok(self.tables()?.runs.values().cloned().collect())
    }

    fn update_run(&self, run: &Run, expected: RunStatus) -> Result<(), StoreError> {
        let mut t = self.tables()?;
        let stored = t.runs
                      .get_mut(&run.id)
                      .ok_or(StoreError::NotFound { entity: "run", id: run.id })?;
        if stored.status != expected {
            return Err(StoreError::Conflict(format!("run {} is {}, expected {expected}", run.id, stored.status)));
        }
        stored.status = run.status;
        Ok(())
    }

    fn get_step(&self, id: StepId) -> Result<Step, StoreError> {
        self.tables()?
            .steps
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { entity: "step", id })
    }

    fn list_steps(&self, run_id: RunId) -> Result<Vec<Step>, StoreError> {
        let t = self.tables()?;
        if !t.runs.contains_key(&run_id) {
            return Err(StoreError::NotFound { entity: "run", id: run_id });
        }
        let mut steps: Vec<Step> = t.steps.values().filter(|s| s.run_id == run_id).cloned().collect();
        steps.sort_by_key(|s| s.position);
        Ok(steps)
    }

    fn update_step(&self, step: &Step, expected: StepStatus) -> Result<(), StoreError> {
        let mut t = self.tables()?;
        t.expect_step(step.id, expected)?;
        t.apply_step_update(step)
    }

    fn begin_step(&self, step: &Step, expected: StepStatus, inputs: &[StepNode]) -> Result<(), StoreError> {
        let mut t = self.tables()?;
        t.expect_step(step.id, expected)?;
        t.check_links(step.id, inputs, &[])?;
        t.apply_step_update(step)?;
        let inserted = t.add_links(inputs);
        debug!("begin_step step_id={} links_inserted={inserted}", step.id);
        Ok(())
    }

    fn complete_step(&self,
                     step: &Step,
                     expected: StepStatus,
                     produced: &[Node],
                     outputs: &[StepNode])
                     -> Result<(), StoreError> {
        let mut t = self.tables()?;
        t.expect_step(step.id, expected)?;
        t.check_nodes(produced)?;
        t.check_links(step.id, outputs, produced)?;
        for node in produced {
            t.nodes.insert(node.id, node.clone());
        }
        t.add_links(outputs);
        t.apply_step_update(step)?;
        debug!("complete_step step_id={} produced={}", step.id, produced.len());
        Ok(())
    }

    fn insert_nodes(&self, nodes: &[Node]) -> Result<(), StoreError> {
        let mut t = self.tables()?;
        t.check_nodes(nodes)?;
        for node in nodes {
            t.nodes.insert(node.id, node.clone());
        }
        Ok(())
    }

    fn get_node(&self, id: NodeId) -> Result<Node, StoreError> {
        self.tables()?
            .nodes
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { entity: "node", id })
    }

    fn get_nodes(&self, ids: &[NodeId]) -> Result<Vec<Node>, StoreError> {
        let t = self.tables()?;
        ids.iter()
           .map(|id| {
               t.nodes
                .get(id)
                .cloned()
                .ok_or(StoreError::NotFound { entity: "node", id: *id })
           })
           .collect()
    }

    fn list_children(&self, id: NodeId) -> Result<Vec<Node>, StoreError> {
        Ok(self.tables()?
               .nodes
               .values()
               .filter(|n| n.parent_id == Some(id))
               .cloned()
               .collect())
    }

    fn list_step_nodes(&self, step_id: StepId, role: LinkRole) -> Result<Vec<StepNode>, StoreError> {
        let mut links: Vec<StepNode> = self.tables()?
                                           .links
                                           .get(&(step_id, role))
                                           .map(|slot| slot.values().cloned().collect())
                                           .unwrap_or_default();
        links.sort_by_key(|l| l.ordinal);
        Ok(links)
    }
}
