//! Lineage tracking over the node forest and the step↔node linkage table.
//!
//! The linkage table is the only source used to answer "what did step S
//! see": resume replays exactly the nodes recorded here, in their recorded
//! order.

use std::collections::HashSet;

use log::debug;
use thiserror::Error;

use crate::model::{LinkRole, Node, NodeId, Step, StepId, StepNode};
use crate::store::{RecordStore, StoreError};

#[derive(Debug, Error)]
pub enum LineageError {
    #[error("lineage cycle detected at node {node_id}")]
    Cycle { node_id: NodeId },
    #[error("node {node_id} references parent {parent_id} outside the checked set")]
    DanglingParent { node_id: NodeId, parent_id: NodeId },
    #[error("step {step_id} has recorded inputs that disagree with the nodes it is given")]
    InputsDiverged { step_id: StepId },
    #[error(transparent)]
    Storage(#[from] StoreError),
}

pub struct LineageTracker<'s, S: RecordStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: RecordStore + ?Sized> LineageTracker<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Input links `record_consumption` would write for `step`.
    ///
    /// Links are written once. When the step already has recorded inputs
    /// (a resumed step) they must name exactly `nodes`, and nothing new is
    /// returned.
    pub fn consumption_links(&self, step: &Step, nodes: &[Node]) -> Result<Vec<StepNode>, LineageError> {
        let recorded = self.store.list_step_nodes(step.id, LinkRole::Input)?;
        if recorded.is_empty() {
            let ids: Vec<NodeId> = nodes.iter().map(|n| n.id).collect();
            return Ok(StepNode::for_nodes(step.id, LinkRole::Input, &ids));
        }
        let same = recorded.len() == nodes.len() && recorded.iter().zip(nodes).all(|(l, n)| l.node_id == n.id);
        if !same {
            return Err(LineageError::InputsDiverged { step_id: step.id });
        }
        Ok(Vec::new())
    }

    /// Persists the input links of `step` for `nodes`. Returns the number of
    /// rows written (zero if they were already recorded).
    pub fn record_consumption(&self, step: &Step, nodes: &[Node]) -> Result<usize, LineageError> {
        let links = self.consumption_links(step, nodes)?;
        if !links.is_empty() {
            // links only; the stored status is kept as it is
            let stored = self.store.get_step(step.id)?;
            self.store.begin_step(&stored, stored.status, &links)?;
        }
        debug!("record_consumption step_id={} written={}", step.id, links.len());
        Ok(links.len())
    }

    /// The exact node set `step` was given, in its original order.
    pub fn resolve_inputs(&self, step: &Step) -> Result<Vec<Node>, LineageError> {
        self.resolve(step.id, LinkRole::Input)
    }

    /// Nodes produced by `step` on its successful attempt.
    pub fn resolve_outputs(&self, step: &Step) -> Result<Vec<Node>, LineageError> {
        self.resolve(step.id, LinkRole::Output)
    }

    fn resolve(&self, step_id: StepId, role: LinkRole) -> Result<Vec<Node>, LineageError> {
        let links = self.store.list_step_nodes(step_id, role)?;
        let ids: Vec<NodeId> = links.iter().map(|l| l.node_id).collect();
        Ok(self.store.get_nodes(&ids)?)
    }

    /// `node_id` followed by its ancestors, up to and including the root.
    pub fn ancestry(&self, node_id: NodeId) -> Result<Vec<Node>, LineageError> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(node_id);
        while let Some(id) = next {
            if !seen.insert(id) {
                return Err(LineageError::Cycle { node_id: id });
            }
            let node = self.store.get_node(id)?;
            next = node.parent_id;
            chain.push(node);
        }
        Ok(chain)
    }
}

/// Checks that the parent relation of `nodes` is a forest: every parent is in
/// the set and no node is its own ancestor.
pub fn verify_forest(nodes: &[Node]) -> Result<(), LineageError> {
    let parents: std::collections::HashMap<NodeId, Option<NodeId>> =
        nodes.iter().map(|n| (n.id, n.parent_id)).collect();
    for node in nodes {
        let mut seen = HashSet::new();
        let mut current = node.id;
        seen.insert(current);
        while let Some(parent) = parents.get(&current).copied().flatten() {
            if !parents.contains_key(&parent) {
                return Err(LineageError::DanglingParent { node_id: current,
                                                          parent_id: parent });
            }
            if !seen.insert(parent) {
                return Err(LineageError::Cycle { node_id: node.id });
            }
            current = parent;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Run, StepStatus};
    use crate::spec::StepDescriptor;
    use crate::store::InMemoryRecordStore;
    use serde_json::json;

    fn store_with_step() -> (InMemoryRecordStore, Step) {
        let store = InMemoryRecordStore::new();
        let run = Run::new(json!({}));
        let step = Step::pending(run.id, 1, &StepDescriptor::new("split", "chunk", json!({})));
        store.create_run_with_steps(&run, std::slice::from_ref(&step)).unwrap();
        (store, step)
    }

    #[test]
    fn resolve_inputs_returns_recorded_order() {
        let (store, mut step) = store_with_step();
        let nodes = vec![Node::root("b"), Node::root("a"), Node::root("c")];
        store.insert_nodes(&nodes).unwrap();
        step.status = StepStatus::Running;
        let tracker = LineageTracker::new(&store);
        assert_eq!(tracker.record_consumption(&step, &nodes).unwrap(), 3);
        assert_eq!(tracker.resolve_inputs(&step).unwrap(), nodes);
    }

    #[test]
    fn recorded_inputs_are_not_rewritten() {
        let (store, step) = store_with_step();
        let nodes = vec![Node::root("a")];
        store.insert_nodes(&nodes).unwrap();
        let tracker = LineageTracker::new(&store);
        tracker.record_consumption(&step, &nodes).unwrap();
        assert_eq!(tracker.record_consumption(&step, &nodes).unwrap(), 0);

        let other = vec![Node::root("z")];
        store.insert_nodes(&other).unwrap();
        assert!(matches!(tracker.consumption_links(&step, &other),
                         Err(LineageError::InputsDiverged { .. })));
    }

    #[test]
    fn ancestry_walks_to_root() {
        let (store, _) = store_with_step();
        let root = Node::root("doc");
        let chunk = root.derive("chunk");
        let answer = chunk.derive("answer");
        store.insert_nodes(&[root.clone(), chunk.clone(), answer.clone()]).unwrap();
        let chain = LineageTracker::new(&store).ancestry(answer.id).unwrap();
        assert_eq!(chain, vec![answer, chunk, root]);
    }

    #[test]
    fn verify_forest_detects_cycles_and_dangling_parents() {
        let a = Node::root("a");
        let mut b = a.derive("b");
        let mut a_cyclic = a.clone();
        a_cyclic.parent_id = Some(b.id);
        assert!(matches!(verify_forest(&[a_cyclic, b.clone()]), Err(LineageError::Cycle { .. })));
        assert!(matches!(verify_forest(std::slice::from_ref(&b)), Err(LineageError::DanglingParent { .. })));
        b.parent_id = None;
        assert!(verify_forest(&[a, b]).is_ok());
    }
}
