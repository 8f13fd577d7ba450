use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type NodeId = Uuid;

/// One record at some point of the lineage graph.
///
/// Nodes are never edited: deriving data always creates a new node whose
/// `parent_id` points at the node it came from. Roots (from the input loader)
/// have no parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub value: String,
    pub created_at: DateTime<Utc>,
}

impl Node {
    pub fn root(value: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(),
               parent_id: None,
               value: value.into(),
               created_at: Utc::now() }
    }

    /// A new node derived from `self`.
    pub fn derive(&self, value: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(),
               parent_id: Some(self.id),
               value: value.into(),
               created_at: Utc::now() }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
