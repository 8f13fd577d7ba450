use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{NodeId, ParseStatusError, StepId};

/// Direction of a step↔node link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkRole {
    /// The node was part of the working set handed to the step.
    Input,
    /// The node was produced by the step.
    Output,
}

impl LinkRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkRole::Input => "input",
            LinkRole::Output => "output",
        }
    }
}

impl fmt::Display for LinkRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkRole {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "input" => Ok(LinkRole::Input),
            "output" => Ok(LinkRole::Output),
            other => Err(ParseStatusError { kind: "link role",
                                            value: other.to_string() }),
        }
    }
}

/// Row of the step↔node linkage table. `ordinal` is the node's index in the
/// working set so the exact order can be replayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepNode {
    pub step_id: StepId,
    pub node_id: NodeId,
    pub role: LinkRole,
    pub ordinal: u32,
}

impl StepNode {
    /// Links for `nodes` in their current order.
    pub fn for_nodes<'a, I>(step_id: StepId, role: LinkRole, nodes: I) -> Vec<StepNode>
        where I: IntoIterator<Item = &'a NodeId>
    {
        nodes.into_iter()
             .enumerate()
             .map(|(i, node_id)| StepNode { step_id,
                                            node_id: *node_id,
                                            role,
                                            ordinal: i as u32 })
             .collect()
    }
}
