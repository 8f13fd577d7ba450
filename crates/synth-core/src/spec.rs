//! Pipeline specification handed to the engine.
//!
//! A `PipelineSpec` is produced by the configuration layer after validation
//! and is immutable from then on. `config` is the full serialized
//! configuration; its canonical JSON is what a resume request is compared
//! against.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hashing::{hash_value, to_canonical_json};

/// One step of the pipeline: type and method select the executor, parameters
/// are method specific.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDescriptor {
    #[serde(rename = "type")]
    pub step_type: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub parameters: Value,
}

impl StepDescriptor {
    pub fn new(step_type: impl Into<String>, method: impl Into<String>, parameters: Value) -> Self {
        Self { step_type: step_type.into(),
               method: method.into(),
               name: None,
               parameters }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSpec {
    config: Value,
    steps: Vec<StepDescriptor>,
}

impl PipelineSpec {
    pub fn new(config: Value, steps: Vec<StepDescriptor>) -> Self {
        Self { config, steps }
    }

    /// Spec whose snapshot is just the serialized step list.
    pub fn from_steps(steps: Vec<StepDescriptor>) -> Self {
        let config = serde_json::json!({ "pipeline": steps });
        Self { config, steps }
    }

    pub fn config(&self) -> &Value {
        &self.config
    }

    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn canonical_config(&self) -> String {
        to_canonical_json(&self.config)
    }

    pub fn config_hash(&self) -> String {
        hash_value(&self.config)
    }

    /// True when `snapshot` serializes identically to this spec's config.
    pub fn matches_snapshot(&self, snapshot: &Value) -> bool {
        to_canonical_json(snapshot) == self.canonical_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_match_ignores_key_order() {
        let spec = PipelineSpec::new(json!({"a": 1, "b": [1, 2]}), vec![]);
        assert!(spec.matches_snapshot(&json!({"b": [1, 2], "a": 1})));
        assert!(!spec.matches_snapshot(&json!({"a": 1, "b": [2, 1]})));
    }

    #[test]
    fn from_steps_snapshot_contains_descriptors() {
        let spec = PipelineSpec::from_steps(vec![StepDescriptor::new("split", "chunk", json!({"size": 10}))]);
        assert_eq!(spec.config()["pipeline"][0]["type"], "split");
        assert_eq!(spec.len(), 1);
    }
}
