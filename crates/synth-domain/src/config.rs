use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use synth_core::PipelineSpec;

use crate::error::ConfigError;
use crate::io::{Input, Output};
use crate::pipeline::PipelineStep;

/// A complete pipeline configuration as written in YAML.
///
/// ```yaml
/// input:
///   type: csv
///   properties: { path: in.csv, target_column: text }
/// pipeline:
///   - type: split
///     method: chunk
///     parameters: { size: 500 }
/// output:
///   type: csv
///   properties: { path: out.csv }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub input: Input,
    #[serde(default)]
    pub pipeline: Vec<PipelineStep>,
    pub output: Output,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(),
                                                                                 source })?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Steps are validated while parsing; this covers the I/O sections and
    /// re-checks steps built in code.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.input.validate()?;
        self.output.validate()?;
        for step in &self.pipeline {
            PipelineStep::from_descriptor(&step.descriptor()?)?;
        }
        Ok(())
    }

    /// The engine-facing `PipelineSpec`. Its snapshot is this whole
    /// configuration with defaults filled in.
    pub fn to_spec(&self) -> Result<PipelineSpec, ConfigError> {
        let snapshot = serde_json::to_value(self)?;
        let steps = self.pipeline
                        .iter()
                        .map(PipelineStep::descriptor)
                        .collect::<Result<Vec<_>, _>>()?;
        Ok(PipelineSpec::new(snapshot, steps))
    }
}
