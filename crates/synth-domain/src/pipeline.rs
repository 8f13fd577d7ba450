//! Pipeline steps: the closed set of (type, method) pairs and their
//! parameters.
//!
//! On the wire a step is `{type, method, name?, parameters}`. Parsing goes
//! through `StepDescriptor` and fills every default, so a serialized step
//! always carries its full parameter set.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use synth_core::StepDescriptor;

use crate::error::ConfigError;

pub const SPLIT: &str = "split";
pub const GENERATION: &str = "generation";
pub const ABLATION: &str = "ablation";

pub const CHUNK: &str = "chunk";
pub const SEPARATOR: &str = "separator";
pub const LLM: &str = "llm";
pub const LLM_JUDGE_BINARY: &str = "llm-judge-binary";

/// Placeholder replaced by the node value in generation templates.
pub const CHUNK_PLACEHOLDER: &str = "{chunk}";

pub const MAX_CHUNK_SIZE: usize = 9_999;

fn default_chunk_size() -> usize {
    500
}

fn default_separator() -> String {
    ".".to_string()
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChunkParameters {
    #[serde(default = "default_chunk_size")]
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeparatorParameters {
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default)]
    pub keep_separator: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationParameters {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub template: String,
}

/// How the binary answers of a judge are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Consensus {
    All,
    Any,
    Majority,
}

impl Consensus {
    /// Whether a candidate with `positive` YES answers out of `total` is kept.
    /// No answers at all never keeps a candidate.
    pub fn accepts(self, positive: usize, total: usize) -> bool {
        if total == 0 {
            return false;
        }
        match self {
            Consensus::All => positive == total,
            Consensus::Any => positive > 0,
            Consensus::Majority => positive * 2 > total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JudgeParameters {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub consensus: Consensus,
    pub criteria: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    ChunkSplit(ChunkParameters),
    SeparatorSplit(SeparatorParameters),
    LlmGeneration(GenerationParameters),
    LlmJudgeBinary(JudgeParameters),
}

impl StepKind {
    pub fn step_type(&self) -> &'static str {
        match self {
            StepKind::ChunkSplit(_) | StepKind::SeparatorSplit(_) => SPLIT,
            StepKind::LlmGeneration(_) => GENERATION,
            StepKind::LlmJudgeBinary(_) => ABLATION,
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            StepKind::ChunkSplit(_) => CHUNK,
            StepKind::SeparatorSplit(_) => SEPARATOR,
            StepKind::LlmGeneration(_) => LLM,
            StepKind::LlmJudgeBinary(_) => LLM_JUDGE_BINARY,
        }
    }

    fn parameters(&self) -> Result<Value, ConfigError> {
        let value = match self {
            StepKind::ChunkSplit(p) => serde_json::to_value(p)?,
            StepKind::SeparatorSplit(p) => serde_json::to_value(p)?,
            StepKind::LlmGeneration(p) => serde_json::to_value(p)?,
            StepKind::LlmJudgeBinary(p) => serde_json::to_value(p)?,
        };
        Ok(value)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            StepKind::ChunkSplit(p) => {
                if p.size == 0 || p.size > MAX_CHUNK_SIZE {
                    return Err(ConfigError::invalid(format!("chunk size must be within 1..={MAX_CHUNK_SIZE}, got {}",
                                                            p.size)));
                }
            }
            StepKind::SeparatorSplit(p) => {
                if p.separator.is_empty() {
                    return Err(ConfigError::invalid("separator must not be empty"));
                }
            }
            StepKind::LlmGeneration(p) => {
                require_model(&p.provider, &p.model)?;
                if !p.template.contains(CHUNK_PLACEHOLDER) {
                    return Err(ConfigError::invalid(format!("generation template must contain {CHUNK_PLACEHOLDER}")));
                }
            }
            StepKind::LlmJudgeBinary(p) => {
                require_model(&p.provider, &p.model)?;
                if p.criteria.is_empty() || p.criteria.iter().any(|c| c.trim().is_empty()) {
                    return Err(ConfigError::invalid("judge criteria must be a non-empty list of non-empty strings"));
                }
            }
        }
        Ok(())
    }
}

fn require_model(provider: &str, model: &str) -> Result<(), ConfigError> {
    if provider.trim().is_empty() || model.trim().is_empty() {
        return Err(ConfigError::invalid("provider and model must not be empty"));
    }
    Ok(())
}

fn parse_parameters<T: DeserializeOwned>(parameters: &Value) -> Result<T, ConfigError> {
    // a step written without `parameters` gets all defaults
    let value = if parameters.is_null() {
        Value::Object(Default::default())
    } else {
        parameters.clone()
    };
    Ok(serde_json::from_value(value)?)
}

/// One validated pipeline step.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "StepDescriptor")]
pub struct PipelineStep {
    pub name: Option<String>,
    pub kind: StepKind,
}

impl PipelineStep {
    pub fn new(kind: StepKind) -> Self {
        Self { name: None, kind }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Parses and validates a descriptor against the closed set.
    pub fn from_descriptor(descriptor: &StepDescriptor) -> Result<Self, ConfigError> {
        let params = &descriptor.parameters;
        let kind = match (descriptor.step_type.as_str(), descriptor.method.as_str()) {
            (SPLIT, CHUNK) => StepKind::ChunkSplit(parse_parameters(params)?),
            (SPLIT, SEPARATOR) => StepKind::SeparatorSplit(parse_parameters(params)?),
            (GENERATION, LLM) => StepKind::LlmGeneration(parse_parameters(params)?),
            (ABLATION, LLM_JUDGE_BINARY) => StepKind::LlmJudgeBinary(parse_parameters(params)?),
            (t, m) => return Err(ConfigError::invalid(format!("unknown step {t}/{m}"))),
        };
        kind.validate()?;
        Ok(Self { name: descriptor.name.clone(),
                  kind })
    }

    pub fn descriptor(&self) -> Result<StepDescriptor, ConfigError> {
        Ok(StepDescriptor { step_type: self.kind.step_type().to_string(),
                            method: self.kind.method().to_string(),
                            name: self.name.clone(),
                            parameters: self.kind.parameters()? })
    }
}

impl TryFrom<StepDescriptor> for PipelineStep {
    type Error = ConfigError;

    fn try_from(d: StepDescriptor) -> Result<Self, Self::Error> {
        PipelineStep::from_descriptor(&d)
    }
}

impl Serialize for PipelineStep {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where S: Serializer
    {
        self.descriptor()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}
