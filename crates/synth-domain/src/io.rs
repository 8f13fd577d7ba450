//! Input and output sections of a configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_separator() -> String {
    ",".to_string()
}

fn default_column() -> String {
    "value".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CsvInputProperties {
    pub path: PathBuf,
    pub target_column: String,
    #[serde(default = "default_separator")]
    pub separator: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InlineInputProperties {
    pub values: Vec<String>,
}

/// Where the root nodes come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "properties", rename_all = "lowercase")]
pub enum Input {
    Csv(CsvInputProperties),
    Inline(InlineInputProperties),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CsvOutputProperties {
    pub path: PathBuf,
    #[serde(default = "default_separator")]
    pub separator: String,
    /// Header of the single output column.
    #[serde(default = "default_column")]
    pub column: String,
}

/// Where the final working set goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "properties", rename_all = "lowercase")]
pub enum Output {
    Csv(CsvOutputProperties),
}

/// CSV separators are single ASCII bytes.
pub fn separator_byte(separator: &str) -> Result<u8, ConfigError> {
    match separator.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(ConfigError::invalid(format!("csv separator must be one ASCII character, got {separator:?}"))),
    }
}

impl Input {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Input::Csv(p) => {
                separator_byte(&p.separator)?;
                if p.target_column.trim().is_empty() {
                    return Err(ConfigError::invalid("input target_column must not be empty"));
                }
                Ok(())
            }
            Input::Inline(_) => Ok(()),
        }
    }
}

impl Output {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Output::Csv(p) => {
                separator_byte(&p.separator)?;
                Ok(())
            }
        }
    }
}
