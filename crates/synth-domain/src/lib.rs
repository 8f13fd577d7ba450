// synth-domain: pipeline configuration model
pub mod config;
pub mod error;
pub mod io;
pub mod pipeline;

pub use config::Config;
pub use error::ConfigError;
pub use io::{CsvInputProperties, CsvOutputProperties, InlineInputProperties, Input, Output};
pub use pipeline::{ChunkParameters, Consensus, GenerationParameters, JudgeParameters, PipelineStep,
                   SeparatorParameters, StepKind};
