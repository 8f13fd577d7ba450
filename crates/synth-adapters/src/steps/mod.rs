//! Executors for the closed set of pipeline steps.

pub mod ablation;
pub mod generation;
pub mod split;

pub use ablation::LlmJudgeBinaryExecutor;
pub use generation::LlmGenerationExecutor;
pub use split::{ChunkSplitExecutor, SeparatorSplitExecutor};
