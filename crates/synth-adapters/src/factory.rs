use std::sync::Arc;

use synth_core::{CoreEngineError, Executor, ExecutorFactory, StepDescriptor};
use synth_domain::pipeline::{ABLATION, CHUNK, GENERATION, LLM, LLM_JUDGE_BINARY, SEPARATOR, SPLIT};
use synth_domain::{PipelineStep, StepKind};

use crate::llm::CompletionClient;
use crate::steps::{ChunkSplitExecutor, LlmGenerationExecutor, LlmJudgeBinaryExecutor, SeparatorSplitExecutor};

fn is_known(step_type: &str, method: &str) -> bool {
    matches!((step_type, method),
             (SPLIT, CHUNK) | (SPLIT, SEPARATOR) | (GENERATION, LLM) | (ABLATION, LLM_JUDGE_BINARY))
}

/// Builds the executor of every step in the closed set. The completion
/// client is shared by all LLM-backed steps.
#[derive(Clone)]
pub struct DefaultExecutorFactory {
    client: Arc<dyn CompletionClient>,
}

impl DefaultExecutorFactory {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }
}

impl ExecutorFactory for DefaultExecutorFactory {
    fn create(&self, descriptor: &StepDescriptor) -> Result<Box<dyn Executor>, CoreEngineError> {
        if !is_known(&descriptor.step_type, &descriptor.method) {
            return Err(CoreEngineError::UnknownExecutor { step_type: descriptor.step_type.clone(),
                                                          method: descriptor.method.clone() });
        }
        let step = PipelineStep::from_descriptor(descriptor).map_err(|e| CoreEngineError::InvalidDescriptor {
                                                                step_type: descriptor.step_type.clone(),
                                                                method: descriptor.method.clone(),
                                                                reason: e.to_string(),
                                                            })?;
        let executor: Box<dyn Executor> = match step.kind {
            StepKind::ChunkSplit(p) => Box::new(ChunkSplitExecutor::new(p)),
            StepKind::SeparatorSplit(p) => Box::new(SeparatorSplitExecutor::new(p)),
            StepKind::LlmGeneration(p) => Box::new(LlmGenerationExecutor::new(p, self.client.clone())),
            StepKind::LlmJudgeBinary(p) => Box::new(LlmJudgeBinaryExecutor::new(p, self.client.clone())),
        };
        Ok(executor)
    }
}
