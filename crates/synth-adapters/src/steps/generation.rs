use std::sync::Arc;

use log::debug;
use rayon::prelude::*;
use serde_json::json;
use synth_core::{ExecutionContext, Executor, ExecutorError};
use synth_domain::GenerationParameters;

use crate::llm::{CompletionClient, CompletionRequest};
use crate::prompt::render_template;

/// One completion per input node, rendered from the template. Calls run in
/// parallel; the first failure fails the whole step.
pub struct LlmGenerationExecutor {
    params: GenerationParameters,
    client: Arc<dyn CompletionClient>,
}

impl LlmGenerationExecutor {
    pub fn new(params: GenerationParameters, client: Arc<dyn CompletionClient>) -> Self {
        Self { params, client }
    }
}

impl Executor for LlmGenerationExecutor {
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<(), ExecutorError> {
        let input = ctx.input();
        debug!("generating {} completions with {}/{}",
               input.len(),
               self.params.provider,
               self.params.model);

        let answers: Vec<String> =
            input.par_iter()
                 .map(|node| {
                     let prompt = render_template(&self.params.template, &node.value);
                     let request = CompletionRequest::new(&self.params.provider, &self.params.model, prompt);
                     self.client
                         .complete(&request)
                         .map_err(|e| ExecutorError::Provider(e.to_string()))
                 })
                 .collect::<Result<_, _>>()?;

        for (node, answer) in input.iter().zip(answers) {
            ctx.derive(node, answer);
        }
        ctx.annotate("provider", json!(self.params.provider));
        ctx.annotate("model", json!(self.params.model));
        ctx.annotate("generated", json!(input.len()));
        Ok(())
    }
}
