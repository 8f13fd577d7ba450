//! Binary LLM judge: keeps the candidates a panel of YES/NO questions
//! agrees on.

use std::sync::Arc;

use log::{debug, info};
use rayon::prelude::*;
use serde::Deserialize;
use serde_json::json;
use synth_core::{ExecutionContext, Executor, ExecutorError};
use synth_domain::JudgeParameters;

use crate::llm::{CompletionClient, CompletionRequest, LlmError};
use crate::prompt::judge_prompt;

#[derive(Debug, Deserialize)]
struct BinaryAnswer {
    answer: String,
}

/// Reads a judge reply: `{"answer": "YES"}` or a bare YES/NO.
pub fn parse_answer(reply: &str) -> Result<bool, LlmError> {
    let text = match serde_json::from_str::<BinaryAnswer>(reply.trim()) {
        Ok(parsed) => parsed.answer,
        Err(_) => reply.to_string(),
    };
    match text.trim().trim_matches(|c: char| !c.is_ascii_alphabetic()).to_ascii_uppercase().as_str() {
        "YES" => Ok(true),
        "NO" => Ok(false),
        _ => Err(LlmError::Parse(format!("expected YES or NO, got {reply:?}"))),
    }
}

pub struct LlmJudgeBinaryExecutor {
    params: JudgeParameters,
    client: Arc<dyn CompletionClient>,
}

impl LlmJudgeBinaryExecutor {
    pub fn new(params: JudgeParameters, client: Arc<dyn CompletionClient>) -> Self {
        Self { params, client }
    }

    /// Positive answers for one candidate, one call per criterion.
    fn judge(&self, candidate: &str) -> Result<usize, LlmError> {
        let mut positive = 0;
        for criterion in &self.params.criteria {
            let request = CompletionRequest::new(&self.params.provider,
                                                 &self.params.model,
                                                 judge_prompt(candidate, criterion)).json();
            if parse_answer(&self.client.complete(&request)?)? {
                positive += 1;
            }
        }
        Ok(positive)
    }
}

impl Executor for LlmJudgeBinaryExecutor {
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<(), ExecutorError> {
        let input = ctx.input();
        let total = self.params.criteria.len();
        let verdicts: Vec<bool> = input.par_iter()
                                       .map(|node| {
                                           self.judge(&node.value)
                                               .map(|positive| self.params.consensus.accepts(positive, total))
                                               .map_err(|e| ExecutorError::Provider(e.to_string()))
                                       })
                                       .collect::<Result<_, _>>()?;

        for (node, keep) in input.iter().zip(&verdicts) {
            debug!("candidate {} kept={keep}", node.id);
            if *keep {
                ctx.derive(node, node.value.clone());
            }
        }
        let kept = ctx.produced().len();
        info!("judge kept {kept} of {} candidates ({:?})", input.len(), self.params.consensus);
        ctx.annotate("consensus", json!(self.params.consensus));
        ctx.annotate("criteria", json!(self.params.criteria));
        ctx.annotate("kept", json!(kept));
        ctx.annotate("rejected", json!(input.len() - kept));
        Ok(())
    }
}
