//! Split steps: one input node becomes several child nodes.

use serde_json::json;
use synth_core::{ExecutionContext, Executor, ExecutorError};
use synth_domain::{ChunkParameters, SeparatorParameters};

/// Cuts each value into pieces of at most `size` characters.
#[derive(Debug, Clone)]
pub struct ChunkSplitExecutor {
    params: ChunkParameters,
}

impl ChunkSplitExecutor {
    pub fn new(params: ChunkParameters) -> Self {
        Self { params }
    }
}

/// Pieces of `value`, `size` chars each (the last one may be shorter).
pub fn chunk(value: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = value.chars().collect();
    chars.chunks(size.max(1)).map(|c| c.iter().collect()).collect()
}

impl Executor for ChunkSplitExecutor {
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<(), ExecutorError> {
        if self.params.size == 0 {
            return Err(ExecutorError::InvalidParameters("chunk size must be positive".into()));
        }
        for node in ctx.input() {
            for piece in chunk(&node.value, self.params.size) {
                ctx.derive(node, piece);
            }
        }
        ctx.annotate("size", json!(self.params.size));
        ctx.annotate("chunks", json!(ctx.produced().len()));
        Ok(())
    }
}

/// Splits each value on a separator, trimming pieces and dropping empty ones.
#[derive(Debug, Clone)]
pub struct SeparatorSplitExecutor {
    params: SeparatorParameters,
}

impl SeparatorSplitExecutor {
    pub fn new(params: SeparatorParameters) -> Self {
        Self { params }
    }
}

pub fn split_on(value: &str, separator: &str, keep_separator: bool) -> Vec<String> {
    let pieces: Vec<&str> = if keep_separator {
        value.split_inclusive(separator).collect()
    } else {
        value.split(separator).collect()
    };
    pieces.into_iter()
          .map(str::trim)
          .filter(|p| !p.is_empty() && *p != separator)
          .map(str::to_string)
          .collect()
}

impl Executor for SeparatorSplitExecutor {
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<(), ExecutorError> {
        let sep = &self.params.separator;
        if sep.is_empty() {
            return Err(ExecutorError::InvalidParameters("separator must not be empty".into()));
        }
        for node in ctx.input() {
            for piece in split_on(&node.value, sep, self.params.keep_separator) {
                ctx.derive(node, piece);
            }
        }
        ctx.annotate("pieces", json!(ctx.produced().len()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_respects_char_boundaries() {
        assert_eq!(chunk("héllo wörld", 4), vec!["héll", "o wö", "rld"]);
        assert!(chunk("", 10).is_empty());
        assert_eq!(chunk("abc", 500), vec!["abc"]);
    }

    #[test]
    fn split_trims_and_drops_empty_pieces() {
        assert_eq!(split_on("One. Two.. Three.", ".", false), vec!["One", "Two", "Three"]);
        assert_eq!(split_on("One. Two.. Three.", ".", true), vec!["One.", "Two.", "Three."]);
        assert!(split_on(" . ", ".", false).is_empty());
    }
}
