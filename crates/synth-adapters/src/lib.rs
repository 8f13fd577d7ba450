//! synth-adapters: concrete executors and collaborators.
//!
//! - `steps`: split (chunk, separator), LLM generation and LLM binary judge.
//! - `llm`: the `CompletionClient` seam and its HTTP implementation.
//! - `io`: CSV/inline loaders and the CSV saver, built from a `Config`.
//! - `DefaultExecutorFactory`: maps every configured step to its executor.

pub mod factory;
pub mod io;
pub mod llm;
pub mod prompt;
pub mod steps;

pub use factory::DefaultExecutorFactory;
pub use io::{build_loader, build_saver, CsvInputLoader, CsvOutputSaver, InlineInputLoader};
pub use llm::{CompletionClient, CompletionRequest, HttpCompletionClient, LlmError, ProviderSettings};
