//! synthflow
//!
//! Configuration-driven text-record pipelines (split, generate, ablate) with
//! durable lineage and resume-from-failure.
//!
//! The root crate is a facade over the workspace:
//! - `synth_core`: records, store contract, lineage and the engine.
//! - `synth_domain`: the YAML configuration model.
//! - `synth_adapters`: executors, completion client and CSV I/O.
//! - `synth_persistence`: the Postgres store.
//!
//! `Pipeline` wires them together for the common case.

pub mod error;
pub mod pipeline;

pub use error::SynthError;
pub use pipeline::Pipeline;

pub use synth_adapters;
pub use synth_core;
pub use synth_domain;
pub use synth_persistence;
