//! Command-line definitions for `synth`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "synth")]
#[command(about = "Run and resume text-record pipelines with durable lineage")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a pipeline configuration as a new run.
    Run(RunArgs),
    /// Resume a failed run from its errored step.
    Resume(ResumeArgs),
    /// List stored runs.
    Runs,
    /// Show the steps of a run.
    Show {
        #[arg(long)]
        run: Uuid,
    },
    /// Print the ancestry of a node, newest first.
    Trace {
        #[arg(long)]
        node: Uuid,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Pipeline configuration (YAML).
    #[arg(short, long)]
    pub config: PathBuf,

    /// Log step parameters and node counts.
    #[arg(long, env = "SYNTH_DEBUG")]
    pub debug: bool,
}

#[derive(Args, Debug)]
#[command(group(clap::ArgGroup::new("target").required(true).args(["step", "run"])))]
pub struct ResumeArgs {
    /// Configuration the run was started with.
    #[arg(short, long)]
    pub config: PathBuf,

    /// Id of the errored step to resume from.
    #[arg(long)]
    pub step: Option<Uuid>,

    /// Id of the run; resumes from its errored step.
    #[arg(long)]
    pub run: Option<Uuid>,

    #[arg(long, env = "SYNTH_DEBUG")]
    pub debug: bool,
}
