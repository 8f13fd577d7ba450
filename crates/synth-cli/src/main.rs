mod cli;

use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use log::error;
use synth_core::lineage::verify_forest;
use synth_core::{EngineConfig, LineageTracker, RecordStore, RunReport};
use synthflow::{Pipeline, SynthError};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cli::{Cli, Command, ResumeArgs, RunArgs};

const EXIT_CONFIG: u8 = 2;
const EXIT_REJECTED: u8 = 4;
const EXIT_FAILED: u8 = 5;

fn main() -> ExitCode {
    synth_persistence::init_dotenv();
    let cli = Cli::parse();

    // RUST_LOG > --log-level
    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr))
                                  .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
                                  .init();

    match dispatch(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("synth: {e}");
            ExitCode::from(exit_code(&e))
        }
    }
}

fn exit_code(e: &SynthError) -> u8 {
    if e.is_config() {
        EXIT_CONFIG
    } else if e.is_rejection() {
        EXIT_REJECTED
    } else {
        EXIT_FAILED
    }
}

fn dispatch(command: Command) -> Result<(), SynthError> {
    match command {
        Command::Run(args) => run(args),
        Command::Resume(args) => resume(args),
        Command::Runs => list_runs(),
        Command::Show { run } => show(run),
        Command::Trace { node } => trace(node),
    }
}

fn run(args: RunArgs) -> Result<(), SynthError> {
    let pipeline = Pipeline::from_env(&args.config, EngineConfig { debug: args.debug })?;
    report(&pipeline.run()?);
    Ok(())
}

fn resume(args: ResumeArgs) -> Result<(), SynthError> {
    let pipeline = Pipeline::from_env(&args.config, EngineConfig { debug: args.debug })?;
    let result = match (args.step, args.run) {
        (Some(step), _) => pipeline.resume_step(step)?,
        (None, Some(run)) => pipeline.resume_run(run)?,
        (None, None) => Cli::command().error(ErrorKind::MissingRequiredArgument, "one of --step or --run is required")
                                      .exit(),
    };
    report(&result);
    Ok(())
}

fn report(report: &RunReport) {
    println!("run {} {}", report.run.id, report.run.status);
    for step in &report.steps {
        println!("  {:>3} {:<24} {}", step.position, step.label(), step.status);
    }
    println!("{} output records", report.output.len());
}

fn list_runs() -> Result<(), SynthError> {
    let store = synth_persistence::store_from_env()?;
    for run in store.list_runs()? {
        println!("{}  {:<8}  {}  {}",
                 run.id,
                 run.status,
                 run.created_at.to_rfc3339(),
                 &run.config_hash[..12.min(run.config_hash.len())]);
    }
    Ok(())
}

fn show(run_id: uuid::Uuid) -> Result<(), SynthError> {
    let store = synth_persistence::store_from_env()?;
    let run = store.get_run(run_id)?;
    println!("run {} {} (config {})", run.id, run.status, run.config_hash);
    for step in store.list_steps(run_id)? {
        let finished = step.finished_at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".into());
        println!("  {:>3} {}  {:<24} {:<8} started {}  finished {}",
                 step.position,
                 step.id,
                 step.label(),
                 step.status,
                 step.run_at.to_rfc3339(),
                 finished);
        if let Some(meta) = &step.metadata {
            println!("      {}", serde_json::to_string(meta).unwrap_or_default());
        }
    }
    Ok(())
}

fn trace(node_id: uuid::Uuid) -> Result<(), SynthError> {
    let store = synth_persistence::store_from_env()?;
    let chain = LineageTracker::new(&store).ancestry(node_id)?;
    verify_forest(&chain)?;
    for (depth, node) in chain.iter().enumerate() {
        println!("{:indent$}{} {:?}", "", node.id, node.value, indent = depth * 2);
    }
    Ok(())
}
