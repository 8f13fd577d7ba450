//! `Pipeline`: a loaded configuration bound to a store and the default
//! executors.

use std::path::Path;
use std::sync::Arc;

use log::info;
use synth_adapters::{build_loader, build_saver, CompletionClient, DefaultExecutorFactory, HttpCompletionClient};
use synth_core::{EngineConfig, PipelineEngine, PipelineSpec, RecordStore, RunId, RunReport, StepId};
use synth_domain::Config;
use synth_persistence::{store_from_env, PgRecordStore, PoolProvider};

use crate::error::SynthError;

pub struct Pipeline<S: RecordStore> {
    config: Config,
    spec: PipelineSpec,
    engine: PipelineEngine<S, DefaultExecutorFactory>,
}

impl<S: RecordStore> Pipeline<S> {
    pub fn new(config: Config,
               store: S,
               client: Arc<dyn CompletionClient>,
               engine_config: EngineConfig)
               -> Result<Self, SynthError> {
        config.validate()?;
        let spec = config.to_spec()?;
        let engine = PipelineEngine::builder(store, DefaultExecutorFactory::new(client)).config(engine_config)
                                                                                        .build();
        Ok(Self { config,
                  spec,
                  engine })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn spec(&self) -> &PipelineSpec {
        &self.spec
    }

    pub fn engine(&self) -> &PipelineEngine<S, DefaultExecutorFactory> {
        &self.engine
    }

    pub fn store(&self) -> &S {
        self.engine.store()
    }

    /// Fresh run: load the configured input, execute every step, save.
    pub fn run(&self) -> Result<RunReport, SynthError> {
        let loader = build_loader(&self.config.input)?;
        let saver = build_saver(&self.config.output)?;
        let report = self.engine.execute(&self.spec, loader.as_ref(), saver.as_ref())?;
        info!("run {} finished with {} output records", report.run.id, report.output.len());
        Ok(report)
    }

    /// Re-executes the failed step `step_id` and everything after it.
    pub fn resume_step(&self, step_id: StepId) -> Result<RunReport, SynthError> {
        let saver = build_saver(&self.config.output)?;
        Ok(self.engine.resume_from_step(&self.spec, step_id, saver.as_ref())?)
    }

    /// Resumes `run_id` from its failed step.
    pub fn resume_run(&self, run_id: RunId) -> Result<RunReport, SynthError> {
        let saver = build_saver(&self.config.output)?;
        Ok(self.engine.resume_run(&self.spec, run_id, saver.as_ref())?)
    }
}

impl Pipeline<PgRecordStore<PoolProvider>> {
    /// Postgres store from `DATABASE_URL` and the HTTP completion client
    /// with provider settings read from the environment.
    pub fn from_env(config_path: impl AsRef<Path>, engine_config: EngineConfig) -> Result<Self, SynthError> {
        let config = Config::load(config_path)?;
        let store = store_from_env()?;
        let client = Arc::new(HttpCompletionClient::new()?);
        Self::new(config, store, client, engine_config)
    }
}
