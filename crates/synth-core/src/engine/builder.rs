use super::{EngineConfig, PipelineEngine};
use crate::executor::ExecutorFactory;
use crate::store::RecordStore;

/// Builder for `PipelineEngine`.
///
/// ```ignore
/// let engine = PipelineEngine::builder(store, factory).debug(true).build();
/// ```
pub struct EngineBuilder<S, F>
    where S: RecordStore,
          F: ExecutorFactory
{
    store: S,
    factory: F,
    config: EngineConfig,
}

impl<S, F> EngineBuilder<S, F>
    where S: RecordStore,
          F: ExecutorFactory
{
    pub fn new(store: S, factory: F) -> Self {
        Self { store,
               factory,
               config: EngineConfig::default() }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    pub fn build(self) -> PipelineEngine<S, F> {
        PipelineEngine::new(self.store, self.factory, self.config)
    }
}
