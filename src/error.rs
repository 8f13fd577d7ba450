use synth_adapters::LlmError;
use synth_core::{CoreEngineError, LineageError, StoreError};
use synth_domain::ConfigError;
use synth_persistence::PersistenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SynthError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Engine(#[from] CoreEngineError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Lineage(#[from] LineageError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("completion client: {0}")]
    Client(#[from] LlmError),
}

impl SynthError {
    /// True when the request was refused before anything was written:
    /// a resume guard fired or the target does not exist.
    pub fn is_rejection(&self) -> bool {
        match self {
            SynthError::Engine(e) => {
                e.is_rejection() || matches!(e, CoreEngineError::Storage(StoreError::NotFound { .. }))
            }
            SynthError::Store(StoreError::NotFound { .. })
            | SynthError::Lineage(LineageError::Storage(StoreError::NotFound { .. })) => true,
            _ => false,
        }
    }

    /// Invalid configuration, detected before any Run exists.
    pub fn is_config(&self) -> bool {
        match self {
            SynthError::Config(_) | SynthError::Persistence(PersistenceError::Config(_)) => true,
            SynthError::Engine(e) => {
                matches!(e,
                         CoreEngineError::UnknownExecutor { .. } | CoreEngineError::InvalidDescriptor { .. })
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn classifies_rejections_and_config_errors() {
        let guard = SynthError::from(CoreEngineError::ConfigMismatch { run_id: Uuid::new_v4() });
        assert!(guard.is_rejection());
        assert!(!guard.is_config());

        let missing = SynthError::from(StoreError::NotFound { entity: "run",
                                                              id: Uuid::new_v4() });
        assert!(missing.is_rejection());

        let unknown = SynthError::from(CoreEngineError::UnknownExecutor { step_type: "x".into(),
                                                                          method: "y".into() });
        assert!(unknown.is_config());
        assert!(!unknown.is_rejection());

        let backend = SynthError::from(StoreError::Backend("down".into()));
        assert!(!backend.is_rejection() && !backend.is_config());
    }
}
