use grindvakt_config::ConfigError;
use grindvakt_engine::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Scenario replay finished with {0} mismatched verdicts")]
    ReplayMismatch(usize),
}
