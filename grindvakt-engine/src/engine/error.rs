use grindvakt_config::ConfigError;
use grindvakt_prevention::FirewallError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Firewall(#[from] FirewallError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// The engine refused a command sent over the control socket.
    #[error("Command rejected: {0}")]
    Rejected(String),

    #[error("Malformed control reply: {0}")]
    Protocol(String),

    #[error("Scenario error: {0}")]
    Scenario(String),
}
