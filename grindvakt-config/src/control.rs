//! Control channel endpoint configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq, Eq)]
pub struct ControlConfig {
    /// Unix socket the engine accepts commands on.
    #[validate(custom(function = validation::validate_socket_path))]
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// How long a connection may take to deliver its command, in milliseconds.
    #[validate(range(min = 1, max = 600_000))]
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/run/grindvakt/control.sock")
}

fn default_read_timeout_ms() -> u64 {
    5_000
}

impl ControlConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}
