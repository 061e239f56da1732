//! # Grindvakt Configuration
//!
//! Layered configuration for the packet filter engine: chain policies, the
//! control socket location and logging defaults.
//!
//! ## Sources, lowest precedence first
//! 1. Built-in defaults
//! 2. `config/grindvakt.yaml`
//! 3. `config/<GRINDVAKT_ENV>.yaml` (`production` when unset)
//! 4. `GRINDVAKT_*` environment variables, `__` separating nested keys

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod control;
mod error;
mod prevention;
mod telemetry;
mod validation;

pub use control::ControlConfig;
pub use error::ConfigError;
pub use prevention::{ChainConfig, PolicyAction, PreventionConfig};
pub use telemetry::TelemetryConfig;
pub use validation::LOG_LEVELS;

const BASE_FILE: &str = "config/grindvakt.yaml";
const ENV_PREFIX: &str = "GRINDVAKT_";

#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone, PartialEq, Eq)]
pub struct GrindvaktConfig {
    /// Default action and rule budget of each chain.
    #[validate(nested)]
    #[serde(default)]
    pub prevention: PreventionConfig,

    #[validate(nested)]
    #[serde(default)]
    pub control: ControlConfig,

    #[validate(nested)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl GrindvaktConfig {
    /// Load configuration from the default files and the environment.
    /// Missing files are skipped.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(GrindvaktConfig::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        }

        let env = std::env::var("GRINDVAKT_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{env}.yaml");
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract(figment)
    }

    /// Load configuration from one specific file, still honouring
    /// environment overrides.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let figment =
            Figment::from(Serialized::defaults(GrindvaktConfig::default())).merge(Yaml::file(path));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }
}
