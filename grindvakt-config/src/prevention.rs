//! Rule chain configuration.
//!
//! One section per traffic direction; each fixes the chain's default verdict
//! and its rule budget at startup.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Verdict for packets no rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyAction {
    #[default]
    Accept,
    Drop,
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    #[serde(default)]
    pub default_action: PolicyAction,

    /// Maximum number of rules the chain may hold.
    #[validate(range(min = 1, max = 1_000_000))]
    #[serde(default = "default_max_rules")]
    pub max_rules: usize,
}

fn default_max_rules() -> usize {
    10_000
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            default_action: PolicyAction::default(),
            max_rules: default_max_rules(),
        }
    }
}

#[derive(Default, Debug, Serialize, Deserialize, Validate, Clone, PartialEq, Eq)]
pub struct PreventionConfig {
    /// Chain consulted for packets addressed to this host.
    #[validate(nested)]
    #[serde(default)]
    pub input: ChainConfig,

    /// Chain consulted for locally generated packets.
    #[validate(nested)]
    #[serde(default)]
    pub output: ChainConfig,
}
