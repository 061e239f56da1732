use std::convert::Infallible;

use thiserror::Error;

use crate::rule::ChainId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FirewallError {
    #[error("Chain id (={0}) out of range")]
    InvalidChain(u32),

    #[error("Rule memory exhausted: {chain} chain already holds {limit} rules")]
    OutOfMemory { chain: ChainId, limit: usize },

    #[error("Malformed command: {0}")]
    MalformedCommand(#[from] MalformedCommand),
}

/// Reasons a control write is rejected before any chain is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedCommand {
    #[error("expected a {expected}-byte command, got {actual} bytes")]
    WrongSize { expected: usize, actual: usize },

    #[error("unknown command type {0}")]
    UnknownType(u32),

    #[error("unknown action {0}")]
    UnknownAction(u32),

    #[error("flag `{field}` holds {value}, expected 0 or 1")]
    InvalidFlag { field: &'static str, value: u8 },
}

// Lets typed `ChainId`s flow through the same entry points as raw ids.
impl From<Infallible> for FirewallError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}
