//! # Grindvakt Engine
//!
//! Owns both rule chains and exposes them to the outside world:
//! - packet hooks returning a verdict for raw IPv4 datagrams
//! - the control channel applying encoded commands
//! - a Unix socket endpoint and client for that channel
//! - offline replay of YAML scenarios

pub mod engine;
pub mod runtime;

pub use engine::{
    ControlChannel, EngineError, FilterEngine, ReplayReport, Scenario, Step, Verdict,
};
pub use runtime::{control_send, run_service, serve_control};
