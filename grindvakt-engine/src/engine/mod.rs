mod control;
mod error;
mod filter_engine;
pub mod scenario;

pub use self::{
    control::ControlChannel,
    error::EngineError,
    filter_engine::{FilterEngine, Verdict},
    scenario::{Mismatch, ReplayReport, Scenario, Step},
};

pub mod prelude {
    pub use super::{ControlChannel, EngineError, FilterEngine, Verdict};
}
