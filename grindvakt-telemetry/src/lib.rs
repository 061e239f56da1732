//! # Grindvakt Telemetry
//!
//! Logging setup, structured audit events and the Prometheus metrics the
//! filter engine exports.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;
