//! ## grindvakt-telemetry::logging
//! **Subscriber setup and structured audit events**
//!
//! `RUST_LOG` wins over the configured level when it is set.

use opentelemetry::KeyValue;
use tracing::{info_span, Instrument};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global fmt subscriber. Later calls are no-ops.
    pub fn init(level: &str) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        let _ = fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .with_span_events(FmtSpan::ENTER)
            .try_init();
    }

    /// Records one control-plane event with its attributes.
    #[inline]
    pub async fn log_event(event_type: &str, metadata: Vec<KeyValue>) {
        let span = info_span!(
            "control_event",
            event_type = event_type,
            otel.kind = "INTERNAL"
        );

        async {
            let attributes: Vec<String> = metadata
                .iter()
                .map(|kv| format!("{}={}", kv.key, kv.value))
                .collect();
            tracing::info!(attributes = %attributes.join(" "), "Control event");
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_log_event() {
        tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(EventLogger::log_event(
                "rule_add",
                vec![
                    KeyValue::new("chain", "input"),
                    KeyValue::new("action", "drop"),
                ],
            ));
        assert!(logs_contain("Control event"));
        assert!(logs_contain("chain=input action=drop"));
    }
}
