//! ## grindvakt-engine::scenario
//! **Offline replay of rule changes and packets**
//!
//! A scenario is a YAML list of steps run in order against one engine:
//!
//! ```yaml
//! steps:
//!   - add:
//!       chain: input
//!       rule: { source: 10.0.0.2, protocol: tcp, destination_port: 23, action: drop }
//!   - packet: { chain: input, hex: "4500...", expect: drop }
//!   - flush: input
//! ```

use std::fmt;
use std::path::Path;

use grindvakt_prevention::{Action, ChainId, Rule};
use serde::Deserialize;
use tracing::{info, warn};

use super::error::EngineError;
use super::filter_engine::{FilterEngine, Verdict};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Add {
        chain: ChainId,
        rule: Rule,
    },
    Flush(ChainId),
    Packet {
        chain: ChainId,
        /// Raw IPv4 datagram; whitespace is ignored.
        hex: String,
        #[serde(default)]
        expect: Option<Action>,
    },
}

/// A packet whose verdict differed from the expected one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub step: usize,
    pub chain: ChainId,
    pub expected: Verdict,
    pub actual: Verdict,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub packets: usize,
    pub accepted: usize,
    pub dropped: usize,
    pub rules_added: usize,
    pub flushes: usize,
    /// Commands the engine refused, e.g. because a chain was full.
    pub commands_rejected: usize,
    pub mismatches: Vec<Mismatch>,
}

impl ReplayReport {
    pub fn is_success(&self) -> bool {
        self.mismatches.is_empty()
    }
}

impl fmt::Display for ReplayReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} packets ({} accepted, {} dropped), {} rules added, {} flushes, {} rejected",
            self.packets,
            self.accepted,
            self.dropped,
            self.rules_added,
            self.flushes,
            self.commands_rejected
        )?;
        for m in &self.mismatches {
            writeln!(
                f,
                "  step {}: {} chain expected {}, got {}",
                m.step, m.chain, m.expected, m.actual
            )?;
        }
        Ok(())
    }
}

impl Scenario {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, EngineError> {
        serde_yaml::from_str(yaml).map_err(|err| EngineError::Scenario(err.to_string()))
    }

    /// Runs every step against `engine` and collects the verdicts.
    ///
    /// Refused rule changes are counted and replay continues; malformed
    /// packet hex aborts the replay.
    pub fn replay(&self, engine: &FilterEngine) -> Result<ReplayReport, EngineError> {
        let mut report = ReplayReport::default();

        for (index, step) in self.steps.iter().enumerate() {
            let step_no = index + 1;
            match step {
                Step::Add { chain, rule } => match engine.rule_add(*chain, *rule) {
                    Ok(()) => report.rules_added += 1,
                    Err(err) => {
                        warn!(step = step_no, error = %err, "Scenario rule refused");
                        report.commands_rejected += 1;
                    }
                },
                Step::Flush(chain) => {
                    engine.chain_flush(*chain)?;
                    report.flushes += 1;
                }
                Step::Packet { chain, hex: text, expect } => {
                    let datagram = decode_hex(text).map_err(|err| {
                        EngineError::Scenario(format!("step {step_no}: invalid hex: {err}"))
                    })?;
                    let verdict = engine.packet_verdict(*chain, &datagram);

                    report.packets += 1;
                    match verdict {
                        Verdict::Accept => report.accepted += 1,
                        Verdict::Drop => report.dropped += 1,
                    }
                    if let Some(expected) = expect.map(Verdict::from) {
                        if expected != verdict {
                            report.mismatches.push(Mismatch {
                                step: step_no,
                                chain: *chain,
                                expected,
                                actual: verdict,
                            });
                        }
                    }
                }
            }
        }

        info!(
            scenario = self.name.as_deref().unwrap_or("unnamed"),
            packets = report.packets,
            mismatches = report.mismatches.len(),
            "Scenario replayed"
        );
        Ok(report)
    }
}

fn decode_hex(text: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(compact)
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use grindvakt_config::GrindvaktConfig;
    use grindvakt_protocols::ip_protocol;

    use super::*;

    const SCENARIO: &str = r#"
name: telnet block
steps:
  - packet:
      chain: input
      hex: "45000028000140004006 66cc0a0000020a000001 9c400017000000000000 000050022000917c0000"
      expect: accept
  - add:
      chain: input
      rule: { source: 10.0.0.2, protocol: tcp, destination_port: 23, action: drop }
  - packet:
      chain: input
      hex: "45000028000140004006 66cc0a0000020a000001 9c400017000000000000 000050022000917c0000"
      expect: drop
  - packet:
      chain: output
      hex: "45000028000140004006 66cc0a0000020a000001 9c400017000000000000 000050022000917c0000"
      expect: drop
  - flush: input
  - packet:
      chain: input
      hex: "45000028000140004006 66cc0a0000020a000001 9c400017000000000000 000050022000917c0000"
"#;

    fn engine() -> FilterEngine {
        FilterEngine::new(&GrindvaktConfig::default()).unwrap()
    }

    #[test]
    fn test_parse_steps() {
        let scenario = Scenario::from_yaml_str(SCENARIO).unwrap();
        assert_eq!(scenario.name.as_deref(), Some("telnet block"));
        assert_eq!(scenario.steps.len(), 6);
        assert_eq!(
            scenario.steps[1],
            Step::Add {
                chain: ChainId::Input,
                rule: Rule::new(Action::Drop)
                    .with_source(Ipv4Addr::new(10, 0, 0, 2))
                    .with_protocol(ip_protocol::TCP)
                    .with_destination_port(23),
            }
        );
        assert_eq!(scenario.steps[4], Step::Flush(ChainId::Input));
    }

    #[test]
    fn test_replay_reports_mismatches() {
        let scenario = Scenario::from_yaml_str(SCENARIO).unwrap();
        let report = scenario.replay(&engine()).unwrap();

        assert_eq!(report.packets, 4);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.accepted, 3);
        assert_eq!(report.rules_added, 1);
        assert_eq!(report.flushes, 1);
        // The output chain has no rule, so the third packet is accepted.
        assert_eq!(
            report.mismatches,
            vec![Mismatch {
                step: 4,
                chain: ChainId::Output,
                expected: Verdict::Drop,
                actual: Verdict::Accept,
            }]
        );
        assert!(!report.is_success());
        assert!(report
            .to_string()
            .contains("step 4: output chain expected drop, got accept"));
    }

    #[test]
    fn test_invalid_hex() {
        let scenario =
            Scenario::from_yaml_str("steps:\n  - packet: { chain: input, hex: \"45zz\" }\n")
                .unwrap();
        let err = scenario.replay(&engine()).unwrap_err();
        assert!(matches!(err, EngineError::Scenario(msg) if msg.contains("step 1")));
    }

    #[test]
    fn test_unknown_protocol_name() {
        let err = Scenario::from_yaml_str(
            "steps:\n  - add: { chain: input, rule: { protocol: sctp, action: drop } }\n",
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Scenario(msg) if msg.contains("sctp")));
    }

    #[test]
    fn test_full_chain_is_counted() {
        let mut config = GrindvaktConfig::default();
        config.prevention.input.max_rules = 1;
        let engine = FilterEngine::new(&config).unwrap();
        let scenario = Scenario::from_yaml_str(
            "steps:\n  - add: { chain: input, rule: { action: drop } }\n  - add: { chain: input, rule: { action: accept } }\n",
        )
        .unwrap();

        let report = scenario.replay(&engine).unwrap();
        assert_eq!(report.rules_added, 1);
        assert_eq!(report.commands_rejected, 1);
    }
}
