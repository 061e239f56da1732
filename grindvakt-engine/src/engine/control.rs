use grindvakt_prevention::{Command, FirewallError};
use tracing::{debug, warn};

use super::filter_engine::FilterEngine;

/// Write side of the control channel: one encoded command per write.
#[derive(Debug, Clone, Copy)]
pub struct ControlChannel<'a> {
    engine: &'a FilterEngine,
}

impl<'a> ControlChannel<'a> {
    pub(crate) fn new(engine: &'a FilterEngine) -> Self {
        Self { engine }
    }

    /// Decodes and applies one command. Returns the number of bytes consumed.
    ///
    /// A rejected write leaves both chains as they were.
    pub fn write(&self, data: &[u8]) -> Result<usize, FirewallError> {
        self.command_write(data).map(|_| data.len())
    }

    /// Like [`write`](Self::write), returning the applied command.
    pub fn command_write(&self, data: &[u8]) -> Result<Command, FirewallError> {
        match self.apply(data) {
            Ok(command) => {
                debug!(?command, "Control command applied");
                Ok(command)
            }
            Err(err) => {
                warn!(error = %err, len = data.len(), "Control command rejected");
                self.engine.inc_control_rejected();
                Err(err)
            }
        }
    }

    fn apply(&self, data: &[u8]) -> Result<Command, FirewallError> {
        let command = Command::decode(data)?;
        self.engine.command_apply(&command)?;
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use grindvakt_config::GrindvaktConfig;
    use grindvakt_prevention::{Action, ChainId, MalformedCommand, Rule, COMMAND_WIRE_SIZE};

    use super::*;

    fn add_input(rule: Rule) -> Vec<u8> {
        Command::Add {
            chain: ChainId::Input,
            rule,
        }
        .encode()
        .to_vec()
    }

    #[test]
    fn test_write_applies_command() {
        let engine = FilterEngine::new(&GrindvaktConfig::default()).unwrap();
        let wire = add_input(Rule::new(Action::Drop).with_source(Ipv4Addr::new(10, 0, 0, 9)));

        assert_eq!(engine.control().write(&wire), Ok(COMMAND_WIRE_SIZE));
        assert_eq!(engine.firewall().chain(ChainId::Input).len(), 1);
    }

    #[test]
    fn test_wrong_length_leaves_state_unchanged() {
        let engine = FilterEngine::new(&GrindvaktConfig::default()).unwrap();
        let control = engine.control();
        control.write(&add_input(Rule::new(Action::Drop))).unwrap();

        let mut long = add_input(Rule::new(Action::Accept));
        long.push(0);
        assert_eq!(
            control.write(&long),
            Err(MalformedCommand::WrongSize {
                expected: COMMAND_WIRE_SIZE,
                actual: COMMAND_WIRE_SIZE + 1
            }
            .into())
        );
        assert!(control.write(&long[..12]).is_err());

        assert_eq!(
            engine.firewall().chain(ChainId::Input).rules(),
            vec![Rule::new(Action::Drop)]
        );
        assert_eq!(engine.metrics().control_rejected.get(), 2);
    }

    #[test]
    fn test_invalid_chain_is_rejected() {
        let engine = FilterEngine::new(&GrindvaktConfig::default()).unwrap();
        let mut wire = Command::Flush {
            chain: ChainId::Input,
        }
        .encode()
        .to_vec();
        wire[4..8].copy_from_slice(&99u32.to_ne_bytes());

        assert_eq!(
            engine.control().write(&wire),
            Err(FirewallError::InvalidChain(99))
        );
    }
}
