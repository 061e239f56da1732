//! ## grindvakt-prevention::firewall
//! **Input and output chains behind one handle**
//!
//! ### Expectations:
//! - Chain ids are validated before any storage is touched
//! - Packet-path lookups never fail: a bad chain id resolves to accept
//! - No lock spans both chains
//!
//! Every entry point accepts either a [`ChainId`] or a raw `u32` id as it
//! arrives from the wire or a packet hook.

use grindvakt_protocols::PacketHeaders;
use tracing::{info, warn};

use crate::chain::{Chain, ChainPolicy};
use crate::command::Command;
use crate::error::FirewallError;
use crate::rule::{Action, ChainId, Rule};

#[derive(Debug)]
pub struct Firewall {
    input: Chain,
    output: Chain,
}

impl Default for Firewall {
    fn default() -> Self {
        Self::new()
    }
}

impl Firewall {
    /// Both chains empty, accepting by default.
    pub fn new() -> Self {
        Self::with_policies(ChainPolicy::default(), ChainPolicy::default())
    }

    pub fn with_policies(input: ChainPolicy, output: ChainPolicy) -> Self {
        Self {
            input: Chain::new(ChainId::Input, input),
            output: Chain::new(ChainId::Output, output),
        }
    }

    pub fn chain(&self, id: ChainId) -> &Chain {
        match id {
            ChainId::Input => &self.input,
            ChainId::Output => &self.output,
        }
    }

    pub fn rule_add<C>(&self, chain: C, rule: Rule) -> Result<(), FirewallError>
    where
        C: TryInto<ChainId>,
        FirewallError: From<C::Error>,
    {
        let id = chain.try_into()?;
        self.chain(id).rule_add(rule)
    }

    /// Returns the number of rules removed.
    pub fn chain_flush<C>(&self, chain: C) -> Result<usize, FirewallError>
    where
        C: TryInto<ChainId>,
        FirewallError: From<C::Error>,
    {
        let id = chain.try_into()?;
        Ok(self.chain(id).flush())
    }

    /// Resolves a chain id on the packet path.
    ///
    /// An id outside the known chains is a caller bug; it is logged and
    /// `None` is returned so the caller can accept the packet.
    pub fn packet_chain<C>(&self, chain: C) -> Option<ChainId>
    where
        C: TryInto<ChainId>,
        FirewallError: From<C::Error>,
    {
        match chain.try_into() {
            Ok(id) => Some(id),
            Err(err) => {
                let err = FirewallError::from(err);
                warn!(error = %err, "Traversal of unknown chain, accepting packet");
                None
            }
        }
    }

    /// Verdict of the addressed chain for `packet`. Unknown chains accept.
    #[inline]
    pub fn chain_traverse<C, P>(&self, chain: C, packet: &P) -> Action
    where
        C: TryInto<ChainId>,
        FirewallError: From<C::Error>,
        P: PacketHeaders + ?Sized,
    {
        match self.packet_chain(chain) {
            Some(id) => self.chain(id).traverse(packet),
            None => Action::Accept,
        }
    }

    pub fn command_execute(&self, command: &Command) -> Result<(), FirewallError> {
        match *command {
            Command::Add { chain, rule } => self.rule_add(chain, rule),
            Command::Flush { chain } => self.chain_flush(chain).map(|_| ()),
        }
    }

    /// Flushes both chains, input first.
    pub fn flush_all(&self) -> usize {
        ChainId::ALL
            .into_iter()
            .map(|id| {
                let removed = self.chain(id).flush();
                info!(chain = %id, removed, "Chain flushed on teardown");
                removed
            })
            .sum()
    }
}
