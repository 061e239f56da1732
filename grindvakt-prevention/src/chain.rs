//! One direction's rule chain: the rule store, the first-match traversal
//! over it, and the action used when no rule matches.

use grindvakt_protocols::PacketHeaders;
use tracing::debug;

use crate::error::FirewallError;
use crate::matcher;
use crate::rule::{Action, ChainId, Rule};
use crate::store::RuleStore;

pub const DEFAULT_MAX_RULES: usize = 10_000;

/// Per-chain settings fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainPolicy {
    /// Verdict for packets no rule matches.
    pub default_action: Action,
    /// Upper bound on the number of rules the chain holds.
    pub max_rules: usize,
}

impl Default for ChainPolicy {
    fn default() -> Self {
        Self {
            default_action: Action::Accept,
            max_rules: DEFAULT_MAX_RULES,
        }
    }
}

#[derive(Debug)]
pub struct Chain {
    id: ChainId,
    store: RuleStore,
    default_action: Action,
}

impl Chain {
    pub fn new(id: ChainId, policy: ChainPolicy) -> Self {
        Self {
            id,
            store: RuleStore::new(id, policy.max_rules),
            default_action: policy.default_action,
        }
    }

    pub fn id(&self) -> ChainId {
        self.id
    }

    pub fn default_action(&self) -> Action {
        self.default_action
    }

    /// Appends `rule` after every rule already in the chain.
    pub fn rule_add(&self, rule: Rule) -> Result<(), FirewallError> {
        let position = self.store.rule_append(rule)?;
        debug!(chain = %self.id, position, ?rule, "Rule appended");
        Ok(())
    }

    /// Removes every rule. Returns how many were removed.
    pub fn flush(&self) -> usize {
        let removed = self.store.flush();
        debug!(chain = %self.id, removed, "Chain flushed");
        removed
    }

    /// Action of the first rule matching `packet`, or the default action.
    #[inline]
    pub fn traverse<P: PacketHeaders + ?Sized>(&self, packet: &P) -> Action {
        self.store
            .find_map(|rule| matcher::rule_match(rule, packet))
            .unwrap_or(self.default_action)
    }

    /// Rules currently in the chain, in evaluation order.
    pub fn rules(&self) -> Vec<Rule> {
        self.store.snapshot()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn max_rules(&self) -> usize {
        self.store.capacity()
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use grindvakt_protocols::{ip_protocol, HeaderFields};

    use super::*;

    const HOST_A: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
    const HOST_B: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

    #[test]
    fn test_first_match_wins() {
        let chain = Chain::new(ChainId::Input, ChainPolicy::default());
        let packet = HeaderFields::tcp(HOST_B, 40000, HOST_A, 23);

        // No match, then two matches with different actions.
        chain.rule_add(Rule::new(Action::Drop).with_destination_port(22)).unwrap();
        chain.rule_add(Rule::new(Action::Drop).with_destination_port(23)).unwrap();
        chain.rule_add(Rule::new(Action::Accept).with_source(HOST_B)).unwrap();

        assert_eq!(chain.traverse(&packet), Action::Drop);
    }

    #[test]
    fn test_empty_chain_returns_default() {
        let chain = Chain::new(ChainId::Output, ChainPolicy::default());
        let packet = HeaderFields::icmp(HOST_A, HOST_B, 8);
        assert_eq!(chain.traverse(&packet), Action::Accept);

        chain.rule_add(Rule::new(Action::Drop)).unwrap();
        assert_eq!(chain.traverse(&packet), Action::Drop);

        chain.flush();
        assert_eq!(chain.traverse(&packet), Action::Accept);
    }

    #[test]
    fn test_configured_default_action() {
        let policy = ChainPolicy {
            default_action: Action::Drop,
            max_rules: 4,
        };
        let chain = Chain::new(ChainId::Input, policy);
        let dns = HeaderFields::udp(HOST_A, 33000, HOST_B, 53);
        assert_eq!(chain.traverse(&dns), Action::Drop);

        chain
            .rule_add(
                Rule::new(Action::Accept)
                    .with_protocol(ip_protocol::UDP)
                    .with_destination_port(53),
            )
            .unwrap();
        assert_eq!(chain.traverse(&dns), Action::Accept);
        assert_eq!(chain.max_rules(), 4);
    }

    #[test]
    fn test_unsupported_protocol_falls_through() {
        let chain = Chain::new(ChainId::Input, ChainPolicy::default());
        chain.rule_add(Rule::new(Action::Drop).with_source(HOST_A)).unwrap();
        let gre = HeaderFields::other(47, HOST_A, HOST_B);
        assert_eq!(chain.traverse(&gre), Action::Accept);
    }

    #[test]
    fn test_rules_lists_in_order() {
        let chain = Chain::new(ChainId::Input, ChainPolicy::default());
        let first = Rule::new(Action::Drop).with_icmp_type(8);
        let second = Rule::new(Action::Accept);
        chain.rule_add(first).unwrap();
        chain.rule_add(second).unwrap();
        assert_eq!(chain.rules(), vec![first, second]);
        assert_eq!(chain.len(), 2);
    }
}
