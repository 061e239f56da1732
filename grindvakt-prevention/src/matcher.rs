//! ## grindvakt-prevention::matcher
//! **Field-by-field rule evaluation**
//!
//! Present filters are combined with a logical AND; the first one that
//! disagrees with the packet ends the evaluation. Filters that only make
//! sense for one protocol (ICMP type, ports) are inert for the others.
//!
//! Protocols other than ICMP, TCP and UDP cannot be filtered: a rule with
//! any filter never matches them, so they fall through to the chain default.
//! A rule with no filter at all matches every packet.

use grindvakt_protocols::{ip_protocol, PacketHeaders};

use crate::rule::{Action, Rule};

/// Returns the rule's action when it matches `packet`, `None` otherwise.
#[inline]
pub fn rule_match<P: PacketHeaders + ?Sized>(rule: &Rule, packet: &P) -> Option<Action> {
    if rule.is_unconditional() {
        return Some(rule.action);
    }

    if rule.source.is_some_and(|addr| addr != packet.source()) {
        return None;
    }
    if rule
        .destination
        .is_some_and(|addr| addr != packet.destination())
    {
        return None;
    }
    if rule.protocol.is_some_and(|proto| proto != packet.protocol()) {
        return None;
    }

    match packet.protocol() {
        ip_protocol::ICMP => {
            if !filter_agrees(rule.icmp_type, packet.icmp_type()) {
                return None;
            }
        }
        ip_protocol::TCP | ip_protocol::UDP => {
            if !filter_agrees(rule.source_port, packet.source_port())
                || !filter_agrees(rule.destination_port, packet.destination_port())
            {
                return None;
            }
        }
        _ => return None,
    }

    Some(rule.action)
}

/// An absent filter always agrees; a present one needs the field to be
/// readable and equal.
#[inline]
fn filter_agrees<T: PartialEq>(filter: Option<T>, field: Option<T>) -> bool {
    match filter {
        None => true,
        Some(expected) => field == Some(expected),
    }
}
