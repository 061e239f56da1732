//! ## grindvakt-prevention::command
//! The 40-byte control command record shared with the control client.
//!
//! Layout follows C struct rules with 4-byte alignment. The command type,
//! chain id and action are native-endian 32-bit integers. Addresses and ports
//! are in network byte order. Padding is zero on encode and ignored on decode.
//!
//! ```text
//!  0  type        4  chain_id
//!  8  filter_saddr          12 ip_saddr
//! 16  filter_daddr          20 ip_daddr
//! 24  filter_proto  25 ip_protocol  26 filter_icmp_type  27 icmp_type
//! 28  filter_sport          30 transport_sport
//! 32  filter_dport          34 transport_dport
//! 36  action
//! ```

use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FirewallError, MalformedCommand};
use crate::rule::{Action, ChainId, Rule};

/// Size in bytes of one encoded command.
pub const COMMAND_WIRE_SIZE: usize = 40;

const CMD_ADD: u32 = 0;
const CMD_FLUSH: u32 = 1;

const ACTION_ACCEPT: u32 = 0;
const ACTION_DROP: u32 = 1;

const RULE_WIRE_SIZE: usize = COMMAND_WIRE_SIZE - 8;

/// A chain mutation requested over the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Add { chain: ChainId, rule: Rule },
    Flush { chain: ChainId },
}

impl Command {
    pub fn chain(&self) -> ChainId {
        match self {
            Command::Add { chain, .. } | Command::Flush { chain } => *chain,
        }
    }

    /// Decodes exactly one command. Any other length is rejected as a whole.
    pub fn decode(data: &[u8]) -> Result<Self, FirewallError> {
        if data.len() != COMMAND_WIRE_SIZE {
            return Err(MalformedCommand::WrongSize {
                expected: COMMAND_WIRE_SIZE,
                actual: data.len(),
            }
            .into());
        }

        let mut buf = data;
        let kind = buf.get_u32_ne();
        let raw_chain = buf.get_u32_ne();

        match kind {
            CMD_ADD => {
                let chain = ChainId::try_from(raw_chain)?;
                let rule = decode_rule(&mut buf)?;
                Ok(Command::Add { chain, rule })
            }
            CMD_FLUSH => {
                let chain = ChainId::try_from(raw_chain)?;
                Ok(Command::Flush { chain })
            }
            other => Err(MalformedCommand::UnknownType(other).into()),
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(COMMAND_WIRE_SIZE);
        self.encode_into(&mut buf);
        buf.freeze()
    }

    pub fn encode_into<B: BufMut>(&self, buf: &mut B) {
        match self {
            Command::Add { chain, rule } => {
                buf.put_u32_ne(CMD_ADD);
                buf.put_u32_ne(u32::from(*chain));
                encode_rule(rule, buf);
            }
            Command::Flush { chain } => {
                buf.put_u32_ne(CMD_FLUSH);
                buf.put_u32_ne(u32::from(*chain));
                buf.put_bytes(0, RULE_WIRE_SIZE);
            }
        }
    }
}

fn decode_rule(buf: &mut &[u8]) -> Result<Rule, FirewallError> {
    let filter_saddr = get_flag(buf, "filter_saddr")?;
    buf.advance(3);
    let saddr = Ipv4Addr::from(buf.get_u32());

    let filter_daddr = get_flag(buf, "filter_daddr")?;
    buf.advance(3);
    let daddr = Ipv4Addr::from(buf.get_u32());

    let filter_proto = get_flag(buf, "filter_proto")?;
    let protocol = buf.get_u8();
    let filter_icmp_type = get_flag(buf, "filter_icmp_type")?;
    let icmp_type = buf.get_u8();

    let filter_sport = get_flag(buf, "filter_sport")?;
    buf.advance(1);
    let sport = buf.get_u16();

    let filter_dport = get_flag(buf, "filter_dport")?;
    buf.advance(1);
    let dport = buf.get_u16();

    let action = match buf.get_u32_ne() {
        ACTION_ACCEPT => Action::Accept,
        ACTION_DROP => Action::Drop,
        other => return Err(MalformedCommand::UnknownAction(other).into()),
    };

    Ok(Rule {
        source: filter_saddr.then_some(saddr),
        destination: filter_daddr.then_some(daddr),
        protocol: filter_proto.then_some(protocol),
        icmp_type: filter_icmp_type.then_some(icmp_type),
        source_port: filter_sport.then_some(sport),
        destination_port: filter_dport.then_some(dport),
        action,
    })
}

fn encode_rule<B: BufMut>(rule: &Rule, buf: &mut B) {
    buf.put_u8(u8::from(rule.source.is_some()));
    buf.put_bytes(0, 3);
    buf.put_u32(rule.source.map_or(0, u32::from));

    buf.put_u8(u8::from(rule.destination.is_some()));
    buf.put_bytes(0, 3);
    buf.put_u32(rule.destination.map_or(0, u32::from));

    buf.put_u8(u8::from(rule.protocol.is_some()));
    buf.put_u8(rule.protocol.unwrap_or(0));
    buf.put_u8(u8::from(rule.icmp_type.is_some()));
    buf.put_u8(rule.icmp_type.unwrap_or(0));

    buf.put_u8(u8::from(rule.source_port.is_some()));
    buf.put_u8(0);
    buf.put_u16(rule.source_port.unwrap_or(0));

    buf.put_u8(u8::from(rule.destination_port.is_some()));
    buf.put_u8(0);
    buf.put_u16(rule.destination_port.unwrap_or(0));

    buf.put_u32_ne(match rule.action {
        Action::Accept => ACTION_ACCEPT,
        Action::Drop => ACTION_DROP,
    });
}

fn get_flag(buf: &mut &[u8], field: &'static str) -> Result<bool, MalformedCommand> {
    match buf.get_u8() {
        0 => Ok(false),
        1 => Ok(true),
        value => Err(MalformedCommand::InvalidFlag { field, value }),
    }
}
