//! Rule descriptors and the closed set of chains they are appended to.

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::error::FirewallError;

/// Verdict a rule or chain hands back for a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Accept,
    Drop,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Accept => "accept",
            Action::Drop => "drop",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Traffic direction a chain filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainId {
    Input,
    Output,
}

impl ChainId {
    pub const ALL: [ChainId; 2] = [ChainId::Input, ChainId::Output];

    pub fn as_str(self) -> &'static str {
        match self {
            ChainId::Input => "input",
            ChainId::Output => "output",
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u32> for ChainId {
    type Error = FirewallError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(ChainId::Input),
            1 => Ok(ChainId::Output),
            other => Err(FirewallError::InvalidChain(other)),
        }
    }
}

impl From<ChainId> for u32 {
    fn from(id: ChainId) -> u32 {
        match id {
            ChainId::Input => 0,
            ChainId::Output => 1,
        }
    }
}

/// A set of optional header filters plus the action taken when all of the
/// present ones agree with a packet.
///
/// A rule without any filter matches every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Ipv4Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Ipv4Addr>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "protocol_repr"
    )]
    pub protocol: Option<u8>,
    /// Only consulted for ICMP packets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icmp_type: Option<u8>,
    /// Only consulted for TCP and UDP packets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_port: Option<u16>,
    /// Only consulted for TCP and UDP packets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_port: Option<u16>,
    pub action: Action,
}

impl Rule {
    /// A rule with no filters, i.e. one that matches everything.
    pub fn new(action: Action) -> Self {
        Self {
            action,
            ..Self::default()
        }
    }

    pub fn with_source(mut self, addr: Ipv4Addr) -> Self {
        self.source = Some(addr);
        self
    }

    pub fn with_destination(mut self, addr: Ipv4Addr) -> Self {
        self.destination = Some(addr);
        self
    }

    pub fn with_protocol(mut self, protocol: u8) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn with_icmp_type(mut self, icmp_type: u8) -> Self {
        self.icmp_type = Some(icmp_type);
        self
    }

    pub fn with_source_port(mut self, port: u16) -> Self {
        self.source_port = Some(port);
        self
    }

    pub fn with_destination_port(mut self, port: u16) -> Self {
        self.destination_port = Some(port);
        self
    }

    /// True when no filter is present.
    pub fn is_unconditional(&self) -> bool {
        self.source.is_none()
            && self.destination.is_none()
            && self.protocol.is_none()
            && self.icmp_type.is_none()
            && self.source_port.is_none()
            && self.destination_port.is_none()
    }
}

/// Protocols are written by name (`tcp`) or number (`6`) in rule files.
mod protocol_repr {
    use grindvakt_protocols::ip_protocol;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(u8),
        Name(String),
    }

    pub fn serialize<S: Serializer>(protocol: &Option<u8>, s: S) -> Result<S::Ok, S::Error> {
        match protocol {
            Some(number) => match ip_protocol::name(*number) {
                Some(name) => s.serialize_str(name),
                None => s.serialize_u8(*number),
            },
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u8>, D::Error> {
        match Option::<Repr>::deserialize(d)? {
            None => Ok(None),
            Some(Repr::Number(number)) => Ok(Some(number)),
            Some(Repr::Name(name)) => ip_protocol::from_name(&name)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("unknown protocol `{name}`"))),
        }
    }
}
