//! ## grindvakt-protocols::headers
//! **Parsed header accessors consumed by the rule matcher**
//!
//! The filter never looks at raw bytes itself. Whoever delivers the packet
//! hands over something implementing [`PacketHeaders`]: either a zero-copy
//! [`Ipv4Packet`](crate::Ipv4Packet) view or an owned [`HeaderFields`] record
//! when the host has already parsed the datagram.

use std::net::Ipv4Addr;

use crate::ip_protocol;

/// Header fields of one IPv4 packet.
///
/// Transport accessors return `None` when the packet is not of the matching
/// protocol or when its transport header is too short to hold the field.
pub trait PacketHeaders {
    fn source(&self) -> Ipv4Addr;
    fn destination(&self) -> Ipv4Addr;
    fn protocol(&self) -> u8;
    fn icmp_type(&self) -> Option<u8>;
    fn source_port(&self) -> Option<u16>;
    fn destination_port(&self) -> Option<u16>;
}

/// Owned, already-decoded header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderFields {
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub protocol: u8,
    pub icmp_type: Option<u8>,
    pub source_port: Option<u16>,
    pub destination_port: Option<u16>,
}

impl HeaderFields {
    pub fn icmp(source: Ipv4Addr, destination: Ipv4Addr, icmp_type: u8) -> Self {
        Self {
            source,
            destination,
            protocol: ip_protocol::ICMP,
            icmp_type: Some(icmp_type),
            source_port: None,
            destination_port: None,
        }
    }

    pub fn tcp(source: Ipv4Addr, sport: u16, destination: Ipv4Addr, dport: u16) -> Self {
        Self::with_ports(ip_protocol::TCP, source, sport, destination, dport)
    }

    pub fn udp(source: Ipv4Addr, sport: u16, destination: Ipv4Addr, dport: u16) -> Self {
        Self::with_ports(ip_protocol::UDP, source, sport, destination, dport)
    }

    /// A packet of an arbitrary protocol without any transport fields.
    pub fn other(protocol: u8, source: Ipv4Addr, destination: Ipv4Addr) -> Self {
        Self {
            source,
            destination,
            protocol,
            icmp_type: None,
            source_port: None,
            destination_port: None,
        }
    }

    fn with_ports(
        protocol: u8,
        source: Ipv4Addr,
        sport: u16,
        destination: Ipv4Addr,
        dport: u16,
    ) -> Self {
        Self {
            source,
            destination,
            protocol,
            icmp_type: None,
            source_port: Some(sport),
            destination_port: Some(dport),
        }
    }

    /// Copies the fields out of any header view.
    pub fn capture<P: PacketHeaders + ?Sized>(packet: &P) -> Self {
        Self {
            source: packet.source(),
            destination: packet.destination(),
            protocol: packet.protocol(),
            icmp_type: packet.icmp_type(),
            source_port: packet.source_port(),
            destination_port: packet.destination_port(),
        }
    }
}

impl PacketHeaders for HeaderFields {
    #[inline]
    fn source(&self) -> Ipv4Addr {
        self.source
    }

    #[inline]
    fn destination(&self) -> Ipv4Addr {
        self.destination
    }

    #[inline]
    fn protocol(&self) -> u8 {
        self.protocol
    }

    #[inline]
    fn icmp_type(&self) -> Option<u8> {
        self.icmp_type
    }

    #[inline]
    fn source_port(&self) -> Option<u16> {
        self.source_port
    }

    #[inline]
    fn destination_port(&self) -> Option<u16> {
        self.destination_port
    }
}
