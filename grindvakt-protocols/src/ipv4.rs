//! ## grindvakt-protocols::ipv4
//! A fixed-offset IPv4 header reader that keeps zero-copy slices into the
//! datagram and decodes the transport fields only when asked.
//!
//! Only the first fragment of a fragmented datagram carries the transport
//! header, so later fragments report no ICMP type and no ports.

use std::net::Ipv4Addr;

use thiserror::Error;

use crate::headers::PacketHeaders;
use crate::ip_protocol;

const IPV4_VERSION: u8 = 4;
const IPV4_HEADER_MIN_SIZE: usize = 20;
const IPV4_TOTAL_LENGTH_OFFSET: usize = 2;
const IPV4_FLAGS_OFFSET: usize = 6;
const IPV4_PROTOCOL_OFFSET: usize = 9;
const IPV4_SRC_OFFSET: usize = 12;
const IPV4_DST_OFFSET: usize = 16;
const IPV4_FRAGMENT_OFFSET_MASK: u16 = 0x1FFF;

const PORT_FIELDS_SIZE: usize = 4;

/// Errors that can occur while reading an IPv4 header.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("Insufficient data for an IPv4 header ({0} bytes)")]
    InsufficientData(usize),
    #[error("Not an IPv4 packet (version {0})")]
    InvalidVersion(u8),
    #[error("Invalid IPv4 header length ({0} words)")]
    InvalidHeaderLength(u8),
    #[error("IPv4 header claims {claimed} bytes but only {available} are present")]
    HeaderIncomplete { claimed: usize, available: usize },
}

/// Zero-copy view over one IPv4 datagram.
#[derive(Debug, Copy, Clone)]
pub struct Ipv4Packet<'a> {
    /// The IPv4 header including options.
    pub header: &'a [u8],
    /// Everything after the header, clipped to the datagram's total length.
    pub transport: &'a [u8],
}

impl<'a> Ipv4Packet<'a> {
    /// Parses `data` with a default [`Ipv4Parser`].
    #[inline]
    pub fn parse(data: &'a [u8]) -> Result<Self, HeaderError> {
        Ipv4Parser::new().parse(data)
    }

    /// Byte offset of this fragment within the original datagram, in 8-byte units.
    pub fn fragment_offset(&self) -> u16 {
        read_u16(self.header, IPV4_FLAGS_OFFSET) & IPV4_FRAGMENT_OFFSET_MASK
    }

    /// Transport header bytes, or nothing for a non-first fragment.
    fn transport_header(&self) -> &'a [u8] {
        if self.fragment_offset() == 0 {
            self.transport
        } else {
            &[]
        }
    }

    fn ports(&self) -> Option<(u16, u16)> {
        if !ip_protocol::has_ports(self.protocol()) {
            return None;
        }
        let transport = self.transport_header();
        if transport.len() < PORT_FIELDS_SIZE {
            return None;
        }
        Some((read_u16(transport, 0), read_u16(transport, 2)))
    }
}

impl PacketHeaders for Ipv4Packet<'_> {
    #[inline]
    fn source(&self) -> Ipv4Addr {
        read_addr(self.header, IPV4_SRC_OFFSET)
    }

    #[inline]
    fn destination(&self) -> Ipv4Addr {
        read_addr(self.header, IPV4_DST_OFFSET)
    }

    #[inline]
    fn protocol(&self) -> u8 {
        self.header[IPV4_PROTOCOL_OFFSET]
    }

    fn icmp_type(&self) -> Option<u8> {
        if self.protocol() != ip_protocol::ICMP {
            return None;
        }
        self.transport_header().first().copied()
    }

    fn source_port(&self) -> Option<u16> {
        self.ports().map(|(sport, _)| sport)
    }

    fn destination_port(&self) -> Option<u16> {
        self.ports().map(|(_, dport)| dport)
    }
}

/// Stateless IPv4 header reader.
#[derive(Default, Debug, Copy, Clone)]
pub struct Ipv4Parser;

impl Ipv4Parser {
    pub fn new() -> Self {
        Self
    }

    /// Splits `data` into header and transport slices after checking that
    /// the header is a complete IPv4 header.
    pub fn parse<'a>(&self, data: &'a [u8]) -> Result<Ipv4Packet<'a>, HeaderError> {
        if data.len() < IPV4_HEADER_MIN_SIZE {
            return Err(HeaderError::InsufficientData(data.len()));
        }

        let version = data[0] >> 4;
        if version != IPV4_VERSION {
            return Err(HeaderError::InvalidVersion(version));
        }

        let ihl = data[0] & 0x0F;
        let header_len = usize::from(ihl) * 4;
        if header_len < IPV4_HEADER_MIN_SIZE {
            return Err(HeaderError::InvalidHeaderLength(ihl));
        }
        if data.len() < header_len {
            return Err(HeaderError::HeaderIncomplete {
                claimed: header_len,
                available: data.len(),
            });
        }

        // Link layers may pad short frames; the total length field tells
        // where the datagram really ends.
        let total_len = usize::from(read_u16(data, IPV4_TOTAL_LENGTH_OFFSET));
        let end = total_len.clamp(header_len, data.len());

        Ok(Ipv4Packet {
            header: &data[..header_len],
            transport: &data[header_len..end],
        })
    }
}

#[inline]
fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

#[inline]
fn read_addr(data: &[u8], offset: usize) -> Ipv4Addr {
    Ipv4Addr::new(
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    )
}
