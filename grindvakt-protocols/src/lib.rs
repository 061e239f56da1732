//! # Grindvakt Protocol Views
//!
//! Crate for reading the header fields the packet filter matches on:
//! IPv4 addresses and protocol, the ICMP type, and TCP/UDP ports.

pub mod headers;
pub mod ip_protocol;
pub mod ipv4;

pub use headers::{HeaderFields, PacketHeaders};
pub use ipv4::{HeaderError, Ipv4Packet, Ipv4Parser};
