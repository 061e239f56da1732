//! IP protocol numbers understood by the filter.

pub const ICMP: u8 = 1;
pub const TCP: u8 = 6;
pub const UDP: u8 = 17;

/// Looks up a protocol number by its name (`icmp`, `tcp` or `udp`, any case).
pub fn from_name(name: &str) -> Option<u8> {
    match name.to_ascii_lowercase().as_str() {
        "icmp" => Some(ICMP),
        "tcp" => Some(TCP),
        "udp" => Some(UDP),
        _ => None,
    }
}

/// Returns the short name of a supported protocol number.
pub fn name(protocol: u8) -> Option<&'static str> {
    match protocol {
        ICMP => Some("icmp"),
        TCP => Some("tcp"),
        UDP => Some("udp"),
        _ => None,
    }
}

/// True for protocols that carry 16-bit source/destination ports.
#[inline]
pub fn has_ports(protocol: u8) -> bool {
    protocol == TCP || protocol == UDP
}
