use std::net::Ipv4Addr;

use grindvakt_protocols::{ip_protocol, Ipv4Packet, PacketHeaders};
use proptest::prelude::*;

fn datagram(src: [u8; 4], dst: [u8; 4], protocol: u8, transport: &[u8]) -> Vec<u8> {
    let total = (20 + transport.len()) as u16;
    let mut data = vec![0x45, 0x00];
    data.extend_from_slice(&total.to_be_bytes());
    data.extend_from_slice(&[0x00, 0x01, 0x40, 0x00, 0x40, protocol, 0x00, 0x00]);
    data.extend_from_slice(&src);
    data.extend_from_slice(&dst);
    data.extend_from_slice(transport);
    data
}

proptest! {
    /// Arbitrary input either parses or yields an error, and every accessor
    /// on a parsed view is total.
    #[test]
    fn parse_never_panics(data in proptest::collection::vec(any::<u8>(), 0..96)) {
        if let Ok(packet) = Ipv4Packet::parse(&data) {
            let _ = packet.source();
            let _ = packet.destination();
            let _ = packet.icmp_type();
            let _ = packet.source_port();
            let _ = packet.destination_port();
        }
    }

    #[test]
    fn addresses_and_ports_are_read_back(
        src in any::<[u8; 4]>(),
        dst in any::<[u8; 4]>(),
        sport in any::<u16>(),
        dport in any::<u16>(),
        udp in any::<bool>(),
    ) {
        let protocol = if udp { ip_protocol::UDP } else { ip_protocol::TCP };
        let mut transport = Vec::new();
        transport.extend_from_slice(&sport.to_be_bytes());
        transport.extend_from_slice(&dport.to_be_bytes());
        transport.extend_from_slice(&[0u8; 4]);

        let data = datagram(src, dst, protocol, &transport);
        let packet = Ipv4Packet::parse(&data).unwrap();
        prop_assert_eq!(packet.source(), Ipv4Addr::from(src));
        prop_assert_eq!(packet.destination(), Ipv4Addr::from(dst));
        prop_assert_eq!(packet.protocol(), protocol);
        prop_assert_eq!(packet.source_port(), Some(sport));
        prop_assert_eq!(packet.destination_port(), Some(dport));
        prop_assert_eq!(packet.icmp_type(), None);
    }

    #[test]
    fn icmp_type_is_first_transport_byte(icmp_type in any::<u8>(), code in any::<u8>()) {
        let data = datagram([10, 0, 0, 1], [10, 0, 0, 2], ip_protocol::ICMP, &[icmp_type, code, 0, 0]);
        let packet = Ipv4Packet::parse(&data).unwrap();
        prop_assert_eq!(packet.icmp_type(), Some(icmp_type));
        prop_assert_eq!(packet.source_port(), None);
    }
}
