//! Address family decoding.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use xflow_schema::{ETHERTYPE_IPV4, ETHERTYPE_IPV6};

/// Address families the report can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    /// Decode an address slot. IPv4 reads the first 4 bytes, already in
    /// network order.
    pub fn decode(&self, slot: &[u8; 16]) -> IpAddr {
        match self {
            Family::V4 => IpAddr::V4(Ipv4Addr::new(slot[0], slot[1], slot[2], slot[3])),
            Family::V6 => IpAddr::V6(Ipv6Addr::from(*slot)),
        }
    }
}

/// Result of classifying a flow's ethertype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Recognized(Family),
    /// The raw ethertype, for reporting.
    Unrecognized(u16),
}

impl AddressFamily {
    pub fn is_recognized(&self) -> bool {
        matches!(self, AddressFamily::Recognized(_))
    }
}

/// Classify an ethertype.
///
/// Only IPv4 and IPv6 carry addresses the report knows how to print. VLAN
/// tags (0x8100) and everything else come back as `Unrecognized`.
pub fn decode_address_family(ether_type: u16) -> AddressFamily {
    match ether_type {
        ETHERTYPE_IPV4 => AddressFamily::Recognized(Family::V4),
        ETHERTYPE_IPV6 => AddressFamily::Recognized(Family::V6),
        other => AddressFamily::Unrecognized(other),
    }
}
