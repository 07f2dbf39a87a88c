//! FlowKey and Accumulator types.
//!
//! Both mirror the structs written by the XDP classifier. Integers are
//! native-endian in the map; ports and addresses are kept exactly as the
//! classifier copied them from the packet (network byte order).

use thiserror::Error;

/// Ethertype for IPv4.
pub const ETHERTYPE_IPV4: u16 = 0x0800;

/// Ethertype for IPv6.
pub const ETHERTYPE_IPV6: u16 = 0x86DD;

/// Ethertype for 802.1Q VLAN tagged frames.
pub const ETHERTYPE_VLAN: u16 = 0x8100;

/// Size of `struct flow_key` in the BPF map.
pub const FLOW_KEY_SIZE: usize = 40;

/// Size of `struct flow_accum` in the BPF map (one per CPU).
pub const ACCUMULATOR_SIZE: usize = 32;

/// Errors decoding raw map bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("invalid flow key size: expected {expected} bytes, got {found}")]
    KeySize { expected: usize, found: usize },

    #[error("invalid accumulator size: expected {expected} bytes, got {found}")]
    AccumulatorSize { expected: usize, found: usize },
}

/// Identity of a flow.
///
/// Addresses occupy a 16-byte slot; IPv4 uses the first 4 bytes and leaves
/// the rest zeroed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowKey {
    pub ether_type: u16,
    pub l4_proto: u8,
    pub src_addr: [u8; 16],
    pub dst_addr: [u8; 16],
    /// Network byte order.
    pub src_port: u16,
    /// Network byte order.
    pub dst_port: u16,
}

impl FlowKey {
    /// Build an IPv4 key from host-order addresses and ports.
    pub fn ipv4(l4_proto: u8, src: [u8; 4], dst: [u8; 4], src_port: u16, dst_port: u16) -> Self {
        let mut src_addr = [0u8; 16];
        let mut dst_addr = [0u8; 16];
        src_addr[..4].copy_from_slice(&src);
        dst_addr[..4].copy_from_slice(&dst);
        Self {
            ether_type: ETHERTYPE_IPV4,
            l4_proto,
            src_addr,
            dst_addr,
            src_port: src_port.to_be(),
            dst_port: dst_port.to_be(),
        }
    }

    /// Build an IPv6 key from host-order ports.
    pub fn ipv6(l4_proto: u8, src: [u8; 16], dst: [u8; 16], src_port: u16, dst_port: u16) -> Self {
        Self {
            ether_type: ETHERTYPE_IPV6,
            l4_proto,
            src_addr: src,
            dst_addr: dst,
            src_port: src_port.to_be(),
            dst_port: dst_port.to_be(),
        }
    }

    /// Encode to the classifier's key layout:
    /// `ether_type(2) | l4_proto(1) | pad(1) | src_port(2) | dst_port(2) | src_addr(16) | dst_addr(16)`.
    pub fn to_bytes(&self) -> [u8; FLOW_KEY_SIZE] {
        let mut out = [0u8; FLOW_KEY_SIZE];
        out[0..2].copy_from_slice(&self.ether_type.to_ne_bytes());
        out[2] = self.l4_proto;
        out[4..6].copy_from_slice(&self.src_port.to_ne_bytes());
        out[6..8].copy_from_slice(&self.dst_port.to_ne_bytes());
        out[8..24].copy_from_slice(&self.src_addr);
        out[24..40].copy_from_slice(&self.dst_addr);
        out
    }

    /// Decode from the classifier's key layout.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LayoutError> {
        if bytes.len() != FLOW_KEY_SIZE {
            return Err(LayoutError::KeySize {
                expected: FLOW_KEY_SIZE,
                found: bytes.len(),
            });
        }

        let mut src_addr = [0u8; 16];
        let mut dst_addr = [0u8; 16];
        src_addr.copy_from_slice(&bytes[8..24]);
        dst_addr.copy_from_slice(&bytes[24..40]);

        Ok(Self {
            ether_type: u16::from_ne_bytes([bytes[0], bytes[1]]),
            l4_proto: bytes[2],
            src_port: u16::from_ne_bytes([bytes[4], bytes[5]]),
            dst_port: u16::from_ne_bytes([bytes[6], bytes[7]]),
            src_addr,
            dst_addr,
        })
    }
}

/// Counters for one flow on one CPU.
///
/// `start_ns`/`end_ns` are `bpf_ktime_get_ns()` values (CLOCK_MONOTONIC).
/// A shard with `packets == 0` was never touched on that CPU and its
/// timestamps are meaningless.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accumulator {
    pub packets: u64,
    pub bytes: u64,
    pub start_ns: u64,
    pub end_ns: u64,
}

impl Accumulator {
    /// Returns true if this shard has observed at least one packet.
    pub fn is_active(&self) -> bool {
        self.packets > 0
    }

    /// Encode to the classifier's value layout: `packets | bytes | start | end`.
    pub fn to_bytes(&self) -> [u8; ACCUMULATOR_SIZE] {
        let mut out = [0u8; ACCUMULATOR_SIZE];
        out[0..8].copy_from_slice(&self.packets.to_ne_bytes());
        out[8..16].copy_from_slice(&self.bytes.to_ne_bytes());
        out[16..24].copy_from_slice(&self.start_ns.to_ne_bytes());
        out[24..32].copy_from_slice(&self.end_ns.to_ne_bytes());
        out
    }

    /// Decode one per-CPU value.
    ///
    /// libbpf pads per-CPU values to 8 bytes, so longer slices are accepted.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LayoutError> {
        if bytes.len() < ACCUMULATOR_SIZE {
            return Err(LayoutError::AccumulatorSize {
                expected: ACCUMULATOR_SIZE,
                found: bytes.len(),
            });
        }

        let word = |i: usize| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[i..i + 8]);
            u64::from_ne_bytes(buf)
        };

        Ok(Self {
            packets: word(0),
            bytes: word(8),
            start_ns: word(16),
            end_ns: word(24),
        })
    }
}
