//! Report rows.

use std::net::IpAddr;

use xflow_clock::TimeOffset;
use xflow_schema::{FlowKey, MergedFlowView};

use crate::address::{decode_address_family, AddressFamily};

/// One flow, decoded and ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub key: FlowKey,
    pub view: MergedFlowView,
    /// Wall-clock seconds of the first packet.
    pub start_sec: f64,
    /// Wall-clock seconds of the last packet.
    pub end_sec: f64,
    pub family: AddressFamily,
    /// `None` when the family is unrecognized.
    pub src_addr: Option<IpAddr>,
    pub dst_addr: Option<IpAddr>,
    /// Host byte order.
    pub src_port: u16,
    /// Host byte order.
    pub dst_port: u16,
}

impl ReportRow {
    /// Decode a merged flow.
    pub fn new(key: FlowKey, view: MergedFlowView, offset: TimeOffset) -> Self {
        let family = decode_address_family(key.ether_type);
        let (src_addr, dst_addr) = match family {
            AddressFamily::Recognized(f) => {
                (Some(f.decode(&key.src_addr)), Some(f.decode(&key.dst_addr)))
            }
            AddressFamily::Unrecognized(_) => (None, None),
        };

        Self {
            key,
            view,
            start_sec: offset.to_wall_seconds(view.earliest_start_ns),
            end_sec: offset.to_wall_seconds(view.latest_end_ns),
            family,
            src_addr,
            dst_addr,
            src_port: u16::from_be(key.src_port),
            dst_port: u16::from_be(key.dst_port),
        }
    }

    /// Render as a CSV line (no trailing newline).
    ///
    /// Times use the shortest representation that parses back to the same
    /// `f64`. Undecoded addresses render as empty fields.
    pub fn render(&self) -> String {
        format!(
            "{:?},{:?},{},{},{},{},{:#x},{},{},{}",
            self.start_sec,
            self.end_sec,
            render_addr(self.src_addr),
            render_addr(self.dst_addr),
            self.src_port,
            self.dst_port,
            self.key.ether_type,
            self.key.l4_proto,
            self.view.total_packets,
            self.view.total_bytes,
        )
    }
}

fn render_addr(addr: Option<IpAddr>) -> String {
    addr.map(|a| a.to_string()).unwrap_or_default()
}
