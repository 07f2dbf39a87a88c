//! xflow XDP/BPF support
//!
//! This crate provides:
//! - `LiveTable` / `ColdCache` traits over the classifier's per-CPU flow maps
//! - `Attachment` trait for detaching the classifier from its interface
//! - In-memory implementations for testing
//! - The libbpf loader (`bpf` feature)

pub mod tables;

#[cfg(feature = "bpf")]
pub mod bpf_tables;

pub use tables::{
    Attachment, BpfError, ColdCache, LiveTable, MemoryColdCache, MockAttachment, MockLiveTable,
    TableError,
};

#[cfg(feature = "bpf")]
pub use bpf_tables::{BpfColdCache, BpfFlowMaps, BpfLiveTable, XdpAttachment};
