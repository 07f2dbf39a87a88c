//! xflow report compiler
//!
//! Turns finalized flows into the CSV report:
//! - merges each flow's per-CPU shards and converts its timestamps to wall time
//! - decodes addresses by ethertype, flagging families it cannot decode
//! - deduplicates, sorts by start time and prepends the header

pub mod address;
pub mod report;
pub mod row;

pub use address::{decode_address_family, AddressFamily, Family};
pub use report::{
    compile_report, leading_start, DedupMode, Report, ReportOptions, ReportStats,
    UnrecognizedPolicy, HEADER,
};
pub use row::ReportRow;
