//! Report compilation.
//!
//! The report is only rendered once every finalized flow is known: row order
//! depends on the full set.

use std::collections::{BTreeMap, BTreeSet};

use xflow_clock::TimeOffset;
use xflow_schema::{merge_shards, Accumulator, FlowKey};

use crate::row::ReportRow;

/// Header line of the CSV report.
pub const HEADER: &str =
    "START, END, SRC IP, DST IP, SRC PORT, DST PORT, ETHER TYPE, PROTO, #PACKETS, #BYTES";

/// How duplicate rows are collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupMode {
    /// One row per flow identity.
    #[default]
    FlowKey,
    /// Legacy behavior: rows with identical rendered text collapse into one,
    /// even when they come from distinct flows.
    RenderedText,
}

/// What to do with rows whose ethertype has no address decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnrecognizedPolicy {
    /// Emit the row with empty address fields.
    #[default]
    Render,
    /// Leave the row out of the report.
    Skip,
}

/// Report compilation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportOptions {
    pub dedup: DedupMode,
    pub unrecognized: UnrecognizedPolicy,
}

/// Counters describing what happened during compilation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportStats {
    /// Finalized flows read from the cache.
    pub flows: usize,
    /// Rows in the report (header excluded).
    pub rows: usize,
    /// Flows with no packet on any CPU.
    pub phantoms: usize,
    /// Flows whose ethertype could not be decoded.
    pub undecoded: usize,
    /// Undecoded flows left out under `UnrecognizedPolicy::Skip`.
    pub skipped: usize,
    /// Rows dropped by deduplication.
    pub duplicates: usize,
}

/// A compiled report.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Rendered rows in output order, without the header.
    pub lines: Vec<String>,
    pub stats: ReportStats,
}

impl Report {
    /// Render the full CSV artifact, header first, one line per row.
    pub fn to_csv(&self) -> String {
        let mut out = String::with_capacity(HEADER.len() + 1 + self.lines.len() * 96);
        out.push_str(HEADER);
        out.push('\n');
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Compile finalized flows into a report.
pub fn compile_report(
    entries: &[(FlowKey, Vec<Accumulator>)],
    offset: TimeOffset,
    options: &ReportOptions,
) -> Report {
    let mut stats = ReportStats {
        flows: entries.len(),
        ..Default::default()
    };

    let mut rows: Vec<ReportRow> = Vec::with_capacity(entries.len());
    for (key, shards) in entries {
        let Some(view) = merge_shards(shards) else {
            stats.phantoms += 1;
            continue;
        };

        let row = ReportRow::new(*key, view, offset);
        if !row.family.is_recognized() {
            stats.undecoded += 1;
            if options.unrecognized == UnrecognizedPolicy::Skip {
                stats.skipped += 1;
                continue;
            }
        }
        rows.push(row);
    }

    let before = rows.len();
    let mut lines: Vec<String> = match options.dedup {
        DedupMode::FlowKey => {
            let by_key: BTreeMap<FlowKey, ReportRow> =
                rows.into_iter().map(|row| (row.key, row)).collect();
            by_key.values().map(ReportRow::render).collect()
        }
        DedupMode::RenderedText => {
            let by_text: BTreeSet<String> = rows.iter().map(ReportRow::render).collect();
            by_text.into_iter().collect()
        }
    };
    stats.duplicates = before - lines.len();

    lines.sort_by(|a, b| {
        leading_start(a)
            .total_cmp(&leading_start(b))
            .then_with(|| a.cmp(b))
    });
    stats.rows = lines.len();

    Report { lines, stats }
}

/// Parse the start time from a rendered row's leading field.
///
/// Unparseable fields sort last.
pub fn leading_start(line: &str) -> f64 {
    line.split(',')
        .next()
        .and_then(|field| field.trim().parse::<f64>().ok())
        .unwrap_or(f64::INFINITY)
}
