//! Flow eviction.
//!
//! Flows move from the live table to the cold cache through a single
//! `transfer` routine:
//! - periodic sweeps move flows idle for longer than the threshold
//! - the drain on exit moves everything left
//!
//! Both are two-pass: enumerate and select first, then transfer. The live
//! table is never mutated while it is being enumerated. A flow that comes back
//! after being finalized is folded into its earlier cold record.

use std::path::PathBuf;

use thiserror::Error;
use xflow_bpf::{ColdCache, LiveTable, TableError};
use xflow_clock::TimeOffset;
use xflow_reporter::ReportOptions;
use xflow_schema::{fold_shards, merge_shards, Accumulator, FlowKey};

/// Errors from eviction.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("sweep failed: {0}")]
    Sweep(#[source] TableError),

    #[error("drain failed: {0}")]
    Drain(#[source] TableError),
}

/// Validated settings for one collection run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Interface the classifier is attached to.
    pub interface: String,
    pub run_time_sec: u64,
    /// A flow idle for strictly longer than this is finalized.
    pub idle_threshold_sec: u64,
    pub sweep_interval_sec: u64,
    /// Report destination.
    pub output: PathBuf,
    pub status_file: Option<PathBuf>,
    pub report: ReportOptions,
}

/// Which live flows an eviction pass moves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvictionPolicy {
    /// Flows whose last packet is more than `threshold_sec` before `now_wall`.
    /// Flows without packets stay.
    Idle {
        offset: TimeOffset,
        threshold_sec: f64,
        now_wall: f64,
    },
    /// Every flow, with or without packets.
    All,
}

enum Selection {
    Evict,
    Keep,
    Phantom,
}

impl EvictionPolicy {
    fn select(&self, shards: &[Accumulator]) -> Selection {
        match *self {
            EvictionPolicy::All => Selection::Evict,
            EvictionPolicy::Idle {
                offset,
                threshold_sec,
                now_wall,
            } => match merge_shards(shards) {
                None => Selection::Phantom,
                Some(view) => {
                    let idle = now_wall - offset.to_wall_seconds(view.latest_end_ns);
                    if idle > threshold_sec {
                        Selection::Evict
                    } else {
                        Selection::Keep
                    }
                }
            },
        }
    }
}

/// Result of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Live flows enumerated.
    pub scanned: usize,
    /// Flows moved to the cold cache.
    pub evicted: usize,
    /// Flows seen with no packet on any CPU.
    pub phantoms: usize,
    /// Flows left in the live table.
    pub remaining: usize,
}

/// Result of the drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainOutcome {
    /// Transfers made, including leftovers.
    pub drained: usize,
    /// Keys found after the eviction pass and transferred directly.
    pub leftovers: usize,
    /// Keys still live at the end. Non-zero only if something kept writing.
    pub remaining: usize,
}

/// Move one flow from the live table to the cold cache.
///
/// The key's shards are read again at transfer time, folded into any earlier
/// cold record for the same key, written to the cold cache and only then
/// deleted from the live table. Returns false if the key is no longer live.
///
/// If the delete fails the cold record is put back the way it was, so the
/// shards still in the live table are counted once by a later transfer.
pub fn transfer<L, C>(live: &L, cold: &C, key: &FlowKey) -> Result<bool, TableError>
where
    L: LiveTable + ?Sized,
    C: ColdCache + ?Sized,
{
    let Some(shards) = live.lookup(key)? else {
        return Ok(false);
    };

    let earlier = cold.lookup(key)?;
    let finalized = match &earlier {
        Some(prev) => fold_shards(prev, &shards),
        None => shards,
    };
    cold.insert(*key, &finalized)?;

    if let Err(e) = live.delete(key) {
        // Put the cold record back; the delete error is what gets returned.
        let _ = match earlier {
            Some(prev) => cold.insert(*key, &prev),
            None => cold.remove(key),
        };
        return Err(e);
    }
    Ok(true)
}

fn evict<L, C>(live: &L, cold: &C, policy: &EvictionPolicy) -> Result<SweepOutcome, TableError>
where
    L: LiveTable + ?Sized,
    C: ColdCache + ?Sized,
{
    let entries = live.entries()?;
    let mut outcome = SweepOutcome {
        scanned: entries.len(),
        ..Default::default()
    };

    let mut candidates = Vec::new();
    for (key, shards) in &entries {
        match policy.select(shards) {
            Selection::Evict => candidates.push(*key),
            Selection::Keep => {}
            Selection::Phantom => outcome.phantoms += 1,
        }
    }

    for key in &candidates {
        if transfer(live, cold, key)? {
            outcome.evicted += 1;
        }
    }
    outcome.remaining = outcome.scanned - outcome.evicted;

    Ok(outcome)
}

/// Move every flow idle for strictly longer than `idle_threshold_sec`.
///
/// `now_wall` is the current Unix time in seconds. Any table error aborts the
/// sweep; flows transferred before the error stay transferred.
pub fn sweep_idle<L, C>(
    live: &L,
    cold: &C,
    offset: TimeOffset,
    idle_threshold_sec: f64,
    now_wall: f64,
) -> Result<SweepOutcome, CollectorError>
where
    L: LiveTable + ?Sized,
    C: ColdCache + ?Sized,
{
    let policy = EvictionPolicy::Idle {
        offset,
        threshold_sec: idle_threshold_sec,
        now_wall,
    };
    evict(live, cold, &policy).map_err(CollectorError::Sweep)
}

/// Move every remaining flow into the cold cache.
///
/// Run once the classifier is detached. An unconditional eviction pass moves
/// every enumerated flow, then any key still present is transferred directly.
/// Keys that reappear even after that (a classifier that failed to detach)
/// are counted in `remaining`; they do not fail the drain.
pub fn drain<L, C>(live: &L, cold: &C) -> Result<DrainOutcome, CollectorError>
where
    L: LiveTable + ?Sized,
    C: ColdCache + ?Sized,
{
    let pass = evict(live, cold, &EvictionPolicy::All).map_err(CollectorError::Drain)?;
    let mut outcome = DrainOutcome {
        drained: pass.evicted,
        ..Default::default()
    };

    for key in live.keys().map_err(CollectorError::Drain)? {
        if transfer(live, cold, &key).map_err(CollectorError::Drain)? {
            outcome.drained += 1;
            outcome.leftovers += 1;
        }
    }

    outcome.remaining = live.keys().map_err(CollectorError::Drain)?.len();
    Ok(outcome)
}
