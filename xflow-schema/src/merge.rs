//! Accumulator merger.
//!
//! Folds the per-CPU shards of one flow into a single view.

use crate::flow::Accumulator;

/// Merged view of a flow across all CPUs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedFlowView {
    pub total_packets: u64,
    pub total_bytes: u64,
    pub earliest_start_ns: u64,
    pub latest_end_ns: u64,
}

/// Merge per-CPU shards into a single view.
///
/// Counters are summed over every shard. Timestamps only come from shards
/// that saw a packet; an untouched shard reads as zero and would otherwise
/// drag `earliest_start_ns` down to boot time.
///
/// Returns `None` when no shard has a packet. Such entries show up when the
/// classifier inserts a key and races a resize, and must not become flows.
pub fn merge_shards(shards: &[Accumulator]) -> Option<MergedFlowView> {
    let mut total_packets: u64 = 0;
    let mut total_bytes: u64 = 0;
    let mut window: Option<(u64, u64)> = None;

    for shard in shards {
        total_packets = total_packets.saturating_add(shard.packets);
        total_bytes = total_bytes.saturating_add(shard.bytes);

        if !shard.is_active() {
            continue;
        }

        window = Some(match window {
            None => (shard.start_ns, shard.end_ns),
            Some((start, end)) => (start.min(shard.start_ns), end.max(shard.end_ns)),
        });
    }

    let (earliest_start_ns, latest_end_ns) = window?;

    Some(MergedFlowView {
        total_packets,
        total_bytes,
        earliest_start_ns,
        latest_end_ns,
    })
}

/// Combine two generations of the same flow CPU by CPU.
///
/// Used when a flow is finalized again after it went idle and came back:
/// counters add up, and each CPU keeps the earliest start and latest end of
/// its active shards. Missing CPUs on either side count as untouched.
pub fn fold_shards(earlier: &[Accumulator], later: &[Accumulator]) -> Vec<Accumulator> {
    let cpus = earlier.len().max(later.len());
    (0..cpus)
        .map(|cpu| {
            let a = earlier.get(cpu).copied().unwrap_or_default();
            let b = later.get(cpu).copied().unwrap_or_default();
            match (a.is_active(), b.is_active()) {
                (false, false) => Accumulator::default(),
                (true, false) => a,
                (false, true) => b,
                (true, true) => Accumulator {
                    packets: a.packets.saturating_add(b.packets),
                    bytes: a.bytes.saturating_add(b.bytes),
                    start_ns: a.start_ns.min(b.start_ns),
                    end_ns: a.end_ns.max(b.end_ns),
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shard(packets: u64, bytes: u64, start_ns: u64, end_ns: u64) -> Accumulator {
        Accumulator {
            packets,
            bytes,
            start_ns,
            end_ns,
        }
    }

    // ===========================================
    // Shard-aware timestamps
    // ===========================================

    #[test]
    fn test_merge_ignores_empty_shards_for_timestamps() {
        let mut shards = vec![Accumulator::default(); 6];
        shards[2] = shard(4, 400, 5_000, 9_000);
        shards[5] = shard(2, 120, 3_000, 7_000);

        let view = merge_shards(&shards).expect("non-empty");

        assert_eq!(view.earliest_start_ns, 3_000);
        assert_eq!(view.latest_end_ns, 9_000);
        assert_eq!(view.total_packets, 6);
        assert_eq!(view.total_bytes, 520);
    }

    #[test]
    fn test_merge_single_shard() {
        let view = merge_shards(&[shard(1, 60, 42, 42)]).expect("non-empty");

        assert_eq!(view.earliest_start_ns, 42);
        assert_eq!(view.latest_end_ns, 42);
    }

    #[test]
    fn test_merge_start_never_after_end() {
        let shards = [
            shard(1, 10, 100, 150),
            shard(3, 30, 120, 400),
            Accumulator::default(),
            shard(1, 10, 90, 95),
        ];

        let view = merge_shards(&shards).expect("non-empty");

        assert!(view.earliest_start_ns <= view.latest_end_ns);
        assert_eq!(view.earliest_start_ns, 90);
        assert_eq!(view.latest_end_ns, 400);
    }

    // ===========================================
    // Empty / phantom flows
    // ===========================================

    #[test]
    fn test_merge_all_empty_is_none() {
        assert!(merge_shards(&[Accumulator::default(); 8]).is_none());
    }

    #[test]
    fn test_merge_no_shards_is_none() {
        assert!(merge_shards(&[]).is_none());
    }

    #[test]
    fn test_merge_zero_packet_shard_with_timestamps_is_ignored() {
        // Stale timestamps on an untouched shard must not leak into the view.
        let shards = [shard(0, 0, 1, 1_000_000), shard(2, 80, 500, 600)];

        let view = merge_shards(&shards).expect("non-empty");

        assert_eq!(view.earliest_start_ns, 500);
        assert_eq!(view.latest_end_ns, 600);
    }

    // ===========================================
    // Totals
    // ===========================================

    #[test]
    fn test_merge_totals_equal_shard_sums() {
        let shards: Vec<Accumulator> = (0..16u64)
            .map(|cpu| {
                if cpu % 3 == 0 {
                    Accumulator::default()
                } else {
                    shard(cpu, cpu * 100, 1_000 + cpu, 2_000 + cpu)
                }
            })
            .collect();

        let expected_packets: u64 = shards.iter().map(|s| s.packets).sum();
        let expected_bytes: u64 = shards.iter().map(|s| s.bytes).sum();

        let view = merge_shards(&shards).expect("non-empty");

        assert_eq!(view.total_packets, expected_packets);
        assert_eq!(view.total_bytes, expected_bytes);
    }

    #[test]
    fn test_merge_totals_saturate() {
        let shards = [shard(u64::MAX, u64::MAX, 1, 2), shard(1, 1, 1, 2)];

        let view = merge_shards(&shards).expect("non-empty");

        assert_eq!(view.total_packets, u64::MAX);
        assert_eq!(view.total_bytes, u64::MAX);
    }

    // ===========================================
    // Folding generations
    // ===========================================

    #[test]
    fn test_fold_sums_counters_per_cpu() {
        let earlier = [shard(10, 1_000, 100, 200), Accumulator::default()];
        let later = [shard(2, 120, 900, 950), shard(1, 60, 910, 910)];

        let folded = fold_shards(&earlier, &later);

        assert_eq!(folded[0], shard(12, 1_120, 100, 950));
        assert_eq!(folded[1], shard(1, 60, 910, 910));
    }

    #[test]
    fn test_fold_keeps_merged_totals() {
        let earlier = vec![shard(1000, 900_000, 5, 50), Accumulator::default()];
        let later = vec![Accumulator::default(), shard(1, 60, 70, 70)];

        let view = merge_shards(&fold_shards(&earlier, &later)).expect("non-empty");

        assert_eq!(view.total_packets, 1001);
        assert_eq!(view.total_bytes, 900_060);
        assert_eq!(view.earliest_start_ns, 5);
        assert_eq!(view.latest_end_ns, 70);
    }

    #[test]
    fn test_fold_ignores_untouched_shard_timestamps() {
        let earlier = [shard(0, 0, 1, 1_000_000)];
        let later = [shard(3, 90, 500, 600)];

        assert_eq!(fold_shards(&earlier, &later), vec![shard(3, 90, 500, 600)]);
    }

    #[test]
    fn test_fold_pads_shorter_side() {
        let folded = fold_shards(&[shard(1, 10, 1, 2)], &[]);
        assert_eq!(folded, vec![shard(1, 10, 1, 2)]);
    }
}
