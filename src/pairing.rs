//! Pairing Algorithm (C6, §4.6): turns a wave's `lead`/`follow` sides into a
//! list of matched pairs, using a windowed, greedy, score-ascending match.

use crate::constants::{population_scale, PressureBand, WindowProfile, WAIT_COEFFICIENT};
use crate::queue::QueueEntry;

/// `pressure = clamp(scale(P) * N / max(P, 1), 0, 1)` — §4.6.
pub fn pressure(queue_size: usize, population: usize) -> f64 {
    let scale = population_scale(population);
    let raw = scale * (queue_size as f64) / (population.max(1) as f64);
    raw.clamp(0.0, 1.0)
}

/// `W(waves, pressure) = base + growth * waves` — §4.6.
pub fn window(profile: WindowProfile, pressure: f64, waves: u32) -> i64 {
    let (base, growth) = profile.window_params(PressureBand::of(pressure));
    base + growth * waves as i64
}

/// One matched pair, by index into the `lead`/`follow` slices passed to
/// `pair_sides`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    pub lead_idx: usize,
    pub follow_idx: usize,
}

struct Candidate {
    lead_idx: usize,
    follow_idx: usize,
    score: i64,
}

/// Run one wave of pairing over `lead`/`follow`. `lead_mmr`/`follow_mmr` give
/// each entry's MMR for the race it would play on its side (§4.5 "Race
/// Selection at Pair Time" — resolved by the caller before calling this,
/// since it depends on per-game rating lookups this module doesn't own).
///
/// Returns pairs in acceptance order; any index not appearing in a pair is
/// unmatched for this wave.
pub fn pair_sides(
    lead: &[QueueEntry],
    follow: &[QueueEntry],
    lead_mmr: &[i32],
    follow_mmr: &[i32],
    profile: WindowProfile,
    population: usize,
) -> Vec<Pairing> {
    assert_eq!(lead.len(), lead_mmr.len());
    assert_eq!(follow.len(), follow_mmr.len());

    let queue_size = lead.len() + follow.len();
    let p = pressure(queue_size, population);

    let mut candidates = Vec::new();
    for (li, lentry) in lead.iter().enumerate() {
        for (fi, fentry) in follow.iter().enumerate() {
            // The window is driven by the lead entry's own wait alone,
            // matching `find_matches()`'s per-lead_player `max_diff` call;
            // the follow side's wait only feeds `wait_priority` below.
            let w = window(profile, p, lentry.wave_count);
            let mmr_diff = (lead_mmr[li] - follow_mmr[fi]) as i64;
            if mmr_diff.abs() > w {
                continue;
            }
            let wait_priority = (lentry.wave_count + fentry.wave_count) as i64;
            let score = mmr_diff * mmr_diff - wait_priority * WAIT_COEFFICIENT;
            candidates.push(Candidate { lead_idx: li, follow_idx: fi, score });
        }
    }

    // Stable sort preserves (lead insertion order, follow insertion order)
    // for equal scores, since `lead`/`follow` are already insertion-ordered
    // snapshots and the double loop enumerates in that order (§4.6 "Tie-
    // breaking & determinism").
    candidates.sort_by_key(|c| c.score);

    let mut lead_taken = vec![false; lead.len()];
    let mut follow_taken = vec![false; follow.len()];
    let mut pairs = Vec::new();

    for c in candidates {
        if lead_taken[c.lead_idx] || follow_taken[c.follow_idx] {
            continue;
        }
        lead_taken[c.lead_idx] = true;
        follow_taken[c.follow_idx] = true;
        pairs.push(Pairing { lead_idx: c.lead_idx, follow_idx: c.follow_idx });
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Race;
    use chrono::Utc;

    fn entry(uid: i64, seq: u64, wave_count: u32) -> QueueEntry {
        QueueEntry {
            discord_uid: uid,
            selected_races: vec![Race::BwTerran],
            queued_at: Utc::now().naive_utc(),
            wave_count,
            seq,
        }
    }

    #[test]
    fn pairs_close_mmr_entries_within_window() {
        let lead = vec![entry(1, 0, 0)];
        let follow = vec![entry(2, 1, 0)];
        let pairs = pair_sides(&lead, &follow, &[1500], &[1500], WindowProfile::Balanced, 50);
        assert_eq!(pairs, vec![Pairing { lead_idx: 0, follow_idx: 0 }]);
    }

    #[test]
    fn rejects_pairs_outside_the_window_at_zero_waves() {
        // pressure for N=2, P=50 is small -> LOW band, base=125.
        let lead = vec![entry(1, 0, 0)];
        let follow = vec![entry(2, 1, 0)];
        let pairs = pair_sides(&lead, &follow, &[1500], &[1800], WindowProfile::Balanced, 50);
        assert!(pairs.is_empty());
    }

    #[test]
    fn wider_window_after_more_waves_admits_previously_rejected_pair() {
        let lead = vec![entry(1, 0, 5)];
        let follow = vec![entry(2, 1, 5)];
        let pairs = pair_sides(&lead, &follow, &[1500], &[1800], WindowProfile::Balanced, 50);
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn window_uses_lead_wait_only_not_the_follow_sides() {
        // Same gap as the case above, but only the follow side has waited;
        // the window must stay at the lead's zero-wave width and reject.
        let lead = vec![entry(1, 0, 0)];
        let follow = vec![entry(2, 1, 5)];
        let pairs = pair_sides(&lead, &follow, &[1500], &[1800], WindowProfile::Balanced, 50);
        assert!(pairs.is_empty());
    }

    #[test]
    fn greedy_matching_prefers_lower_score_and_skips_taken_entries() {
        // lead[0] close to follow[0] (best), lead[0] also admissible to
        // follow[1] but worse; lead[1] only fits follow[1].
        let lead = vec![entry(1, 0, 0), entry(3, 1, 0)];
        let follow = vec![entry(2, 2, 0), entry(4, 3, 0)];
        let pairs = pair_sides(
            &lead,
            &follow,
            &[1500, 1490],
            &[1510, 1495],
            WindowProfile::Balanced,
            50,
        );
        assert_eq!(pairs.len(), 2);
        assert!(pairs.contains(&Pairing { lead_idx: 0, follow_idx: 0 }));
        assert!(pairs.contains(&Pairing { lead_idx: 1, follow_idx: 1 }));
    }

    #[test]
    fn tie_breaks_by_lead_then_follow_insertion_order() {
        // Two equal-score candidates (same mmr_diff, same wait_priority);
        // only the first enumerated (lowest lead_idx, then follow_idx)
        // should win the follow slot.
        let lead = vec![entry(1, 0, 0), entry(2, 1, 0)];
        let follow = vec![entry(3, 2, 0)];
        let pairs =
            pair_sides(&lead, &follow, &[1500, 1500], &[1500], WindowProfile::Balanced, 50);
        assert_eq!(pairs, vec![Pairing { lead_idx: 0, follow_idx: 0 }]);
    }

    #[test]
    fn pressure_clamps_to_one_for_large_queues() {
        assert_eq!(pressure(1000, 10), 1.0);
    }

    #[test]
    fn pressure_is_zero_for_empty_queue() {
        assert_eq!(pressure(0, 50), 0.0);
    }
}
