//! Pure Elo-style rating computation (§4.2). No mutable state lives here —
//! the store applies whatever this module returns.

use crate::model::MatchResult;

/// K-factor tiers, keyed by games played before this match.
const K_NEW: f64 = 40.0;
const K_MID: f64 = 32.0;
const K_STABLE: f64 = 24.0;

fn k_factor(games_played: u32) -> f64 {
    if games_played < 30 {
        K_NEW
    } else if games_played < 100 {
        K_MID
    } else {
        K_STABLE
    }
}

/// Expected score of a player rated `rating_a` against one rated `rating_b`,
/// standard logistic Elo curve. Also used directly as a win-probability
/// projection (supplemental, not persisted anywhere).
pub fn expected_score(rating_a: i32, rating_b: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf((rating_b - rating_a) as f64 / 400.0))
}

/// Result of applying a match outcome to a pair of pre-match MMRs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RatingOutcome {
    /// Signed relative to player 1: positive means player 1 gained (§3).
    pub mmr_change: i32,
    pub player1_new_mmr: i32,
    pub player2_new_mmr: i32,
}

/// Compute the MMR change and resulting ratings for a finalized match.
///
/// K is taken from player 1's `player1_games_played` — the single affected
/// player whose tier governs the one signed delta applied to both sides.
/// The original service computes asymmetric `K1`/`K2` per player; this
/// engine persists one `mmr_change` field (§3), so it deliberately collapses
/// to a single K rather than splitting the delta two ways.
///
/// `result` must be a scoring result (`Player1Won`, `Player2Won`, `Draw`);
/// `Invalidated`/`Conflict` have no rating effect and must be handled by the
/// caller before reaching here — passing one returns a zero change.
pub fn apply_result(
    player1_mmr: i32,
    player2_mmr: i32,
    player1_games_played: u32,
    result: MatchResult,
) -> RatingOutcome {
    let score1 = match result.player1_score() {
        Some(s) => s,
        None => {
            return RatingOutcome {
                mmr_change: 0,
                player1_new_mmr: player1_mmr,
                player2_new_mmr: player2_mmr,
            }
        }
    };

    let k = k_factor(player1_games_played);
    let e1 = expected_score(player1_mmr, player2_mmr);
    let delta = (k * (score1 - e1)).round() as i32;

    RatingOutcome {
        mmr_change: delta,
        player1_new_mmr: (player1_mmr + delta).max(0),
        player2_new_mmr: (player2_mmr - delta).max(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_ratings_win_gives_half_k() {
        let out = apply_result(1500, 1500, 0, MatchResult::Player1Won);
        assert_eq!(out.mmr_change, 20);
        assert_eq!(out.player1_new_mmr, 1520);
        assert_eq!(out.player2_new_mmr, 1480);
    }

    #[test]
    fn equal_ratings_draw_is_a_no_op() {
        let out = apply_result(1500, 1500, 0, MatchResult::Draw);
        assert_eq!(out.mmr_change, 0);
        assert_eq!(out.player1_new_mmr, 1500);
        assert_eq!(out.player2_new_mmr, 1500);
    }

    #[test]
    fn invalidated_result_is_a_zero_change() {
        let out = apply_result(1500, 1800, 12, MatchResult::Invalidated);
        assert_eq!(out.mmr_change, 0);
        assert_eq!(out.player1_new_mmr, 1500);
        assert_eq!(out.player2_new_mmr, 1800);
    }

    #[test]
    fn conflict_result_is_a_zero_change() {
        let out = apply_result(1500, 1800, 12, MatchResult::Conflict);
        assert_eq!(out.mmr_change, 0);
    }

    #[test]
    fn k_factor_tiers_match_games_played_thresholds() {
        assert_eq!(k_factor(0), K_NEW);
        assert_eq!(k_factor(29), K_NEW);
        assert_eq!(k_factor(30), K_MID);
        assert_eq!(k_factor(99), K_MID);
        assert_eq!(k_factor(100), K_STABLE);
    }

    #[test]
    fn rating_round_trip_flips_sign_for_swapped_sides() {
        // (R1, R2, player1 won) then (R2', R1', player1 won) on the swapped
        // pair reproduces the opposite-sign, equal-magnitude change for the
        // same K (§8 "Round-trip").
        let forward = apply_result(1500, 1600, 10, MatchResult::Player1Won);
        let swapped = apply_result(
            forward.player2_new_mmr,
            forward.player1_new_mmr,
            10,
            MatchResult::Player2Won,
        );
        assert_eq!(swapped.mmr_change, -forward.mmr_change);
    }

    #[test]
    fn ratings_never_go_negative() {
        let out = apply_result(5, 2000, 5, MatchResult::Player2Won);
        assert_eq!(out.player1_new_mmr, 0);
    }

    #[test]
    fn expected_score_is_symmetric_around_half() {
        let e = expected_score(1500, 1500);
        assert!((e - 0.5).abs() < 1e-9);
        let (e_hi, e_lo) = (expected_score(1700, 1500), expected_score(1500, 1700));
        assert!((e_hi + e_lo - 1.0).abs() < 1e-9);
    }
}
