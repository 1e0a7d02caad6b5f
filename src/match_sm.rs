//! Match Creation & State Machine (C7, §4.7): from a pairing decision
//! through reporting, conflict, abandonment, and terminal MMR application.

use chrono::Utc;

use crate::catalog;
use crate::error::{EngineError, EngineResult};
use crate::model::{Match, MatchResult, MatchSide, Race, ReportCode};
use crate::rating;
use crate::store::{LiveStore, StoreController};

/// Steps 1-6 of §4.7's creation sequence. Queue removal, lifecycle
/// transition to `matched`, and the "match found" notification (step 5, 7)
/// are the caller's responsibility — they depend on the Queue Engine and
/// Notification Router, which this module doesn't own.
pub async fn create_match(
    store: &StoreController,
    player1_uid: i64,
    player1_race: Race,
    player2_uid: i64,
    player2_race: Race,
) -> anyhow::Result<Match> {
    let player1_initial_mmr = store.rating(player1_uid, player1_race).mmr;
    let player2_initial_mmr = store.rating(player2_uid, player2_race).mmr;

    let id = store.allocate_match_id();
    let map = catalog::pick_map(id);

    let player1_region = store.player(player1_uid).and_then(|p| p.region);
    let player2_region = store.player(player2_uid).and_then(|p| p.region);
    let server_region = catalog::best_server(player1_region.as_deref(), player2_region.as_deref());

    let now = Utc::now().naive_utc();
    let m = Match {
        id,
        player1_uid,
        player2_uid,
        player1_race,
        player2_race,
        map,
        server_region,
        player1_initial_mmr,
        player2_initial_mmr,
        player1_report: None,
        player2_report: None,
        match_result: None,
        mmr_change: None,
        player1_replay_path: None,
        player2_replay_path: None,
        created_at: now,
        played_at: None,
        updated_at: now,
    };

    store.create_match(m.clone()).await?;
    Ok(m)
}

fn remaining_aborts_of(store: &StoreController, discord_uid: i64) -> u8 {
    store.player(discord_uid).map(|p| p.remaining_aborts).unwrap_or(0)
}

fn side_of(m: &Match, reporter_uid: i64) -> Option<MatchSide> {
    if reporter_uid == m.player1_uid {
        Some(MatchSide::Player1)
    } else if reporter_uid == m.player2_uid {
        Some(MatchSide::Player2)
    } else {
        None
    }
}

/// Record `reporter_uid`'s report, store it in the common (player-1) frame,
/// then run the completion check. Returns the resulting `MatchResult` once
/// the match reaches a terminal or conflict state, `None` while still
/// `REPORTING`.
pub async fn submit_report(
    store: &StoreController,
    match_id: i64,
    reporter_uid: i64,
    code: ReportCode,
) -> EngineResult<Option<MatchResult>> {
    let m = store
        .match_by_id(match_id)
        .ok_or_else(|| EngineError::validation("no such match"))?;

    if m.is_terminal() || m.is_conflict() {
        return Err(EngineError::state("match already resolved"));
    }

    let side = side_of(&m, reporter_uid)
        .ok_or_else(|| EngineError::authorization("not a participant in this match"))?;

    if code == ReportCode::ManualAbort {
        let remaining = remaining_aborts_of(store, reporter_uid);
        if remaining == 0 {
            return Err(EngineError::validation("no manual aborts remaining"));
        }
    }

    let (player1_report, player2_report) = match side {
        MatchSide::Player1 => (Some(code), m.player2_report),
        MatchSide::Player2 => (m.player1_report, Some(code)),
    };

    store
        .update_match_report(match_id, player1_report, player2_report)
        .await
        .map_err(EngineError::External)?;

    run_completion_check(store, match_id, player1_report, player2_report).await
}

/// Abandonment timer firing at `T_abandon` (§4.7): any player who hasn't
/// reported gets a `-4` ("no response"), then the completion check runs.
pub async fn abandon_unresponsive(
    store: &StoreController,
    match_id: i64,
) -> EngineResult<Option<MatchResult>> {
    let m = store
        .match_by_id(match_id)
        .ok_or_else(|| EngineError::validation("no such match"))?;

    if m.is_terminal() || m.is_conflict() {
        return Ok(m.match_result);
    }

    let player1_report = m.player1_report.or(Some(ReportCode::NoResponse));
    let player2_report = m.player2_report.or(Some(ReportCode::NoResponse));

    store
        .update_match_report(match_id, player1_report, player2_report)
        .await
        .map_err(EngineError::External)?;

    run_completion_check(store, match_id, player1_report, player2_report).await
}

/// §4.7 "Completion check": branches evaluated in spec order.
async fn run_completion_check(
    store: &StoreController,
    match_id: i64,
    r1: Option<ReportCode>,
    r2: Option<ReportCode>,
) -> EngineResult<Option<MatchResult>> {
    let (r1, r2) = match (r1, r2) {
        (Some(a), Some(b)) => (a, b),
        _ => return Ok(None),
    };

    use ReportCode::*;

    let result = if r1 == r2 && matches!(r1, Player1Won | Player2Won | Draw) {
        let result = match r1 {
            Player1Won => MatchResult::Player1Won,
            Player2Won => MatchResult::Player2Won,
            Draw => MatchResult::Draw,
            _ => unreachable!(),
        };
        finalize_terminal(store, match_id, result).await?;
        result
    } else if r1 == ManualAbort && r2 == ManualAbort {
        decrement_aborts(store, match_id, true, true).await?;
        finalize_invalidated(store, match_id).await?;
        MatchResult::Invalidated
    } else if r1 == ManualAbort || r2 == ManualAbort {
        let (aborter_is_p1, result) =
            if r1 == ManualAbort { (true, MatchResult::Player2Won) } else { (false, MatchResult::Player1Won) };
        decrement_aborts(store, match_id, aborter_is_p1, !aborter_is_p1).await?;
        finalize_terminal(store, match_id, result).await?;
        result
    } else if r1 == NoResponse && r2 == NoResponse {
        finalize_invalidated(store, match_id).await?;
        MatchResult::Invalidated
    } else {
        store
            .update_match_result_and_mmr_change(match_id, MatchResult::Conflict, 0)
            .await
            .map_err(EngineError::External)?;
        MatchResult::Conflict
    };

    Ok(Some(result))
}

async fn decrement_aborts(
    store: &StoreController,
    match_id: i64,
    player1: bool,
    player2: bool,
) -> EngineResult<()> {
    let m = store.match_by_id(match_id).ok_or_else(|| EngineError::integrity("match vanished"))?;
    if player1 {
        decrement_one(store, m.player1_uid).await?;
    }
    if player2 {
        decrement_one(store, m.player2_uid).await?;
    }
    Ok(())
}

async fn decrement_one(store: &StoreController, discord_uid: i64) -> EngineResult<()> {
    let remaining = remaining_aborts_of(store, discord_uid);
    let new_remaining = remaining.saturating_sub(1);
    store
        .update_remaining_aborts(discord_uid, new_remaining)
        .await
        .map_err(EngineError::External)
}

/// `match_result == -1`: no MMR or games-counter change (§4.7).
async fn finalize_invalidated(store: &StoreController, match_id: i64) -> EngineResult<()> {
    store
        .update_match_result_and_mmr_change(match_id, MatchResult::Invalidated, 0)
        .await
        .map_err(EngineError::External)
}

/// `match_result ∈ {1, 2, 0}`: run the rating engine (C2) against the
/// frozen creation-time MMRs and each player's *current* games_played, then
/// update both players' ratings and the Match's stored `mmr_change`.
async fn finalize_terminal(
    store: &StoreController,
    match_id: i64,
    result: MatchResult,
) -> EngineResult<()> {
    let m = store.match_by_id(match_id).ok_or_else(|| EngineError::integrity("match vanished"))?;

    let mut r1 = store.rating(m.player1_uid, m.player1_race);
    let mut r2 = store.rating(m.player2_uid, m.player2_race);

    let outcome = rating::apply_result(m.player1_initial_mmr, m.player2_initial_mmr, r1.games_played, result);

    r1.mmr = outcome.player1_new_mmr;
    r2.mmr = outcome.player2_new_mmr;
    r1.games_played += 1;
    r2.games_played += 1;
    match result {
        MatchResult::Player1Won => {
            r1.games_won += 1;
            r2.games_lost += 1;
        }
        MatchResult::Player2Won => {
            r1.games_lost += 1;
            r2.games_won += 1;
        }
        MatchResult::Draw => {
            r1.games_drawn += 1;
            r2.games_drawn += 1;
        }
        MatchResult::Invalidated | MatchResult::Conflict => {
            return Err(EngineError::integrity("finalize_terminal called with non-scoring result"));
        }
    }
    let now = Utc::now().naive_utc();
    r1.last_played = Some(now);
    r2.last_played = Some(now);

    store.update_mmr(r1).await.map_err(EngineError::External)?;
    store.update_mmr(r2).await.map_err(EngineError::External)?;
    store
        .update_match_result_and_mmr_change(match_id, result, outcome.mmr_change)
        .await
        .map_err(EngineError::External)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fresh_store as store, setup_players};

    #[tokio::test]
    async fn agreeing_reports_finalize_and_apply_mmr() {
        let store = store();
        setup_players(&store).await;
        let m = create_match(&store, 1, Race::BwTerran, 2, Race::Sc2Zerg).await.unwrap();

        let r = submit_report(&store, m.id, 1, ReportCode::Player1Won).await.unwrap();
        assert!(r.is_none());
        let r = submit_report(&store, m.id, 2, ReportCode::Player1Won).await.unwrap();
        assert_eq!(r, Some(MatchResult::Player1Won));

        let updated = store.match_by_id(m.id).unwrap();
        assert!(updated.mmr_change.unwrap() > 0);
        let r1 = store.rating(1, Race::BwTerran);
        assert_eq!(r1.games_played, 1);
        assert_eq!(r1.games_won, 1);
    }

    #[tokio::test]
    async fn disagreeing_reports_go_to_conflict() {
        let store = store();
        setup_players(&store).await;
        let m = create_match(&store, 1, Race::BwTerran, 2, Race::Sc2Zerg).await.unwrap();

        submit_report(&store, m.id, 1, ReportCode::Player1Won).await.unwrap();
        let r = submit_report(&store, m.id, 2, ReportCode::Player2Won).await.unwrap();
        assert_eq!(r, Some(MatchResult::Conflict));
        let updated = store.match_by_id(m.id).unwrap();
        assert_eq!(updated.mmr_change, Some(0));
    }

    #[tokio::test]
    async fn both_manual_aborts_invalidate_and_decrement_both() {
        let store = store();
        setup_players(&store).await;
        let m = create_match(&store, 1, Race::BwTerran, 2, Race::Sc2Zerg).await.unwrap();

        submit_report(&store, m.id, 1, ReportCode::ManualAbort).await.unwrap();
        let r = submit_report(&store, m.id, 2, ReportCode::ManualAbort).await.unwrap();
        assert_eq!(r, Some(MatchResult::Invalidated));

        assert_eq!(remaining_aborts_of(&store, 1), 2);
        assert_eq!(remaining_aborts_of(&store, 2), 2);
    }

    #[tokio::test]
    async fn one_sided_abort_awards_win_to_the_other_player() {
        let store = store();
        setup_players(&store).await;
        let m = create_match(&store, 1, Race::BwTerran, 2, Race::Sc2Zerg).await.unwrap();

        submit_report(&store, m.id, 1, ReportCode::ManualAbort).await.unwrap();
        let r = submit_report(&store, m.id, 2, ReportCode::Player1Won).await.unwrap();
        assert_eq!(r, Some(MatchResult::Player2Won));
        assert_eq!(remaining_aborts_of(&store, 1), 2);
        assert_eq!(remaining_aborts_of(&store, 2), 3);
    }

    #[tokio::test]
    async fn manual_abort_rejected_once_credits_exhausted() {
        let store = store();
        setup_players(&store).await;
        store.update_remaining_aborts(1, 0).await.unwrap();
        let m = create_match(&store, 1, Race::BwTerran, 2, Race::Sc2Zerg).await.unwrap();

        let err = submit_report(&store, m.id, 1, ReportCode::ManualAbort).await.unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn abandonment_with_no_reports_invalidates() {
        let store = store();
        setup_players(&store).await;
        let m = create_match(&store, 1, Race::BwTerran, 2, Race::Sc2Zerg).await.unwrap();

        let r = abandon_unresponsive(&store, m.id).await.unwrap();
        assert_eq!(r, Some(MatchResult::Invalidated));
    }
}
