//! Admin Override (C10, §4.10): privileged re-resolution and intervention.
//! Its defining property is idempotence — resolving the same match any
//! number of times with the same final call yields the same player MMRs.

use chrono::Utc;

use crate::config::{AdminRole, AllowlistEntry};
use crate::error::{EngineError, EngineResult};
use crate::match_sm;
use crate::model::{AdminAction, AdminActionType, Match, MatchResult, PlayerState};
use crate::queue::{QueueController, RemoveReason};
use crate::rating;
use crate::store::{LiveStore, StoreController};
use crate::writelog::WriteLogController;

pub fn is_admin(allowlist: &[AllowlistEntry], discord_uid: i64) -> bool {
    allowlist.iter().any(|e| e.discord_id == discord_uid)
}

pub fn is_owner(allowlist: &[AllowlistEntry], discord_uid: i64) -> bool {
    allowlist
        .iter()
        .any(|e| e.discord_id == discord_uid && e.role == AdminRole::Owner)
}

/// Read-only operational projection (supplemental feature, grounded on
/// `admin_service.py::get_system_snapshot`, scoped down to the counts this
/// engine actually tracks). Audit-only: nothing in core logic consults it.
#[derive(Clone, Copy, Debug)]
pub struct SystemSnapshot {
    pub queue_size: usize,
    pub population_estimate: usize,
    pub pending_write_log_jobs: usize,
    pub open_conflicts: usize,
}

pub async fn system_snapshot(
    store: &StoreController,
    queue: &QueueController,
    write_log: &WriteLogController,
    population_estimate: usize,
) -> SystemSnapshot {
    SystemSnapshot {
        queue_size: queue.snapshot().len(),
        population_estimate,
        pending_write_log_jobs: write_log.pending_jobs().await.len(),
        open_conflicts: store.open_conflict_count(),
    }
}

fn audit(
    admin_uid: i64,
    admin_name: &str,
    action_type: AdminActionType,
    target_player_uid: Option<i64>,
    target_match_id: Option<i64>,
    detail: serde_json::Value,
    reason: &str,
) -> AdminAction {
    AdminAction {
        id: 0,
        admin_discord_uid: admin_uid,
        admin_display_name: admin_name.to_string(),
        action_type,
        target_player_uid,
        target_match_id,
        detail,
        reason: reason.to_string(),
        performed_at: Utc::now().naive_utc(),
    }
}

/// `admin.resolve` — §4.10's idempotent re-resolution algorithm.
pub async fn resolve_match(
    store: &StoreController,
    admin_uid: i64,
    admin_name: &str,
    match_id: i64,
    result: MatchResult,
    reason: &str,
) -> EngineResult<Match> {
    if !result.is_terminal() {
        return Err(EngineError::validation("admin resolution must target a terminal result"));
    }

    let m = store.match_by_id(match_id).ok_or_else(|| EngineError::validation("no such match"))?;

    if m.match_result.is_none() && m.player1_report.is_none() && m.player2_report.is_none() {
        // Fresh-match resolution: simulate both reports, then restore nulls.
        return resolve_fresh_match(store, admin_uid, admin_name, match_id, result, reason).await;
    }

    reresolve_with_snapshot(store, admin_uid, admin_name, &m, result, reason).await
}

/// §4.10 steps 1-6: restore to the immutable snapshot, then apply the new
/// result from that snapshot — never from current MMR — so repeated calls
/// converge to the same final numbers regardless of how many times the
/// match has already been re-resolved.
async fn reresolve_with_snapshot(
    store: &StoreController,
    admin_uid: i64,
    admin_name: &str,
    m: &Match,
    result: MatchResult,
    reason: &str,
) -> EngineResult<Match> {
    let mut r1 = store.rating(m.player1_uid, m.player1_race);
    let mut r2 = store.rating(m.player2_uid, m.player2_race);

    // Step 2: if a change was previously applied, restore current MMR to
    // the immutable snapshot by direct assignment (not by subtracting Δ).
    if m.mmr_change.unwrap_or(0) != 0 {
        r1.mmr = m.player1_initial_mmr;
        r2.mmr = m.player2_initial_mmr;
    }

    // Step 3-4: compute the new delta from the snapshot, apply to the
    // snapshot values (which now equal r1.mmr/r2.mmr after the restore, or
    // already did if there was nothing to restore).
    let mmr_change = match result.player1_score() {
        Some(_) => {
            let games_played = store.rating(m.player1_uid, m.player1_race).games_played;
            rating::apply_result(m.player1_initial_mmr, m.player2_initial_mmr, games_played, result)
                .mmr_change
        }
        None => 0,
    };
    r1.mmr = m.player1_initial_mmr + mmr_change;
    r2.mmr = m.player2_initial_mmr - mmr_change;

    store.update_mmr(r1).await.map_err(EngineError::External)?;
    store.update_mmr(r2).await.map_err(EngineError::External)?;

    // Step 5-6: original reports are untouched by `admin_resolve_match`;
    // game counters are never adjusted here.
    store
        .admin_resolve_match(m.id, result, mmr_change)
        .await
        .map_err(EngineError::External)?;

    // Step 7: clear queue locks.
    if matches!(store.player(m.player1_uid).map(|p| p.state), Some(PlayerState::Matched)) {
        store.update_player_state(m.player1_uid, PlayerState::Idle).await.map_err(EngineError::External)?;
    }
    if matches!(store.player(m.player2_uid).map(|p| p.state), Some(PlayerState::Matched)) {
        store.update_player_state(m.player2_uid, PlayerState::Idle).await.map_err(EngineError::External)?;
    }

    // Step 8: audit.
    let detail = serde_json::json!({ "match_id": m.id, "result": result as i8, "mmr_change": mmr_change });
    store
        .log_admin_action(audit(
            admin_uid,
            admin_name,
            AdminActionType::ResolveMatch,
            None,
            Some(m.id),
            detail,
            reason,
        ))
        .await
        .map_err(EngineError::External)?;

    Ok(store.match_by_id(m.id).expect("match just written"))
}

/// §4.10 "Fresh-match resolution": simulate both reports through the normal
/// completion flow, then restore the (null) reports in persistence so the
/// historical record still shows nobody actually reported.
async fn resolve_fresh_match(
    store: &StoreController,
    admin_uid: i64,
    admin_name: &str,
    match_id: i64,
    result: MatchResult,
    reason: &str,
) -> EngineResult<Match> {
    let m = store.match_by_id(match_id).ok_or_else(|| EngineError::validation("no such match"))?;

    let (r1, r2) = match result {
        MatchResult::Player1Won => (crate::model::ReportCode::Player1Won, crate::model::ReportCode::Player1Won),
        MatchResult::Player2Won => (crate::model::ReportCode::Player2Won, crate::model::ReportCode::Player2Won),
        MatchResult::Draw => (crate::model::ReportCode::Draw, crate::model::ReportCode::Draw),
        _ => return Err(EngineError::validation("fresh resolution requires a scoring result")),
    };

    match_sm::submit_report(store, match_id, m.player1_uid, r1).await?;
    match_sm::submit_report(store, match_id, m.player2_uid, r2).await?;

    store
        .update_match_report(match_id, None, None)
        .await
        .map_err(EngineError::External)?;

    let detail = serde_json::json!({ "match_id": match_id, "result": result as i8, "fresh": true });
    store
        .log_admin_action(audit(
            admin_uid,
            admin_name,
            AdminActionType::ResolveMatch,
            None,
            Some(match_id),
            detail,
            reason,
        ))
        .await
        .map_err(EngineError::External)?;

    Ok(store.match_by_id(match_id).expect("match just written"))
}

/// `admin.adjust_mmr` — set/add/subtract, no game-counter change.
pub async fn adjust_mmr(
    store: &StoreController,
    admin_uid: i64,
    admin_name: &str,
    target_uid: i64,
    race: crate::model::Race,
    delta: i32,
    reason: &str,
) -> EngineResult<()> {
    let mut r = store.rating(target_uid, race);
    r.mmr = (r.mmr + delta).max(0);
    store.update_mmr(r).await.map_err(EngineError::External)?;

    let detail = serde_json::json!({ "race": race.as_db_str(), "delta": delta });
    store
        .log_admin_action(audit(
            admin_uid,
            admin_name,
            AdminActionType::AdjustMmr,
            Some(target_uid),
            None,
            detail,
            reason,
        ))
        .await
        .map_err(EngineError::External)
}

/// `admin.remove_queue` — force-dequeue a player.
pub async fn remove_from_queue(
    store: &StoreController,
    queue: &QueueController,
    admin_uid: i64,
    admin_name: &str,
    target_uid: i64,
    reason: &str,
) -> EngineResult<()> {
    queue.remove(target_uid, RemoveReason::AdminRemoved);
    store
        .update_player_state(target_uid, PlayerState::Idle)
        .await
        .map_err(EngineError::External)?;

    store
        .log_admin_action(audit(
            admin_uid,
            admin_name,
            AdminActionType::RemoveFromQueue,
            Some(target_uid),
            None,
            serde_json::Value::Null,
            reason,
        ))
        .await
        .map_err(EngineError::External)
}

/// `admin.reset_aborts` — set the counter to an explicit value.
pub async fn reset_aborts(
    store: &StoreController,
    admin_uid: i64,
    admin_name: &str,
    target_uid: i64,
    new_value: u8,
    reason: &str,
) -> EngineResult<()> {
    store.update_remaining_aborts(target_uid, new_value).await.map_err(EngineError::External)?;
    store
        .log_admin_action(audit(
            admin_uid,
            admin_name,
            AdminActionType::ResetAborts,
            Some(target_uid),
            None,
            serde_json::json!({ "new_value": new_value }),
            reason,
        ))
        .await
        .map_err(EngineError::External)
}

/// `admin.toggle_ban`.
pub async fn toggle_ban(
    store: &StoreController,
    admin_uid: i64,
    admin_name: &str,
    target_uid: i64,
    reason: &str,
) -> EngineResult<bool> {
    let current = store.player(target_uid).map(|p| p.is_banned).unwrap_or(false);
    let new_value = !current;
    store.update_is_banned(target_uid, new_value).await.map_err(EngineError::External)?;
    store
        .log_admin_action(audit(
            admin_uid,
            admin_name,
            AdminActionType::ToggleBan,
            Some(target_uid),
            None,
            serde_json::json!({ "banned": new_value }),
            reason,
        ))
        .await
        .map_err(EngineError::External)?;
    Ok(new_value)
}

/// `admin.unblock` — set lifecycle back to idle and clear queue locks.
pub async fn unblock(
    store: &StoreController,
    queue: &QueueController,
    admin_uid: i64,
    admin_name: &str,
    target_uid: i64,
    reason: &str,
) -> EngineResult<()> {
    queue.remove(target_uid, RemoveReason::AdminRemoved);
    store.update_player_state(target_uid, PlayerState::Idle).await.map_err(EngineError::External)?;
    store
        .log_admin_action(audit(
            admin_uid,
            admin_name,
            AdminActionType::Unblock,
            Some(target_uid),
            None,
            serde_json::Value::Null,
            reason,
        ))
        .await
        .map_err(EngineError::External)
}

/// `admin.clear_queue` — emergency dequeue-everyone. Returns the uids
/// removed so the caller can notify them.
pub async fn clear_queue(
    store: &StoreController,
    queue: &QueueController,
    admin_uid: i64,
    admin_name: &str,
    reason: &str,
) -> EngineResult<Vec<i64>> {
    let uids: Vec<i64> = queue.snapshot().into_iter().map(|e| e.discord_uid).collect();
    for uid in &uids {
        queue.remove(*uid, RemoveReason::AdminRemoved);
        store.update_player_state(*uid, PlayerState::Idle).await.map_err(EngineError::External)?;
    }
    store
        .log_admin_action(audit(
            admin_uid,
            admin_name,
            AdminActionType::ClearQueue,
            None,
            None,
            serde_json::json!({ "cleared": uids.len() }),
            reason,
        ))
        .await
        .map_err(EngineError::External)?;
    Ok(uids)
}

/// `owner.toggle_admin` — owner-only membership toggle on the in-memory
/// copy of the allowlist; persistence of the allowlist file itself is out
/// of scope (§6: it's a static config file, not store-owned state).
pub fn toggle_admin(
    allowlist: &mut Vec<AllowlistEntry>,
    owner_uid: i64,
    target_uid: i64,
    target_name: &str,
) -> EngineResult<bool> {
    if !is_owner(allowlist, owner_uid) {
        return Err(EngineError::authorization("only an owner may toggle admin membership"));
    }
    if let Some(pos) = allowlist.iter().position(|e| e.discord_id == target_uid) {
        allowlist.remove(pos);
        Ok(false)
    } else {
        allowlist.push(AllowlistEntry {
            discord_id: target_uid,
            name: target_name.to_string(),
            role: AdminRole::Admin,
        });
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Player, Race, ReportCode};
    use crate::test_support::fresh_store as store;
    use std::sync::Arc;

    #[tokio::test]
    async fn reresolving_the_same_match_repeatedly_converges() {
        let store = store();
        store.create_player(Player::new(1, "p1")).await.unwrap();
        store.create_player(Player::new(2, "p2")).await.unwrap();
        let m = match_sm::create_match(&store, 1, Race::BwTerran, 2, Race::Sc2Zerg).await.unwrap();

        match_sm::submit_report(&store, m.id, 1, ReportCode::Player1Won).await.unwrap();
        match_sm::submit_report(&store, m.id, 2, ReportCode::Player1Won).await.unwrap();

        let after_first = resolve_match(&store, 999, "admin", m.id, MatchResult::Player2Won, "bad call")
            .await
            .unwrap();
        let r1_after_first = store.rating(1, Race::BwTerran).mmr;
        let r2_after_first = store.rating(2, Race::Sc2Zerg).mmr;

        // Re-resolve to the SAME result twice more; MMRs must not drift.
        resolve_match(&store, 999, "admin", m.id, MatchResult::Player2Won, "re-check").await.unwrap();
        resolve_match(&store, 999, "admin", m.id, MatchResult::Player2Won, "re-check again").await.unwrap();

        assert_eq!(store.rating(1, Race::BwTerran).mmr, r1_after_first);
        assert_eq!(store.rating(2, Race::Sc2Zerg).mmr, r2_after_first);
        assert_eq!(after_first.match_result, Some(MatchResult::Player2Won));

        // Original reports are preserved, not overwritten by the override.
        let m_final = store.match_by_id(m.id).unwrap();
        assert_eq!(m_final.player1_report, Some(ReportCode::Player1Won));
        assert_eq!(m_final.player2_report, Some(ReportCode::Player1Won));
    }

    #[tokio::test]
    async fn system_snapshot_reports_queue_and_conflict_counts() {
        let store = store();
        let path = std::env::temp_dir().join(format!("arbiter-test-writelog-{}.jsonl", std::process::id()));
        let write_log = WriteLogController::open(&path).await.unwrap();
        let queue = QueueController::new(Arc::new(store.clone()));

        store.create_player(Player::new(1, "p1")).await.unwrap();
        store.create_player(Player::new(2, "p2")).await.unwrap();
        queue.add(1, vec![Race::BwTerran]).unwrap();

        let m = match_sm::create_match(&store, 1, Race::BwTerran, 2, Race::Sc2Zerg).await.unwrap();
        match_sm::submit_report(&store, m.id, 1, ReportCode::Player1Won).await.unwrap();
        match_sm::submit_report(&store, m.id, 2, ReportCode::Player2Won).await.unwrap();

        let snap = system_snapshot(&store, &queue, &write_log, 42).await;
        assert_eq!(snap.queue_size, 1);
        assert_eq!(snap.population_estimate, 42);
        assert_eq!(snap.open_conflicts, 1);

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn fresh_match_resolution_restores_null_reports() {
        let store = store();
        store.create_player(Player::new(1, "p1")).await.unwrap();
        store.create_player(Player::new(2, "p2")).await.unwrap();
        let m = match_sm::create_match(&store, 1, Race::BwTerran, 2, Race::Sc2Zerg).await.unwrap();

        resolve_match(&store, 999, "admin", m.id, MatchResult::Draw, "manual call").await.unwrap();

        let m_final = store.match_by_id(m.id).unwrap();
        assert_eq!(m_final.match_result, Some(MatchResult::Draw));
        assert_eq!(m_final.player1_report, None);
        assert_eq!(m_final.player2_report, None);
    }
}
