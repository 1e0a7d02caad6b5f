//! The thin facade wiring every standalone component (Queue, Pairing, Match
//! State Machine, Admin Override, Replay Ingestion, Notification Router,
//! Command Guards) into one cheaply-cloneable handle the Orchestrator drives.
//! Mirrors the teacher's controller-facade shape: commands come in, get
//! guarded, get dispatched to the owning component, and a typed output comes
//! back for the presentation layer to render.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock as AsyncRwLock;

use crate::admin;
use crate::command::{
    AdminCommand, CommandOutput, MmrOp, OwnerCommand, PlayerCommand, ReportedOutcome, HELP_TEXT,
};
use crate::config::{AllowlistEntry, Config};
use crate::constants::WindowProfile;
use crate::error::{EngineError, EngineResult};
use crate::event::EngineEvent;
use crate::guard;
use crate::match_sm;
use crate::model::{MatchResult, PlayerState, ReportCode};
use crate::notify::{Notification, NotificationRouter};
use crate::pairing;
use crate::queue::{self, QueueController, RemoveReason};
use crate::replay::{self, ReplayWorkerPool};
use crate::store::{LiveStore, StoreController};
use crate::writelog::WriteLogController;

/// Everything a running engine needs, wired together once at startup (C11)
/// and handed out as one `Arc`-backed handle per inbound command.
#[derive(Clone)]
pub struct Controller {
    pub store: StoreController,
    pub write_log: WriteLogController,
    pub queue: QueueController,
    pub notifications: NotificationRouter,
    pub replay_pool: Arc<ReplayWorkerPool>,
    allowlist: Arc<AsyncRwLock<Vec<AllowlistEntry>>>,
    window_profile: WindowProfile,
    /// Refreshed periodically by the Orchestrator from the player count in
    /// the SQL store; feeds `pairing::pressure`'s population term. The
    /// in-memory store doesn't keep a running player count itself (§4.4
    /// tracks it only as a reverse index keyed by race), so this is tracked
    /// separately rather than added to `LiveStore`.
    population_estimate: Arc<AtomicUsize>,
}

impl Controller {
    pub fn new(
        store: StoreController,
        write_log: WriteLogController,
        queue: QueueController,
        notifications: NotificationRouter,
        replay_pool: Arc<ReplayWorkerPool>,
        allowlist: Vec<AllowlistEntry>,
        config: &Config,
    ) -> Self {
        Controller {
            store,
            write_log,
            queue,
            notifications,
            replay_pool,
            allowlist: Arc::new(AsyncRwLock::new(allowlist)),
            window_profile: config.match_window_profile,
            population_estimate: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_population_estimate(&self, n: usize) {
        self.population_estimate.store(n, Ordering::Relaxed);
    }

    fn population(&self) -> usize {
        self.population_estimate.load(Ordering::Relaxed)
    }

    /// Read-only operational projection for the Orchestrator's periodic
    /// self-check and for admin tooling (§4.10 supplemental).
    pub async fn system_snapshot(&self) -> admin::SystemSnapshot {
        admin::system_snapshot(&self.store, &self.queue, &self.write_log, self.population()).await
    }

    // ---- Player commands (§6) ----------------------------------------

    pub async fn handle_player_command(
        &self,
        discord_uid: i64,
        discord_username: &str,
        cmd: PlayerCommand,
    ) -> EngineResult<CommandOutput> {
        let player = guard::ensure_player_record(&self.store, discord_uid, discord_username).await?;

        match cmd {
            PlayerCommand::Setup { display_name, battletag, alt_names, country, region } => {
                if display_name.trim().is_empty() {
                    return Err(EngineError::validation("display name must not be empty"));
                }
                guard::require_not_banned(&player)?;
                self.store
                    .update_player_info(discord_uid, display_name, battletag, alt_names, country, region)
                    .await
                    .map_err(EngineError::External)?;
                self.store
                    .update_completed_setup(discord_uid, true)
                    .await
                    .map_err(EngineError::External)?;
                Ok(CommandOutput::Ack)
            }
            PlayerCommand::SetCountry { country } => {
                guard::require_not_banned(&player)?;
                if country.trim().is_empty() {
                    return Err(EngineError::validation("invalid country code"));
                }
                self.store
                    .update_player_info(
                        discord_uid,
                        player.display_name.clone(),
                        player.battletag.clone(),
                        player.alt_names.clone(),
                        Some(country),
                        player.region.clone(),
                    )
                    .await
                    .map_err(EngineError::External)?;
                Ok(CommandOutput::Ack)
            }
            PlayerCommand::AcceptTerms => {
                guard::require_not_banned(&player)?;
                self.store
                    .update_accepted_tos(discord_uid, true)
                    .await
                    .map_err(EngineError::External)?;
                Ok(CommandOutput::Ack)
            }
            PlayerCommand::DeclineTerms => {
                guard::require_not_banned(&player)?;
                self.store
                    .update_accepted_tos(discord_uid, false)
                    .await
                    .map_err(EngineError::External)?;
                Ok(CommandOutput::Ack)
            }
            PlayerCommand::Queue { races } => {
                guard::require_queue_access(&player)?;
                self.queue.add(discord_uid, races)?;
                self.store
                    .update_player_state(discord_uid, PlayerState::Queued)
                    .await
                    .map_err(EngineError::External)?;
                Ok(CommandOutput::Ack)
            }
            PlayerCommand::Dequeue => {
                guard::require_not_banned(&player)?;
                if self.queue.remove(discord_uid, RemoveReason::Cancelled).is_none() {
                    return Err(EngineError::state("not queued"));
                }
                self.store
                    .update_player_state(discord_uid, PlayerState::Idle)
                    .await
                    .map_err(EngineError::External)?;
                Ok(CommandOutput::Ack)
            }
            PlayerCommand::ReportResult { match_id, outcome } => {
                guard::require_not_banned(&player)?;
                let code = match outcome {
                    ReportedOutcome::Win => self.own_win_code(match_id, discord_uid)?,
                    ReportedOutcome::Loss => self.own_loss_code(match_id, discord_uid)?,
                    ReportedOutcome::Draw => ReportCode::Draw,
                    ReportedOutcome::Abort => ReportCode::ManualAbort,
                };
                let result = match_sm::submit_report(&self.store, match_id, discord_uid, code).await?;
                self.settle_if_terminal(match_id, result).await?;
                Ok(CommandOutput::Ack)
            }
            PlayerCommand::UploadReplay { match_id, bytes } => {
                guard::require_not_banned(&player)?;
                let (_replay, verification) = replay::ingest(
                    &self.store,
                    &self.replay_pool,
                    match_id,
                    discord_uid,
                    format!("replays/{}-{}.rep", match_id, discord_uid),
                    bytes,
                )
                .await?;
                if verification.blocking_mismatch() {
                    self.notifications
                        .send_low(Notification {
                            recipient_uid: discord_uid,
                            text: "replay verification found a mismatch; an admin will review it".to_string(),
                        })
                        .await
                        .map_err(EngineError::External)?;
                }
                Ok(CommandOutput::Ack)
            }
            PlayerCommand::Profile => {
                let ratings = crate::catalog::races()
                    .iter()
                    .map(|&r| self.store.rating(discord_uid, r))
                    .collect();
                Ok(CommandOutput::Profile(player, ratings))
            }
            PlayerCommand::Leaderboard { race } => {
                Ok(CommandOutput::Leaderboard(self.store.leaderboard(race, 20)))
            }
            PlayerCommand::Help => Ok(CommandOutput::HelpText(HELP_TEXT)),
        }
    }

    /// A player reporting "win" means "I say I won" — translate to the
    /// common player-1 frame based on which side they're on.
    fn own_win_code(&self, match_id: i64, reporter_uid: i64) -> EngineResult<ReportCode> {
        let m = self.store.match_by_id(match_id).ok_or_else(|| EngineError::validation("no such match"))?;
        Ok(if reporter_uid == m.player1_uid { ReportCode::Player1Won } else { ReportCode::Player2Won })
    }

    fn own_loss_code(&self, match_id: i64, reporter_uid: i64) -> EngineResult<ReportCode> {
        let m = self.store.match_by_id(match_id).ok_or_else(|| EngineError::validation("no such match"))?;
        Ok(if reporter_uid == m.player1_uid { ReportCode::Player2Won } else { ReportCode::Player1Won })
    }

    /// Once a match leaves `REPORTING`, clear both sides' `matched` lock so
    /// they can queue again. No-op while still awaiting the other report.
    async fn settle_if_terminal(&self, match_id: i64, result: Option<MatchResult>) -> EngineResult<()> {
        if result.is_none() {
            return Ok(());
        }
        let m = self.store.match_by_id(match_id).ok_or_else(|| EngineError::integrity("match vanished"))?;
        for uid in [m.player1_uid, m.player2_uid] {
            if matches!(self.store.player(uid).map(|p| p.state), Some(PlayerState::Matched)) {
                self.store.update_player_state(uid, PlayerState::Idle).await.map_err(EngineError::External)?;
            }
        }
        Ok(())
    }

    // ---- Admin / owner commands (§6, §4.10) --------------------------

    pub async fn handle_admin_command(
        &self,
        admin_uid: i64,
        admin_name: &str,
        cmd: AdminCommand,
    ) -> EngineResult<CommandOutput> {
        {
            let allowlist = self.allowlist.read().await;
            if !admin::is_admin(&allowlist, admin_uid) {
                return Err(EngineError::authorization("not an admin"));
            }
        }

        match cmd {
            AdminCommand::ResolveMatch { match_id, result, reason } => {
                let m = admin::resolve_match(&self.store, admin_uid, admin_name, match_id, result, &reason)
                    .await?;
                Ok(CommandOutput::MatchResolved(m))
            }
            AdminCommand::AdjustMmr { target_uid, race, op, value, reason } => {
                let current = self.store.rating(target_uid, race).mmr;
                let delta = match op {
                    MmrOp::Set => value - current,
                    MmrOp::Add => value,
                    MmrOp::Sub => -value,
                };
                admin::adjust_mmr(&self.store, admin_uid, admin_name, target_uid, race, delta, &reason)
                    .await?;
                let new_mmr = self.store.rating(target_uid, race).mmr;
                Ok(CommandOutput::MmrAdjusted { target_uid, race, new_mmr })
            }
            AdminCommand::RemoveFromQueue { target_uid, reason } => {
                admin::remove_from_queue(&self.store, &self.queue, admin_uid, admin_name, target_uid, &reason)
                    .await?;
                Ok(CommandOutput::Ack)
            }
            AdminCommand::ResetAborts { target_uid, new_count, reason } => {
                admin::reset_aborts(&self.store, admin_uid, admin_name, target_uid, new_count, &reason)
                    .await?;
                Ok(CommandOutput::Ack)
            }
            AdminCommand::ToggleBan { target_uid, reason } => {
                let now_banned =
                    admin::toggle_ban(&self.store, admin_uid, admin_name, target_uid, &reason).await?;
                Ok(CommandOutput::BanToggled { target_uid, now_banned })
            }
            AdminCommand::Unblock { target_uid, reason } => {
                admin::unblock(&self.store, &self.queue, admin_uid, admin_name, target_uid, &reason).await?;
                Ok(CommandOutput::Ack)
            }
            AdminCommand::ClearQueue { reason } => {
                let removed =
                    admin::clear_queue(&self.store, &self.queue, admin_uid, admin_name, &reason).await?;
                Ok(CommandOutput::QueueCleared { count: removed.len() })
            }
        }
    }

    pub async fn handle_owner_command(
        &self,
        owner_uid: i64,
        cmd: OwnerCommand,
    ) -> EngineResult<CommandOutput> {
        let OwnerCommand::ToggleAdmin { target_uid, target_name } = cmd;
        let mut allowlist = self.allowlist.write().await;
        let is_admin_now = admin::toggle_admin(&mut allowlist, owner_uid, target_uid, &target_name)?;
        Ok(CommandOutput::AdminToggled { target_uid, is_admin_now })
    }

    // ---- Wave scheduling (C11 driving C5/C6/C7) ----------------------

    /// One wave tick: age the queue, split into sides, pair within the
    /// current window, and create a match for every accepted pairing.
    /// Returns the events the orchestrator should notify participants of.
    pub async fn run_wave(&self) -> Vec<EngineEvent> {
        self.queue.tick_wave();
        let snapshot = self.queue.snapshot();
        if snapshot.is_empty() {
            return Vec::new();
        }
        let sides = queue::split_sides(snapshot);
        let (lead, follow, lead_is_bw) = if sides.lead_is_bw() {
            (sides.bw_side, sides.sc2_side, true)
        } else {
            (sides.sc2_side, sides.bw_side, false)
        };

        let lead_mmr: Vec<i32> = lead
            .iter()
            .map(|e| {
                let race = queue::choose_race_for_side(&self.store, e, lead_is_bw);
                self.store.rating(e.discord_uid, race).mmr
            })
            .collect();
        let follow_mmr: Vec<i32> = follow
            .iter()
            .map(|e| {
                let race = queue::choose_race_for_side(&self.store, e, !lead_is_bw);
                self.store.rating(e.discord_uid, race).mmr
            })
            .collect();

        let population = self.population();
        let pairings = pairing::pair_sides(&lead, &follow, &lead_mmr, &follow_mmr, self.window_profile, population);

        let mut events = Vec::with_capacity(pairings.len());
        for p in pairings {
            let lead_entry = &lead[p.lead_idx];
            let follow_entry = &follow[p.follow_idx];
            let lead_race = queue::choose_race_for_side(&self.store, lead_entry, lead_is_bw);
            let follow_race = queue::choose_race_for_side(&self.store, follow_entry, !lead_is_bw);

            let (p1_uid, p1_race, p2_uid, p2_race) = if lead_is_bw {
                (lead_entry.discord_uid, lead_race, follow_entry.discord_uid, follow_race)
            } else {
                (follow_entry.discord_uid, follow_race, lead_entry.discord_uid, lead_race)
            };

            match match_sm::create_match(&self.store, p1_uid, p1_race, p2_uid, p2_race).await {
                Ok(m) => {
                    self.queue.remove_many(&[lead_entry.discord_uid, follow_entry.discord_uid]);
                    for uid in [m.player1_uid, m.player2_uid] {
                        if let Err(e) = self.store.update_player_state(uid, PlayerState::Matched).await {
                            log::error!("failed to mark player {} matched: {}", uid, e);
                        }
                    }
                    events.push(EngineEvent::MatchCreated { m });
                }
                Err(e) => log::error!("failed to create match from pairing: {}", e),
            }
        }
        events
    }

    /// Scheduled `ABANDONMENT_TIMEOUT_SEC` after a match is created;
    /// no-ops if the match already left `REPORTING` on its own.
    pub async fn abandon_if_unresponsive(&self, match_id: i64) -> EngineResult<Option<MatchResult>> {
        match_sm::abandon_unresponsive(&self.store, match_id).await
    }
}
