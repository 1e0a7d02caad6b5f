//! In-Memory Store (C4, §4.4): the runtime source of truth for players,
//! ratings, matches, and replays, plus the race→sorted-MMR reverse index
//! used by the leaderboard.
//!
//! Reads are synchronous snapshots taken under a `std::sync::RwLock` (no
//! `.await` on the read path). Writes are async because they must append a
//! `WriteJob` to the Durable Write Log *before* the in-memory mutation is
//! considered to have happened — if the append fails, the memory is left
//! untouched (§4.4's "never succeed if the log append fails").

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use crate::model::{
    AdminAction, Match, MatchResult, PerRaceRating, Player, PlayerState, Race, ReportCode, Replay,
};
use crate::writelog::{JobPayload, LiveWriteLog};

#[derive(Default)]
struct StoreState {
    players: HashMap<i64, Player>,
    ratings: HashMap<(i64, Race), PerRaceRating>,
    matches: HashMap<i64, Match>,
    replays: HashMap<String, Replay>,
    /// `(Reverse(mmr), discord_uid) -> ()` per race, so iteration order is
    /// descending MMR with a deterministic tie-break on uid.
    leaderboard: HashMap<Race, BTreeMap<(std::cmp::Reverse<i32>, i64), ()>>,
    next_match_id: i64,
}

/// Read-only surface other controllers (queue, pairing, match state machine,
/// admin override, chat) depend on, mirroring the teacher's `Live*` trait
/// pattern so those components don't need the concrete store type.
#[async_trait]
pub trait LiveStore: Send + Sync {
    fn player(&self, discord_uid: i64) -> Option<Player>;
    fn rating(&self, discord_uid: i64, race: Race) -> PerRaceRating;
    fn match_by_id(&self, id: i64) -> Option<Match>;
    fn leaderboard(&self, race: Race, limit: usize) -> Vec<PerRaceRating>;
    fn replay(&self, path: &str) -> Option<Replay>;
}

#[derive(Clone)]
pub struct StoreController {
    state: Arc<RwLock<StoreState>>,
    write_log: Arc<dyn LiveWriteLog>,
}

impl StoreController {
    pub fn new(write_log: Arc<dyn LiveWriteLog>) -> Self {
        StoreController { state: Arc::new(RwLock::new(StoreState::default())), write_log }
    }

    /// Rebuild in-memory state from the SQL store at startup (§4.3 restart
    /// recovery, step 1: "in-memory state is rebuilt from the SQL store").
    pub fn hydrate(
        &self,
        players: Vec<Player>,
        ratings: Vec<PerRaceRating>,
        matches: Vec<Match>,
        replays: Vec<Replay>,
    ) {
        let mut state = self.state.write().expect("store lock poisoned");
        state.next_match_id = matches.iter().map(|m| m.id).max().map(|id| id + 1).unwrap_or(0);
        for p in players {
            state.players.insert(p.discord_uid, p);
        }
        for r in ratings {
            state.index_insert(r.discord_uid, r.race, r.mmr);
            state.ratings.insert((r.discord_uid, r.race), r);
        }
        for m in matches {
            state.matches.insert(m.id, m);
        }
        for r in replays {
            state.replays.insert(r.path.clone(), r);
        }
    }

    fn next_match_id(&self) -> i64 {
        let mut state = self.state.write().expect("store lock poisoned");
        let id = state.next_match_id;
        state.next_match_id += 1;
        id
    }

    pub fn allocate_match_id(&self) -> i64 {
        self.next_match_id()
    }

    /// Number of matches currently stuck in `CONFLICT`, awaiting admin
    /// resolution. Used by the admin system snapshot (§4.10).
    pub fn open_conflict_count(&self) -> usize {
        let state = self.state.read().expect("store lock poisoned");
        state.matches.values().filter(|m| m.is_conflict()).count()
    }

    pub async fn create_player(&self, player: Player) -> anyhow::Result<()> {
        self.write_log.append(JobPayload::CreatePlayer { player: player.clone() }).await?;
        let mut state = self.state.write().expect("store lock poisoned");
        state.players.entry(player.discord_uid).or_insert(player);
        Ok(())
    }

    pub async fn update_player_info(
        &self,
        discord_uid: i64,
        display_name: String,
        battletag: Option<String>,
        alt_names: Vec<String>,
        country: Option<String>,
        region: Option<String>,
    ) -> anyhow::Result<()> {
        self.write_log
            .append(JobPayload::UpdatePlayerInfo {
                discord_uid,
                display_name: display_name.clone(),
                battletag: battletag.clone(),
                alt_names: alt_names.clone(),
                country: country.clone(),
                region: region.clone(),
            })
            .await?;
        let mut state = self.state.write().expect("store lock poisoned");
        if let Some(p) = state.players.get_mut(&discord_uid) {
            p.display_name = display_name;
            p.battletag = battletag;
            p.alt_names = alt_names;
            p.country = country;
            p.region = region;
        }
        Ok(())
    }

    pub async fn update_accepted_tos(&self, discord_uid: i64, accepted: bool) -> anyhow::Result<()> {
        self.write_log.append(JobPayload::UpdateAcceptedTos { discord_uid, accepted }).await?;
        let mut state = self.state.write().expect("store lock poisoned");
        if let Some(p) = state.players.get_mut(&discord_uid) {
            p.accepted_tos = accepted;
        }
        Ok(())
    }

    pub async fn update_completed_setup(
        &self,
        discord_uid: i64,
        completed: bool,
    ) -> anyhow::Result<()> {
        self.write_log
            .append(JobPayload::UpdateCompletedSetup { discord_uid, completed })
            .await?;
        let mut state = self.state.write().expect("store lock poisoned");
        if let Some(p) = state.players.get_mut(&discord_uid) {
            p.completed_setup = completed;
        }
        Ok(())
    }

    pub async fn update_shield_battery_bug(
        &self,
        discord_uid: i64,
        acked: bool,
    ) -> anyhow::Result<()> {
        self.write_log
            .append(JobPayload::UpdateShieldBatteryBug { discord_uid, acked })
            .await?;
        let mut state = self.state.write().expect("store lock poisoned");
        if let Some(p) = state.players.get_mut(&discord_uid) {
            p.shield_battery_bug_ack = acked;
        }
        Ok(())
    }

    pub async fn update_remaining_aborts(
        &self,
        discord_uid: i64,
        remaining: u8,
    ) -> anyhow::Result<()> {
        self.write_log
            .append(JobPayload::UpdateRemainingAborts { discord_uid, remaining })
            .await?;
        let mut state = self.state.write().expect("store lock poisoned");
        if let Some(p) = state.players.get_mut(&discord_uid) {
            p.remaining_aborts = remaining;
        }
        Ok(())
    }

    pub async fn update_is_banned(&self, discord_uid: i64, banned: bool) -> anyhow::Result<()> {
        self.write_log.append(JobPayload::UpdateIsBanned { discord_uid, banned }).await?;
        let mut state = self.state.write().expect("store lock poisoned");
        if let Some(p) = state.players.get_mut(&discord_uid) {
            p.is_banned = banned;
        }
        Ok(())
    }

    pub async fn update_player_state(
        &self,
        discord_uid: i64,
        new_state: PlayerState,
    ) -> anyhow::Result<()> {
        self.write_log
            .append(JobPayload::UpdatePlayerState { discord_uid, state: new_state })
            .await?;
        let mut state = self.state.write().expect("store lock poisoned");
        if let Some(p) = state.players.get_mut(&discord_uid) {
            p.state = new_state;
        }
        Ok(())
    }

    /// Apply a rating update, keeping the race→MMR reverse index consistent.
    pub async fn update_mmr(&self, rating: PerRaceRating) -> anyhow::Result<()> {
        self.write_log.append(JobPayload::UpdateMmr { rating: rating.clone() }).await?;
        let mut state = self.state.write().expect("store lock poisoned");
        state.index_remove(rating.discord_uid, rating.race);
        state.index_insert(rating.discord_uid, rating.race, rating.mmr);
        state.ratings.insert((rating.discord_uid, rating.race), rating);
        Ok(())
    }

    pub async fn create_match(&self, m: Match) -> anyhow::Result<()> {
        self.write_log.append(JobPayload::CreateMatch { m: m.clone() }).await?;
        let mut state = self.state.write().expect("store lock poisoned");
        state.matches.insert(m.id, m);
        Ok(())
    }

    pub async fn update_match_report(
        &self,
        match_id: i64,
        player1_report: Option<ReportCode>,
        player2_report: Option<ReportCode>,
    ) -> anyhow::Result<()> {
        self.write_log
            .append(JobPayload::UpdateMatchReport { match_id, player1_report, player2_report })
            .await?;
        let mut state = self.state.write().expect("store lock poisoned");
        if let Some(m) = state.matches.get_mut(&match_id) {
            m.player1_report = player1_report;
            m.player2_report = player2_report;
            m.updated_at = Utc::now().naive_utc();
        }
        Ok(())
    }

    pub async fn update_match_result_and_mmr_change(
        &self,
        match_id: i64,
        match_result: MatchResult,
        mmr_change: i32,
    ) -> anyhow::Result<()> {
        self.write_log
            .append(JobPayload::UpdateMatchResultAndMmrChange { match_id, match_result, mmr_change })
            .await?;
        let mut state = self.state.write().expect("store lock poisoned");
        let now = Utc::now().naive_utc();
        if let Some(m) = state.matches.get_mut(&match_id) {
            m.match_result = Some(match_result);
            m.mmr_change = Some(mmr_change);
            m.played_at = Some(now);
            m.updated_at = now;
        }
        Ok(())
    }

    pub async fn update_match_replay_path(
        &self,
        match_id: i64,
        player1_replay_path: Option<String>,
        player2_replay_path: Option<String>,
    ) -> anyhow::Result<()> {
        self.write_log
            .append(JobPayload::UpdateMatchReplayPath {
                match_id,
                player1_replay_path: player1_replay_path.clone(),
                player2_replay_path: player2_replay_path.clone(),
            })
            .await?;
        let mut state = self.state.write().expect("store lock poisoned");
        if let Some(m) = state.matches.get_mut(&match_id) {
            if let Some(p) = player1_replay_path {
                m.player1_replay_path = Some(p);
            }
            if let Some(p) = player2_replay_path {
                m.player2_replay_path = Some(p);
            }
            m.updated_at = Utc::now().naive_utc();
        }
        Ok(())
    }

    /// The admin re-resolution write (§4.10): result + mmr_change only,
    /// original reports untouched.
    pub async fn admin_resolve_match(
        &self,
        match_id: i64,
        match_result: MatchResult,
        mmr_change: i32,
    ) -> anyhow::Result<()> {
        self.write_log
            .append(JobPayload::AdminResolveMatch { match_id, match_result, mmr_change })
            .await?;
        let mut state = self.state.write().expect("store lock poisoned");
        if let Some(m) = state.matches.get_mut(&match_id) {
            m.match_result = Some(match_result);
            m.mmr_change = Some(mmr_change);
            m.updated_at = Utc::now().naive_utc();
        }
        Ok(())
    }

    pub async fn upsert_replay(&self, replay: Replay) -> anyhow::Result<()> {
        self.write_log.append(JobPayload::UpsertReplay { replay: replay.clone() }).await?;
        let mut state = self.state.write().expect("store lock poisoned");
        state.replays.insert(replay.path.clone(), replay);
        Ok(())
    }

    pub async fn log_admin_action(&self, action: AdminAction) -> anyhow::Result<()> {
        self.write_log.append(JobPayload::LogAdminAction { action }).await?;
        Ok(())
    }

    pub async fn log_player_action(
        &self,
        discord_uid: i64,
        action: &str,
        detail: serde_json::Value,
    ) -> anyhow::Result<()> {
        self.write_log
            .append(JobPayload::LogPlayerAction {
                discord_uid,
                action: action.to_string(),
                detail,
            })
            .await?;
        Ok(())
    }

    pub async fn log_command_call(
        &self,
        discord_uid: i64,
        command: &str,
        detail: serde_json::Value,
    ) -> anyhow::Result<()> {
        self.write_log
            .append(JobPayload::LogCommandCall {
                discord_uid,
                command: command.to_string(),
                detail,
            })
            .await?;
        Ok(())
    }
}

impl StoreState {
    fn index_insert(&mut self, discord_uid: i64, race: Race, mmr: i32) {
        self.leaderboard
            .entry(race)
            .or_insert_with(BTreeMap::new)
            .insert((std::cmp::Reverse(mmr), discord_uid), ());
    }

    fn index_remove(&mut self, discord_uid: i64, race: Race) {
        if let Some(prior) = self.ratings.get(&(discord_uid, race)) {
            if let Some(tree) = self.leaderboard.get_mut(&race) {
                tree.remove(&(std::cmp::Reverse(prior.mmr), discord_uid));
            }
        }
    }
}

#[async_trait]
impl LiveStore for StoreController {
    fn player(&self, discord_uid: i64) -> Option<Player> {
        let state = self.state.read().expect("store lock poisoned");
        state.players.get(&discord_uid).cloned()
    }

    fn rating(&self, discord_uid: i64, race: Race) -> PerRaceRating {
        let state = self.state.read().expect("store lock poisoned");
        state
            .ratings
            .get(&(discord_uid, race))
            .cloned()
            .unwrap_or_else(|| PerRaceRating::initial(discord_uid, race))
    }

    fn match_by_id(&self, id: i64) -> Option<Match> {
        let state = self.state.read().expect("store lock poisoned");
        state.matches.get(&id).cloned()
    }

    fn leaderboard(&self, race: Race, limit: usize) -> Vec<PerRaceRating> {
        let state = self.state.read().expect("store lock poisoned");
        match state.leaderboard.get(&race) {
            None => Vec::new(),
            Some(tree) => tree
                .keys()
                .take(limit)
                .filter_map(|(_, uid)| state.ratings.get(&(*uid, race)).cloned())
                .collect(),
        }
    }

    fn replay(&self, path: &str) -> Option<Replay> {
        let state = self.state.read().expect("store lock poisoned");
        state.replays.get(path).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    struct CountingWriteLog {
        appended: StdMutex<Vec<JobPayload>>,
    }

    #[async_trait]
    impl LiveWriteLog for CountingWriteLog {
        async fn append(&self, payload: JobPayload) -> anyhow::Result<u64> {
            let mut g = self.appended.lock().unwrap();
            g.push(payload);
            Ok(g.len() as u64 - 1)
        }
    }

    fn store() -> StoreController {
        StoreController::new(Arc::new(CountingWriteLog { appended: StdMutex::new(Vec::new()) }))
    }

    #[tokio::test]
    async fn create_then_read_player_round_trips() {
        let store = store();
        let p = Player::new(42, "alice");
        store.create_player(p.clone()).await.unwrap();
        assert_eq!(store.player(42), Some(p));
    }

    #[tokio::test]
    async fn unrated_player_gets_initial_rating() {
        let store = store();
        let r = store.rating(7, Race::BwTerran);
        assert_eq!(r.mmr, crate::constants::INITIAL_MMR);
        assert_eq!(r.games_played, 0);
    }

    #[tokio::test]
    async fn leaderboard_is_sorted_descending_by_mmr() {
        let store = store();
        store
            .update_mmr(PerRaceRating { mmr: 1400, ..PerRaceRating::initial(1, Race::BwTerran) })
            .await
            .unwrap();
        store
            .update_mmr(PerRaceRating { mmr: 1700, ..PerRaceRating::initial(2, Race::BwTerran) })
            .await
            .unwrap();
        store
            .update_mmr(PerRaceRating { mmr: 1550, ..PerRaceRating::initial(3, Race::BwTerran) })
            .await
            .unwrap();

        let board = store.leaderboard(Race::BwTerran, 10);
        let uids: Vec<i64> = board.iter().map(|r| r.discord_uid).collect();
        assert_eq!(uids, vec![2, 3, 1]);
    }

    #[tokio::test]
    async fn reindexing_an_existing_rating_does_not_duplicate_entries() {
        let store = store();
        store
            .update_mmr(PerRaceRating { mmr: 1500, ..PerRaceRating::initial(1, Race::BwTerran) })
            .await
            .unwrap();
        store
            .update_mmr(PerRaceRating { mmr: 1600, ..PerRaceRating::initial(1, Race::BwTerran) })
            .await
            .unwrap();
        let board = store.leaderboard(Race::BwTerran, 10);
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].mmr, 1600);
    }
}
