//! An in-memory stand-in for `postgres::DatabaseClient`, used by `cfg(test)`
//! unit tests (`--features unit_test`) so the store/controller layers can be
//! exercised without a live Postgres instance.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::database::api::*;
use crate::model::*;

pub type Result<T> = anyhow::Result<T>;

#[derive(Default)]
pub struct DatabaseClient {
    inner: Mutex<MockDatabase>,
}

#[derive(Default)]
struct MockDatabase {
    players: HashMap<i64, Player>,
    ratings: HashMap<(i64, Race), PerRaceRating>,
    matches: HashMap<i64, Match>,
    replays: HashMap<String, Replay>,
    admin_actions: Vec<AdminAction>,
}

impl DatabaseClient {
    pub async fn migrate(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl PlayerQueries for DatabaseClient {
    async fn player(&self, discord_uid: i64) -> Result<Option<Player>> {
        Ok(self.inner.lock().await.players.get(&discord_uid).cloned())
    }

    async fn all_players(&self) -> Result<Vec<Player>> {
        Ok(self.inner.lock().await.players.values().cloned().collect())
    }

    async fn create_player(&self, player: &Player) -> Result<()> {
        let mut db = self.inner.lock().await;
        db.players.entry(player.discord_uid).or_insert_with(|| player.clone());
        Ok(())
    }

    async fn update_player_info(
        &self,
        discord_uid: i64,
        display_name: &str,
        battletag: Option<&str>,
        alt_names: &[String],
        country: Option<&str>,
        region: Option<&str>,
    ) -> Result<()> {
        let mut db = self.inner.lock().await;
        if let Some(p) = db.players.get_mut(&discord_uid) {
            p.display_name = display_name.to_string();
            p.battletag = battletag.map(String::from);
            p.alt_names = alt_names.to_vec();
            p.country = country.map(String::from);
            p.region = region.map(String::from);
        }
        Ok(())
    }

    async fn update_accepted_tos(&self, discord_uid: i64, accepted: bool) -> Result<()> {
        let mut db = self.inner.lock().await;
        if let Some(p) = db.players.get_mut(&discord_uid) {
            p.accepted_tos = accepted;
        }
        Ok(())
    }

    async fn update_completed_setup(&self, discord_uid: i64, completed: bool) -> Result<()> {
        let mut db = self.inner.lock().await;
        if let Some(p) = db.players.get_mut(&discord_uid) {
            p.completed_setup = completed;
        }
        Ok(())
    }

    async fn update_shield_battery_bug(&self, discord_uid: i64, acked: bool) -> Result<()> {
        let mut db = self.inner.lock().await;
        if let Some(p) = db.players.get_mut(&discord_uid) {
            p.shield_battery_bug_ack = acked;
        }
        Ok(())
    }

    async fn update_remaining_aborts(&self, discord_uid: i64, remaining: u8) -> Result<()> {
        let mut db = self.inner.lock().await;
        if let Some(p) = db.players.get_mut(&discord_uid) {
            p.remaining_aborts = remaining;
        }
        Ok(())
    }

    async fn update_is_banned(&self, discord_uid: i64, banned: bool) -> Result<()> {
        let mut db = self.inner.lock().await;
        if let Some(p) = db.players.get_mut(&discord_uid) {
            p.is_banned = banned;
        }
        Ok(())
    }

    async fn update_player_state(&self, discord_uid: i64, state: PlayerState) -> Result<()> {
        let mut db = self.inner.lock().await;
        if let Some(p) = db.players.get_mut(&discord_uid) {
            p.state = state;
        }
        Ok(())
    }
}

#[async_trait]
impl RatingQueries for DatabaseClient {
    async fn all_ratings(&self) -> Result<Vec<PerRaceRating>> {
        Ok(self.inner.lock().await.ratings.values().cloned().collect())
    }

    async fn rating(&self, discord_uid: i64, race: Race) -> Result<Option<PerRaceRating>> {
        Ok(self.inner.lock().await.ratings.get(&(discord_uid, race)).cloned())
    }

    async fn update_mmr(&self, rating: &PerRaceRating) -> Result<()> {
        let mut db = self.inner.lock().await;
        db.ratings.insert((rating.discord_uid, rating.race), rating.clone());
        Ok(())
    }
}

#[async_trait]
impl MatchQueries for DatabaseClient {
    async fn all_matches(&self) -> Result<Vec<Match>> {
        Ok(self.inner.lock().await.matches.values().cloned().collect())
    }

    async fn match_by_id(&self, id: i64) -> Result<Option<Match>> {
        Ok(self.inner.lock().await.matches.get(&id).cloned())
    }

    async fn create_match(&self, m: &Match) -> Result<()> {
        let mut db = self.inner.lock().await;
        db.matches.entry(m.id).or_insert_with(|| m.clone());
        Ok(())
    }

    async fn update_match_report(
        &self,
        match_id: i64,
        player1_report: Option<ReportCode>,
        player2_report: Option<ReportCode>,
    ) -> Result<()> {
        let mut db = self.inner.lock().await;
        if let Some(m) = db.matches.get_mut(&match_id) {
            m.player1_report = player1_report;
            m.player2_report = player2_report;
        }
        Ok(())
    }

    async fn update_match_result_and_mmr_change(
        &self,
        match_id: i64,
        match_result: MatchResult,
        mmr_change: i32,
    ) -> Result<()> {
        let mut db = self.inner.lock().await;
        if let Some(m) = db.matches.get_mut(&match_id) {
            m.match_result = Some(match_result);
            m.mmr_change = Some(mmr_change);
        }
        Ok(())
    }

    async fn update_match_replay_path(
        &self,
        match_id: i64,
        player1_replay_path: Option<&str>,
        player2_replay_path: Option<&str>,
    ) -> Result<()> {
        let mut db = self.inner.lock().await;
        if let Some(m) = db.matches.get_mut(&match_id) {
            if let Some(p) = player1_replay_path {
                m.player1_replay_path = Some(p.to_string());
            }
            if let Some(p) = player2_replay_path {
                m.player2_replay_path = Some(p.to_string());
            }
        }
        Ok(())
    }

    async fn admin_resolve_match(
        &self,
        match_id: i64,
        match_result: MatchResult,
        mmr_change: i32,
    ) -> Result<()> {
        let mut db = self.inner.lock().await;
        if let Some(m) = db.matches.get_mut(&match_id) {
            m.match_result = Some(match_result);
            m.mmr_change = Some(mmr_change);
        }
        Ok(())
    }
}

#[async_trait]
impl ReplayQueries for DatabaseClient {
    async fn all_replays(&self) -> Result<Vec<Replay>> {
        Ok(self.inner.lock().await.replays.values().cloned().collect())
    }

    async fn replay(&self, path: &str) -> Result<Option<Replay>> {
        Ok(self.inner.lock().await.replays.get(path).cloned())
    }

    async fn upsert_replay(&self, replay: &Replay) -> Result<()> {
        let mut db = self.inner.lock().await;
        db.replays.insert(replay.path.clone(), replay.clone());
        Ok(())
    }
}

#[async_trait]
impl AdminActionQueries for DatabaseClient {
    async fn log_admin_action(&self, action: &AdminAction) -> Result<()> {
        self.inner.lock().await.admin_actions.push(action.clone());
        Ok(())
    }

    async fn recent_admin_actions(&self, limit: i64) -> Result<Vec<AdminAction>> {
        let db = self.inner.lock().await;
        let mut actions = db.admin_actions.clone();
        actions.sort_by_key(|a| std::cmp::Reverse(a.performed_at));
        actions.truncate(limit.max(0) as usize);
        Ok(actions)
    }
}

#[async_trait]
impl PlayerActionQueries for DatabaseClient {
    async fn log_player_action(
        &self,
        _discord_uid: i64,
        _action: &str,
        _detail: serde_json::Value,
    ) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl CommandCallQueries for DatabaseClient {
    async fn log_command_call(
        &self,
        _discord_uid: i64,
        _command: &str,
        _detail: serde_json::Value,
    ) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
impl DatabaseClient {
    pub async fn push_player(&self, player: Player) {
        let mut db = self.inner.lock().await;
        db.players.insert(player.discord_uid, player);
    }
}
