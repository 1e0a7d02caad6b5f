use async_trait::async_trait;
use tokio_postgres::Row;

use crate::database::api::PlayerQueries;
use crate::database::{DatabaseClient, Result};
use crate::model::{Player, PlayerState};

#[async_trait]
impl PlayerQueries for DatabaseClient {
    async fn player(&self, discord_uid: i64) -> Result<Option<Player>> {
        let conn = self.pool.get().await?;
        let stmt = "SELECT * FROM arbiter.players WHERE discord_uid = $1";
        let row = conn.query_opt(stmt, &[&discord_uid]).await?;
        Ok(row.map(row_to_player))
    }

    async fn all_players(&self) -> Result<Vec<Player>> {
        let conn = self.pool.get().await?;
        let stmt = "SELECT * FROM arbiter.players";
        let rows = conn.query(stmt, &[]).await?;
        Ok(rows.into_iter().map(row_to_player).collect())
    }

    async fn create_player(&self, player: &Player) -> Result<()> {
        let conn = self.pool.get().await?;
        let stmt = r#"
            INSERT INTO arbiter.players
                (discord_uid, discord_username, player_name, battletag, alt_names,
                 country, region, accepted_tos, completed_setup, is_banned,
                 shield_battery_bug, remaining_aborts, state)
            VALUES
                ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (discord_uid) DO NOTHING
        "#;
        let _ = conn
            .execute(
                stmt,
                &[
                    &player.discord_uid,
                    &player.discord_username,
                    &player.display_name,
                    &player.battletag,
                    &player.alt_names,
                    &player.country,
                    &player.region,
                    &player.accepted_tos,
                    &player.completed_setup,
                    &player.is_banned,
                    &player.shield_battery_bug_ack,
                    &(player.remaining_aborts as i16),
                    &player_state_str(player.state),
                ],
            )
            .await?;
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
        let conn = self.pool.get().await?;
        let stmt = r#"
            UPDATE arbiter.players
            SET player_name = $2, battletag = $3, alt_names = $4, country = $5, region = $6
            WHERE discord_uid = $1
        "#;
        let alt_names = alt_names.to_vec();
        let _ = conn
            .execute(
                stmt,
                &[&discord_uid, &display_name, &battletag, &alt_names, &country, &region],
            )
            .await?;
        Ok(())
    }

    async fn update_accepted_tos(&self, discord_uid: i64, accepted: bool) -> Result<()> {
        let conn = self.pool.get().await?;
        let stmt = "UPDATE arbiter.players SET accepted_tos = $2 WHERE discord_uid = $1";
        let _ = conn.execute(stmt, &[&discord_uid, &accepted]).await?;
        Ok(())
    }

    async fn update_completed_setup(&self, discord_uid: i64, completed: bool) -> Result<()> {
        let conn = self.pool.get().await?;
        let stmt = "UPDATE arbiter.players SET completed_setup = $2 WHERE discord_uid = $1";
        let _ = conn.execute(stmt, &[&discord_uid, &completed]).await?;
        Ok(())
    }

    async fn update_shield_battery_bug(&self, discord_uid: i64, acked: bool) -> Result<()> {
        let conn = self.pool.get().await?;
        let stmt = "UPDATE arbiter.players SET shield_battery_bug = $2 WHERE discord_uid = $1";
        let _ = conn.execute(stmt, &[&discord_uid, &acked]).await?;
        Ok(())
    }

    async fn update_remaining_aborts(&self, discord_uid: i64, remaining: u8) -> Result<()> {
        let conn = self.pool.get().await?;
        let stmt = "UPDATE arbiter.players SET remaining_aborts = $2 WHERE discord_uid = $1";
        let _ = conn
            .execute(stmt, &[&discord_uid, &(remaining as i16)])
            .await?;
        Ok(())
    }

    async fn update_is_banned(&self, discord_uid: i64, banned: bool) -> Result<()> {
        let conn = self.pool.get().await?;
        let stmt = "UPDATE arbiter.players SET is_banned = $2 WHERE discord_uid = $1";
        let _ = conn.execute(stmt, &[&discord_uid, &banned]).await?;
        Ok(())
    }

    async fn update_player_state(&self, discord_uid: i64, state: PlayerState) -> Result<()> {
        let conn = self.pool.get().await?;
        let stmt = "UPDATE arbiter.players SET state = $2 WHERE discord_uid = $1";
        let _ = conn
            .execute(stmt, &[&discord_uid, &player_state_str(state)])
            .await?;
        Ok(())
    }
}

fn player_state_str(state: PlayerState) -> &'static str {
    match state {
        PlayerState::Idle => "idle",
        PlayerState::Queued => "queued",
        PlayerState::Matched => "matched",
        PlayerState::Reporting => "reporting",
    }
}

fn player_state_from_str(s: &str) -> PlayerState {
    match s {
        "queued" => PlayerState::Queued,
        "matched" => PlayerState::Matched,
        "reporting" => PlayerState::Reporting,
        _ => PlayerState::Idle,
    }
}

fn row_to_player(row: Row) -> Player {
    let remaining_aborts: i16 = row.get("remaining_aborts");
    Player {
        discord_uid: row.get("discord_uid"),
        discord_username: row.get("discord_username"),
        display_name: row.get("player_name"),
        battletag: row.get("battletag"),
        alt_names: row.get("alt_names"),
        country: row.get("country"),
        region: row.get("region"),
        accepted_tos: row.get("accepted_tos"),
        completed_setup: row.get("completed_setup"),
        is_banned: row.get("is_banned"),
        shield_battery_bug_ack: row.get("shield_battery_bug"),
        remaining_aborts: remaining_aborts as u8,
        state: player_state_from_str(row.get("state")),
    }
}
