use async_trait::async_trait;
use chrono::Utc;
use tokio_postgres::Row;

use crate::database::api::MatchQueries;
use crate::database::{DatabaseClient, Result};
use crate::model::{Match, MatchResult, ReportCode};

#[async_trait]
impl MatchQueries for DatabaseClient {
    async fn all_matches(&self) -> Result<Vec<Match>> {
        let conn = self.pool.get().await?;
        let stmt = "SELECT * FROM arbiter.matches_1v1";
        let rows = conn.query(stmt, &[]).await?;
        Ok(rows.into_iter().map(row_to_match).collect())
    }

    async fn match_by_id(&self, id: i64) -> Result<Option<Match>> {
        let conn = self.pool.get().await?;
        let stmt = "SELECT * FROM arbiter.matches_1v1 WHERE id = $1";
        let row = conn.query_opt(stmt, &[&id]).await?;
        Ok(row.map(row_to_match))
    }

    async fn create_match(&self, m: &Match) -> Result<()> {
        let conn = self.pool.get().await?;
        let stmt = r#"
            INSERT INTO arbiter.matches_1v1
                (id, player_1_discord_uid, player_2_discord_uid, player_1_race, player_2_race,
                 map_played, server_used, created_at, player_1_mmr, player_2_mmr, updated_at)
            VALUES
                ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO NOTHING
        "#;
        let _ = conn
            .execute(
                stmt,
                &[
                    &m.id,
                    &m.player1_uid,
                    &m.player2_uid,
                    &m.player1_race.as_db_str(),
                    &m.player2_race.as_db_str(),
                    &m.map,
                    &m.server_region,
                    &m.created_at,
                    &m.player1_initial_mmr,
                    &m.player2_initial_mmr,
                    &m.updated_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn update_match_report(
        &self,
        match_id: i64,
        player1_report: Option<ReportCode>,
        player2_report: Option<ReportCode>,
    ) -> Result<()> {
        let conn = self.pool.get().await?;
        let stmt = r#"
            UPDATE arbiter.matches_1v1
            SET player_1_report = $2, player_2_report = $3, updated_at = $4
            WHERE id = $1
        "#;
        let _ = conn
            .execute(
                stmt,
                &[
                    &match_id,
                    &player1_report.map(|r| r.as_i8() as i16),
                    &player2_report.map(|r| r.as_i8() as i16),
                    &Utc::now().naive_utc(),
                ],
            )
            .await?;
        Ok(())
    }

    async fn update_match_result_and_mmr_change(
        &self,
        match_id: i64,
        match_result: MatchResult,
        mmr_change: i32,
    ) -> Result<()> {
        let conn = self.pool.get().await?;
        let now = Utc::now().naive_utc();
        let stmt = r#"
            UPDATE arbiter.matches_1v1
            SET match_result = $2, mmr_change = $3, played_at = $4, updated_at = $4
            WHERE id = $1
        "#;
        let _ = conn
            .execute(
                stmt,
                &[&match_id, &(match_result as i8 as i16), &mmr_change, &now],
            )
            .await?;
        Ok(())
    }

    async fn update_match_replay_path(
        &self,
        match_id: i64,
        player1_replay_path: Option<&str>,
        player2_replay_path: Option<&str>,
    ) -> Result<()> {
        let conn = self.pool.get().await?;
        let stmt = r#"
            UPDATE arbiter.matches_1v1
            SET player_1_replay_path = COALESCE($2, player_1_replay_path),
                player_2_replay_path = COALESCE($3, player_2_replay_path),
                updated_at = $4
            WHERE id = $1
        "#;
        let _ = conn
            .execute(
                stmt,
                &[&match_id, &player1_replay_path, &player2_replay_path, &Utc::now().naive_utc()],
            )
            .await?;
        Ok(())
    }

    async fn admin_resolve_match(
        &self,
        match_id: i64,
        match_result: MatchResult,
        mmr_change: i32,
    ) -> Result<()> {
        // Deliberately leaves player_1_report/player_2_report untouched (§4.10
        // step 5: original player reports must survive re-resolution).
        let conn = self.pool.get().await?;
        let stmt = r#"
            UPDATE arbiter.matches_1v1
            SET match_result = $2, mmr_change = $3, updated_at = $4
            WHERE id = $1
        "#;
        let _ = conn
            .execute(
                stmt,
                &[&match_id, &(match_result as i8 as i16), &mmr_change, &Utc::now().naive_utc()],
            )
            .await?;
        Ok(())
    }
}

fn row_to_match(row: Row) -> Match {
    let player1_race: &str = row.get("player_1_race");
    let player2_race: &str = row.get("player_2_race");
    let player1_report: Option<i16> = row.get("player_1_report");
    let player2_report: Option<i16> = row.get("player_2_report");
    let match_result: Option<i16> = row.get("match_result");

    Match {
        id: row.get("id"),
        player1_uid: row.get("player_1_discord_uid"),
        player2_uid: row.get("player_2_discord_uid"),
        player1_race: player1_race.parse().expect("unknown race in database"),
        player2_race: player2_race.parse().expect("unknown race in database"),
        map: row.get("map_played"),
        server_region: row.get("server_used"),
        player1_initial_mmr: row.get("player_1_mmr"),
        player2_initial_mmr: row.get("player_2_mmr"),
        player1_report: player1_report.and_then(|v| ReportCode::from_i8(v as i8)),
        player2_report: player2_report.and_then(|v| ReportCode::from_i8(v as i8)),
        match_result: match_result.and_then(|v| MatchResult::from_i8(v as i8)),
        mmr_change: row.get("mmr_change"),
        player1_replay_path: row.get("player_1_replay_path"),
        player2_replay_path: row.get("player_2_replay_path"),
        created_at: row.get("created_at"),
        played_at: row.get("played_at"),
        updated_at: row.get("updated_at"),
    }
}
