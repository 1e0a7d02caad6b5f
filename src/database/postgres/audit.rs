use async_trait::async_trait;
use chrono::Utc;
use tokio_postgres::Row;

use crate::database::api::{AdminActionQueries, CommandCallQueries, PlayerActionQueries};
use crate::database::{DatabaseClient, Result};
use crate::model::{AdminAction, AdminActionType};

#[async_trait]
impl AdminActionQueries for DatabaseClient {
    async fn log_admin_action(&self, action: &AdminAction) -> Result<()> {
        let conn = self.pool.get().await?;
        let stmt = r#"
            INSERT INTO arbiter.admin_actions
                (admin_discord_uid, admin_username, action_type, target_player_uid,
                 target_match_id, action_details_json, reason, performed_at)
            VALUES
                ($1, $2, $3, $4, $5, $6, $7, $8)
        "#;
        let _ = conn
            .execute(
                stmt,
                &[
                    &action.admin_discord_uid,
                    &action.admin_display_name,
                    &action_type_str(action.action_type),
                    &action.target_player_uid,
                    &action.target_match_id,
                    &action.detail,
                    &action.reason,
                    &action.performed_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn recent_admin_actions(&self, limit: i64) -> Result<Vec<AdminAction>> {
        let conn = self.pool.get().await?;
        let stmt = "SELECT * FROM arbiter.admin_actions ORDER BY performed_at DESC LIMIT $1";
        let rows = conn.query(stmt, &[&limit]).await?;
        Ok(rows.into_iter().map(row_to_admin_action).collect())
    }
}

#[async_trait]
impl PlayerActionQueries for DatabaseClient {
    async fn log_player_action(
        &self,
        discord_uid: i64,
        action: &str,
        detail: serde_json::Value,
    ) -> Result<()> {
        let conn = self.pool.get().await?;
        let stmt = r#"
            INSERT INTO arbiter.player_actions (discord_uid, action, detail_json, performed_at)
            VALUES ($1, $2, $3, $4)
        "#;
        let _ = conn
            .execute(stmt, &[&discord_uid, &action, &detail, &Utc::now().naive_utc()])
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CommandCallQueries for DatabaseClient {
    async fn log_command_call(
        &self,
        discord_uid: i64,
        command: &str,
        detail: serde_json::Value,
    ) -> Result<()> {
        let conn = self.pool.get().await?;
        let stmt = r#"
            INSERT INTO arbiter.command_calls (discord_uid, command, detail_json, called_at)
            VALUES ($1, $2, $3, $4)
        "#;
        let _ = conn
            .execute(stmt, &[&discord_uid, &command, &detail, &Utc::now().naive_utc()])
            .await?;
        Ok(())
    }
}

fn action_type_str(t: AdminActionType) -> &'static str {
    match t {
        AdminActionType::ResolveMatch => "resolve_match",
        AdminActionType::AdjustMmr => "adjust_mmr",
        AdminActionType::RemoveFromQueue => "remove_from_queue",
        AdminActionType::ResetAborts => "reset_aborts",
        AdminActionType::ToggleBan => "toggle_ban",
        AdminActionType::Unblock => "unblock",
        AdminActionType::ClearQueue => "clear_queue",
        AdminActionType::ToggleAdmin => "toggle_admin",
    }
}

fn action_type_from_str(s: &str) -> AdminActionType {
    match s {
        "adjust_mmr" => AdminActionType::AdjustMmr,
        "remove_from_queue" => AdminActionType::RemoveFromQueue,
        "reset_aborts" => AdminActionType::ResetAborts,
        "toggle_ban" => AdminActionType::ToggleBan,
        "unblock" => AdminActionType::Unblock,
        "clear_queue" => AdminActionType::ClearQueue,
        "toggle_admin" => AdminActionType::ToggleAdmin,
        _ => AdminActionType::ResolveMatch,
    }
}

fn row_to_admin_action(row: Row) -> AdminAction {
    let action_type: &str = row.get("action_type");
    AdminAction {
        id: row.get("id"),
        admin_discord_uid: row.get("admin_discord_uid"),
        admin_display_name: row.get("admin_username"),
        action_type: action_type_from_str(action_type),
        target_player_uid: row.get("target_player_uid"),
        target_match_id: row.get("target_match_id"),
        detail: row.get("action_details_json"),
        reason: row.get("reason"),
        performed_at: row.get("performed_at"),
    }
}
