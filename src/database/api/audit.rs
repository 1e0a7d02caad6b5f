use async_trait::async_trait;

use crate::database::Result;
use crate::model::AdminAction;

#[async_trait]
pub trait AdminActionQueries {
    async fn log_admin_action(&self, action: &AdminAction) -> Result<()>;

    /// Most recent admin actions, optionally filtered, newest first. Used by
    /// `admin.resolve`'s re-resolution path to find a match's prior
    /// resolutions for the audit trail, and by the supplemental system
    /// snapshot.
    async fn recent_admin_actions(&self, limit: i64) -> Result<Vec<AdminAction>>;
}

/// Audit-only logs that back no read path in this engine beyond the DB
/// itself; the store doesn't hold these in memory (§4.4 lists them only as
/// audit tables, not part of the reverse-index working set).
#[async_trait]
pub trait PlayerActionQueries {
    async fn log_player_action(
        &self,
        discord_uid: i64,
        action: &str,
        detail: serde_json::Value,
    ) -> Result<()>;
}

#[async_trait]
pub trait CommandCallQueries {
    async fn log_command_call(
        &self,
        discord_uid: i64,
        command: &str,
        detail: serde_json::Value,
    ) -> Result<()>;
}
