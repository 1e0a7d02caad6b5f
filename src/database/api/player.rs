use async_trait::async_trait;

use crate::database::Result;
use crate::model::{Player, PlayerState};

#[async_trait]
pub trait PlayerQueries {
    /// Return the specified player, or `None` if no such player exists.
    async fn player(&self, discord_uid: i64) -> Result<Option<Player>>;

    /// Return every known player, for store hydration at startup.
    async fn all_players(&self) -> Result<Vec<Player>>;

    /// Insert a brand-new player record.
    async fn create_player(&self, player: &Player) -> Result<()>;

    /// Update the mutable profile fields set by `/setup` and `/setcountry`.
    async fn update_player_info(
        &self,
        discord_uid: i64,
        display_name: &str,
        battletag: Option<&str>,
        alt_names: &[String],
        country: Option<&str>,
        region: Option<&str>,
    ) -> Result<()>;

    async fn update_accepted_tos(&self, discord_uid: i64, accepted: bool) -> Result<()>;

    async fn update_completed_setup(&self, discord_uid: i64, completed: bool) -> Result<()>;

    async fn update_shield_battery_bug(&self, discord_uid: i64, acked: bool) -> Result<()>;

    async fn update_remaining_aborts(&self, discord_uid: i64, remaining: u8) -> Result<()>;

    async fn update_is_banned(&self, discord_uid: i64, banned: bool) -> Result<()>;

    async fn update_player_state(&self, discord_uid: i64, state: PlayerState) -> Result<()>;
}
