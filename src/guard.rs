//! Command guards: the pre-checks every chat command runs before touching
//! engine state. Grounded in the original service's `command_guard_service`,
//! adapted to this engine's store — there's no separate cache layer here
//! since the In-Memory Store (C4) already serves reads without a DB round
//! trip, so "cache-first" collapses to a plain store lookup.

use crate::error::{EngineError, EngineResult};
use crate::model::Player;
use crate::store::{LiveStore, StoreController};

/// Look up the player record, creating one on first interaction (§3:
/// "Players are created on first interaction and never destroyed").
pub async fn ensure_player_record(
    store: &StoreController,
    discord_uid: i64,
    discord_username: &str,
) -> EngineResult<Player> {
    if let Some(player) = store.player(discord_uid) {
        return Ok(player);
    }
    let player = Player::new(discord_uid, discord_username);
    store.create_player(player.clone()).await.map_err(EngineError::External)?;
    Ok(player)
}

/// Banned players fail every command guard (§3).
pub fn require_not_banned(player: &Player) -> EngineResult<()> {
    if player.is_banned {
        return Err(EngineError::authorization("this account is banned"));
    }
    Ok(())
}

pub fn require_tos_accepted(player: &Player) -> EngineResult<()> {
    require_not_banned(player)?;
    if !player.accepted_tos {
        return Err(EngineError::validation("terms of service not accepted"));
    }
    Ok(())
}

pub fn require_setup_completed(player: &Player) -> EngineResult<()> {
    require_not_banned(player)?;
    if !player.completed_setup {
        return Err(EngineError::validation("profile setup not completed"));
    }
    Ok(())
}

/// Queueing requires both TOS acceptance and completed setup.
pub fn require_queue_access(player: &Player) -> EngineResult<()> {
    require_tos_accepted(player)?;
    require_setup_completed(player)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fresh_store as store;

    #[tokio::test]
    async fn ensure_player_record_creates_on_first_interaction() {
        let store = store();
        let p = ensure_player_record(&store, 1, "alice").await.unwrap();
        assert_eq!(p.discord_uid, 1);
        assert_eq!(store.player(1).unwrap().discord_username, "alice");
    }

    #[tokio::test]
    async fn ensure_player_record_returns_existing_without_overwriting() {
        let store = store();
        ensure_player_record(&store, 1, "alice").await.unwrap();
        store.update_accepted_tos(1, true).await.unwrap();
        let p = ensure_player_record(&store, 1, "alice-again").await.unwrap();
        assert!(p.accepted_tos);
    }

    #[test]
    fn banned_player_fails_every_guard() {
        let mut p = Player::new(1, "alice");
        p.is_banned = true;
        p.accepted_tos = true;
        p.completed_setup = true;
        assert!(require_tos_accepted(&p).is_err());
        assert!(require_setup_completed(&p).is_err());
        assert!(require_queue_access(&p).is_err());
    }

    #[test]
    fn queue_access_requires_tos_and_setup() {
        let mut p = Player::new(1, "alice");
        assert!(require_queue_access(&p).is_err());
        p.accepted_tos = true;
        assert!(require_queue_access(&p).is_err());
        p.completed_setup = true;
        assert!(require_queue_access(&p).is_ok());
    }
}
