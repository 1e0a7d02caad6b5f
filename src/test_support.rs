//! Shared test fixtures (supplemental, grounded on
//! `generate_realistic_mock_data.py`'s role in the original test suite —
//! scaled down to a handful of idiomatic builder functions rather than a
//! standalone data-generation script). Used across unit tests so each module
//! doesn't hand-roll its own no-op write log and player setup.

#![cfg(test)]

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex as TokioMutex;

use crate::model::Player;
use crate::store::StoreController;
use crate::writelog::{JobPayload, LiveWriteLog};

/// A write log that accepts every append and never persists anything.
/// Fine for tests that only care about in-memory state, which is most of
/// them; tests that need to assert on what got appended build their own.
pub struct NullWriteLog {
    next: TokioMutex<u64>,
}

impl Default for NullWriteLog {
    fn default() -> Self {
        NullWriteLog { next: TokioMutex::new(0) }
    }
}

#[async_trait]
impl LiveWriteLog for NullWriteLog {
    async fn append(&self, _payload: JobPayload) -> anyhow::Result<u64> {
        let mut n = self.next.lock().await;
        *n += 1;
        Ok(*n - 1)
    }
}

/// A fresh, empty store backed by a `NullWriteLog`.
pub fn fresh_store() -> StoreController {
    StoreController::new(Arc::new(NullWriteLog::default()))
}

/// Creates players `1` and `2` ("p1"/"p2") in `store`, the pairing this
/// engine's match-lifecycle tests overwhelmingly reach for.
pub async fn setup_players(store: &StoreController) {
    store.create_player(Player::new(1, "p1")).await.unwrap();
    store.create_player(Player::new(2, "p2")).await.unwrap();
}
