use async_trait::async_trait;

use crate::database::Result;
use crate::model::Replay;

#[async_trait]
pub trait ReplayQueries {
    async fn all_replays(&self) -> Result<Vec<Replay>>;

    async fn replay(&self, path: &str) -> Result<Option<Replay>>;

    async fn upsert_replay(&self, replay: &Replay) -> Result<()>;
}
