use async_trait::async_trait;

use crate::database::Result;
use crate::model::{PerRaceRating, Race};

#[async_trait]
pub trait RatingQueries {
    /// Every `(player, race)` rating row, for store hydration at startup.
    async fn all_ratings(&self) -> Result<Vec<PerRaceRating>>;

    async fn rating(&self, discord_uid: i64, race: Race) -> Result<Option<PerRaceRating>>;

    /// Upsert a player's full rating row for one race (§4.2's result of a
    /// completed or re-resolved match).
    async fn update_mmr(&self, rating: &PerRaceRating) -> Result<()>;
}
