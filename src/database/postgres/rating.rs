use async_trait::async_trait;
use tokio_postgres::Row;

use crate::database::api::RatingQueries;
use crate::database::{DatabaseClient, Result};
use crate::model::{PerRaceRating, Race};

#[async_trait]
impl RatingQueries for DatabaseClient {
    async fn all_ratings(&self) -> Result<Vec<PerRaceRating>> {
        let conn = self.pool.get().await?;
        let stmt = "SELECT * FROM arbiter.mmrs_1v1";
        let rows = conn.query(stmt, &[]).await?;
        Ok(rows.into_iter().map(row_to_rating).collect())
    }

    async fn rating(&self, discord_uid: i64, race: Race) -> Result<Option<PerRaceRating>> {
        let conn = self.pool.get().await?;
        let stmt = "SELECT * FROM arbiter.mmrs_1v1 WHERE discord_uid = $1 AND race = $2";
        let row = conn
            .query_opt(stmt, &[&discord_uid, &race.as_db_str()])
            .await?;
        Ok(row.map(row_to_rating))
    }

    async fn update_mmr(&self, rating: &PerRaceRating) -> Result<()> {
        let conn = self.pool.get().await?;
        let stmt = r#"
            INSERT INTO arbiter.mmrs_1v1
                (discord_uid, race, mmr, games_played, games_won, games_lost, games_drawn, last_played)
            VALUES
                ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (discord_uid, race)
            DO UPDATE SET
                mmr = excluded.mmr,
                games_played = excluded.games_played,
                games_won = excluded.games_won,
                games_lost = excluded.games_lost,
                games_drawn = excluded.games_drawn,
                last_played = excluded.last_played
        "#;
        let _ = conn
            .execute(
                stmt,
                &[
                    &rating.discord_uid,
                    &rating.race.as_db_str(),
                    &rating.mmr,
                    &(rating.games_played as i32),
                    &(rating.games_won as i32),
                    &(rating.games_lost as i32),
                    &(rating.games_drawn as i32),
                    &rating.last_played,
                ],
            )
            .await?;
        Ok(())
    }
}

fn row_to_rating(row: Row) -> PerRaceRating {
    let race_str: &str = row.get("race");
    let games_played: i32 = row.get("games_played");
    let games_won: i32 = row.get("games_won");
    let games_lost: i32 = row.get("games_lost");
    let games_drawn: i32 = row.get("games_drawn");
    PerRaceRating {
        discord_uid: row.get("discord_uid"),
        race: race_str.parse().expect("unknown race in database"),
        mmr: row.get("mmr"),
        games_played: games_played as u32,
        games_won: games_won as u32,
        games_lost: games_lost as u32,
        games_drawn: games_drawn as u32,
        last_played: row.get("last_played"),
    }
}
