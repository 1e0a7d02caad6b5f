use async_trait::async_trait;
use tokio_postgres::Row;

use crate::database::api::ReplayQueries;
use crate::database::{DatabaseClient, Result};
use crate::model::{Replay, ReplayMetadata};

#[async_trait]
impl ReplayQueries for DatabaseClient {
    async fn all_replays(&self) -> Result<Vec<Replay>> {
        let conn = self.pool.get().await?;
        let stmt = "SELECT * FROM arbiter.replays";
        let rows = conn.query(stmt, &[]).await?;
        Ok(rows.into_iter().map(row_to_replay).collect())
    }

    async fn replay(&self, path: &str) -> Result<Option<Replay>> {
        let conn = self.pool.get().await?;
        let stmt = "SELECT * FROM arbiter.replays WHERE path = $1";
        let row = conn.query_opt(stmt, &[&path]).await?;
        Ok(row.map(row_to_replay))
    }

    async fn upsert_replay(&self, replay: &Replay) -> Result<()> {
        let conn = self.pool.get().await?;
        let stmt = r#"
            INSERT INTO arbiter.replays (path, metadata_json, uploaded_at, uploader_uid)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (path)
            DO UPDATE SET metadata_json = excluded.metadata_json
        "#;
        let metadata_json = serde_json::to_value(&replay.metadata)
            .expect("ReplayMetadata always serializes");
        let _ = conn
            .execute(
                stmt,
                &[&replay.path, &metadata_json, &replay.uploaded_at, &replay.uploader_uid],
            )
            .await?;
        Ok(())
    }
}

fn row_to_replay(row: Row) -> Replay {
    let metadata_json: serde_json::Value = row.get("metadata_json");
    Replay {
        path: row.get("path"),
        uploader_uid: row.get("uploader_uid"),
        uploaded_at: row.get("uploaded_at"),
        metadata: serde_json::from_value::<ReplayMetadata>(metadata_json)
            .expect("malformed replay metadata in database"),
    }
}
