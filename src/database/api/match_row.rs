use async_trait::async_trait;

use crate::database::Result;
use crate::model::{Match, MatchResult, ReportCode};

#[async_trait]
pub trait MatchQueries {
    /// Every persisted match, for store hydration at startup.
    async fn all_matches(&self) -> Result<Vec<Match>>;

    async fn match_by_id(&self, id: i64) -> Result<Option<Match>>;

    /// Insert a newly-paired match. `match.id` is caller-assigned (the store
    /// owns id allocation so in-memory and persisted ids never diverge).
    async fn create_match(&self, m: &Match) -> Result<()>;

    async fn update_match_report(
        &self,
        match_id: i64,
        player1_report: Option<ReportCode>,
        player2_report: Option<ReportCode>,
    ) -> Result<()>;

    async fn update_match_result_and_mmr_change(
        &self,
        match_id: i64,
        match_result: MatchResult,
        mmr_change: i32,
    ) -> Result<()>;

    async fn update_match_replay_path(
        &self,
        match_id: i64,
        player1_replay_path: Option<&str>,
        player2_replay_path: Option<&str>,
    ) -> Result<()>;

    /// Full admin re-resolution write (§4.10): result, mmr_change, and
    /// `updated_at`, leaving `player1_report`/`player2_report` untouched.
    async fn admin_resolve_match(
        &self,
        match_id: i64,
        match_result: MatchResult,
        mmr_change: i32,
    ) -> Result<()>;
}
