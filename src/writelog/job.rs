use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::model::{MatchResult, PerRaceRating, Player, PlayerState, ReportCode, Replay};

/// The fixed set of mutations the Durable Write Log can carry (§4.3). Each
/// variant is one `job_type`; its fields are the job's `data` payload. Serde
/// tags on `job_type` when persisted to the log file, so a line on disk is
/// self-describing without a separate enum-plus-blob pair.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "job_type", content = "data", rename_all = "snake_case")]
pub enum JobPayload {
    CreatePlayer {
        player: Player,
    },
    UpdatePlayerInfo {
        discord_uid: i64,
        display_name: String,
        battletag: Option<String>,
        alt_names: Vec<String>,
        country: Option<String>,
        region: Option<String>,
    },
    UpdateAcceptedTos {
        discord_uid: i64,
        accepted: bool,
    },
    UpdateCompletedSetup {
        discord_uid: i64,
        completed: bool,
    },
    UpdateShieldBatteryBug {
        discord_uid: i64,
        acked: bool,
    },
    UpdateRemainingAborts {
        discord_uid: i64,
        remaining: u8,
    },
    UpdateIsBanned {
        discord_uid: i64,
        banned: bool,
    },
    UpdatePlayerState {
        discord_uid: i64,
        state: PlayerState,
    },
    UpdateMmr {
        rating: PerRaceRating,
    },
    CreateMatch {
        m: crate::model::Match,
    },
    UpdateMatchReport {
        match_id: i64,
        player1_report: Option<ReportCode>,
        player2_report: Option<ReportCode>,
    },
    UpdateMatchResultAndMmrChange {
        match_id: i64,
        match_result: MatchResult,
        mmr_change: i32,
    },
    UpdateMatchReplayPath {
        match_id: i64,
        player1_replay_path: Option<String>,
        player2_replay_path: Option<String>,
    },
    AdminResolveMatch {
        match_id: i64,
        match_result: MatchResult,
        mmr_change: i32,
    },
    UpsertReplay {
        replay: Replay,
    },
    LogAdminAction {
        action: crate::model::AdminAction,
    },
    LogPlayerAction {
        discord_uid: i64,
        action: String,
        detail: serde_json::Value,
    },
    LogCommandCall {
        discord_uid: i64,
        command: String,
        detail: serde_json::Value,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
}

/// One entry of the durable log (§4.3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WriteJob {
    pub id: u64,
    #[serde(flatten)]
    pub payload: JobPayload,
    pub status: JobStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub enqueued_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}
