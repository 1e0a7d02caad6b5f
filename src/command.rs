//! The chat command surface (§6): one typed variant per command the
//! presentation layer can invoke. Parsing/formatting for a concrete chat
//! platform is that layer's job, not the engine's (§1) — this module is the
//! engine-side contract, following the teacher's split between a typed
//! command enum and a typed output enum.

use crate::model::{MatchResult, Race};

/// An admin MMR adjustment operation (`admin.adjust_mmr`, §6).
#[derive(Clone, Copy, Debug)]
pub enum MmrOp {
    Set,
    Add,
    Sub,
}

/// A player-reported match outcome (§6 `report_result`).
#[derive(Clone, Copy, Debug)]
pub enum ReportedOutcome {
    Win,
    Loss,
    Draw,
    Abort,
}

/// Commands available to any player.
#[derive(Debug)]
pub enum PlayerCommand {
    Setup {
        display_name: String,
        battletag: Option<String>,
        alt_names: Vec<String>,
        country: Option<String>,
        region: Option<String>,
    },
    SetCountry {
        country: String,
    },
    AcceptTerms,
    DeclineTerms,
    Queue {
        races: Vec<Race>,
    },
    Dequeue,
    ReportResult {
        match_id: i64,
        outcome: ReportedOutcome,
    },
    UploadReplay {
        match_id: i64,
        bytes: Vec<u8>,
    },
    Profile,
    Leaderboard {
        race: Race,
    },
    Help,
}

/// Commands gated on the caller being in the admin allowlist.
#[derive(Debug)]
pub enum AdminCommand {
    ResolveMatch {
        match_id: i64,
        result: MatchResult,
        reason: String,
    },
    AdjustMmr {
        target_uid: i64,
        race: Race,
        op: MmrOp,
        value: i32,
        reason: String,
    },
    RemoveFromQueue {
        target_uid: i64,
        reason: String,
    },
    ResetAborts {
        target_uid: i64,
        new_count: u8,
        reason: String,
    },
    ToggleBan {
        target_uid: i64,
        reason: String,
    },
    Unblock {
        target_uid: i64,
        reason: String,
    },
    ClearQueue {
        reason: String,
    },
}

/// Owner-only (§6: "distinct from owners, who can toggle admin membership").
#[derive(Debug)]
pub enum OwnerCommand {
    ToggleAdmin { target_uid: i64, target_name: String },
}

/// What a command handler hands back to the presentation layer to render.
#[derive(Debug)]
pub enum CommandOutput {
    Ack,
    Profile(crate::model::Player, Vec<crate::model::PerRaceRating>),
    Leaderboard(Vec<crate::model::PerRaceRating>),
    HelpText(&'static str),
    MatchResolved(crate::model::Match),
    MmrAdjusted { target_uid: i64, race: Race, new_mmr: i32 },
    BanToggled { target_uid: i64, now_banned: bool },
    QueueCleared { count: usize },
    AdminToggled { target_uid: i64, is_admin_now: bool },
}

pub const HELP_TEXT: &str = "\
Player commands:
  /setup <name> [tag] [alts] [country] [region]
  /setcountry <code>
  /accept_terms | /decline_terms
  /queue <race...> | /dequeue
  /report_result <match_id> <win|loss|draw|abort>
  /upload_replay <match_id>
  /profile | /leaderboard <race> | /help
Admin commands:
  /admin resolve <match_id> <1|2|draw|invalidate> <reason>
  /admin adjust_mmr <player> <race> <set|add|sub> <value> <reason>
  /admin remove_queue <player> <reason>
  /admin reset_aborts <player> <count> <reason>
  /admin toggle_ban <player> <reason>
  /admin unblock <player> <reason>
  /admin clear_queue <reason>
Owner commands:
  /owner toggle_admin <player>
";
