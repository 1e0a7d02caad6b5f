//! Core domain entities, owned exclusively by the in-memory store (`crate::store`).
//!
//! Nothing outside `store` ever constructs these directly except the database
//! layer (when hydrating from rows) and tests.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// One of the six race/game combinations a player can queue and be rated in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Race {
    BwTerran,
    BwZerg,
    BwProtoss,
    Sc2Terran,
    Sc2Zerg,
    Sc2Protoss,
}

impl Race {
    /// `true` if this race belongs to the Brood War client.
    pub fn is_bw(self) -> bool {
        matches!(self, Race::BwTerran | Race::BwZerg | Race::BwProtoss)
    }

    /// `true` if this race belongs to the StarCraft II client.
    pub fn is_sc2(self) -> bool {
        !self.is_bw()
    }

    /// The `TEXT` form stored in `mmrs_1v1.race` / `matches_1v1.player_N_race`.
    pub fn as_db_str(self) -> &'static str {
        match self {
            Race::BwTerran => "bw_terran",
            Race::BwZerg => "bw_zerg",
            Race::BwProtoss => "bw_protoss",
            Race::Sc2Terran => "sc2_terran",
            Race::Sc2Zerg => "sc2_zerg",
            Race::Sc2Protoss => "sc2_protoss",
        }
    }
}

impl std::str::FromStr for Race {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bw_terran" => Ok(Race::BwTerran),
            "bw_zerg" => Ok(Race::BwZerg),
            "bw_protoss" => Ok(Race::BwProtoss),
            "sc2_terran" => Ok(Race::Sc2Terran),
            "sc2_zerg" => Ok(Race::Sc2Zerg),
            "sc2_protoss" => Ok(Race::Sc2Protoss),
            other => Err(format!("unknown race '{}'", other)),
        }
    }
}

/// A player's external identity and lifecycle flags.
///
/// `discord_uid` is the only unique key; display names are *not* enforced
/// unique (see `spec.md` §3).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub discord_uid: i64,
    /// The player's raw Discord account username, recorded on first
    /// interaction. Distinct from `display_name`, which is player-chosen
    /// during `/setup` and is not required to be unique.
    pub discord_username: String,
    pub display_name: String,
    pub battletag: Option<String>,
    pub alt_names: Vec<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub accepted_tos: bool,
    pub completed_setup: bool,
    pub is_banned: bool,
    pub shield_battery_bug_ack: bool,
    pub remaining_aborts: u8,
    pub state: PlayerState,
}

impl Player {
    /// A brand-new player record, as created on first interaction.
    pub fn new(discord_uid: i64, discord_username: impl Into<String>) -> Self {
        let discord_username = discord_username.into();
        Player {
            discord_uid,
            display_name: discord_username.clone(),
            discord_username,
            battletag: None,
            alt_names: Vec::new(),
            country: None,
            region: None,
            accepted_tos: false,
            completed_setup: false,
            is_banned: false,
            shield_battery_bug_ack: false,
            remaining_aborts: crate::constants::DEFAULT_REMAINING_ABORTS,
            state: PlayerState::Idle,
        }
    }

    /// Every name this player could be credited under in a replay: their
    /// display name, their battletag's name portion, and any alts.
    pub fn known_names(&self) -> Vec<&str> {
        let mut names = vec![self.display_name.as_str()];
        if let Some(tag) = &self.battletag {
            if let Some(name) = tag.split('#').next() {
                names.push(name);
            }
        }
        names.extend(self.alt_names.iter().map(String::as_str));
        names
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerState {
    Idle,
    Queued,
    Matched,
    Reporting,
}

/// Per-`(player, race)` skill record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerRaceRating {
    pub discord_uid: i64,
    pub race: Race,
    pub mmr: i32,
    pub games_played: u32,
    pub games_won: u32,
    pub games_lost: u32,
    pub games_drawn: u32,
    pub last_played: Option<NaiveDateTime>,
}

impl PerRaceRating {
    pub fn initial(discord_uid: i64, race: Race) -> Self {
        PerRaceRating {
            discord_uid,
            race,
            mmr: crate::constants::INITIAL_MMR,
            games_played: 0,
            games_won: 0,
            games_lost: 0,
            games_drawn: 0,
            last_played: None,
        }
    }

    /// `games_won + games_lost + games_drawn == games_played` (§3 invariant).
    #[cfg(test)]
    pub fn invariant_holds(&self) -> bool {
        self.games_won + self.games_lost + self.games_drawn == self.games_played
    }
}

/// A player's report of a match outcome, in that player's own frame (before
/// normalization by the match state machine into "player 1's frame").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i8)]
pub enum ReportCode {
    /// "I/we say player 1 won".
    Player1Won = 1,
    /// "player 2 won".
    Player2Won = 2,
    Draw = 0,
    ManualAbort = -3,
    NoResponse = -4,
}

impl ReportCode {
    pub fn as_i8(self) -> i8 {
        self as i8
    }

    pub fn from_i8(v: i8) -> Option<Self> {
        match v {
            1 => Some(ReportCode::Player1Won),
            2 => Some(ReportCode::Player2Won),
            0 => Some(ReportCode::Draw),
            -3 => Some(ReportCode::ManualAbort),
            -4 => Some(ReportCode::NoResponse),
            _ => None,
        }
    }
}

/// The terminal (or conflict) outcome of a match, once both reports have
/// been reconciled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i8)]
pub enum MatchResult {
    Player1Won = 1,
    Player2Won = 2,
    Draw = 0,
    /// Invalidated: no MMR change (both aborted, or both no-response).
    Invalidated = -1,
    /// Reports disagree; awaiting admin.
    Conflict = -2,
}

impl MatchResult {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MatchResult::Player1Won
                | MatchResult::Player2Won
                | MatchResult::Draw
                | MatchResult::Invalidated
        )
    }

    /// The `{1, 0.5, 0}` score used by the rating engine, from player 1's
    /// perspective. `None` for non-scoring results (`Invalidated`, `Conflict`).
    pub fn player1_score(self) -> Option<f64> {
        match self {
            MatchResult::Player1Won => Some(1.0),
            MatchResult::Player2Won => Some(0.0),
            MatchResult::Draw => Some(0.5),
            MatchResult::Invalidated | MatchResult::Conflict => None,
        }
    }

    pub fn from_i8(v: i8) -> Option<Self> {
        match v {
            1 => Some(MatchResult::Player1Won),
            2 => Some(MatchResult::Player2Won),
            0 => Some(MatchResult::Draw),
            -1 => Some(MatchResult::Invalidated),
            -2 => Some(MatchResult::Conflict),
            _ => None,
        }
    }
}

/// A paired, lifecycle-tracked match between two players.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Match {
    pub id: i64,
    pub player1_uid: i64,
    pub player2_uid: i64,
    pub player1_race: Race,
    pub player2_race: Race,
    pub map: String,
    pub server_region: String,

    /// Frozen at creation. Never mutated afterwards — see `spec.md` §3.
    pub player1_initial_mmr: i32,
    /// Frozen at creation. Never mutated afterwards — see `spec.md` §3.
    pub player2_initial_mmr: i32,

    pub player1_report: Option<ReportCode>,
    pub player2_report: Option<ReportCode>,
    pub match_result: Option<MatchResult>,
    pub mmr_change: Option<i32>,

    pub player1_replay_path: Option<String>,
    pub player2_replay_path: Option<String>,

    pub created_at: NaiveDateTime,
    pub played_at: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}

impl Match {
    /// A match is in `CREATED` while neither side has reported.
    pub fn is_created(&self) -> bool {
        self.player1_report.is_none() && self.player2_report.is_none()
    }

    /// `REPORTING`: at least one side reported, no result yet.
    pub fn is_reporting(&self) -> bool {
        self.match_result.is_none()
            && (self.player1_report.is_some() || self.player2_report.is_some())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self.match_result, Some(MatchResult::Conflict))
    }

    pub fn is_terminal(&self) -> bool {
        self.match_result.map(MatchResult::is_terminal).unwrap_or(false)
    }

    /// The race + frozen MMR a given side was assigned at creation.
    pub fn side_mmr(&self, side: MatchSide) -> i32 {
        match side {
            MatchSide::Player1 => self.player1_initial_mmr,
            MatchSide::Player2 => self.player2_initial_mmr,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchSide {
    Player1,
    Player2,
}

/// Parsed replay metadata, cross-verified against a `Match` before acceptance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Replay {
    pub path: String,
    pub uploader_uid: i64,
    pub uploaded_at: NaiveDateTime,
    pub metadata: ReplayMetadata,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplayMetadata {
    pub player_names: Vec<String>,
    pub races: Vec<String>,
    pub map: String,
    pub duration_secs: u32,
    pub observers: Vec<String>,
    pub cache_handles: Vec<String>,
    pub winner_as_parsed: Option<u8>,
}

/// Per-field cross-verification result, shown to players/admins but never
/// auto-rejecting (§4.8).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ReplayVerification {
    pub players_match: bool,
    pub races_match: bool,
    pub map_matches: bool,
    pub winner_consistent: bool,
    pub has_observers: bool,
    pub duration_suspicious: bool,
    pub cache_handle_anomaly: bool,
}

impl ReplayVerification {
    /// The fields that gate nothing (observers/duration/cache) are excluded;
    /// this is the subset admins actually look at to adjudicate a mismatch.
    pub fn blocking_mismatch(&self) -> bool {
        !(self.players_match && self.races_match && self.map_matches && self.winner_consistent)
    }
}

/// Audit-only record of a privileged action. Never consulted by core logic.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdminAction {
    pub id: i64,
    pub admin_discord_uid: i64,
    pub admin_display_name: String,
    pub action_type: AdminActionType,
    pub target_player_uid: Option<i64>,
    pub target_match_id: Option<i64>,
    pub detail: serde_json::Value,
    pub reason: String,
    pub performed_at: NaiveDateTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminActionType {
    ResolveMatch,
    AdjustMmr,
    RemoveFromQueue,
    ResetAborts,
    ToggleBan,
    Unblock,
    ClearQueue,
    ToggleAdmin,
}
