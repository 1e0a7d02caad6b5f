//! Internal lifecycle events the Orchestrator (C11) fans out to the
//! Notification Router and to logging. Complements the command/output types
//! in `command.rs` the same way the teacher's `ControllerEvent` complements
//! its own command type: these describe things that happen to state, not
//! things a caller asked for directly.

use crate::model::{Match, MatchResult, Race};

#[derive(Debug)]
pub enum EngineEvent {
    /// A wave tick found a pairing and created a match (§4.6, §4.7).
    MatchCreated { m: Match },

    /// One side reported; the other hasn't yet.
    ReportRecorded { match_id: i64, reporter_uid: i64 },

    /// Both reports disagree and didn't fall into a resolvable case
    /// (§4.7 branch 6) — needs admin attention.
    MatchInConflict { match_id: i64 },

    /// The match reached a terminal state, with or without a rating change.
    MatchResolved { match_id: i64, result: MatchResult, mmr_change: i32 },

    /// The abandonment timer fired and filled in missing reports.
    MatchAbandoned { match_id: i64 },

    /// A replay was ingested and cross-verified; `mismatch` is true when
    /// any field failed verification (§4.8) — non-fatal, surfaced for admins.
    ReplayVerified { match_id: i64, mismatch: bool },

    /// An admin or owner command mutated state outside the normal flow
    /// (§4.10).
    AdminActionTaken { action_type: &'static str, admin_uid: i64, target_uid: Option<i64> },

    /// A player crossed the manual-abort credit limit and was rejected.
    AbortCreditsExhausted { discord_uid: i64, match_id: i64 },

    /// Queue membership changed; used to drive queue-size projections.
    QueueChanged { discord_uid: i64, race_filter: Vec<Race> },
}
