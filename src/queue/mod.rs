//! Queue Engine (C5, §4.5): who's waiting, for which races, and how long
//! they've waited. Wave scheduling lives in the orchestrator (C11), which
//! calls `snapshot()` then `split_sides()` on each tick before handing the
//! two sides to the Pairing Algorithm (C6).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{NaiveDateTime, Utc};

use crate::error::{EngineError, EngineResult};
use crate::model::Race;
use crate::store::LiveStore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoveReason {
    Matched,
    Cancelled,
    AdminRemoved,
}

/// A player's entry while queued. `seq` is the monotonic insertion sequence
/// used to break score ties deterministically (§4.6 "Tie-breaking").
#[derive(Clone, Debug)]
pub struct QueueEntry {
    pub discord_uid: i64,
    pub selected_races: Vec<Race>,
    pub queued_at: NaiveDateTime,
    pub wave_count: u32,
    pub seq: u64,
}

impl QueueEntry {
    pub fn is_bw_only(&self) -> bool {
        self.selected_races.iter().all(|r| r.is_bw())
    }

    pub fn is_sc2_only(&self) -> bool {
        self.selected_races.iter().all(|r| r.is_sc2())
    }
}

#[derive(Default)]
struct QueueState {
    entries: HashMap<i64, QueueEntry>,
    next_seq: u64,
}

#[derive(Clone)]
pub struct QueueController {
    state: Arc<RwLock<QueueState>>,
    store: Arc<dyn LiveStore>,
}

impl QueueController {
    pub fn new(store: Arc<dyn LiveStore>) -> Self {
        QueueController { state: Arc::new(RwLock::new(QueueState::default())), store }
    }

    /// `add(player, races)` — §4.5. Lifecycle transition to `queued` is the
    /// caller's responsibility (it goes through the store so it's
    /// persisted); this only manages the ephemeral queue membership.
    pub fn add(&self, discord_uid: i64, selected_races: Vec<Race>) -> EngineResult<()> {
        if selected_races.is_empty() {
            return Err(EngineError::validation("no races selected"));
        }
        let player = self.store.player(discord_uid);
        if player.as_ref().map(|p| p.is_banned).unwrap_or(false) {
            return Err(EngineError::authorization("player is banned"));
        }
        if player.as_ref().map(|p| p.state == crate::model::PlayerState::Matched).unwrap_or(false) {
            return Err(EngineError::state("player is in a live match"));
        }

        let mut state = self.state.write().expect("queue lock poisoned");
        if state.entries.contains_key(&discord_uid) {
            return Err(EngineError::state("already queued"));
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(
            discord_uid,
            QueueEntry {
                discord_uid,
                selected_races,
                queued_at: Utc::now().naive_utc(),
                wave_count: 0,
                seq,
            },
        );
        Ok(())
    }

    /// `remove(player, reason)` — unconditional (§4.5); the caller decides
    /// whether to emit a cancellation notification based on `reason`.
    pub fn remove(&self, discord_uid: i64, reason: RemoveReason) -> Option<QueueEntry> {
        let mut state = self.state.write().expect("queue lock poisoned");
        let removed = state.entries.remove(&discord_uid);
        if removed.is_some() {
            log::debug!("removed {} from queue ({:?})", discord_uid, reason);
        }
        removed
    }

    pub fn is_queued(&self, discord_uid: i64) -> bool {
        let state = self.state.read().expect("queue lock poisoned");
        state.entries.contains_key(&discord_uid)
    }

    /// A full, insertion-ordered snapshot, used by wave scheduling.
    pub fn snapshot(&self) -> Vec<QueueEntry> {
        let state = self.state.read().expect("queue lock poisoned");
        let mut entries: Vec<QueueEntry> = state.entries.values().cloned().collect();
        entries.sort_by_key(|e| e.seq);
        entries
    }

    /// Increment every entry's wave counter. Called once per wave tick,
    /// before pairing (§4.5 "Wave Scheduling").
    pub fn tick_wave(&self) {
        let mut state = self.state.write().expect("queue lock poisoned");
        for entry in state.entries.values_mut() {
            entry.wave_count += 1;
        }
    }

    pub fn remove_many(&self, discord_uids: &[i64]) {
        let mut state = self.state.write().expect("queue lock poisoned");
        for uid in discord_uids {
            state.entries.remove(uid);
        }
    }
}

/// The two sides handed to the Pairing Algorithm, plus which one is `lead`.
pub struct Sides {
    pub bw_side: Vec<QueueEntry>,
    pub sc2_side: Vec<QueueEntry>,
}

impl Sides {
    /// The shorter side leads iteration (ties go to bw, §4.6).
    pub fn lead_is_bw(&self) -> bool {
        self.bw_side.len() <= self.sc2_side.len()
    }
}

/// Split a wave snapshot into `bw_side`/`sc2_side` per §4.5's balancing rule.
pub fn split_sides(mut snapshot: Vec<QueueEntry>) -> Sides {
    let mut bw_side = Vec::new();
    let mut sc2_side = Vec::new();
    let mut both = Vec::new();

    snapshot.sort_by_key(|e| e.seq);
    for entry in snapshot.drain(..) {
        if entry.is_bw_only() {
            bw_side.push(entry);
        } else if entry.is_sc2_only() {
            sc2_side.push(entry);
        } else {
            both.push(entry);
        }
    }

    if bw_side.is_empty() && sc2_side.is_empty() {
        // Rule 2: only `both` players present — alternate-assign.
        for (i, entry) in both.drain(..).enumerate() {
            if i % 2 == 0 {
                bw_side.push(entry);
            } else {
                sc2_side.push(entry);
            }
        }
    } else {
        // Rule 3: push each `both` player to the shorter side; ties to sc2_side.
        for entry in both.drain(..) {
            if bw_side.len() < sc2_side.len() {
                bw_side.push(entry);
            } else {
                sc2_side.push(entry);
            }
        }
    }

    Sides { bw_side, sc2_side }
}

/// Choose a `both` player's race for whichever side they landed on: the
/// selected race in that game with the highest current MMR (§4.5 "Race
/// Selection at Pair Time"). For a single-game player, the (only) race in
/// their selection that matches the game is returned.
pub fn choose_race_for_side(
    store: &dyn LiveStore,
    entry: &QueueEntry,
    side_is_bw: bool,
) -> Race {
    let candidates: Vec<Race> = entry
        .selected_races
        .iter()
        .copied()
        .filter(|r| if side_is_bw { r.is_bw() } else { r.is_sc2() })
        .collect();

    *candidates
        .iter()
        .max_by_key(|r| store.rating(entry.discord_uid, **r).mmr)
        .unwrap_or(&entry.selected_races[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(uid: i64, races: Vec<Race>, seq: u64) -> QueueEntry {
        QueueEntry { discord_uid: uid, selected_races: races, queued_at: Utc::now().naive_utc(), wave_count: 0, seq }
    }

    #[test]
    fn split_sides_routes_pure_races_directly() {
        let snap = vec![
            entry(1, vec![Race::BwTerran], 0),
            entry(2, vec![Race::Sc2Zerg], 1),
        ];
        let sides = split_sides(snap);
        assert_eq!(sides.bw_side.len(), 1);
        assert_eq!(sides.sc2_side.len(), 1);
    }

    #[test]
    fn split_sides_alternates_when_only_both_players_present() {
        let snap = vec![
            entry(1, vec![Race::BwTerran, Race::Sc2Zerg], 0),
            entry(2, vec![Race::BwZerg, Race::Sc2Terran], 1),
            entry(3, vec![Race::BwProtoss, Race::Sc2Protoss], 2),
        ];
        let sides = split_sides(snap);
        assert_eq!(sides.bw_side.len(), 2);
        assert_eq!(sides.sc2_side.len(), 1);
        assert_eq!(sides.bw_side[0].discord_uid, 1);
        assert_eq!(sides.sc2_side[0].discord_uid, 2);
    }

    #[test]
    fn split_sides_pushes_both_players_to_shorter_side() {
        let snap = vec![
            entry(1, vec![Race::BwTerran], 0),
            entry(2, vec![Race::BwZerg], 1),
            entry(3, vec![Race::Sc2Zerg], 2),
            entry(4, vec![Race::BwTerran, Race::Sc2Terran], 3),
        ];
        let sides = split_sides(snap);
        // bw has 2, sc2 has 1 before placing the `both` player -> goes to sc2_side.
        assert_eq!(sides.sc2_side.len(), 2);
        assert!(sides.sc2_side.iter().any(|e| e.discord_uid == 4));
    }
}
