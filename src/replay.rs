//! Replay Ingestion (C8, §4.8): accept an uploaded artifact, parse it in a
//! sandboxed worker pool, and cross-verify the result against the Match.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::timeout;

use crate::constants::REPLAY_PARSE_TIMEOUT_SECS;
use crate::error::{EngineError, EngineResult};
use crate::model::{Match, MatchSide, Replay, ReplayMetadata, ReplayVerification};
use crate::store::{LiveStore, StoreController};

/// What a worker does with a raw replay binary. The actual `.rep`/
/// `.SC2Replay` binary formats are an opaque external collaborator (§1) —
/// this engine only defines the seam a real parser binding plugs into.
pub trait ReplayParser: Send + Sync + 'static {
    fn parse(&self, bytes: &[u8]) -> anyhow::Result<ReplayMetadata>;
}

/// Placeholder until a real binary parser is bound in. Keeps the worker
/// pool wireable at startup without fabricating replay-format parsing logic
/// that's explicitly out of scope.
pub struct UnboundReplayParser;

impl ReplayParser for UnboundReplayParser {
    fn parse(&self, _bytes: &[u8]) -> anyhow::Result<ReplayMetadata> {
        anyhow::bail!("no replay parser binding configured for this deployment")
    }
}

enum WorkerJob {
    Parse { bytes: Vec<u8>, reply: oneshot::Sender<anyhow::Result<ReplayMetadata>> },
    Ping { reply: oneshot::Sender<()> },
}

/// A small pool of sandboxed parse workers (§4.8 step 2). Each worker is a
/// `spawn_blocking` task reading off a shared channel; a panicked or wedged
/// worker is detected and the whole pool is torn down and recreated, since
/// individual worker identity doesn't matter to callers.
pub struct ReplayWorkerPool {
    parser: Arc<dyn ReplayParser>,
    size: usize,
    inner: Mutex<PoolInner>,
}

struct PoolInner {
    tx: mpsc::Sender<WorkerJob>,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl ReplayWorkerPool {
    pub fn new(parser: Arc<dyn ReplayParser>, size: usize) -> Self {
        let inner = spawn_pool(parser.clone(), size);
        ReplayWorkerPool { parser, size, inner: Mutex::new(inner) }
    }

    /// Parse `bytes`, respecting `REPLAY_PARSE_TIMEOUT_SECS`. On timeout or
    /// a dead worker, the pool is recreated before returning the error, so
    /// the next call gets a fresh pool rather than repeating the failure.
    pub async fn parse(&self, bytes: Vec<u8>) -> anyhow::Result<ReplayMetadata> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let send_result = {
            let inner = self.inner.lock().await;
            inner.tx.send(WorkerJob::Parse { bytes, reply: reply_tx }).await
        };
        if send_result.is_err() {
            self.restart().await;
            anyhow::bail!("replay worker pool was wedged; restarted, please retry");
        }

        match timeout(Duration::from_secs(REPLAY_PARSE_TIMEOUT_SECS), reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                self.restart().await;
                anyhow::bail!("replay worker crashed mid-parse")
            }
            Err(_) => {
                self.restart().await;
                anyhow::bail!("replay parse timed out after {}s", REPLAY_PARSE_TIMEOUT_SECS)
            }
        }
    }

    /// Health check (§4.8): a trivial ping sent to the pool. No response
    /// within the parse timeout means the pool is wedged; restart it.
    pub async fn health_check(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        let send_result = {
            let inner = self.inner.lock().await;
            inner.tx.send(WorkerJob::Ping { reply: reply_tx }).await
        };
        if send_result.is_err() || timeout(Duration::from_secs(REPLAY_PARSE_TIMEOUT_SECS), reply_rx).await.is_err() {
            log::warn!("replay worker pool failed health check, restarting");
            self.restart().await;
        }
    }

    async fn restart(&self) {
        let mut inner = self.inner.lock().await;
        for h in inner.handles.drain(..) {
            h.abort();
        }
        *inner = spawn_pool(self.parser.clone(), self.size);
    }
}

fn spawn_pool(parser: Arc<dyn ReplayParser>, size: usize) -> PoolInner {
    let (tx, rx) = mpsc::channel::<WorkerJob>(256);
    let rx = Arc::new(Mutex::new(rx));
    let mut handles = Vec::with_capacity(size);
    for _ in 0..size {
        let rx = rx.clone();
        let parser = parser.clone();
        handles.push(tokio::spawn(async move {
            loop {
                let job = {
                    let mut rx = rx.lock().await;
                    rx.recv().await
                };
                match job {
                    Some(WorkerJob::Parse { bytes, reply }) => {
                        let parser = parser.clone();
                        let result = tokio::task::spawn_blocking(move || parser.parse(&bytes))
                            .await
                            .unwrap_or_else(|e| Err(anyhow::anyhow!("worker panicked: {}", e)));
                        let _ = reply.send(result);
                    }
                    Some(WorkerJob::Ping { reply }) => {
                        let _ = reply.send(());
                    }
                    None => break,
                }
            }
        }));
    }
    PoolInner { tx, handles }
}

/// §4.8 step 3: cross-verify parsed metadata against the claimed Match.
/// Never auto-rejects — every field is surfaced for a human to adjudicate.
pub fn verify(
    m: &Match,
    metadata: &ReplayMetadata,
    uploader_report: Option<crate::model::ReportCode>,
    known_names: (&[&str], &[&str]),
) -> ReplayVerification {
    let (p1_names, p2_names) = known_names;
    let has_p1 = metadata.player_names.iter().any(|n| p1_names.iter().any(|k| k.eq_ignore_ascii_case(n)));
    let has_p2 = metadata.player_names.iter().any(|n| p2_names.iter().any(|k| k.eq_ignore_ascii_case(n)));
    let players_match = metadata.player_names.len() == 2 && has_p1 && has_p2;

    let expected_races = [m.player1_race.as_db_str(), m.player2_race.as_db_str()];
    let races_match = metadata.races.len() == 2
        && expected_races.iter().all(|r| metadata.races.iter().any(|pr| pr == r));

    let map_matches = normalize(&metadata.map) == normalize(&m.map);

    // Reports are stored in the common frame where 1 means "player 1 won"
    // regardless of which side submitted (§4.7), so this needs no branch on
    // which side uploaded.
    let winner_consistent = match (metadata.winner_as_parsed, uploader_report) {
        (Some(winner_idx), Some(report)) => {
            let parsed_p1_won = winner_idx == 1;
            let claims_p1_won = matches!(report, crate::model::ReportCode::Player1Won);
            parsed_p1_won == claims_p1_won
        }
        // Nothing to contradict yet.
        _ => true,
    };

    ReplayVerification {
        players_match,
        races_match,
        map_matches,
        winner_consistent,
        has_observers: !metadata.observers.is_empty(),
        duration_suspicious: metadata.duration_secs < 30 || metadata.duration_secs > 3 * 3600,
        cache_handle_anomaly: metadata.cache_handles.iter().any(|h| h.trim().is_empty()),
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// §4.8 step 4: store the parsed Replay and point the Match's replay path
/// at it.
pub async fn ingest(
    store: &StoreController,
    pool: &ReplayWorkerPool,
    match_id: i64,
    uploader_uid: i64,
    path: String,
    bytes: Vec<u8>,
) -> EngineResult<(Replay, ReplayVerification)> {
    let m = store.match_by_id(match_id).ok_or_else(|| EngineError::validation("no such match"))?;

    let side = if uploader_uid == m.player1_uid {
        MatchSide::Player1
    } else if uploader_uid == m.player2_uid {
        MatchSide::Player2
    } else {
        return Err(EngineError::authorization("not a participant in this match"));
    };

    let metadata = pool.parse(bytes).await.map_err(EngineError::External)?;

    let p1 = store.player(m.player1_uid);
    let p2 = store.player(m.player2_uid);
    let p1_names: Vec<&str> = p1.as_ref().map(|p| p.known_names()).unwrap_or_default();
    let p2_names: Vec<&str> = p2.as_ref().map(|p| p.known_names()).unwrap_or_default();
    let uploader_report = match side {
        MatchSide::Player1 => m.player1_report,
        MatchSide::Player2 => m.player2_report,
    };

    let verification = verify(&m, &metadata, uploader_report, (&p1_names, &p2_names));

    let replay = Replay { path: path.clone(), uploader_uid, uploaded_at: Utc::now().naive_utc(), metadata };
    store.upsert_replay(replay.clone()).await.map_err(EngineError::External)?;

    let (p1_path, p2_path) = match side {
        MatchSide::Player1 => (Some(path), None),
        MatchSide::Player2 => (None, Some(path)),
    };
    store
        .update_match_replay_path(match_id, p1_path, p2_path)
        .await
        .map_err(EngineError::External)?;

    Ok((replay, verification))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Race;

    struct FixtureParser;
    impl ReplayParser for FixtureParser {
        fn parse(&self, bytes: &[u8]) -> anyhow::Result<ReplayMetadata> {
            let text = String::from_utf8_lossy(bytes);
            let fields: Vec<&str> = text.split('|').collect();
            Ok(ReplayMetadata {
                player_names: fields[0].split(',').map(String::from).collect(),
                races: fields[1].split(',').map(String::from).collect(),
                map: fields[2].to_string(),
                duration_secs: fields[3].parse().unwrap_or(600),
                observers: Vec::new(),
                cache_handles: vec!["abc123".to_string()],
                winner_as_parsed: fields[4].parse().ok(),
            })
        }
    }

    fn sample_match() -> Match {
        Match {
            id: 1,
            player1_uid: 1,
            player2_uid: 2,
            player1_race: Race::BwTerran,
            player2_race: Race::Sc2Zerg,
            map: "Fighting Spirit".to_string(),
            server_region: "NAC".to_string(),
            player1_initial_mmr: 1500,
            player2_initial_mmr: 1500,
            player1_report: Some(crate::model::ReportCode::Player1Won),
            player2_report: None,
            match_result: None,
            mmr_change: None,
            player1_replay_path: None,
            player2_replay_path: None,
            created_at: Utc::now().naive_utc(),
            played_at: None,
            updated_at: Utc::now().naive_utc(),
        }
    }

    #[tokio::test]
    async fn pool_parses_a_fixture_replay() {
        let pool = ReplayWorkerPool::new(Arc::new(FixtureParser), 1);
        let metadata = pool
            .parse(b"alice,bob|bw_terran,sc2_zerg|fighting spirit|900|1".to_vec())
            .await
            .unwrap();
        assert_eq!(metadata.player_names, vec!["alice", "bob"]);
        assert_eq!(metadata.winner_as_parsed, Some(1));
    }

    #[test]
    fn verify_flags_mismatched_map_but_not_others() {
        let m = sample_match();
        let metadata = ReplayMetadata {
            player_names: vec!["alice".to_string(), "bob".to_string()],
            races: vec!["bw_terran".to_string(), "sc2_zerg".to_string()],
            map: "Destination".to_string(),
            duration_secs: 900,
            observers: Vec::new(),
            cache_handles: vec!["abc123".to_string()],
            winner_as_parsed: Some(1),
        };
        let v = verify(&m, &metadata, m.player1_report, (&["alice"], &["bob"]));
        assert!(!v.map_matches);
        assert!(v.players_match);
        assert!(v.races_match);
        assert!(v.blocking_mismatch());
    }

    #[test]
    fn verify_flags_inconsistent_winner_with_reported_claim() {
        let m = sample_match();
        let metadata = ReplayMetadata {
            player_names: vec!["alice".to_string(), "bob".to_string()],
            races: vec!["bw_terran".to_string(), "sc2_zerg".to_string()],
            map: "fighting spirit".to_string(),
            duration_secs: 900,
            observers: Vec::new(),
            cache_handles: vec!["abc123".to_string()],
            winner_as_parsed: Some(2),
        };
        // Player 1 claimed to have won, but the replay says player 2 won.
        let v = verify(&m, &metadata, m.player1_report, (&["alice"], &["bob"]));
        assert!(!v.winner_consistent);
        assert!(!v.duration_suspicious);
    }
}
