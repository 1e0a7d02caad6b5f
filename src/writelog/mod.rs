//! Durable Write Log (C3, §4.3): an ordered, persistent append log of
//! mutations, drained by a single background worker into the SQL store.
//!
//! Append is synchronous from the caller's perspective (the future only
//! resolves once the job is fsynced); the drain is asynchronous, FIFO, and
//! retries failures a bounded number of times before marking a job `FAILED`
//! and alerting via `log::error!`.

mod job;

pub use job::{JobPayload, JobStatus, WriteJob};

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::constants::WRITE_JOB_MAX_ATTEMPTS;
use crate::database::api::{
    AdminActionQueries, CommandCallQueries, MatchQueries, PlayerActionQueries, PlayerQueries,
    RatingQueries, ReplayQueries,
};
use crate::database::Database;

/// What the store (C4) and admin/match/queue components need from the
/// write log: fire-and-forget-durable appends. Split out as a trait so
/// those components depend on the interface, not the file-backed impl —
/// the same shape as the teacher's `Live*` controller traits.
#[async_trait]
pub trait LiveWriteLog: Send + Sync {
    async fn append(&self, payload: JobPayload) -> anyhow::Result<u64>;
}

struct WriteLogState {
    jobs: Vec<WriteJob>,
    next_id: u64,
}

/// Owns the on-disk log file and the in-memory mirror of its pending/failed
/// jobs. Cheap to clone (an `Arc` internally), following the teacher's
/// actor-controller shape.
#[derive(Clone)]
pub struct WriteLogController {
    state: Arc<Mutex<WriteLogState>>,
    path: PathBuf,
}

impl WriteLogController {
    /// Open (or create) the log at `path` and replay it into memory. This is
    /// the first half of restart recovery (§4.3): the caller still needs to
    /// re-apply any `PENDING`/`FAILED` jobs returned by `pending_jobs()`
    /// once the store has hydrated from the SQL tables.
    pub async fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();

        let jobs = if path.exists() {
            let contents = tokio::fs::read_to_string(&path).await?;
            contents
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(|l| serde_json::from_str::<WriteJob>(l).map_err(anyhow::Error::from))
                .collect::<anyhow::Result<Vec<_>>>()?
        } else {
            Vec::new()
        };

        let next_id = jobs.iter().map(|j| j.id).max().map(|id| id + 1).unwrap_or(0);

        log::info!(
            "write log at '{}' opened with {} outstanding job(s)",
            path.display(),
            jobs.len()
        );

        Ok(WriteLogController {
            state: Arc::new(Mutex::new(WriteLogState { jobs, next_id })),
            path,
        })
    }

    /// Jobs still needing to be applied (or re-applied) to the SQL store,
    /// in FIFO insertion order.
    pub async fn pending_jobs(&self) -> Vec<WriteJob> {
        let state = self.state.lock().await;
        state
            .jobs
            .iter()
            .filter(|j| j.status != JobStatus::Completed)
            .cloned()
            .collect()
    }

    async fn mark_completed(&self, id: u64) {
        let mut state = self.state.lock().await;
        if let Some(job) = state.jobs.iter_mut().find(|j| j.id == id) {
            job.status = JobStatus::Completed;
            job.completed_at = Some(Utc::now().naive_utc());
        }
        drop(state);
        let _ = self.compact().await;
    }

    async fn mark_failed_attempt(&self, id: u64, error: String) {
        let mut state = self.state.lock().await;
        if let Some(job) = state.jobs.iter_mut().find(|j| j.id == id) {
            job.attempts += 1;
            job.last_error = Some(error.clone());
            if job.attempts >= WRITE_JOB_MAX_ATTEMPTS {
                job.status = JobStatus::Failed;
                log::error!(
                    "write log job {} ({:?}) failed permanently after {} attempts: {}",
                    id,
                    job.payload,
                    job.attempts,
                    error
                );
            } else {
                log::warn!("write log job {} failed (attempt {}): {}", id, job.attempts, error);
            }
        }
        drop(state);
        let _ = self.compact().await;
    }

    /// Rewrite the on-disk log to contain only jobs not yet `COMPLETED`.
    /// Completed jobs are dropped from disk since the SQL store is now
    /// their source of truth; `PENDING`/`FAILED` jobs stay so a restart
    /// still sees them.
    async fn compact(&self) -> anyhow::Result<()> {
        let state = self.state.lock().await;
        let lines: Vec<String> = state
            .jobs
            .iter()
            .filter(|j| j.status != JobStatus::Completed)
            .map(|j| serde_json::to_string(j).expect("WriteJob always serializes"))
            .collect();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_all_lines_durably(&path, &lines, false)).await??;
        Ok(())
    }

    /// Apply every pending job to `db`, in FIFO order, retrying failures up
    /// to `WRITE_JOB_MAX_ATTEMPTS` times before giving up on a job (it stays
    /// `FAILED` in the log for operator attention — see §4.3 "Retry").
    pub async fn drain_once(&self, db: &Arc<dyn Database>) {
        for job in self.pending_jobs().await {
            if job.status == JobStatus::Failed {
                continue;
            }
            match apply(db, &job.payload).await {
                Ok(()) => self.mark_completed(job.id).await,
                Err(e) => self.mark_failed_attempt(job.id, e.to_string()).await,
            }
        }
    }
}

#[async_trait]
impl LiveWriteLog for WriteLogController {
    async fn append(&self, payload: JobPayload) -> anyhow::Result<u64> {
        let (id, job) = {
            let mut state = self.state.lock().await;
            let id = state.next_id;
            state.next_id += 1;
            let job = WriteJob {
                id,
                payload,
                status: JobStatus::Pending,
                attempts: 0,
                last_error: None,
                enqueued_at: Utc::now().naive_utc(),
                completed_at: None,
            };
            state.jobs.push(job.clone());
            (id, job)
        };

        let line = serde_json::to_string(&job)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_all_lines_durably(&path, &[line], true)).await??;
        Ok(id)
    }
}

/// Write `lines` to `path`, fsyncing before returning — the durability
/// guarantee an `append()` caller is relying on. `append_mode` selects
/// between appending one new line (the common case) and rewriting the
/// whole file (compaction).
fn write_all_lines_durably(path: &Path, lines: &[String], append_mode: bool) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .append(append_mode)
        .truncate(!append_mode)
        .open(path)?;

    for line in lines {
        writeln!(file, "{}", line)?;
    }
    file.sync_all()?;
    Ok(())
}

/// Dispatch one job's payload to the concrete `Database` mutation it
/// represents. Every arm must be idempotent under replay (§4.3) — all are
/// natural upserts except `admin_resolve_match`, whose idempotency is
/// established by the admin override algorithm (§4.10) before the job is
/// ever enqueued.
async fn apply(db: &Arc<dyn Database>, payload: &JobPayload) -> anyhow::Result<()> {
    match payload {
        JobPayload::CreatePlayer { player } => db.create_player(player).await?,
        JobPayload::UpdatePlayerInfo {
            discord_uid,
            display_name,
            battletag,
            alt_names,
            country,
            region,
        } => {
            db.update_player_info(
                *discord_uid,
                display_name,
                battletag.as_deref(),
                alt_names,
                country.as_deref(),
                region.as_deref(),
            )
            .await?
        }
        JobPayload::UpdateAcceptedTos { discord_uid, accepted } => {
            db.update_accepted_tos(*discord_uid, *accepted).await?
        }
        JobPayload::UpdateCompletedSetup { discord_uid, completed } => {
            db.update_completed_setup(*discord_uid, *completed).await?
        }
        JobPayload::UpdateShieldBatteryBug { discord_uid, acked } => {
            db.update_shield_battery_bug(*discord_uid, *acked).await?
        }
        JobPayload::UpdateRemainingAborts { discord_uid, remaining } => {
            db.update_remaining_aborts(*discord_uid, *remaining).await?
        }
        JobPayload::UpdateIsBanned { discord_uid, banned } => {
            db.update_is_banned(*discord_uid, *banned).await?
        }
        JobPayload::UpdatePlayerState { discord_uid, state } => {
            db.update_player_state(*discord_uid, *state).await?
        }
        JobPayload::UpdateMmr { rating } => db.update_mmr(rating).await?,
        JobPayload::CreateMatch { m } => db.create_match(m).await?,
        JobPayload::UpdateMatchReport { match_id, player1_report, player2_report } => {
            db.update_match_report(*match_id, *player1_report, *player2_report).await?
        }
        JobPayload::UpdateMatchResultAndMmrChange { match_id, match_result, mmr_change } => {
            db.update_match_result_and_mmr_change(*match_id, *match_result, *mmr_change).await?
        }
        JobPayload::UpdateMatchReplayPath { match_id, player1_replay_path, player2_replay_path } => {
            db.update_match_replay_path(
                *match_id,
                player1_replay_path.as_deref(),
                player2_replay_path.as_deref(),
            )
            .await?
        }
        JobPayload::AdminResolveMatch { match_id, match_result, mmr_change } => {
            db.admin_resolve_match(*match_id, *match_result, *mmr_change).await?
        }
        JobPayload::UpsertReplay { replay } => db.upsert_replay(replay).await?,
        JobPayload::LogAdminAction { action } => db.log_admin_action(action).await?,
        JobPayload::LogPlayerAction { discord_uid, action, detail } => {
            db.log_player_action(*discord_uid, action, detail.clone()).await?
        }
        JobPayload::LogCommandCall { discord_uid, command, detail } => {
            db.log_command_call(*discord_uid, command, detail.clone()).await?
        }
    }
    Ok(())
}

/// Spawn the single drain worker (§4.3: "asynchronous by a single worker").
/// Runs until the process exits; errors applying an individual job are
/// handled inside `drain_once` and never stop the loop.
pub fn spawn_drain_loop(
    write_log: WriteLogController,
    db: Arc<dyn Database>,
    interval: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            write_log.drain_once(&db).await;
        }
    })
}
