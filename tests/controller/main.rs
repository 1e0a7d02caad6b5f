//! End-to-end `Controller` scenarios, driven the way the Orchestrator drives
//! it in `main.rs`: player commands in, wave tick, reports, admin override.
//! Runs entirely in-process against the `unit_test` in-memory mock database
//! (`--features unit_test`), the same database swap the teacher's own
//! `DatabaseClient` mock enables for its controller-level tests, rather than
//! standing up a Postgres container the way `tests/integration` does for
//! row-level persistence checks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arbiter::command::{AdminCommand, CommandOutput, PlayerCommand, ReportedOutcome};
use arbiter::config::{AdminRole, AllowlistEntry, Config};
use arbiter::constants::WindowProfile;
use arbiter::controller::Controller;
use arbiter::database::DatabaseClient;
use arbiter::model::{MatchResult, Race};
use arbiter::notify::{Dispatcher, Notification, NotificationRouter};
use arbiter::queue::QueueController;
use arbiter::replay::{ReplayWorkerPool, UnboundReplayParser};
use arbiter::store::StoreController;
use arbiter::writelog::WriteLogController;

const ADMIN_UID: i64 = 999;

struct NullDispatcher;

#[async_trait::async_trait]
impl Dispatcher for NullDispatcher {
    async fn send(&self, _notification: &Notification) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A fresh `Controller` wired against an empty mock database and an
/// on-disk write log unique to this test, mirroring `main()`'s startup
/// sequence minus the Postgres connection.
async fn fresh_controller() -> Controller {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let write_log_path = std::env::temp_dir()
        .join(format!("arbiter-controller-test-{}-{}.jsonl", std::process::id(), n));

    let write_log = WriteLogController::open(&write_log_path).await.unwrap();
    let store = StoreController::new(Arc::new(write_log.clone()));
    let queue = QueueController::new(Arc::new(store.clone()));
    let notifications = NotificationRouter::spawn(Arc::new(NullDispatcher), 1000);
    let replay_pool = Arc::new(ReplayWorkerPool::new(Arc::new(UnboundReplayParser), 1));
    let allowlist =
        vec![AllowlistEntry { discord_id: ADMIN_UID, name: "admin".to_string(), role: AdminRole::Admin }];

    let config = Config {
        database_url: String::new(),
        write_log_path: write_log_path.to_string_lossy().to_string(),
        wave_interval_secs: 15,
        abandonment_timeout_secs: 1800,
        worker_pool_size: 1,
        message_rate_limit_per_sec: 1000,
        admin_allowlist_path: String::new(),
        match_window_profile: WindowProfile::Balanced,
    };

    Controller::new(store, write_log, queue, notifications, replay_pool, allowlist, &config)
}

/// Gets a queued, terms-accepted, setup-complete player ready to be paired.
async fn onboard_and_queue(controller: &Controller, uid: i64, name: &str, race: Race) {
    controller.handle_player_command(uid, name, PlayerCommand::AcceptTerms).await.unwrap();
    controller
        .handle_player_command(
            uid,
            name,
            PlayerCommand::Setup {
                display_name: name.to_string(),
                battletag: None,
                alt_names: vec![],
                country: None,
                region: None,
            },
        )
        .await
        .unwrap();
    controller.handle_player_command(uid, name, PlayerCommand::Queue { races: vec![race] }).await.unwrap();
}

/// Runs one wave and returns the id of the single match it's expected to
/// create. Panics if the wave didn't pair exactly one match.
async fn run_wave_expect_one_match(controller: &Controller) -> i64 {
    let events = controller.run_wave().await;
    assert_eq!(events.len(), 1, "expected exactly one match from this wave");
    match &events[0] {
        arbiter::event::EngineEvent::MatchCreated { m } => m.id,
    }
}

#[tokio::test]
async fn queue_pair_report_resolve_updates_mmr() {
    let controller = fresh_controller().await;
    onboard_and_queue(&controller, 1, "p1", Race::BwTerran).await;
    onboard_and_queue(&controller, 2, "p2", Race::Sc2Zerg).await;

    let match_id = run_wave_expect_one_match(&controller).await;

    let ack = controller
        .handle_player_command(1, "p1", PlayerCommand::ReportResult { match_id, outcome: ReportedOutcome::Win })
        .await
        .unwrap();
    assert!(matches!(ack, CommandOutput::Ack));

    controller
        .handle_player_command(2, "p2", PlayerCommand::ReportResult { match_id, outcome: ReportedOutcome::Loss })
        .await
        .unwrap();

    let snapshot = controller.system_snapshot().await;
    assert_eq!(snapshot.open_conflicts, 0);
    assert_eq!(snapshot.queue_size, 0);
}

#[tokio::test]
async fn disagreeing_reports_conflict_then_admin_resolves() {
    let controller = fresh_controller().await;
    onboard_and_queue(&controller, 1, "p1", Race::BwTerran).await;
    onboard_and_queue(&controller, 2, "p2", Race::Sc2Zerg).await;
    let match_id = run_wave_expect_one_match(&controller).await;

    controller
        .handle_player_command(1, "p1", PlayerCommand::ReportResult { match_id, outcome: ReportedOutcome::Win })
        .await
        .unwrap();
    controller
        .handle_player_command(2, "p2", PlayerCommand::ReportResult { match_id, outcome: ReportedOutcome::Win })
        .await
        .unwrap();

    let snapshot = controller.system_snapshot().await;
    assert_eq!(snapshot.open_conflicts, 1);

    let output = controller
        .handle_admin_command(
            ADMIN_UID,
            "admin",
            AdminCommand::ResolveMatch {
                match_id,
                result: MatchResult::Player1Won,
                reason: "video review".to_string(),
            },
        )
        .await
        .unwrap();
    let resolved = match output {
        CommandOutput::MatchResolved(m) => m,
        other => panic!("expected MatchResolved, got {:?}", other),
    };
    assert_eq!(resolved.match_result, Some(MatchResult::Player1Won));
    assert_eq!(controller.system_snapshot().await.open_conflicts, 0);
}

#[tokio::test]
async fn admin_override_reresolution_is_idempotent() {
    let controller = fresh_controller().await;
    onboard_and_queue(&controller, 1, "p1", Race::BwTerran).await;
    onboard_and_queue(&controller, 2, "p2", Race::Sc2Zerg).await;
    let match_id = run_wave_expect_one_match(&controller).await;

    controller
        .handle_player_command(1, "p1", PlayerCommand::ReportResult { match_id, outcome: ReportedOutcome::Win })
        .await
        .unwrap();
    controller
        .handle_player_command(2, "p2", PlayerCommand::ReportResult { match_id, outcome: ReportedOutcome::Loss })
        .await
        .unwrap();

    for reason in ["first call", "re-check", "re-check again"] {
        controller
            .handle_admin_command(
                ADMIN_UID,
                "admin",
                AdminCommand::ResolveMatch {
                    match_id,
                    result: MatchResult::Player2Won,
                    reason: reason.to_string(),
                },
            )
            .await
            .unwrap();
    }

    let output = controller
        .handle_admin_command(
            ADMIN_UID,
            "admin",
            AdminCommand::ResolveMatch {
                match_id,
                result: MatchResult::Player2Won,
                reason: "final check".to_string(),
            },
        )
        .await
        .unwrap();
    let first_mmr_change = match output {
        CommandOutput::MatchResolved(m) => m.mmr_change,
        other => panic!("expected MatchResolved, got {:?}", other),
    };

    let output_again = controller
        .handle_admin_command(
            ADMIN_UID,
            "admin",
            AdminCommand::ResolveMatch {
                match_id,
                result: MatchResult::Player2Won,
                reason: "once more".to_string(),
            },
        )
        .await
        .unwrap();
    match output_again {
        CommandOutput::MatchResolved(m) => assert_eq!(m.mmr_change, first_mmr_change),
        other => panic!("expected MatchResolved, got {:?}", other),
    }
}

#[tokio::test]
async fn unresponsive_match_is_abandoned_without_a_report() {
    let controller = fresh_controller().await;
    onboard_and_queue(&controller, 1, "p1", Race::BwTerran).await;
    onboard_and_queue(&controller, 2, "p2", Race::Sc2Zerg).await;
    let match_id = run_wave_expect_one_match(&controller).await;

    let result = controller.abandon_if_unresponsive(match_id).await.unwrap();
    assert_eq!(result, Some(MatchResult::Invalidated));
    assert_eq!(controller.system_snapshot().await.open_conflicts, 0);
}

#[tokio::test]
async fn manual_abort_fails_once_credits_are_exhausted() {
    let controller = fresh_controller().await;
    onboard_and_queue(&controller, 1, "p1", Race::BwTerran).await;
    onboard_and_queue(&controller, 2, "p2", Race::Sc2Zerg).await;
    let match_id = run_wave_expect_one_match(&controller).await;

    controller
        .handle_admin_command(
            ADMIN_UID,
            "admin",
            AdminCommand::ResetAborts { target_uid: 1, new_count: 0, reason: "already burned".to_string() },
        )
        .await
        .unwrap();

    let err = controller
        .handle_player_command(
            1,
            "p1",
            PlayerCommand::ReportResult { match_id, outcome: ReportedOutcome::Abort },
        )
        .await
        .unwrap_err();
    assert!(format!("{}", err).contains("abort"));
}
