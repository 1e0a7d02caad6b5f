use std::sync::Arc;
use std::time::Duration;

use arbiter::config::Config;
use arbiter::controller::Controller;
use arbiter::database::api::{MatchQueries, PlayerQueries, RatingQueries, ReplayQueries};
use arbiter::database::{pg_connect, Database, DatabaseClient};
use arbiter::notify::{Dispatcher, Notification, NotificationRouter};
use arbiter::queue::QueueController;
use arbiter::replay::{ReplayWorkerPool, UnboundReplayParser};
use arbiter::store::StoreController;
use arbiter::writelog::WriteLogController;
use arbiter::{catalog, config, constants, event, model, writelog};

/// The engine's entry point (§4.11 Orchestrator): connect to storage, replay
/// the durable write log, hydrate the in-memory store, start the wave timer
/// and background workers, then run until shut down.
#[tokio::main]
async fn main() {
    env_logger::init();

    let config = Config::from_env();
    log::info!("arbiter {} starting up", *constants::VERSION);

    let db_client = pg_connect(&config.database_url, Duration::from_secs(5))
        .await
        .expect("failed to connect to the database");
    db_client.migrate().await.expect("failed to run pending migrations");
    let db: Arc<dyn Database> = Arc::new(db_client);

    // Restart recovery (§4.3): open the write log and replay whatever's
    // still pending against the SQL store before hydrating from it, so the
    // in-memory view reflects every mutation that was ever durably appended.
    let write_log = WriteLogController::open(&config.write_log_path)
        .await
        .expect("failed to open write log");
    write_log.drain_once(&db).await;

    let store = StoreController::new(Arc::new(write_log.clone()));
    let players = db.all_players().await.expect("failed to load players");
    let ratings = db.all_ratings().await.expect("failed to load ratings");
    let matches = db.all_matches().await.expect("failed to load matches");
    let replays = db.all_replays().await.expect("failed to load replays");
    log::info!(
        "hydrated {} player(s), {} rating(s), {} match(es), {} replay(s)",
        players.len(),
        ratings.len(),
        matches.len(),
        replays.len()
    );
    let in_flight_match_ids: Vec<i64> =
        matches.iter().filter(|m| !m.is_terminal() && !m.is_conflict()).map(|m| m.id).collect();
    store.hydrate(players, ratings, matches, replays);

    writelog::spawn_drain_loop(write_log.clone(), db.clone(), Duration::from_secs(2));

    let queue = QueueController::new(Arc::new(store.clone()));

    let allowlist = config::load_allowlist(&config.admin_allowlist_path);
    log::info!("loaded {} admin allowlist entr(ies)", allowlist.len());

    let dispatcher: Arc<dyn Dispatcher> = Arc::new(LoggingDispatcher);
    let notifications = NotificationRouter::spawn(dispatcher, config.message_rate_limit_per_sec);

    let replay_pool = Arc::new(ReplayWorkerPool::new(Arc::new(UnboundReplayParser), config.worker_pool_size));

    let controller =
        Controller::new(store, write_log, queue, notifications, replay_pool, allowlist, &config);

    // Resume the abandonment timer for every match that was already in
    // `REPORTING`/`CREATED` when the process last stopped (§4.3 recovery).
    for match_id in in_flight_match_ids {
        spawn_abandonment_timer(controller.clone(), match_id, config.abandonment_timeout_secs);
    }

    spawn_wave_timer(controller.clone(), &config);
    spawn_population_refresh(controller.clone(), db.clone());
    spawn_self_check(controller.clone());

    log::info!("accepting commands");

    // The presentation layer (out of scope, §1) drives `Controller` from
    // here via `handle_player_command`/`handle_admin_command`/
    // `handle_owner_command`. This process just keeps the background tasks
    // above alive until terminated.
    std::future::pending::<()>().await;
}

fn spawn_wave_timer(controller: Controller, config: &Config) {
    let interval = Duration::from_secs(config.wave_interval_secs);
    let abandon_after = config.abandonment_timeout_secs;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let events = controller.run_wave().await;
            for event in events {
                if let event::EngineEvent::MatchCreated { m } = event {
                    spawn_abandonment_timer(controller.clone(), m.id, abandon_after);
                    notify_match_found(&controller, &m).await;
                }
            }
        }
    });
}

async fn notify_match_found(controller: &Controller, m: &model::Match) {
    let region1 = controller.store.player(m.player1_uid).and_then(|p| p.region);
    let region2 = controller.store.player(m.player2_uid).and_then(|p| p.region);
    let quality = match (region1.as_deref(), region2.as_deref()) {
        (Some(a), Some(b)) => Some(catalog::ping_quality(a, b, &m.server_region)),
        _ => None,
    };

    for uid in [m.player1_uid, m.player2_uid] {
        let text = match quality {
            Some(q) => format!(
                "match #{} found on {} ({}, ping: {:?})",
                m.id, m.map, m.server_region, q
            ),
            None => format!("match #{} found on {} ({})", m.id, m.map, m.server_region),
        };
        if let Err(e) = controller.notifications.send_low(Notification { recipient_uid: uid, text }).await {
            log::error!("failed to notify {} of match {}: {}", uid, m.id, e);
        }
    }
}

fn spawn_abandonment_timer(controller: Controller, match_id: i64, after_secs: u64) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(after_secs)).await;
        match controller.abandon_if_unresponsive(match_id).await {
            Ok(Some(result)) => {
                log::info!("match {} abandoned, resolved as {:?}", match_id, result);
            }
            Ok(None) => {}
            Err(e) => log::error!("abandonment check failed for match {}: {}", match_id, e),
        }
    });
}

/// Refresh the pairing population estimate from the SQL player count every
/// few minutes; cheap enough to not warrant a dedicated store method, and
/// doesn't need to be exact (§4.6 only uses it to pick a pressure band).
fn spawn_population_refresh(controller: Controller, db: Arc<dyn Database>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(300));
        loop {
            ticker.tick().await;
            match db.all_players().await {
                Ok(players) => controller.set_population_estimate(players.len()),
                Err(e) => log::warn!("failed to refresh population estimate: {}", e),
            }
        }
    });
}

/// Light periodic self-check (supplemental, grounded on `memory_monitor.py`'s
/// threshold-based alerting): warns when the queue or write-log backlog
/// grows past a fixed threshold, so an operator notices before either
/// becomes an "alertable condition" on its own. Not a metrics system — just
/// a log line.
fn spawn_self_check(controller: Controller) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            let snapshot = controller.system_snapshot().await;
            if snapshot.queue_size > constants::QUEUE_DEPTH_WARN_THRESHOLD {
                log::warn!(
                    "queue depth {} exceeds threshold {}",
                    snapshot.queue_size,
                    constants::QUEUE_DEPTH_WARN_THRESHOLD
                );
            }
            if snapshot.pending_write_log_jobs > constants::PENDING_WRITE_JOBS_WARN_THRESHOLD {
                log::warn!(
                    "write log backlog {} exceeds threshold {}",
                    snapshot.pending_write_log_jobs,
                    constants::PENDING_WRITE_JOBS_WARN_THRESHOLD
                );
            }
        }
    });
}

/// Placeholder dispatcher until a real chat-platform client is wired in by
/// the presentation layer; logs what would have been sent.
struct LoggingDispatcher;

#[async_trait::async_trait]
impl Dispatcher for LoggingDispatcher {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        log::info!("-> {}: {}", notification.recipient_uid, notification.text);
        Ok(())
    }
}
