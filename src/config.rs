use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::constants::{
    WindowProfile, DEFAULT_ABANDONMENT_TIMEOUT_SECS, DEFAULT_MESSAGE_RATE_LIMIT_PER_SEC,
    DEFAULT_WAVE_INTERVAL_SECS, DEFAULT_WORKER_POOL_SIZE,
};

/// Engine config, read from the environment (§6 `# Configuration`).
///
/// Unlike the teacher, which reads a single TOML file, this engine's
/// configuration surface is small enough to live entirely in environment
/// variables, the way the teacher's own `database`/`network` modules read
/// connection strings straight out of `std::env`.
#[derive(Clone, Debug)]
pub struct Config {
    /// `DATABASE_URL` — main store connection.
    pub database_url: String,

    /// `WRITE_LOG_PATH` — local durable path for the write-behind log (C3).
    pub write_log_path: String,

    /// `WAVE_INTERVAL_SEC` — default 15.
    pub wave_interval_secs: u64,

    /// `ABANDONMENT_TIMEOUT_SEC` — default 1800.
    pub abandonment_timeout_secs: u64,

    /// `WORKER_POOL_SIZE` — default 1.
    pub worker_pool_size: usize,

    /// `MESSAGE_RATE_LIMIT_PER_SEC` — default 40.
    pub message_rate_limit_per_sec: u32,

    /// `ADMIN_ALLOWLIST_PATH` — JSON list of `{discord_id, name, role}`.
    pub admin_allowlist_path: String,

    /// `MATCH_WINDOW_PROFILE` — one of {aggressive, balanced, strict}.
    pub match_window_profile: WindowProfile,
}

impl Config {
    /// Read configuration from the environment, applying `spec.md` §6
    /// defaults for anything unset.
    ///
    /// # Panics
    /// When `DATABASE_URL`, `WRITE_LOG_PATH`, or `ADMIN_ALLOWLIST_PATH` are
    /// missing — these have no sensible default.
    pub fn from_env() -> Config {
        dotenv::dotenv().ok();

        Config {
            database_url: require_env("DATABASE_URL"),
            write_log_path: require_env("WRITE_LOG_PATH"),
            wave_interval_secs: parse_env_or("WAVE_INTERVAL_SEC", DEFAULT_WAVE_INTERVAL_SECS),
            abandonment_timeout_secs: parse_env_or(
                "ABANDONMENT_TIMEOUT_SEC",
                DEFAULT_ABANDONMENT_TIMEOUT_SECS,
            ),
            worker_pool_size: parse_env_or("WORKER_POOL_SIZE", DEFAULT_WORKER_POOL_SIZE),
            message_rate_limit_per_sec: parse_env_or(
                "MESSAGE_RATE_LIMIT_PER_SEC",
                DEFAULT_MESSAGE_RATE_LIMIT_PER_SEC,
            ),
            admin_allowlist_path: require_env("ADMIN_ALLOWLIST_PATH"),
            match_window_profile: std::env::var("MATCH_WINDOW_PROFILE")
                .ok()
                .and_then(|s| match s.to_lowercase().as_str() {
                    "aggressive" => Some(WindowProfile::Aggressive),
                    "balanced" => Some(WindowProfile::Balanced),
                    "strict" => Some(WindowProfile::Strict),
                    _ => None,
                })
                .unwrap_or_default(),
        }
    }
}

fn require_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| panic!("missing required env var '{}'", key))
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// One entry of the `ADMIN_ALLOWLIST_PATH` JSON file.
#[derive(Clone, Debug, Deserialize)]
pub struct AllowlistEntry {
    pub discord_id: i64,
    pub name: String,
    pub role: AdminRole,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminRole {
    Admin,
    Owner,
}

/// Load the statically-configured admin/owner allowlist.
///
/// # Panics
/// When the file doesn't exist or fails to parse — a malformed allowlist is
/// an integrity problem that must be caught at startup, not mid-run.
pub fn load_allowlist(path: &str) -> Vec<AllowlistEntry> {
    let contents = fs::read_to_string(Path::new(path))
        .unwrap_or_else(|e| panic!("failed to read admin allowlist at '{}': {}", path, e));
    serde_json::from_str(&contents)
        .unwrap_or_else(|e| panic!("failed to parse admin allowlist at '{}': {}", path, e))
}
