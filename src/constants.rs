//! Tunable constants. Most of these have an environment-variable override in
//! `Config`; the values here are the defaults from `spec.md` §6.

use lazy_static::*;
use semver::Version;

lazy_static! {
    /// Engine version.
    pub static ref VERSION: Version =
        Version::parse(env!("CARGO_PKG_VERSION")).expect("failed to parse our own SemVer");
}

/// Initial MMR for a player's first game in any race (§3).
pub const INITIAL_MMR: i32 = 1500;

/// Default number of manual aborts a player starts with (§3).
pub const DEFAULT_REMAINING_ABORTS: u8 = 3;

/// Default wave interval, in seconds (§6 `WAVE_INTERVAL_SEC`).
pub const DEFAULT_WAVE_INTERVAL_SECS: u64 = 15;

/// Default match abandonment timeout, in seconds (§6 `ABANDONMENT_TIMEOUT_SEC`).
pub const DEFAULT_ABANDONMENT_TIMEOUT_SECS: u64 = 1800;

/// Default replay-worker pool size (§6 `WORKER_POOL_SIZE`).
pub const DEFAULT_WORKER_POOL_SIZE: usize = 1;

/// Default notification dispatch rate limit, messages/sec (§6
/// `MESSAGE_RATE_LIMIT_PER_SEC`).
pub const DEFAULT_MESSAGE_RATE_LIMIT_PER_SEC: u32 = 40;

/// Per-task timeout for replay parsing (§5).
pub const REPLAY_PARSE_TIMEOUT_SECS: u64 = 10;

/// Retry budget for a single Write Log job before it is marked `FAILED` (§4.3).
pub const WRITE_JOB_MAX_ATTEMPTS: u32 = 5;

/// Retry budget for a single Notification Router dispatch (§4.9).
pub const NOTIFICATION_MAX_ATTEMPTS: u32 = 3;

/// `WAIT_COEFFICIENT` in the pairing score formula (§4.6, "balanced" tuning).
pub const WAIT_COEFFICIENT: i64 = 20;

/// The `(base, growth)` window tuning for a given population-pressure band
/// and `MATCH_WINDOW_PROFILE` (§4.6). `aggressive`/`strict` scale the
/// "balanced" defaults up or down uniformly; `balanced` is exactly §4.6.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowProfile {
    Aggressive,
    Balanced,
    Strict,
}

impl Default for WindowProfile {
    fn default() -> Self {
        WindowProfile::Balanced
    }
}

/// Pressure band, used to pick `(base, growth)` within a profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PressureBand {
    High,
    Moderate,
    Low,
}

impl PressureBand {
    pub fn of(pressure: f64) -> Self {
        if pressure >= 0.20 {
            PressureBand::High
        } else if pressure >= 0.10 {
            PressureBand::Moderate
        } else {
            PressureBand::Low
        }
    }
}

impl WindowProfile {
    /// Returns `(base, growth)` for the given pressure band, under this
    /// profile. `Balanced` is §4.6 verbatim; `Aggressive` widens windows by
    /// 50% (favors throughput), `Strict` narrows them by a third (favors
    /// fairness).
    pub fn window_params(self, band: PressureBand) -> (i64, i64) {
        let (base, growth) = match band {
            PressureBand::High => (75, 25),
            PressureBand::Moderate => (100, 35),
            PressureBand::Low => (125, 45),
        };
        match self {
            WindowProfile::Balanced => (base, growth),
            WindowProfile::Aggressive => (base + base / 2, growth + growth / 2),
            WindowProfile::Strict => (base - base / 3, growth - growth / 3),
        }
    }
}

/// Queue-depth threshold for the Orchestrator's periodic self-check, above
/// which a `warn!` is logged (supplemental feature, grounded on
/// `memory_monitor.py`'s threshold-based alerting, scoped down to queue/
/// write-log depth rather than process memory).
pub const QUEUE_DEPTH_WARN_THRESHOLD: usize = 200;

/// Pending-write-log-job threshold for the same self-check.
pub const PENDING_WRITE_JOBS_WARN_THRESHOLD: usize = 50;

/// `scale(P)` from §4.6's pressure metric.
pub fn population_scale(population: usize) -> f64 {
    if population <= 10 {
        1.2
    } else if population <= 25 {
        1.0
    } else {
        0.8
    }
}
