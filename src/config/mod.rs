use std::env;
use std::time::Duration;

pub struct Config {
    pub sync: SyncConfig,
}

/// Tunables for the reconciliation and detection loops. All thresholds have
/// production defaults; env vars exist for soak testing with looser timing.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Seek the local player when it deviates from the adjusted remote
    /// position by more than this many seconds.
    pub seek_threshold_secs: f64,
    /// Interval of the local-seek detection poll.
    pub poll_interval: Duration,
    /// A polled time jump is a seek when it exceeds elapsed wall clock by
    /// more than this many seconds.
    pub poll_jump_threshold_secs: f64,
    /// Local seeks within this window of the previous accepted seek are
    /// coalesced.
    pub seek_debounce: Duration,
    /// Decay window of the echo suppressor after a remote apply.
    pub echo_window: Duration,
    /// A detected seek within this many seconds of the last remote-applied
    /// time is an echo even outside the suppression window.
    pub remote_echo_tolerance_secs: f64,
    /// Elapsed times at or beyond this are treated as clock skew and not
    /// drift-compensated.
    pub max_drift_secs: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            seek_threshold_secs: 1.5,
            poll_interval: Duration::from_millis(200),
            poll_jump_threshold_secs: 0.75,
            seek_debounce: Duration::from_millis(300),
            echo_window: Duration::from_millis(400),
            remote_echo_tolerance_secs: 1.0,
            max_drift_secs: 3600.0,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let defaults = SyncConfig::default();
        Self {
            sync: SyncConfig {
                seek_threshold_secs: env_f64("SYNC_SEEK_THRESHOLD_SECS", defaults.seek_threshold_secs),
                poll_interval: env_millis("SYNC_POLL_INTERVAL_MS", defaults.poll_interval),
                poll_jump_threshold_secs: env_f64(
                    "SYNC_POLL_JUMP_THRESHOLD_SECS",
                    defaults.poll_jump_threshold_secs,
                ),
                seek_debounce: env_millis("SYNC_SEEK_DEBOUNCE_MS", defaults.seek_debounce),
                echo_window: env_millis("SYNC_ECHO_WINDOW_MS", defaults.echo_window),
                remote_echo_tolerance_secs: env_f64(
                    "SYNC_REMOTE_ECHO_TOLERANCE_SECS",
                    defaults.remote_echo_tolerance_secs,
                ),
                max_drift_secs: env_f64("SYNC_MAX_DRIFT_SECS", defaults.max_drift_secs),
            },
        }
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key = %key, value = %raw, "Unable to parse as f64, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_millis(key: &str, default: Duration) -> Duration {
    match env::var(key) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                tracing::warn!(key = %key, value = %raw, "Unable to parse as millis, using default");
                default
            }
        },
        Err(_) => default,
    }
}
