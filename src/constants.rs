//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! Every value here can be overridden through the environment (see `EngineConfig::from_env`).

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "EVADE";

// ============================================
// Engine timing defaults
// ============================================

/// Default cooldown between admitted alerts for the same offender (seconds)
pub const DEFAULT_COOLDOWN_SECS: u64 = 600;

/// Shortest cooldown a policy may configure (seconds)
pub const MIN_COOLDOWN_SECS: u64 = 1;

/// Longest cooldown a policy may configure (seconds)
pub const MAX_COOLDOWN_SECS: u64 = 24 * 60 * 60;

/// Maximum total processing time per detection event (seconds)
pub const DEFAULT_MAX_EVENT_SECS: u64 = 45;

/// Global timeout for the notification fan-out (seconds)
pub const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 20;

/// Global timeout for the emergency contact cascade (seconds)
pub const DEFAULT_CASCADE_TIMEOUT_SECS: u64 = 40;

/// How long the escalation waits on the emergency call before starting the
/// contact cascade (seconds). Must leave the cascade its full budget.
pub const DEFAULT_CALL_WAIT_SECS: u64 = 5;

/// Timeout for a single offender registry lookup (seconds)
pub const DEFAULT_REGISTRY_TIMEOUT_SECS: u64 = 5;

/// Detection events processed concurrently by the feed runner
pub const DEFAULT_MAX_CONCURRENT_EVENTS: usize = 8;

/// Caller-side retries for a failed history append
pub const DEFAULT_HISTORY_APPEND_RETRIES: u32 = 3;

/// Capacity of the history subscription channel
pub const DEFAULT_EVENT_BUFFER: usize = 256;

// ============================================
// Storage defaults
// ============================================

/// Directory under the local data dir that holds engine state
pub const DATA_DIR_NAME: &str = "evade";

/// History log sub-directory
pub const HISTORY_DIR_NAME: &str = "history";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Read a numeric env var, falling back to `default` when unset or unparsable
pub fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Read an optional string env var (empty values count as unset)
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Read a boolean env var ("false" and "0" disable)
pub fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|s| s.to_lowercase() != "false" && s != "0")
        .unwrap_or(default)
}

/// Default history directory: `<data_local_dir>/evade/history`
pub fn default_history_dir() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(DATA_DIR_NAME)
        .join(HISTORY_DIR_NAME)
}
