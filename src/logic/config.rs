//! Engine Configuration
//!
//! Timeouts, retry bounds, storage locations and collaborator endpoints.
//! Loaded from environment variables (a `.env` file is honoured by the binary).

use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{self, env_flag, env_string, env_u64};
use crate::logic::response::RetryPolicy;
use crate::logic::threat::{ClassificationThresholds, SensitivityMode};

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cooldown seeded into default policies
    pub default_cooldown: Duration,

    /// Maximum total processing time per detection event
    pub max_event_duration: Duration,

    /// Global timeout for the notification fan-out
    pub notify_timeout: Duration,

    /// Global timeout for the contact cascade
    pub cascade_timeout: Duration,

    /// Wait on the emergency call before the cascade starts; a call still
    /// running after this keeps going as a late outcome
    pub call_wait: Duration,

    /// Timeout for a single offender registry lookup
    pub registry_timeout: Duration,

    /// Feed runner concurrency bound
    pub max_concurrent_events: usize,

    /// Caller-side retries for a failed history append
    pub history_append_retries: u32,

    /// Record outcomes that resolve after the record was finalized
    pub track_late_outcomes: bool,

    /// Capacity of the history subscription channel
    pub event_buffer: usize,

    /// Risk classifier thresholds (includes sensitivity direction)
    pub thresholds: ClassificationThresholds,

    pub local_retry: RetryPolicy,
    pub email_retry: RetryPolicy,
    pub contact_retry: RetryPolicy,
    pub call_retry: RetryPolicy,

    /// JSONL history directory
    pub history_dir: PathBuf,

    /// Offender registry JSON file
    pub registry_file: Option<PathBuf>,

    /// Persisted policy/contacts JSON file
    pub settings_file: Option<PathBuf>,

    /// Webhook collaborators (log-only when unset)
    pub email_relay_url: Option<String>,
    pub sms_gateway_url: Option<String>,
    pub dispatch_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_cooldown: Duration::from_secs(constants::DEFAULT_COOLDOWN_SECS),
            max_event_duration: Duration::from_secs(constants::DEFAULT_MAX_EVENT_SECS),
            notify_timeout: Duration::from_secs(constants::DEFAULT_NOTIFY_TIMEOUT_SECS),
            cascade_timeout: Duration::from_secs(constants::DEFAULT_CASCADE_TIMEOUT_SECS),
            call_wait: Duration::from_secs(constants::DEFAULT_CALL_WAIT_SECS),
            registry_timeout: Duration::from_secs(constants::DEFAULT_REGISTRY_TIMEOUT_SECS),
            max_concurrent_events: constants::DEFAULT_MAX_CONCURRENT_EVENTS,
            history_append_retries: constants::DEFAULT_HISTORY_APPEND_RETRIES,
            track_late_outcomes: true,
            event_buffer: constants::DEFAULT_EVENT_BUFFER,
            thresholds: ClassificationThresholds::default(),
            local_retry: RetryPolicy::local_device(),
            email_retry: RetryPolicy::email(),
            contact_retry: RetryPolicy::contact(),
            call_retry: RetryPolicy::emergency_call(),
            history_dir: constants::default_history_dir(),
            registry_file: None,
            settings_file: None,
            email_relay_url: None,
            sms_gateway_url: None,
            dispatch_url: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let sensitivity_mode = env_string("EVADE_SENSITIVITY_MODE")
            .map(|s| SensitivityMode::from_str(&s))
            .unwrap_or_default();

        Self {
            default_cooldown: Duration::from_secs(env_u64(
                "EVADE_COOLDOWN_SECS",
                constants::DEFAULT_COOLDOWN_SECS,
            )),
            max_event_duration: Duration::from_secs(env_u64(
                "EVADE_MAX_EVENT_SECS",
                constants::DEFAULT_MAX_EVENT_SECS,
            )),
            notify_timeout: Duration::from_secs(env_u64(
                "EVADE_NOTIFY_TIMEOUT_SECS",
                constants::DEFAULT_NOTIFY_TIMEOUT_SECS,
            )),
            cascade_timeout: Duration::from_secs(env_u64(
                "EVADE_CASCADE_TIMEOUT_SECS",
                constants::DEFAULT_CASCADE_TIMEOUT_SECS,
            )),
            call_wait: Duration::from_secs(env_u64(
                "EVADE_CALL_WAIT_SECS",
                constants::DEFAULT_CALL_WAIT_SECS,
            )),
            max_concurrent_events: env_u64(
                "EVADE_MAX_CONCURRENT_EVENTS",
                constants::DEFAULT_MAX_CONCURRENT_EVENTS as u64,
            )
            .max(1) as usize,
            history_append_retries: env_u64(
                "EVADE_HISTORY_APPEND_RETRIES",
                constants::DEFAULT_HISTORY_APPEND_RETRIES as u64,
            ) as u32,
            track_late_outcomes: env_flag("EVADE_TRACK_LATE_OUTCOMES", true),
            thresholds: ClassificationThresholds {
                sensitivity_mode,
                ..defaults.thresholds
            },
            history_dir: env_string("EVADE_HISTORY_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.history_dir),
            registry_file: env_string("EVADE_REGISTRY_FILE").map(PathBuf::from),
            settings_file: env_string("EVADE_SETTINGS_FILE").map(PathBuf::from),
            email_relay_url: env_string("EVADE_EMAIL_RELAY_URL"),
            sms_gateway_url: env_string("EVADE_SMS_GATEWAY_URL"),
            dispatch_url: env_string("EVADE_DISPATCH_URL"),
            ..defaults
        }
    }

    /// Cooldown in whole seconds, as stored on policies
    pub fn default_cooldown_secs(&self) -> u64 {
        self.default_cooldown.as_secs().clamp(
            constants::MIN_COOLDOWN_SECS,
            constants::MAX_COOLDOWN_SECS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.default_cooldown, Duration::from_secs(600));
        assert!(config.track_late_outcomes);
        assert!(config.notify_timeout < config.max_event_duration);
        assert!(config.cascade_timeout < config.max_event_duration);
        // Call wait and cascade must both fit the event budget
        assert!(config.call_wait + config.cascade_timeout <= config.max_event_duration);
        assert_eq!(config.thresholds.sensitivity_mode, SensitivityMode::StrongerSignal);
    }

    #[test]
    fn test_cooldown_secs_clamped() {
        let config = EngineConfig {
            default_cooldown: Duration::from_millis(10),
            ..Default::default()
        };
        assert_eq!(config.default_cooldown_secs(), constants::MIN_COOLDOWN_SECS);
    }
}
