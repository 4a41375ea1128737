//! Policy Types
//!
//! Alert policy and the enums it is built from.
//! Validation lives here; storage lives in `store`.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_COOLDOWN_SECS, MAX_COOLDOWN_SECS, MIN_COOLDOWN_SECS};
use crate::logic::error::ConfigError;

// ============================================================================
// SENSITIVITY
// ============================================================================

/// User-facing sensitivity setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Sensitivity {
    Low,
    Medium,
    High,
}

impl Sensitivity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sensitivity::Low => "Low",
            Sensitivity::Medium => "Medium",
            Sensitivity::High => "High",
        }
    }
}

// ============================================================================
// CHANNEL
// ============================================================================

/// Notification channel. Ordering is the fan-out reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Channel {
    Push,
    Sound,
    Vibration,
    Email,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Push, Channel::Sound, Channel::Vibration, Channel::Email];

    /// On-device delivery (short timeout, fast retry)
    pub fn is_local(&self) -> bool {
        !matches!(self, Channel::Email)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Push => "push",
            Channel::Sound => "sound",
            Channel::Vibration => "vibration",
            Channel::Email => "email",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// PROFILE
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Profile {
    #[default]
    Adult,
    Kid,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Adult => "Adult",
            Profile::Kid => "Kid",
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// ALERT POLICY
// ============================================================================

/// One profile's alerting configuration. Replaced as a whole, never patched
/// in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPolicy {
    pub profile: Profile,
    pub sensitivity: Sensitivity,
    pub channels: BTreeSet<Channel>,
    pub auto_call_police: bool,
    /// Dedup cooldown window
    pub cooldown_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
}

impl AlertPolicy {
    /// Adult default: Medium sensitivity, on-device notifications, no auto-call
    pub fn adult_default() -> Self {
        Self {
            profile: Profile::Adult,
            sensitivity: Sensitivity::Medium,
            channels: [Channel::Push, Channel::Sound, Channel::Vibration].into_iter().collect(),
            auto_call_police: false,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            email_address: None,
        }
    }

    /// Kid default: every detection alerts, no auto-call
    pub fn kid_default() -> Self {
        Self {
            profile: Profile::Kid,
            sensitivity: Sensitivity::Low,
            channels: Channel::ALL.into_iter().filter(|c| c.is_local()).collect(),
            auto_call_police: false,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            email_address: None,
        }
    }

    pub fn for_profile(profile: Profile) -> Self {
        match profile {
            Profile::Adult => Self::adult_default(),
            Profile::Kid => Self::kid_default(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn has_channel(&self, channel: Channel) -> bool {
        self.channels.contains(&channel)
    }

    /// Reject malformed edits before they reach the store
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_COOLDOWN_SECS..=MAX_COOLDOWN_SECS).contains(&self.cooldown_secs) {
            return Err(ConfigError::new(
                "cooldown_secs",
                format!(
                    "must be between {} and {} (got {})",
                    MIN_COOLDOWN_SECS, MAX_COOLDOWN_SECS, self.cooldown_secs
                ),
            ));
        }

        if self.has_channel(Channel::Email) {
            match self.email_address.as_deref().map(str::trim) {
                None | Some("") => {
                    return Err(ConfigError::new(
                        "email_address",
                        "required when the email channel is enabled",
                    ))
                }
                Some(address) if !address.contains('@') => {
                    return Err(ConfigError::new(
                        "email_address",
                        format!("'{}' is not an email address", address),
                    ))
                }
                Some(_) => {}
            }
        }

        if self.channels.is_empty() {
            log::warn!(
                "{} policy has no notification channels; detections will only be logged",
                self.profile
            );
        }

        Ok(())
    }
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self::adult_default()
    }
}

// ============================================================================
// TESTS
// ============================================================================
