//! Risk Classification Rules & Thresholds
//!
//! Thresholds for mapping tier + confidence to a risk level, and the
//! sensitivity floor table.
//! No classify logic here - constants and config only.

use serde::{Deserialize, Serialize};

use super::types::RiskLevel;
use crate::logic::policy::Sensitivity;

// ============================================================================
// THRESHOLDS (Constants)
// ============================================================================

/// At or above this match confidence = High, regardless of tier
pub const HIGH_CONFIDENCE_THRESHOLD: f32 = 0.85;

/// At or above this match confidence = at least Medium
pub const MEDIUM_CONFIDENCE_THRESHOLD: f32 = 0.60;

// ============================================================================
// SENSITIVITY DIRECTION
// ============================================================================

/// How the user's sensitivity setting maps to the admitted risk floor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityMode {
    /// Higher sensitivity demands a stronger signal: Low admits everything,
    /// High admits High risk only. Sensitivity acts as a noise filter.
    #[default]
    StrongerSignal,
    /// Higher sensitivity means more alerts: High admits everything,
    /// Low admits High risk only.
    MoreAlerts,
}

impl SensitivityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensitivityMode::StrongerSignal => "stronger_signal",
            SensitivityMode::MoreAlerts => "more_alerts",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "more_alerts" | "more-alerts" | "inverted" => SensitivityMode::MoreAlerts,
            _ => SensitivityMode::StrongerSignal,
        }
    }
}

// ============================================================================
// CONFIGURABLE THRESHOLDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationThresholds {
    pub high_confidence_min: f32,
    pub medium_confidence_min: f32,
    pub sensitivity_mode: SensitivityMode,
}

impl Default for ClassificationThresholds {
    fn default() -> Self {
        Self {
            high_confidence_min: HIGH_CONFIDENCE_THRESHOLD,
            medium_confidence_min: MEDIUM_CONFIDENCE_THRESHOLD,
            sensitivity_mode: SensitivityMode::default(),
        }
    }
}

impl ClassificationThresholds {
    /// Lowest risk level a sensitivity setting admits
    pub fn floor_for(&self, sensitivity: Sensitivity) -> RiskLevel {
        match (self.sensitivity_mode, sensitivity) {
            (SensitivityMode::StrongerSignal, Sensitivity::Low) => RiskLevel::Low,
            (SensitivityMode::StrongerSignal, Sensitivity::Medium) => RiskLevel::Medium,
            (SensitivityMode::StrongerSignal, Sensitivity::High) => RiskLevel::High,
            (SensitivityMode::MoreAlerts, Sensitivity::Low) => RiskLevel::High,
            (SensitivityMode::MoreAlerts, Sensitivity::Medium) => RiskLevel::Medium,
            (SensitivityMode::MoreAlerts, Sensitivity::High) => RiskLevel::Low,
        }
    }
}
