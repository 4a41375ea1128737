//! Threat Types
//!
//! Core types for risk classification.
//! No logic here - data structures only.

use serde::{Deserialize, Serialize};

use crate::logic::detection::Tier;

// ============================================================================
// RISK LEVEL
// ============================================================================

/// Engine-computed severity, independent of the statutory tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            RiskLevel::Low => "[LOW]",
            RiskLevel::Medium => "[MEDIUM]",
            RiskLevel::High => "[HIGH]",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            RiskLevel::Low => "#10b981",    // Green
            RiskLevel::Medium => "#f59e0b", // Yellow
            RiskLevel::High => "#ef4444",   // Red
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// RISK ASSESSMENT
// ============================================================================

/// Result of classifying one detection. Computed fresh per event and only
/// persisted as part of its history record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub tier: Tier,
    pub clears_threshold: bool,
    /// Confidence the level was derived from (normalized)
    pub confidence: f32,
    /// Lowest level the active policy admits
    pub floor: RiskLevel,
    pub reasons: Vec<String>,
}

impl RiskAssessment {
    /// Whether this detection may trigger automated emergency contact
    pub fn permits_escalation(&self) -> bool {
        self.clears_threshold && self.risk_level == RiskLevel::High
    }
}
