//! Detection Types
//!
//! Raw input from the sensor feed and the offender reference data it points at.
//! No decision logic here - data structures only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type OffenderId = String;

// ============================================================================
// TIER
// ============================================================================

/// Statutory offender classification from the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Tier {
    Tier1 = 1,
    Tier2 = 2,
    Tier3 = 3,
}

impl Tier {
    pub fn level(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Tier1 => "Tier 1",
            Tier::Tier2 => "Tier 2",
            Tier::Tier3 => "Tier 3",
        }
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Tier::Tier1),
            2 => Ok(Tier::Tier2),
            3 => Ok(Tier::Tier3),
            other => Err(format!("tier must be 1, 2 or 3 (got {})", other)),
        }
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> Self {
        tier.level()
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// LOCATION
// ============================================================================

/// Opaque "current location" value supplied by the device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl Location {
    pub fn named(description: &str) -> Self {
        Self {
            description: description.to_string(),
            ..Default::default()
        }
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => write!(f, "{} ({:.5}, {:.5})", self.description, lat, lon),
            _ => write!(f, "{}", self.description),
        }
    }
}

// ============================================================================
// DETECTION EVENT
// ============================================================================

/// Raw detection from the sensor feed. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub offender_id: OffenderId,
    /// Matched registry record reference (face gallery entry)
    #[serde(default)]
    pub record_ref: String,
    /// Match confidence (0.0 - 1.0)
    pub confidence: f32,
    #[serde(default = "Utc::now")]
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_ref: Option<String>,
}

impl DetectionEvent {
    pub fn new(offender_id: &str, confidence: f32, location: Location) -> Self {
        Self {
            id: Uuid::new_v4(),
            offender_id: offender_id.to_string(),
            record_ref: offender_id.to_string(),
            confidence,
            captured_at: Utc::now(),
            location,
            photo_ref: None,
        }
    }

    pub fn with_captured_at(mut self, captured_at: DateTime<Utc>) -> Self {
        self.captured_at = captured_at;
        self
    }

    pub fn with_photo(mut self, photo_ref: &str) -> Self {
        self.photo_ref = Some(photo_ref.to_string());
        self
    }

    pub fn with_record_ref(mut self, record_ref: &str) -> Self {
        self.record_ref = record_ref.to_string();
        self
    }

    /// Confidence clamped to 0-1 (NaN counts as no confidence)
    pub fn normalized_confidence(&self) -> f32 {
        if self.confidence.is_nan() {
            0.0
        } else {
            self.confidence.clamp(0.0, 1.0)
        }
    }
}

// ============================================================================
// OFFENDER RECORD
// ============================================================================

/// External registry reference data. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffenderRecord {
    pub id: OffenderId,
    pub name: String,
    pub conviction: String,
    pub tier: Tier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_ref: Option<String>,
}

/// What gets read out to emergency dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffenderSummary {
    pub name: String,
    pub tier: Tier,
    pub conviction: String,
}

impl From<&OffenderRecord> for OffenderSummary {
    fn from(record: &OffenderRecord) -> Self {
        Self {
            name: record.name.clone(),
            tier: record.tier,
            conviction: record.conviction.clone(),
        }
    }
}

impl std::fmt::Display for OffenderSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}) - {}", self.name, self.tier, self.conviction)
    }
}

/// Convert a name to a filesystem-safe string
pub fn safe_name(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    kept.trim_end().replace(' ', "_")
}
