//! Threat Module
//!
//! Maps a raw detection (offender record + match confidence) to a
//! `(RiskLevel, Tier)` pair and decides whether it clears the policy's
//! alert threshold.
//!
//! ## Structure
//! - `types`: Core types (RiskLevel, RiskAssessment)
//! - `rules`: Thresholds, sensitivity direction
//! - `classifier`: Classification logic
//!
//! ## Usage
//! ```ignore
//! use crate::logic::threat::classify;
//!
//! let assessment = classify(&event, &offender, &policy)?;
//! if assessment.clears_threshold {
//!     notify();
//! }
//! ```

pub mod classifier;
pub mod rules;
pub mod types;

pub use types::{RiskAssessment, RiskLevel};

pub use rules::{
    ClassificationThresholds, SensitivityMode, HIGH_CONFIDENCE_THRESHOLD,
    MEDIUM_CONFIDENCE_THRESHOLD,
};

pub use classifier::{classify, classify_with_thresholds, clears_threshold, risk_level_for};
