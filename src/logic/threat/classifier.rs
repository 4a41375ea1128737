//! Risk Classifier
//!
//! Only classify logic lives here - no types, no policy storage.
//! Input: DetectionEvent + OffenderRecord + AlertPolicy
//! Output: RiskAssessment
//!
//! Pure and deterministic. The only failure is an offender record that does
//! not belong to the event (`NotFound`).

use super::rules::ClassificationThresholds;
use super::types::{RiskAssessment, RiskLevel};
use crate::logic::detection::{DetectionEvent, OffenderRecord, Tier};
use crate::logic::error::{EngineError, EngineResult};
use crate::logic::policy::{AlertPolicy, Sensitivity};

// ============================================================================
// MAIN CLASSIFICATION FUNCTION
// ============================================================================

/// Classify with the default thresholds
pub fn classify(
    event: &DetectionEvent,
    offender: &OffenderRecord,
    policy: &AlertPolicy,
) -> EngineResult<RiskAssessment> {
    classify_with_thresholds(event, offender, policy, &ClassificationThresholds::default())
}

/// Classification with custom thresholds
pub fn classify_with_thresholds(
    event: &DetectionEvent,
    offender: &OffenderRecord,
    policy: &AlertPolicy,
    thresholds: &ClassificationThresholds,
) -> EngineResult<RiskAssessment> {
    if offender.id != event.offender_id {
        return Err(EngineError::NotFound(format!(
            "offender record {} does not match detection of {}",
            offender.id, event.offender_id
        )));
    }

    let mut reasons = Vec::new();
    let confidence = event.normalized_confidence();
    if confidence != event.confidence {
        reasons.push(format!(
            "Confidence {} out of range, normalized to {:.2}",
            event.confidence, confidence
        ));
    }

    let risk_level = risk_level_for(offender.tier, confidence, thresholds);
    reasons.push(format!(
        "{} with match confidence {:.2} => {} risk",
        offender.tier, confidence, risk_level
    ));

    let floor = thresholds.floor_for(policy.sensitivity);
    let clears_threshold = risk_level >= floor;
    if !clears_threshold {
        reasons.push(format!(
            "Below {} sensitivity floor ({})",
            policy.sensitivity.as_str(),
            floor
        ));
    }

    log::debug!(
        "Classified detection {} ({}): {} risk, floor {}, clears={}",
        event.id,
        event.offender_id,
        risk_level,
        floor,
        clears_threshold
    );

    Ok(RiskAssessment {
        risk_level,
        tier: offender.tier,
        clears_threshold,
        confidence,
        floor,
        reasons,
    })
}

/// Fixed tier + confidence mapping
pub fn risk_level_for(tier: Tier, confidence: f32, thresholds: &ClassificationThresholds) -> RiskLevel {
    if tier == Tier::Tier3 || confidence >= thresholds.high_confidence_min {
        RiskLevel::High
    } else if tier == Tier::Tier2 || confidence >= thresholds.medium_confidence_min {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Whether `level` is admitted under `sensitivity`
pub fn clears_threshold(
    level: RiskLevel,
    sensitivity: Sensitivity,
    thresholds: &ClassificationThresholds,
) -> bool {
    level >= thresholds.floor_for(sensitivity)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::detection::Location;
    use crate::logic::policy::Profile;
    use crate::logic::threat::SensitivityMode;

    fn offender(tier: Tier) -> OffenderRecord {
        OffenderRecord {
            id: "off-1".to_string(),
            name: "John Smith".to_string(),
            conviction: "Sexual assault (2019)".to_string(),
            tier,
            photo_ref: None,
        }
    }

    fn event(confidence: f32) -> DetectionEvent {
        DetectionEvent::new("off-1", confidence, Location::named("Main St & 5th Ave"))
    }

    fn policy(sensitivity: Sensitivity) -> AlertPolicy {
        AlertPolicy {
            sensitivity,
            ..AlertPolicy::for_profile(Profile::Adult)
        }
    }

    #[test]
    fn test_tier3_is_high_even_with_low_confidence() {
        let result = classify(&event(0.3), &offender(Tier::Tier3), &policy(Sensitivity::Medium)).unwrap();
        assert_eq!(result.risk_level, RiskLevel::High);
        assert_eq!(result.tier, Tier::Tier3);
        assert!(result.clears_threshold);
        assert!(result.permits_escalation());
    }

    #[test]
    fn test_high_confidence_promotes_tier1() {
        let result = classify(&event(0.9), &offender(Tier::Tier1), &policy(Sensitivity::Low)).unwrap();
        assert_eq!(result.risk_level, RiskLevel::High);
        // Tier is taken verbatim from the record
        assert_eq!(result.tier, Tier::Tier1);
    }

    #[test]
    fn test_tier2_or_mid_confidence_is_medium() {
        let t = ClassificationThresholds::default();
        assert_eq!(risk_level_for(Tier::Tier2, 0.1, &t), RiskLevel::Medium);
        assert_eq!(risk_level_for(Tier::Tier1, 0.6, &t), RiskLevel::Medium);
        assert_eq!(risk_level_for(Tier::Tier1, 0.59, &t), RiskLevel::Low);
        assert_eq!(risk_level_for(Tier::Tier2, 0.85, &t), RiskLevel::High);
    }

    #[test]
    fn test_sensitivity_floor_filters_medium() {
        let result = classify(&event(0.7), &offender(Tier::Tier2), &policy(Sensitivity::High)).unwrap();
        assert_eq!(result.risk_level, RiskLevel::Medium);
        assert!(!result.clears_threshold);
        assert!(!result.permits_escalation());
        assert!(result.reasons.iter().any(|r| r.contains("sensitivity floor")));
    }

    #[test]
    fn test_low_sensitivity_admits_everything() {
        let result = classify(&event(0.1), &offender(Tier::Tier1), &policy(Sensitivity::Low)).unwrap();
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert!(result.clears_threshold);
    }

    #[test]
    fn test_more_alerts_mode_inverts_direction() {
        let thresholds = ClassificationThresholds {
            sensitivity_mode: SensitivityMode::MoreAlerts,
            ..Default::default()
        };
        let low = classify_with_thresholds(&event(0.1), &offender(Tier::Tier1), &policy(Sensitivity::High), &thresholds).unwrap();
        assert!(low.clears_threshold);

        let medium = classify_with_thresholds(&event(0.7), &offender(Tier::Tier2), &policy(Sensitivity::Low), &thresholds).unwrap();
        assert!(!medium.clears_threshold);
    }

    #[test]
    fn test_mismatched_record_is_not_found() {
        let mut other = offender(Tier::Tier3);
        other.id = "off-2".to_string();
        let result = classify(&event(0.9), &other, &policy(Sensitivity::Low));
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[test]
    fn test_out_of_range_confidence_noted() {
        let result = classify(&event(1.4), &offender(Tier::Tier1), &policy(Sensitivity::Low)).unwrap();
        assert_eq!(result.confidence, 1.0);
        assert!(result.reasons.iter().any(|r| r.contains("normalized")));
    }
}
