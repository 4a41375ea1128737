//! UI read models
//!
//! Flattened rows for the "Recent Activity" and "Detection Log" screens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{Disposition, HistoryRecord};
use crate::logic::detection::Tier;
use crate::logic::threat::RiskLevel;

/// Name shown for detections the registry could not resolve
pub const UNKNOWN_NAME: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionView {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    pub conviction: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub location: String,
    pub disposition: Disposition,
}

impl From<&HistoryRecord> for DetectionView {
    fn from(record: &HistoryRecord) -> Self {
        let offender = record.offender.as_ref();
        Self {
            id: record.id,
            name: offender.map_or_else(|| UNKNOWN_NAME.to_string(), |o| o.name.clone()),
            risk_level: record.risk_level(),
            tier: offender.map(|o| o.tier),
            conviction: offender.map(|o| o.conviction.clone()).unwrap_or_default(),
            photo: record
                .event
                .photo_ref
                .clone()
                .or_else(|| offender.and_then(|o| o.photo_ref.clone())),
            timestamp: record.event.captured_at,
            location: record.event.location.to_string(),
            disposition: record.disposition,
        }
    }
}

impl From<HistoryRecord> for DetectionView {
    fn from(record: HistoryRecord) -> Self {
        Self::from(&record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::testing::history_record;

    #[test]
    fn test_view_from_record() {
        let record = history_record(Disposition::Alerted);
        let view = DetectionView::from(&record);

        assert_eq!(view.id, record.id);
        assert_eq!(view.name, "John Smith");
        assert_eq!(view.tier, Some(Tier::Tier3));
        assert_eq!(view.risk_level, Some(RiskLevel::High));
        assert_eq!(view.location, "Main St & 5th Ave");
        assert_eq!(view.photo.as_deref(), Some("offender_list/images/John_Smith.jpg"));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["riskLevel"], "High");
        assert_eq!(json["tier"], 3);
    }

    #[test]
    fn test_view_for_unknown_offender() {
        let mut record = history_record(Disposition::UnknownOffender);
        record.offender = None;
        record.assessment = None;

        let view = DetectionView::from(record);
        assert_eq!(view.name, UNKNOWN_NAME);
        assert!(view.tier.is_none());
        assert!(view.conviction.is_empty());
    }
}
