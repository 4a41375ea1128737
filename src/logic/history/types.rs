//! History Types
//!
//! One `HistoryRecord` per processed detection, plus the amendments that
//! late-resolving attempts append to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::detection::{DetectionEvent, OffenderRecord};
use crate::logic::policy::Profile;
use crate::logic::response::{
    CallResult, EscalationOutcome, LateOutcome, NotificationOutcome,
};
use crate::logic::threat::{RiskAssessment, RiskLevel};

/// Default page size for history queries
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Upper bound on a single page
pub const MAX_PAGE_SIZE: usize = 100;

// ============================================================================
// DISPOSITION
// ============================================================================

/// What the engine did with a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Disposition {
    /// Cleared the threshold and was admitted by the dedup filter
    Alerted,
    /// Risk level below the active sensitivity floor
    BelowThreshold,
    /// Same offender inside the cooldown window
    Suppressed,
    /// Offender lookup failed; never alerted
    UnknownOffender,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Alerted => "alerted",
            Disposition::BelowThreshold => "below_threshold",
            Disposition::Suppressed => "suppressed",
            Disposition::UnknownOffender => "unknown_offender",
        }
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub event: DetectionEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offender: Option<OffenderRecord>,
    /// Absent only for `UnknownOffender`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment: Option<RiskAssessment>,
    pub disposition: Disposition,
    #[serde(default)]
    pub notification_outcomes: Vec<NotificationOutcome>,
    #[serde(default)]
    pub escalation_outcome: EscalationOutcome,
    /// Profile and config versions the event was processed under
    pub profile: Profile,
    pub policy_version: u64,
    pub contacts_version: u64,
    pub created_at: DateTime<Utc>,
    /// Why the event was not alerted, if it was not
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub amendments: Vec<OutcomeAmendment>,
}

impl HistoryRecord {
    pub fn is_alerted(&self) -> bool {
        self.disposition == Disposition::Alerted
    }

    pub fn risk_level(&self) -> Option<RiskLevel> {
        self.assessment.as_ref().map(|a| a.risk_level)
    }

    /// Fold a late outcome into the record. The matching channel / contact /
    /// call entry is replaced and the amendment itself is kept for audit.
    pub fn apply(&mut self, amendment: OutcomeAmendment) {
        match &amendment.outcome {
            LateOutcome::Notification(outcome) => {
                match self
                    .notification_outcomes
                    .iter_mut()
                    .find(|o| o.channel == outcome.channel)
                {
                    Some(existing) => *existing = outcome.clone(),
                    None => self.notification_outcomes.push(outcome.clone()),
                }
            }
            LateOutcome::Contact(attempt) => {
                match self
                    .escalation_outcome
                    .contacts_notified
                    .iter_mut()
                    .find(|c| c.contact_id == attempt.contact_id)
                {
                    Some(existing) => *existing = attempt.clone(),
                    None => self.escalation_outcome.contacts_notified.push(attempt.clone()),
                }
            }
            LateOutcome::AutoCall { result, error } => {
                self.escalation_outcome.auto_call_result = *result;
                self.escalation_outcome.auto_call_error = match result {
                    CallResult::Connected => None,
                    _ => error.clone(),
                };
            }
        }
        self.amendments.push(amendment);
    }
}

/// Late outcome appended to an existing record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeAmendment {
    pub record_id: Uuid,
    pub outcome: LateOutcome,
    pub recorded_at: DateTime<Utc>,
}

impl OutcomeAmendment {
    pub fn new(record_id: Uuid, outcome: LateOutcome) -> Self {
        Self {
            record_id,
            outcome,
            recorded_at: Utc::now(),
        }
    }
}

// ============================================================================
// QUERIES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_page_size")]
    pub limit: usize,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl PageRequest {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    pub fn first(limit: usize) -> Self {
        Self::new(0, limit)
    }

    /// Limit clamped to 1..=MAX_PAGE_SIZE
    pub fn effective_limit(&self) -> usize {
        self.limit.clamp(1, MAX_PAGE_SIZE)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}

/// One page of history, most recent first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage<T = HistoryRecord> {
    pub records: Vec<T>,
    pub total: usize,
    pub offset: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<usize>,
}

impl<T> HistoryPage<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> HistoryPage<U> {
        HistoryPage {
            records: self.records.into_iter().map(f).collect(),
            total: self.total,
            offset: self.offset,
            next_offset: self.next_offset,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub total: usize,
    pub alerted: usize,
    pub below_threshold: usize,
    pub suppressed: usize,
    pub unknown_offender: usize,
    pub high_risk: usize,
    pub medium_risk: usize,
    pub low_risk: usize,
    pub auto_calls: usize,
    pub amended: usize,
}

impl HistoryStats {
    pub fn record(&mut self, record: &HistoryRecord) {
        self.total += 1;
        match record.disposition {
            Disposition::Alerted => self.alerted += 1,
            Disposition::BelowThreshold => self.below_threshold += 1,
            Disposition::Suppressed => self.suppressed += 1,
            Disposition::UnknownOffender => self.unknown_offender += 1,
        }
        match record.risk_level() {
            Some(RiskLevel::High) => self.high_risk += 1,
            Some(RiskLevel::Medium) => self.medium_risk += 1,
            Some(RiskLevel::Low) => self.low_risk += 1,
            None => {}
        }
        if record.escalation_outcome.auto_call_attempted {
            self.auto_calls += 1;
        }
        if !record.amendments.is_empty() {
            self.amended += 1;
        }
    }
}
