//! Response Types
//!
//! Alert payload, per-channel / per-contact outcomes, escalation state and
//! the handles for attempts that outlive the event deadline.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use tokio::task::{AbortHandle, JoinHandle};
use uuid::Uuid;

use crate::logic::detection::{DetectionEvent, Location, OffenderRecord, Tier};
use crate::logic::error::ChannelError;
use crate::logic::policy::Channel;
use crate::logic::threat::{RiskAssessment, RiskLevel};

// ============================================================================
// ALERT PAYLOAD
// ============================================================================

/// What every channel and contact receives for one admitted detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub detection_id: Uuid,
    pub title: String,
    pub message: String,
    pub risk_level: RiskLevel,
    pub tier: Tier,
    pub offender_name: String,
    pub conviction: String,
    pub location: Location,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_ref: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl AlertPayload {
    pub fn from_detection(
        event: &DetectionEvent,
        offender: &OffenderRecord,
        assessment: &RiskAssessment,
    ) -> Self {
        let title = match assessment.risk_level {
            RiskLevel::High => format!("{} {} offender nearby", assessment.risk_level.tag(), offender.tier),
            _ => format!("{} Registered offender detected", assessment.risk_level.tag()),
        };
        let message = format!(
            "{} ({}, {}) detected near {} at {}",
            offender.name,
            offender.tier,
            offender.conviction,
            event.location,
            event.captured_at.format("%H:%M:%S UTC")
        );

        Self {
            detection_id: event.id,
            title,
            message,
            risk_level: assessment.risk_level,
            tier: offender.tier,
            offender_name: offender.name.clone(),
            conviction: offender.conviction.clone(),
            location: event.location.clone(),
            photo_ref: event.photo_ref.clone().or_else(|| offender.photo_ref.clone()),
            captured_at: event.captured_at,
        }
    }
}

// ============================================================================
// DELIVERY OUTCOMES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeliveryStatus::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationOutcome {
    pub channel: Channel,
    pub status: DeliveryStatus,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl NotificationOutcome {
    pub fn delivered(channel: Channel, attempts: u32) -> Self {
        Self {
            channel,
            status: DeliveryStatus::Delivered,
            attempts,
            last_error: None,
        }
    }

    pub fn failed(channel: Channel, attempts: u32, error: &ChannelError) -> Self {
        Self {
            channel,
            status: DeliveryStatus::Failed,
            attempts,
            last_error: Some(error.to_string()),
        }
    }

    pub fn from_result(channel: Channel, attempts: u32, result: Result<(), ChannelError>) -> Self {
        match result {
            Ok(()) => Self::delivered(channel, attempts),
            Err(e) => Self::failed(channel, attempts, &e),
        }
    }
}

/// One contact's entry in the cascade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactAttempt {
    pub contact_id: Uuid,
    pub name: String,
    pub status: DeliveryStatus,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

// ============================================================================
// ESCALATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallResult {
    Pending,
    Connected,
    Failed,
    Skipped,
}

/// Escalation state machine
///
/// `Idle -> Evaluating -> {Skipped | AutoCalling -> {Connected | FailedAutoCall}
/// -> ContactCascade -> Done}`. Without auto-call, `Evaluating` goes straight to
/// `ContactCascade`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscalationState {
    Idle,
    Evaluating,
    Skipped,
    AutoCalling,
    Connected,
    FailedAutoCall,
    ContactCascade,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationOutcome {
    pub auto_call_attempted: bool,
    pub auto_call_result: CallResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_call_error: Option<String>,
    /// Cascade order (primary first)
    pub contacts_notified: Vec<ContactAttempt>,
    /// States visited, for audit
    pub trail: Vec<EscalationState>,
}

impl EscalationOutcome {
    /// Outcome for events that never reach `Evaluating`
    pub fn skipped() -> Self {
        Self {
            auto_call_attempted: false,
            auto_call_result: CallResult::Skipped,
            auto_call_error: None,
            contacts_notified: Vec::new(),
            trail: vec![EscalationState::Idle, EscalationState::Skipped],
        }
    }

    pub fn final_state(&self) -> EscalationState {
        self.trail.last().copied().unwrap_or(EscalationState::Idle)
    }

    pub fn was_skipped(&self) -> bool {
        self.final_state() == EscalationState::Skipped
    }
}

impl Default for EscalationOutcome {
    fn default() -> Self {
        Self::skipped()
    }
}

// ============================================================================
// LATE OUTCOMES
// ============================================================================

/// Result of an attempt that was still running when its record was finalized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LateOutcome {
    Notification(NotificationOutcome),
    Contact(ContactAttempt),
    AutoCall {
        result: CallResult,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Attempt task detached from the event at its deadline
pub struct PendingOutcome {
    future: BoxFuture<'static, Option<LateOutcome>>,
    abort: AbortHandle,
}

impl PendingOutcome {
    pub fn from_task<T, F>(handle: JoinHandle<T>, map: F) -> Self
    where
        T: Send + 'static,
        F: FnOnce(T) -> LateOutcome + Send + 'static,
    {
        let abort = handle.abort_handle();
        let future = async move { handle.await.ok().map(map) }.boxed();
        Self { future, abort }
    }

    /// Wait for the detached attempt. `None` if it panicked or was aborted.
    pub async fn resolve(self) -> Option<LateOutcome> {
        self.future.await
    }

    pub fn abort(self) {
        self.abort.abort();
    }
}

impl std::fmt::Debug for PendingOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingOutcome")
            .field("finished", &self.abort.is_finished())
            .finish()
    }
}
