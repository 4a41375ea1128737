//! Escalation Dispatcher
//!
//! Per-detection state machine:
//! `Idle -> Evaluating -> {Skipped | AutoCalling -> {Connected | FailedAutoCall}
//! -> ContactCascade -> Done}`
//!
//! Only High-risk detections that clear the threshold reach `Evaluating`.
//! A failed auto-call still runs the cascade. The call is waited on for
//! `call_wait` at most; one still running after that is handed back as
//! pending so the cascade keeps its own budget. The cascade attempts every
//! contact in order, primary first, regardless of earlier outcomes.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};

use super::channels::{ContactNotifier, EmergencyDispatch, LogContactNotifier, LogDispatch};
use super::retry::RetryPolicy;
use super::types::{
    AlertPayload, CallResult, ContactAttempt, DeliveryStatus, EscalationOutcome, EscalationState,
    LateOutcome, PendingOutcome,
};
use crate::logic::config::EngineConfig;
use crate::logic::contacts::{cascade_order, Contact};
use crate::logic::detection::{Location, OffenderSummary};
use crate::logic::error::ChannelError;
use crate::logic::threat::RiskAssessment;

/// Everything one escalation needs, captured from the event's snapshot
#[derive(Debug, Clone)]
pub struct EscalationRequest {
    pub assessment: RiskAssessment,
    pub auto_call_police: bool,
    pub contacts: Arc<Vec<Contact>>,
    pub offender: OffenderSummary,
    pub location: Location,
    pub payload: Arc<AlertPayload>,
}

#[derive(Debug, Default)]
pub struct Escalation {
    pub outcome: EscalationOutcome,
    pub pending: Vec<PendingOutcome>,
}

pub struct EscalationDispatcher {
    dispatch: Option<Arc<dyn EmergencyDispatch>>,
    notifier: Option<Arc<dyn ContactNotifier>>,
    call_retry: RetryPolicy,
    contact_retry: RetryPolicy,
    call_wait: Duration,
    cascade_timeout: Duration,
}

impl EscalationDispatcher {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            dispatch: None,
            notifier: None,
            call_retry: config.call_retry,
            contact_retry: config.contact_retry,
            call_wait: config.call_wait,
            cascade_timeout: config.cascade_timeout,
        }
    }

    pub fn log_only(config: &EngineConfig) -> Self {
        Self::new(config)
            .with_dispatch(Arc::new(LogDispatch))
            .with_notifier(Arc::new(LogContactNotifier))
    }

    pub fn with_dispatch(mut self, dispatch: Arc<dyn EmergencyDispatch>) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ContactNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Run the state machine to a terminal state. Never fails; collaborator
    /// failures are recorded in the outcome.
    pub async fn escalate(&self, request: EscalationRequest, deadline: Instant) -> Escalation {
        let detection_id = request.payload.detection_id;

        if !request.assessment.permits_escalation() {
            return Escalation::default();
        }

        let mut outcome = EscalationOutcome {
            auto_call_attempted: false,
            auto_call_result: CallResult::Skipped,
            auto_call_error: None,
            contacts_notified: Vec::new(),
            trail: vec![EscalationState::Idle, EscalationState::Evaluating],
        };
        let mut pending = Vec::new();

        if !request.auto_call_police && request.contacts.is_empty() {
            log::info!(
                "Escalation skipped for {}: auto-call disabled and no contacts",
                detection_id
            );
            outcome.trail.push(EscalationState::Skipped);
            return Escalation { outcome, pending };
        }

        if request.auto_call_police {
            outcome.trail.push(EscalationState::AutoCalling);
            outcome.auto_call_attempted = true;

            let (result, error) = self
                .place_call(&request.offender, &request.location, deadline, &mut pending)
                .await;
            outcome.auto_call_result = result;
            outcome.auto_call_error = error;

            match result {
                CallResult::Connected => {
                    log::info!("Emergency call connected for {}", detection_id);
                    outcome.trail.push(EscalationState::Connected);
                }
                _ => {
                    log::warn!(
                        "Emergency call failed for {}: {}",
                        detection_id,
                        outcome.auto_call_error.as_deref().unwrap_or("unknown error")
                    );
                    outcome.trail.push(EscalationState::FailedAutoCall);
                }
            }
        }

        outcome.trail.push(EscalationState::ContactCascade);
        let cascade_deadline = deadline.min(Instant::now() + self.cascade_timeout);
        outcome.contacts_notified = self
            .cascade(&request.contacts, &request.payload, cascade_deadline, &mut pending)
            .await;
        outcome.trail.push(EscalationState::Done);

        Escalation { outcome, pending }
    }

    async fn place_call(
        &self,
        offender: &OffenderSummary,
        location: &Location,
        deadline: Instant,
        pending: &mut Vec<PendingOutcome>,
    ) -> (CallResult, Option<String>) {
        let Some(dispatch) = self.dispatch.clone() else {
            return (
                CallResult::Failed,
                Some(ChannelError::Unavailable("no emergency dispatch configured".into()).to_string()),
            );
        };

        let retry = self.call_retry;
        let offender = offender.clone();
        let location = location.clone();
        let mut handle = tokio::spawn(async move {
            let attempts = AtomicU32::new(0);
            retry
                .run("emergency call", &attempts, || dispatch.place_call(&offender, &location))
                .await
        });

        let started = Instant::now();
        let call_deadline = deadline.min(started + self.call_wait);

        match timeout_at(call_deadline, &mut handle).await {
            Ok(Ok(Ok(()))) => (CallResult::Connected, None),
            Ok(Ok(Err(e))) => (CallResult::Failed, Some(e.to_string())),
            Ok(Err(join_error)) => (
                CallResult::Failed,
                Some(format!("call task failed: {}", join_error)),
            ),
            Err(_) => {
                pending.push(PendingOutcome::from_task(handle, |result| LateOutcome::AutoCall {
                    result: if result.is_ok() { CallResult::Connected } else { CallResult::Failed },
                    error: result.err().map(|e| e.to_string()),
                }));
                let waited = started.elapsed();
                log::warn!("Emergency call unanswered after {:?}, starting cascade", waited);
                (
                    CallResult::Failed,
                    Some(format!("emergency call still pending after {:?}", waited)),
                )
            }
        }
    }

    async fn cascade(
        &self,
        contacts: &[Contact],
        payload: &Arc<AlertPayload>,
        deadline: Instant,
        pending: &mut Vec<PendingOutcome>,
    ) -> Vec<ContactAttempt> {
        let mut attempts = Vec::with_capacity(contacts.len());

        for contact in cascade_order(contacts) {
            if Instant::now() >= deadline {
                attempts.push(failed_attempt(&contact, 0, "cascade deadline elapsed"));
                continue;
            }

            let Some(notifier) = self.notifier.clone() else {
                attempts.push(failed_attempt(&contact, 0, "no contact notifier configured"));
                continue;
            };

            let counter = Arc::new(AtomicU32::new(0));
            let task_counter = counter.clone();
            let retry = self.contact_retry;
            let task_payload = payload.clone();
            let task_contact = contact.clone();
            let mut handle = tokio::spawn(async move {
                let label = format!("contact {}", task_contact.name);
                let result = retry
                    .run(&label, &task_counter, || notifier.notify(&task_contact, &task_payload))
                    .await;
                contact_attempt(&task_contact, task_counter.load(Ordering::SeqCst), result)
            });

            match timeout_at(deadline, &mut handle).await {
                Ok(Ok(attempt)) => attempts.push(attempt),
                Ok(Err(join_error)) => attempts.push(failed_attempt(
                    &contact,
                    counter.load(Ordering::SeqCst),
                    &format!("contact task failed: {}", join_error),
                )),
                Err(_) => {
                    attempts.push(failed_attempt(
                        &contact,
                        counter.load(Ordering::SeqCst),
                        "cascade deadline elapsed",
                    ));
                    pending.push(PendingOutcome::from_task(handle, LateOutcome::Contact));
                }
            }
        }

        attempts
    }
}

fn contact_attempt(contact: &Contact, attempts: u32, result: Result<(), ChannelError>) -> ContactAttempt {
    match result {
        Ok(()) => ContactAttempt {
            contact_id: contact.id,
            name: contact.name.clone(),
            status: DeliveryStatus::Delivered,
            attempts,
            last_error: None,
        },
        Err(e) => failed_attempt(contact, attempts, &e.to_string()),
    }
}

fn failed_attempt(contact: &Contact, attempts: u32, error: &str) -> ContactAttempt {
    ContactAttempt {
        contact_id: contact.id,
        name: contact.name.clone(),
        status: DeliveryStatus::Failed,
        attempts,
        last_error: Some(error.to_string()),
    }
}
