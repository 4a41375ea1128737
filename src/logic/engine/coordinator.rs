//! Per-event pipeline
//!
//! snapshot -> lookup -> classify -> threshold -> dedup ->
//! {notify || escalate} -> append -> publish
//!
//! Fail-open on logging, fail-closed on alerting: every event ends in exactly
//! one history record, and only identified, admitted, above-threshold events
//! alert. The history append is the last step and the only fatal one.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::{timeout_at, Instant};
use uuid::Uuid;

use super::{ConfigSnapshot, Engine};
use crate::logic::detection::{DetectionEvent, OffenderRecord, OffenderSummary};
use crate::logic::error::{EngineError, EngineResult};
use crate::logic::history::{Disposition, HistoryRecord, OutcomeAmendment};
use crate::logic::response::{
    AlertPayload, EscalationOutcome, EscalationRequest, PendingOutcome,
};
use crate::logic::threat::{classify_with_thresholds, RiskAssessment};

impl Engine {
    /// Process one detection end to end.
    ///
    /// Only `HistoryWrite` is returned as an error; it carries the finalized
    /// record so the caller can retry the append with [`Engine::append_record`].
    pub async fn process(&self, event: DetectionEvent) -> EngineResult<HistoryRecord> {
        let config = &self.inner.config;
        let deadline = Instant::now() + config.max_event_duration;
        let snapshot = self.snapshot();

        let offender = match self.lookup(&event.offender_id, deadline).await {
            Ok(offender) => offender,
            Err(reason) => {
                log::warn!("Detection {} not alerted: {}", event.id, reason);
                let mut record = new_record(event, &snapshot, Disposition::UnknownOffender);
                record.note = Some(reason);
                return self.finalize(record, Vec::new()).await;
            }
        };

        let assessment =
            match classify_with_thresholds(&event, &offender, &snapshot.policy, &config.thresholds) {
                Ok(assessment) => assessment,
                Err(e) => {
                    log::warn!("Detection {} not alerted: {}", event.id, e);
                    let mut record = new_record(event, &snapshot, Disposition::UnknownOffender);
                    record.note = Some(e.to_string());
                    return self.finalize(record, Vec::new()).await;
                }
            };

        if !assessment.clears_threshold {
            log::info!(
                "Detection {} of {} below threshold ({} risk, {} sensitivity)",
                event.id,
                offender.name,
                assessment.risk_level,
                snapshot.policy.sensitivity.as_str()
            );
            let note = format!("{} risk below {} floor", assessment.risk_level, assessment.floor);
            let mut record = new_record(event, &snapshot, Disposition::BelowThreshold);
            record.offender = Some(offender);
            record.assessment = Some(assessment);
            record.note = Some(note);
            return self.finalize(record, Vec::new()).await;
        }

        // A capture clock running ahead must not extend the cooldown
        let seen_at = event.captured_at.min(Utc::now());
        if !self
            .inner
            .dedup
            .admit(&event.offender_id, seen_at, snapshot.policy.cooldown())
        {
            let note = format!("within {}s cooldown", snapshot.policy.cooldown_secs);
            let mut record = new_record(event, &snapshot, Disposition::Suppressed);
            record.offender = Some(offender);
            record.assessment = Some(assessment);
            record.note = Some(note);
            return self.finalize(record, Vec::new()).await;
        }

        self.alert(event, offender, assessment, snapshot, deadline).await
    }

    /// Append a record that previously failed with `HistoryWrite`
    pub async fn append_record(&self, record: HistoryRecord) -> EngineResult<HistoryRecord> {
        self.finalize(record, Vec::new()).await
    }

    async fn lookup(&self, offender_id: &str, deadline: Instant) -> Result<OffenderRecord, String> {
        let timeout = self.inner.config.registry_timeout;
        let lookup_deadline = deadline.min(Instant::now() + timeout);

        match timeout_at(lookup_deadline, self.inner.registry.lookup(offender_id)).await {
            Ok(Ok(offender)) => Ok(offender),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("registry lookup timed out after {:?}", timeout)),
        }
    }

    /// Notification fan-out and escalation run concurrently, joined before
    /// the record is built
    async fn alert(
        &self,
        event: DetectionEvent,
        offender: OffenderRecord,
        assessment: RiskAssessment,
        snapshot: ConfigSnapshot,
        deadline: Instant,
    ) -> EngineResult<HistoryRecord> {
        let payload = Arc::new(AlertPayload::from_detection(&event, &offender, &assessment));
        log::info!("ALERT {} [{}]: {}", event.id, snapshot.profile, payload.message);

        let request = EscalationRequest {
            assessment: assessment.clone(),
            auto_call_police: snapshot.policy.auto_call_police,
            contacts: snapshot.contacts.clone(),
            offender: OffenderSummary::from(&offender),
            location: event.location.clone(),
            payload: payload.clone(),
        };

        let (dispatch, escalation) = tokio::join!(
            self.inner.notifier.dispatch(
                payload,
                &snapshot.policy.channels,
                snapshot.policy.email_address.as_deref(),
                deadline,
            ),
            self.inner.escalation.escalate(request, deadline),
        );

        let mut pending = dispatch.pending;
        pending.extend(escalation.pending);

        let mut record = new_record(event, &snapshot, Disposition::Alerted);
        record.offender = Some(offender);
        record.assessment = Some(assessment);
        record.notification_outcomes = dispatch.outcomes;
        record.escalation_outcome = escalation.outcome;

        self.finalize(record, pending).await
    }

    async fn finalize(
        &self,
        record: HistoryRecord,
        pending: Vec<PendingOutcome>,
    ) -> EngineResult<HistoryRecord> {
        if let Err(source) = self.inner.history.append(&record).await {
            log::error!("History append failed for record {}: {}", record.id, source);
            for outcome in pending {
                outcome.abort();
            }
            return Err(EngineError::HistoryWrite {
                record: Box::new(record),
                source,
            });
        }

        self.track_late_outcomes(record.id, pending);

        // No subscribers is not an error
        let _ = self.inner.events.send(record.clone());
        Ok(record)
    }

    /// Attempts still running at the deadline are recorded as amendments when
    /// they resolve, or dropped if late tracking is off
    fn track_late_outcomes(&self, record_id: Uuid, pending: Vec<PendingOutcome>) {
        if pending.is_empty() {
            return;
        }
        if !self.inner.config.track_late_outcomes {
            for outcome in pending {
                outcome.abort();
            }
            return;
        }

        log::debug!("Tracking {} late outcome(s) for record {}", pending.len(), record_id);
        let history = self.inner.history.clone();
        tokio::spawn(async move {
            let mut resolved: FuturesUnordered<_> =
                pending.into_iter().map(PendingOutcome::resolve).collect();

            while let Some(outcome) = resolved.next().await {
                let Some(outcome) = outcome else { continue };
                if let Err(e) = history.amend(&OutcomeAmendment::new(record_id, outcome)).await {
                    log::warn!("Failed to record late outcome for {}: {}", record_id, e);
                }
            }
        });
    }
}

fn new_record(event: DetectionEvent, snapshot: &ConfigSnapshot, disposition: Disposition) -> HistoryRecord {
    HistoryRecord {
        id: Uuid::new_v4(),
        event,
        offender: None,
        assessment: None,
        disposition,
        notification_outcomes: Vec::new(),
        escalation_outcome: EscalationOutcome::skipped(),
        profile: snapshot.profile,
        policy_version: snapshot.policy_version,
        contacts_version: snapshot.contacts_version,
        created_at: Utc::now(),
        note: None,
        amendments: Vec::new(),
    }
}
