//! Response Module - alert delivery and escalation
//!
//! # Components
//! - `types.rs`: Payload, outcomes, escalation states, late outcomes
//! - `retry.rs`: Bounded retry with backoff + jitter
//! - `channels.rs`: Collaborator traits (sinks, email, dispatch, contacts)
//! - `notify.rs`: Notification fan-out dispatcher
//! - `escalation.rs`: Auto-call + contact cascade state machine
//! - `webhook.rs`: HTTP collaborators (email relay, SMS gateway, dispatch)

pub mod channels;
pub mod escalation;
pub mod notify;
pub mod retry;
pub mod types;
pub mod webhook;

// Re-exports from types
pub use types::{
    AlertPayload, CallResult, ContactAttempt, DeliveryStatus, EscalationOutcome,
    EscalationState, LateOutcome, NotificationOutcome, PendingOutcome,
};

// Re-exports from submodules
pub use channels::{
    ContactNotifier, EmailTransport, EmergencyDispatch, LogContactNotifier, LogDispatch,
    LogEmailTransport, LogSink, NotificationSink,
};
pub use escalation::{Escalation, EscalationDispatcher, EscalationRequest};
pub use notify::{Dispatch, NotificationDispatcher};
pub use retry::RetryPolicy;
pub use webhook::{WebhookContactNotifier, WebhookDispatch, WebhookEmailTransport};
