//! Engine Coordinator
//!
//! Owns the shared state (policy store, contact directory, dedup filter)
//! and the collaborators, and turns each `DetectionEvent` into exactly one
//! appended `HistoryRecord`.
//!
//! ## Structure
//! - `coordinator`: Per-event pipeline (`process`)
//! - `runner`: Bounded-concurrency feed consumer

pub mod coordinator;
pub mod runner;


use std::sync::Arc;

use tokio::sync::broadcast;

use crate::logic::config::EngineConfig;
use crate::logic::contacts::{Contact, ContactDirectory};
use crate::logic::dedup::DedupFilter;
use crate::logic::history::{HistoryLog, HistoryRecord, MemoryHistoryLog};
use crate::logic::policy::{AlertPolicy, PolicyStore, Profile};
use crate::logic::registry::{InMemoryRegistry, OffenderRegistry};
use crate::logic::response::{
    ContactNotifier, EmailTransport, EmergencyDispatch, EscalationDispatcher,
    NotificationDispatcher, NotificationSink,
};

pub use runner::{run_feed, FeedStats};

/// Configuration captured once at the start of an event's processing.
/// Later policy or contact edits never reach an in-flight event.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub profile: Profile,
    pub policy_version: u64,
    pub policy: Arc<AlertPolicy>,
    pub contacts_version: u64,
    pub contacts: Arc<Vec<Contact>>,
}

pub(crate) struct EngineInner {
    config: EngineConfig,
    policies: PolicyStore,
    contacts: ContactDirectory,
    dedup: DedupFilter,
    registry: Arc<dyn OffenderRegistry>,
    notifier: NotificationDispatcher,
    escalation: EscalationDispatcher,
    history: Arc<dyn HistoryLog>,
    events: broadcast::Sender<HistoryRecord>,
}

/// Cheap to clone; every clone drives the same engine
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn policies(&self) -> &PolicyStore {
        &self.inner.policies
    }

    pub fn contacts(&self) -> &ContactDirectory {
        &self.inner.contacts
    }

    pub fn history(&self) -> &Arc<dyn HistoryLog> {
        &self.inner.history
    }

    /// Finalized records as they are appended
    pub fn subscribe(&self) -> broadcast::Receiver<HistoryRecord> {
        self.inner.events.subscribe()
    }

    /// Active profile's policy and contacts
    pub fn snapshot(&self) -> ConfigSnapshot {
        let policies = self.inner.policies.snapshot();
        let directory = self.inner.contacts.snapshot();
        let profile = policies.active_profile;

        ConfigSnapshot {
            profile,
            policy_version: policies.version,
            policy: policies.active().clone(),
            contacts_version: directory.version,
            contacts: directory.contacts(profile).clone(),
        }
    }
}

// ============================================================================
// BUILDER
// ============================================================================

pub struct EngineBuilder {
    config: EngineConfig,
    registry: Option<Arc<dyn OffenderRegistry>>,
    history: Option<Arc<dyn HistoryLog>>,
    policies: Option<PolicyStore>,
    notifier: NotificationDispatcher,
    escalation: EscalationDispatcher,
}

impl EngineBuilder {
    /// No collaborators: enabled channels fail until sinks are added
    pub fn new(config: EngineConfig) -> Self {
        Self {
            notifier: NotificationDispatcher::new(&config),
            escalation: EscalationDispatcher::new(&config),
            config,
            registry: None,
            history: None,
            policies: None,
        }
    }

    /// Log-only implementations of every delivery collaborator
    pub fn log_only(config: EngineConfig) -> Self {
        Self {
            notifier: NotificationDispatcher::log_only(&config),
            escalation: EscalationDispatcher::log_only(&config),
            ..Self::new(config)
        }
    }

    pub fn registry(mut self, registry: Arc<dyn OffenderRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn history(mut self, history: Arc<dyn HistoryLog>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn policies(mut self, policies: PolicyStore) -> Self {
        self.policies = Some(policies);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notifier = self.notifier.with_sink(sink);
        self
    }

    pub fn email(mut self, transport: Arc<dyn EmailTransport>) -> Self {
        self.notifier = self.notifier.with_email(transport);
        self
    }

    pub fn dispatch(mut self, dispatch: Arc<dyn EmergencyDispatch>) -> Self {
        self.escalation = self.escalation.with_dispatch(dispatch);
        self
    }

    pub fn contact_notifier(mut self, notifier: Arc<dyn ContactNotifier>) -> Self {
        self.escalation = self.escalation.with_notifier(notifier);
        self
    }

    pub fn build(self) -> Engine {
        let (events, _) = broadcast::channel(self.config.event_buffer.max(1));
        let policies = self
            .policies
            .unwrap_or_else(|| PolicyStore::with_default_cooldown(self.config.default_cooldown_secs()));

        Engine {
            inner: Arc::new(EngineInner {
                policies,
                contacts: ContactDirectory::new(),
                dedup: DedupFilter::new(),
                registry: self.registry.unwrap_or_else(|| Arc::new(InMemoryRegistry::new())),
                notifier: self.notifier,
                escalation: self.escalation,
                history: self.history.unwrap_or_else(|| Arc::new(MemoryHistoryLog::new())),
                events,
                config: self.config,
            }),
        }
    }
}
