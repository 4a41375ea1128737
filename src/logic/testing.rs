//! Test doubles for every collaborator trait plus sample data builders

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::logic::contacts::Contact;
use crate::logic::detection::{DetectionEvent, Location, OffenderRecord, OffenderSummary, Tier};
use crate::logic::error::{ChannelError, HistoryError};
use crate::logic::history::{
    Disposition, HistoryLog, HistoryPage, HistoryRecord, HistoryStats, MemoryHistoryLog,
    OutcomeAmendment, PageRequest,
};
use crate::logic::policy::{AlertPolicy, Channel, Profile};
use crate::logic::response::{
    AlertPayload, ContactNotifier, EmailTransport, EmergencyDispatch, EscalationOutcome,
    NotificationOutcome, NotificationSink,
};
use crate::logic::threat::classify;

const FOREVER: Duration = Duration::from_secs(24 * 3600);

// ============================================================================
// SAMPLE DATA
// ============================================================================

pub fn offender(id: &str, name: &str, tier: Tier) -> OffenderRecord {
    OffenderRecord {
        id: id.to_string(),
        name: name.to_string(),
        conviction: "Sexual assault (2019)".to_string(),
        tier,
        photo_ref: Some(crate::logic::registry::default_photo_ref(name)),
    }
}

pub fn john_smith() -> OffenderRecord {
    offender("off-1", "John Smith", Tier::Tier3)
}

pub fn detection(offender_id: &str, confidence: f32) -> DetectionEvent {
    DetectionEvent::new(offender_id, confidence, Location::named("Main St & 5th Ave"))
}

pub fn sample_payload() -> AlertPayload {
    let offender = john_smith();
    let event = detection(&offender.id, 0.92);
    let assessment = match classify(&event, &offender, &AlertPolicy::adult_default()) {
        Ok(assessment) => assessment,
        Err(e) => panic!("sample classification failed: {}", e),
    };
    AlertPayload::from_detection(&event, &offender, &assessment)
}

pub fn contact(name: &str, is_primary: bool) -> Contact {
    Contact {
        id: Uuid::new_v4(),
        name: name.to_string(),
        phone: format!("+1 555 {:04}", name.len() * 7),
        relation: "Family".to_string(),
        is_primary,
    }
}

pub fn history_record(disposition: Disposition) -> HistoryRecord {
    let offender = john_smith();
    let event = detection(&offender.id, 0.92);
    let assessment = classify(&event, &offender, &AlertPolicy::adult_default()).ok();
    let alerted = disposition == Disposition::Alerted;

    HistoryRecord {
        id: Uuid::new_v4(),
        event,
        offender: Some(offender),
        assessment,
        disposition,
        notification_outcomes: if alerted {
            vec![NotificationOutcome::delivered(Channel::Push, 1)]
        } else {
            Vec::new()
        },
        escalation_outcome: EscalationOutcome::skipped(),
        profile: Profile::Adult,
        policy_version: 1,
        contacts_version: 1,
        created_at: Utc::now(),
        note: None,
        amendments: Vec::new(),
    }
}

// ============================================================================
// NOTIFICATION SINKS
// ============================================================================

pub struct ScriptedSink {
    channel: Channel,
    fail: bool,
    calls: AtomicU32,
}

impl ScriptedSink {
    pub fn ok(channel: Channel) -> Self {
        Self {
            channel,
            fail: false,
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing(channel: Channel) -> Self {
        Self {
            fail: true,
            ..Self::ok(channel)
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSink for ScriptedSink {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, _payload: &AlertPayload) -> Result<(), ChannelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(ChannelError::Transport(format!("{} unavailable", self.channel)))
        } else {
            Ok(())
        }
    }
}

/// Never completes a send
pub struct HangingSink {
    channel: Channel,
}

impl HangingSink {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl NotificationSink for HangingSink {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, _payload: &AlertPayload) -> Result<(), ChannelError> {
        tokio::time::sleep(FOREVER).await;
        Ok(())
    }
}

// ============================================================================
// EMAIL
// ============================================================================

#[derive(Clone, Copy)]
enum Script {
    Ok,
    Fail,
    Hang,
    Delay(Duration),
}

async fn play(script: Script, what: &str) -> Result<(), ChannelError> {
    match script {
        Script::Ok => Ok(()),
        Script::Fail => Err(ChannelError::Transport(format!("{} unreachable", what))),
        Script::Hang => {
            tokio::time::sleep(FOREVER).await;
            Ok(())
        }
        Script::Delay(delay) => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
    }
}

pub struct ScriptedEmail {
    script: Script,
    calls: AtomicU32,
}

impl ScriptedEmail {
    fn with(script: Script) -> Self {
        Self {
            script,
            calls: AtomicU32::new(0),
        }
    }

    pub fn ok() -> Self {
        Self::with(Script::Ok)
    }

    pub fn failing() -> Self {
        Self::with(Script::Fail)
    }

    pub fn hanging() -> Self {
        Self::with(Script::Hang)
    }

    /// Succeeds after `delay`
    pub fn delayed(delay: Duration) -> Self {
        Self::with(Script::Delay(delay))
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmailTransport for ScriptedEmail {
    async fn send(&self, _address: &str, _payload: &AlertPayload) -> Result<(), ChannelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        play(self.script, "mail relay").await
    }
}

// ============================================================================
// EMERGENCY DISPATCH
// ============================================================================

pub struct ScriptedDispatch {
    script: Script,
    calls: AtomicU32,
}

impl ScriptedDispatch {
    fn with(script: Script) -> Self {
        Self {
            script,
            calls: AtomicU32::new(0),
        }
    }

    pub fn connected() -> Self {
        Self::with(Script::Ok)
    }

    pub fn failing() -> Self {
        Self::with(Script::Fail)
    }

    pub fn hanging() -> Self {
        Self::with(Script::Hang)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmergencyDispatch for ScriptedDispatch {
    async fn place_call(
        &self,
        _offender: &OffenderSummary,
        _location: &Location,
    ) -> Result<(), ChannelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        play(self.script, "dispatch center").await
    }
}

// ============================================================================
// CONTACT NOTIFIER
// ============================================================================

/// Records every contact it was asked to notify, in call order
#[derive(Default)]
pub struct ScriptedNotifier {
    failing: HashSet<String>,
    hanging: HashSet<String>,
    notified: Mutex<Vec<String>>,
}

impl ScriptedNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub fn hanging_for(mut self, name: &str) -> Self {
        self.hanging.insert(name.to_string());
        self
    }

    /// Distinct contacts in first-call order
    pub fn notified(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for name in self.notified.lock().iter() {
            if !seen.contains(name) {
                seen.push(name.clone());
            }
        }
        seen
    }
}

#[async_trait]
impl ContactNotifier for ScriptedNotifier {
    async fn notify(&self, contact: &Contact, _payload: &AlertPayload) -> Result<(), ChannelError> {
        self.notified.lock().push(contact.name.clone());
        let script = if self.hanging.contains(&contact.name) {
            Script::Hang
        } else if self.failing.contains(&contact.name) {
            Script::Fail
        } else {
            Script::Ok
        };
        play(script, &contact.name).await
    }
}

// ============================================================================
// HISTORY
// ============================================================================

/// Memory log whose first `failures` appends fail
pub struct FlakyHistoryLog {
    inner: MemoryHistoryLog,
    failures: AtomicU32,
}

impl FlakyHistoryLog {
    pub fn new(failures: u32) -> Self {
        Self {
            inner: MemoryHistoryLog::new(),
            failures: AtomicU32::new(failures),
        }
    }

    pub fn records(&self) -> Vec<HistoryRecord> {
        self.inner.records()
    }
}

#[async_trait]
impl HistoryLog for FlakyHistoryLog {
    async fn append(&self, record: &HistoryRecord) -> Result<(), HistoryError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(HistoryError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.append(record).await
    }

    async fn amend(&self, amendment: &OutcomeAmendment) -> Result<(), HistoryError> {
        self.inner.amend(amendment).await
    }

    async fn page(&self, request: PageRequest) -> Result<HistoryPage, HistoryError> {
        self.inner.page(request).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<HistoryRecord>, HistoryError> {
        self.inner.get(id).await
    }

    async fn len(&self) -> Result<usize, HistoryError> {
        self.inner.len().await
    }

    async fn stats(&self) -> Result<HistoryStats, HistoryError> {
        self.inner.stats().await
    }
}

// ============================================================================
// LOG CAPTURE
// ============================================================================

thread_local! {
    static CAPTURED: std::cell::RefCell<Option<Vec<String>>> = const { std::cell::RefCell::new(None) };
}

/// Records messages only on threads that are inside `capture_logs`
struct ThreadLogger;

impl log::Log for ThreadLogger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        CAPTURED.with(|captured| {
            if let Some(lines) = captured.borrow_mut().as_mut() {
                lines.push(record.args().to_string());
            }
        });
    }

    fn flush(&self) {}
}

static LOGGER: ThreadLogger = ThreadLogger;
static INSTALL: std::sync::Once = std::sync::Once::new();

/// Log messages emitted on the current thread while `f` runs
pub fn capture_logs(f: impl FnOnce()) -> Vec<String> {
    INSTALL.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(log::LevelFilter::Debug);
        }
    });

    CAPTURED.with(|captured| *captured.borrow_mut() = Some(Vec::new()));
    f();
    CAPTURED.with(|captured| captured.borrow_mut().take().unwrap_or_default())
}
