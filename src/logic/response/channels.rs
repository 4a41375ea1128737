//! Delivery collaborators
//!
//! The engine only talks to these traits. Log-only implementations back the
//! development binary; `webhook` holds the HTTP ones.

use async_trait::async_trait;

use super::types::AlertPayload;
use crate::logic::contacts::Contact;
use crate::logic::detection::{Location, OffenderSummary};
use crate::logic::error::ChannelError;
use crate::logic::policy::Channel;

/// On-device delivery primitive (push, sound, vibration)
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn channel(&self) -> Channel;

    async fn send(&self, payload: &AlertPayload) -> Result<(), ChannelError>;
}

#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, address: &str, payload: &AlertPayload) -> Result<(), ChannelError>;
}

/// Outbound call-placement to emergency services
#[async_trait]
pub trait EmergencyDispatch: Send + Sync {
    async fn place_call(
        &self,
        offender: &OffenderSummary,
        location: &Location,
    ) -> Result<(), ChannelError>;
}

/// SMS / voice notification of one emergency contact
#[async_trait]
pub trait ContactNotifier: Send + Sync {
    async fn notify(&self, contact: &Contact, payload: &AlertPayload) -> Result<(), ChannelError>;
}

// ============================================================================
// LOG-ONLY IMPLEMENTATIONS
// ============================================================================

pub struct LogSink {
    channel: Channel,
}

impl LogSink {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl NotificationSink for LogSink {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, payload: &AlertPayload) -> Result<(), ChannelError> {
        log::info!("[{}] {} - {}", self.channel, payload.title, payload.message);
        Ok(())
    }
}

pub struct LogEmailTransport;

#[async_trait]
impl EmailTransport for LogEmailTransport {
    async fn send(&self, address: &str, payload: &AlertPayload) -> Result<(), ChannelError> {
        log::info!("[email -> {}] {}", address, payload.title);
        Ok(())
    }
}

pub struct LogDispatch;

#[async_trait]
impl EmergencyDispatch for LogDispatch {
    async fn place_call(
        &self,
        offender: &OffenderSummary,
        location: &Location,
    ) -> Result<(), ChannelError> {
        log::warn!("[emergency call] {} reported at {}", offender, location);
        Ok(())
    }
}

pub struct LogContactNotifier;

#[async_trait]
impl ContactNotifier for LogContactNotifier {
    async fn notify(&self, contact: &Contact, payload: &AlertPayload) -> Result<(), ChannelError> {
        log::info!("[contact {} {}] {}", contact.name, contact.phone, payload.message);
        Ok(())
    }
}
