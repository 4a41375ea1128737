//! Error handling
//!
//! Taxonomy:
//! - `NotFound` - offender/contact lookup miss, alerting skipped for that path only
//! - `ChannelFailure` - transient delivery failure, retried within bounds, never fatal
//! - `Timeout` - an operation exceeded its bound
//! - `ConfigInvalid` - malformed policy/contact edit, rejected at the mutation boundary
//! - `HistoryWrite` - the only error fatal to a single event's processing

use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::logic::history::HistoryRecord;

pub type EngineResult<T> = Result<T, EngineError>;

/// Failure of a single delivery attempt (channel, contact or emergency call)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChannelError {
    /// Permanent rejection (bad address, 4xx). Not retried.
    #[error("delivery rejected: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// No collaborator configured for this path
    #[error("channel unavailable: {0}")]
    Unavailable(String),
}

impl ChannelError {
    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChannelError::Transport(_) | ChannelError::Timeout(_))
    }
}

/// Offender registry lookup failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("offender not found: {0}")]
    NotFound(String),

    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

/// History log failure
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("history serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown history record: {0}")]
    UnknownRecord(Uuid),
}

/// Rejected configuration edit
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: String,
}

impl ConfigError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("channel failure: {0}")]
    ChannelFailure(#[from] ChannelError),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("invalid configuration: {0}")]
    ConfigInvalid(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The finalized record could not be appended. The record travels with
    /// the error so the caller can retry the append.
    #[error("history write failed for record {}: {source}", .record.id)]
    HistoryWrite {
        record: Box<HistoryRecord>,
        source: HistoryError,
    },

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
