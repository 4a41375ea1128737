//! EVADE Detection Alerting & Escalation Engine
//!
//! Turns raw sensor detections (an offender matched near the user) into
//! notifications, emergency escalation and a durable detection history.
//!
//! # Architecture
//!
//! ```text
//! sensor feed ──> Engine ──> Dedup ──> Risk Classifier
//!                                          │
//!                      ┌───────────────────┴──────────────────┐
//!                      ▼                                      ▼
//!           Notification Fan-out                   Escalation Dispatcher
//!        (push / sound / vibration / email)   (auto-call police, contact cascade)
//!                      └───────────────────┬──────────────────┘
//!                                          ▼
//!                                 Detection History Log ──> UI read models
//! ```

pub mod api;
pub mod constants;
pub mod logic;

pub use logic::config::EngineConfig;
pub use logic::engine::{Engine, EngineBuilder};
pub use logic::error::{EngineError, EngineResult};
