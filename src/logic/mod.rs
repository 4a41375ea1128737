//! Logic Module - Business Logic & Engines
//!
//! ## Structure
//! - `detection` - Raw detection events and offender records
//! - `registry` - Offender registry collaborator
//! - `threat` - Risk classification (tier + confidence -> risk level)
//! - `policy` - Alert policy per profile, versioned store
//! - `contacts` - Emergency contact directory
//! - `dedup` - Per-offender cooldown filter
//! - `response` - Notification fan-out, escalation, delivery collaborators
//! - `history` - Append-only detection history and read models
//! - `engine` - Coordinator and sensor feed runner

pub mod config;
pub mod contacts;
pub mod dedup;
pub mod detection;
pub mod engine;
pub mod error;
pub mod history;
pub mod policy;
pub mod registry;
pub mod response;
pub mod settings;
pub mod threat;

#[cfg(test)]
pub(crate) mod testing;
