//! API Module
//!
//! Organized with versioning for backward compatibility.
//!
//! Structure:
//! - commands.rs: Current stable API (`Commands`)
//! - v1/mod.rs: Re-exports commands as the v1 API
//!
//! Usage:
//! - `api::Commands::new(engine).get_history(page)` - Direct access
//! - `api::v1::Commands` - Version 1 API

pub mod commands;
pub mod v1;

// Re-export current version as default
pub use commands::*;
