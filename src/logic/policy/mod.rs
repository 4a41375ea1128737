//! Policy Module
//!
//! Per-profile alert configuration: sensitivity, channels, auto-call toggle
//! and dedup cooldown. Pure data + validation; the store swaps whole
//! policy sets so in-flight detections keep the snapshot they started with.
//!
//! ## Structure
//! - `types`: Core types (AlertPolicy, Sensitivity, Channel, Profile)
//! - `store`: Versioned, atomically swapped policy storage
//!
//! ## Usage
//! ```ignore
//! use crate::logic::policy::{PolicyStore, Profile};
//!
//! let store = PolicyStore::new();
//! let snapshot = store.snapshot();
//! let policy = snapshot.active();
//! ```

pub mod store;
pub mod types;

pub use types::{AlertPolicy, Channel, Profile, Sensitivity};

pub use store::{PolicySet, PolicyStore};
