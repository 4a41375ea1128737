//! Dedup / Debounce Filter
//!
//! Suppresses repeat alerts for the same offender inside the cooldown window.
//! `admit` is a single read-and-update under one lock, so two near-simultaneous
//! detections of the same offender can never both be admitted.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::constants::MAX_COOLDOWN_SECS;

/// Prune stale entries once the map grows past this
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Default)]
pub struct DedupFilter {
    last_admitted: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl DedupFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit if the offender has no prior admission or the cooldown has
    /// elapsed since it. Admission records `now` as the new start.
    pub fn admit(&self, offender_id: &str, now: DateTime<Utc>, cooldown: Duration) -> bool {
        let cooldown = chrono::Duration::from_std(cooldown)
            .unwrap_or_else(|_| chrono::Duration::seconds(MAX_COOLDOWN_SECS as i64));

        let mut map = self.last_admitted.lock();
        if let Some(last) = map.get(offender_id) {
            // Out-of-order captures (now < last) stay suppressed
            if now.signed_duration_since(*last) < cooldown {
                log::info!(
                    "Suppressed repeat detection of {} (last alert {}s ago, cooldown {}s)",
                    offender_id,
                    now.signed_duration_since(*last).num_seconds(),
                    cooldown.num_seconds()
                );
                return false;
            }
        }

        map.insert(offender_id.to_string(), now);

        if map.len() > PRUNE_THRESHOLD {
            let cutoff = now - chrono::Duration::seconds(MAX_COOLDOWN_SECS as i64);
            map.retain(|_, last| *last > cutoff);
        }

        true
    }

    pub fn last_admitted(&self, offender_id: &str) -> Option<DateTime<Utc>> {
        self.last_admitted.lock().get(offender_id).copied()
    }

    pub fn len(&self) -> usize {
        self.last_admitted.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_admitted.lock().is_empty()
    }
}
