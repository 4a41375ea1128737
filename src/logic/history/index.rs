//! In-memory record index shared by every history backend

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::types::{HistoryPage, HistoryRecord, HistoryStats, OutcomeAmendment, PageRequest};
use crate::logic::error::HistoryError;

#[derive(Debug, Default)]
pub(crate) struct RecordIndex {
    /// Creation order; id breaks ties
    order: BTreeSet<(DateTime<Utc>, Uuid)>,
    records: HashMap<Uuid, HistoryRecord>,
}

impl RecordIndex {
    pub fn contains(&self, id: Uuid) -> bool {
        self.records.contains_key(&id)
    }

    /// Returns false if the id is already present
    pub fn insert(&mut self, record: HistoryRecord) -> bool {
        if self.records.contains_key(&record.id) {
            return false;
        }
        self.order.insert((record.created_at, record.id));
        self.records.insert(record.id, record);
        true
    }

    pub fn amend(&mut self, amendment: OutcomeAmendment) -> Result<(), HistoryError> {
        let record = self
            .records
            .get_mut(&amendment.record_id)
            .ok_or(HistoryError::UnknownRecord(amendment.record_id))?;
        record.apply(amendment);
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<HistoryRecord> {
        self.records.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Every record, most recent first
    pub fn all(&self) -> Vec<HistoryRecord> {
        self.order
            .iter()
            .rev()
            .filter_map(|(_, id)| self.records.get(id).cloned())
            .collect()
    }

    /// Most recent first
    pub fn page(&self, request: PageRequest) -> HistoryPage {
        let limit = request.effective_limit();
        let total = self.records.len();

        let records: Vec<HistoryRecord> = self
            .order
            .iter()
            .rev()
            .skip(request.offset)
            .take(limit)
            .filter_map(|(_, id)| self.records.get(id).cloned())
            .collect();

        let end = request.offset.saturating_add(records.len());
        HistoryPage {
            records,
            total,
            offset: request.offset,
            next_offset: (end < total).then_some(end),
        }
    }

    pub fn stats(&self) -> HistoryStats {
        self.records.values().fold(HistoryStats::default(), |mut stats, record| {
            stats.record(record);
            stats
        })
    }
}
