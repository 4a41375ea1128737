//! In-memory history log for tests and ephemeral runs

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use super::index::RecordIndex;
use super::types::{HistoryPage, HistoryRecord, HistoryStats, OutcomeAmendment, PageRequest};
use super::HistoryLog;
use crate::logic::error::HistoryError;

#[derive(Default)]
pub struct MemoryHistoryLog {
    index: RwLock<RecordIndex>,
}

impl MemoryHistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records, most recent first
    pub fn records(&self) -> Vec<HistoryRecord> {
        self.index.read().all()
    }
}

#[async_trait]
impl HistoryLog for MemoryHistoryLog {
    async fn append(&self, record: &HistoryRecord) -> Result<(), HistoryError> {
        if !self.index.write().insert(record.clone()) {
            log::debug!("History record {} already appended", record.id);
        }
        Ok(())
    }

    async fn amend(&self, amendment: &OutcomeAmendment) -> Result<(), HistoryError> {
        self.index.write().amend(amendment.clone())
    }

    async fn page(&self, request: PageRequest) -> Result<HistoryPage, HistoryError> {
        Ok(self.index.read().page(request))
    }

    async fn get(&self, id: Uuid) -> Result<Option<HistoryRecord>, HistoryError> {
        Ok(self.index.read().get(id))
    }

    async fn len(&self) -> Result<usize, HistoryError> {
        Ok(self.index.read().len())
    }

    async fn stats(&self) -> Result<HistoryStats, HistoryError> {
        Ok(self.index.read().stats())
    }
}
