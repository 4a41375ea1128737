//! Detection History Module
//!
//! Append-only, queryable record of every processed detection. The single
//! source of truth for the "Recent Activity" and "Detection Log" views.
//!
//! ## Structure
//! - `types`: HistoryRecord, Disposition, amendments, paging, stats
//! - `memory`: In-memory backend
//! - `recorder`: Append-only JSONL backend with rotation + replay
//! - `views`: UI-facing rows

mod index;
pub mod memory;
pub mod recorder;
pub mod types;
pub mod views;

use async_trait::async_trait;
use uuid::Uuid;

use crate::logic::error::HistoryError;

pub use memory::MemoryHistoryLog;
pub use recorder::JsonlHistoryLog;
pub use types::{
    Disposition, HistoryPage, HistoryRecord, HistoryStats, OutcomeAmendment, PageRequest,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use views::DetectionView;

/// Durable log contract
#[async_trait]
pub trait HistoryLog: Send + Sync {
    /// Append a finalized record. Appending an id that is already present is a no-op.
    async fn append(&self, record: &HistoryRecord) -> Result<(), HistoryError>;

    /// Attach a late outcome to an appended record
    async fn amend(&self, amendment: &OutcomeAmendment) -> Result<(), HistoryError>;

    /// Most recent first
    async fn page(&self, request: PageRequest) -> Result<HistoryPage, HistoryError>;

    async fn get(&self, id: Uuid) -> Result<Option<HistoryRecord>, HistoryError>;

    async fn len(&self) -> Result<usize, HistoryError>;

    async fn stats(&self) -> Result<HistoryStats, HistoryError>;
}
