//! Feed runner
//!
//! Consumes the sensor feed and processes events concurrently, bounded by
//! `max_concurrent_events`. Failed history appends are retried here, on the
//! caller side, up to `history_append_retries` times.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};

use super::Engine;
use crate::logic::detection::DetectionEvent;
use crate::logic::error::{EngineError, EngineResult};
use crate::logic::history::{Disposition, HistoryRecord};

/// Linear backoff step between append retries
const APPEND_RETRY_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedStats {
    pub processed: u64,
    pub alerted: u64,
    pub below_threshold: u64,
    pub suppressed: u64,
    pub unknown_offender: u64,
    /// Events whose record could not be appended
    pub failed: u64,
}

impl FeedStats {
    fn observe(&mut self, result: Result<EngineResult<HistoryRecord>, JoinError>) {
        self.processed += 1;
        match result {
            Ok(Ok(record)) => match record.disposition {
                Disposition::Alerted => self.alerted += 1,
                Disposition::BelowThreshold => self.below_threshold += 1,
                Disposition::Suppressed => self.suppressed += 1,
                Disposition::UnknownOffender => self.unknown_offender += 1,
            },
            Ok(Err(e)) => {
                log::error!("Detection dropped: {}", e);
                self.failed += 1;
            }
            Err(e) => {
                log::error!("Detection task failed: {}", e);
                self.failed += 1;
            }
        }
    }
}

/// Run until the feed closes and every in-flight event has finished
pub async fn run_feed(engine: Engine, mut feed: mpsc::Receiver<DetectionEvent>) -> FeedStats {
    let limit = engine.config().max_concurrent_events.max(1);
    let semaphore = Arc::new(Semaphore::new(limit));
    let mut tasks = JoinSet::new();
    let mut stats = FeedStats::default();

    log::info!("Feed runner started (max {} concurrent events)", limit);

    loop {
        tokio::select! {
            Some(result) = tasks.join_next(), if !tasks.is_empty() => stats.observe(result),
            event = feed.recv() => {
                let Some(event) = event else { break };
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let engine = engine.clone();
                tasks.spawn(async move {
                    let _permit = permit;
                    process_with_retry(&engine, event).await
                });
            }
        }
    }

    while let Some(result) = tasks.join_next().await {
        stats.observe(result);
    }

    log::info!(
        "Feed closed: {} processed, {} alerted, {} suppressed, {} failed",
        stats.processed,
        stats.alerted,
        stats.suppressed,
        stats.failed
    );
    stats
}

/// `process`, then retry the append while it keeps failing
pub async fn process_with_retry(engine: &Engine, event: DetectionEvent) -> EngineResult<HistoryRecord> {
    let max_retries = engine.config().history_append_retries;
    let mut result = engine.process(event).await;
    let mut retries = 0;

    loop {
        match result {
            Err(EngineError::HistoryWrite { record, source }) if retries < max_retries => {
                retries += 1;
                log::warn!(
                    "Retrying history append for {} ({}/{}): {}",
                    record.id,
                    retries,
                    max_retries,
                    source
                );
                tokio::time::sleep(APPEND_RETRY_BACKOFF * retries).await;
                result = engine.append_record(*record).await;
            }
            other => return other,
        }
    }
}
