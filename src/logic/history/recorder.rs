//! JSONL History Recorder
//!
//! Append-only JSON-lines log of history records and outcome amendments.
//! One line per write, flushed before returning. Opening a directory
//! replays every `history_*.jsonl` file in name (= creation) order.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::index::RecordIndex;
use super::types::{HistoryPage, HistoryRecord, HistoryStats, OutcomeAmendment, PageRequest};
use super::HistoryLog;
use crate::logic::error::HistoryError;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Maximum file size before rotation (50 MB)
pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

const FILE_PREFIX: &str = "history_";

const LOG_EXT: &str = "jsonl";

// ============================================================================
// LINE FORMAT
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum HistoryLine {
    Record(HistoryRecord),
    Amendment(OutcomeAmendment),
}

// ============================================================================
// WRITER
// ============================================================================

struct Writer {
    writer: BufWriter<File>,
    current_file: PathBuf,
    current_size: u64,
}

impl Writer {
    fn open(base_dir: &Path) -> std::io::Result<Self> {
        let filename = format!(
            "{}{}.{}",
            FILE_PREFIX,
            Utc::now().format("%Y%m%d_%H%M%S_%3f"),
            LOG_EXT
        );
        let current_file = base_dir.join(filename);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&current_file)?;
        let current_size = file.metadata()?.len();

        log::info!("Opened history log: {:?}", current_file);
        Ok(Self {
            writer: BufWriter::new(file),
            current_file,
            current_size,
        })
    }

    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        // Flush for durability
        self.writer.flush()?;
        self.current_size += line.len() as u64 + 1;
        Ok(())
    }
}

// ============================================================================
// RECORDER
// ============================================================================

pub struct JsonlHistoryLog {
    base_dir: PathBuf,
    max_file_size: u64,
    writer: Mutex<Writer>,
    index: RwLock<RecordIndex>,
}

impl JsonlHistoryLog {
    /// Open (or create) a history directory and replay what is in it
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;

        let index = replay(&base_dir)?;
        log::info!("Replayed {} history records from {:?}", index.len(), base_dir);

        let writer = Writer::open(&base_dir)?;
        Ok(Self {
            base_dir,
            max_file_size: MAX_FILE_SIZE,
            writer: Mutex::new(writer),
            index: RwLock::new(index),
        })
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size.max(1);
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn current_file(&self) -> PathBuf {
        self.writer.lock().current_file.clone()
    }

    fn write(&self, line: &HistoryLine) -> Result<(), HistoryError> {
        let json = serde_json::to_string(line)?;
        let mut writer = self.writer.lock();

        if writer.current_size > 0 && writer.current_size + json.len() as u64 + 1 > self.max_file_size {
            let next = Writer::open(&self.base_dir)?;
            log::info!("Rotated history from {:?} to {:?}", writer.current_file, next.current_file);
            *writer = next;
        }

        writer.write_line(&json)?;
        Ok(())
    }
}

#[async_trait]
impl HistoryLog for JsonlHistoryLog {
    async fn append(&self, record: &HistoryRecord) -> Result<(), HistoryError> {
        if self.index.read().contains(record.id) {
            log::debug!("History record {} already appended", record.id);
            return Ok(());
        }

        self.write(&HistoryLine::Record(record.clone()))?;
        self.index.write().insert(record.clone());
        Ok(())
    }

    async fn amend(&self, amendment: &OutcomeAmendment) -> Result<(), HistoryError> {
        if !self.index.read().contains(amendment.record_id) {
            return Err(HistoryError::UnknownRecord(amendment.record_id));
        }

        self.write(&HistoryLine::Amendment(amendment.clone()))?;
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

// ============================================================================
// REPLAY
// ============================================================================

/// Get list of all history files in directory, oldest first
pub fn list_log_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if dir.is_dir() {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_history = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with(FILE_PREFIX));
            if is_history && path.extension().map_or(false, |e| e == LOG_EXT) {
                files.push(path);
            }
        }
    }

    // Sort by name (which includes timestamp)
    files.sort();
    Ok(files)
}

fn replay(dir: &Path) -> Result<RecordIndex, HistoryError> {
    let mut index = RecordIndex::default();

    for path in list_log_files(dir)? {
        let reader = BufReader::new(File::open(&path)?);

        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<HistoryLine>(&line) {
                Ok(HistoryLine::Record(record)) => {
                    index.insert(record);
                }
                Ok(HistoryLine::Amendment(amendment)) => {
                    let record_id = amendment.record_id;
                    if index.amend(amendment).is_err() {
                        log::warn!(
                            "{:?}:{}: amendment for unknown record {}",
                            path,
                            number + 1,
                            record_id
                        );
                    }
                }
                Err(e) => {
                    log::warn!("{:?}:{}: skipping corrupt history line: {}", path, number + 1, e);
                }
            }
        }
    }

    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::history::Disposition;
    use crate::logic::policy::Channel;
    use crate::logic::response::{DeliveryStatus, LateOutcome, NotificationOutcome};
    use crate::logic::testing::history_record;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_append_and_replay() {
        let temp_dir = TempDir::new().unwrap();
        let first = history_record(Disposition::Alerted);
        let second = history_record(Disposition::Suppressed);

        {
            let log = JsonlHistoryLog::open(temp_dir.path()).unwrap();
            log.append(&first).await.unwrap();
            log.append(&second).await.unwrap();
            // Idempotent by id
            log.append(&first).await.unwrap();
            assert_eq!(log.len().await.unwrap(), 2);
        }

        let reopened = JsonlHistoryLog::open(temp_dir.path()).unwrap();
        assert_eq!(reopened.len().await.unwrap(), 2);
        assert_eq!(reopened.get(first.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_jsonl_format() {
        let temp_dir = TempDir::new().unwrap();
        let log = JsonlHistoryLog::open(temp_dir.path()).unwrap();

        for _ in 0..3 {
            log.append(&history_record(Disposition::BelowThreshold)).await.unwrap();
        }

        // Verify file format (one JSON per line)
        let content = fs::read_to_string(log.current_file()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["kind"], "record");
        }
    }

    #[tokio::test]
    async fn test_amendment_replayed() {
        let temp_dir = TempDir::new().unwrap();
        let record = history_record(Disposition::Alerted);
        let late = NotificationOutcome::delivered(Channel::Email, 2);

        {
            let log = JsonlHistoryLog::open(temp_dir.path()).unwrap();
            log.append(&record).await.unwrap();
            log.amend(&OutcomeAmendment::new(record.id, LateOutcome::Notification(late.clone())))
                .await
                .unwrap();
        }

        let reopened = JsonlHistoryLog::open(temp_dir.path()).unwrap();
        let restored = reopened.get(record.id).await.unwrap().unwrap();
        assert_eq!(restored.amendments.len(), 1);
        let email = restored
            .notification_outcomes
            .iter()
            .find(|o| o.channel == Channel::Email)
            .unwrap();
        assert_eq!(email.status, DeliveryStatus::Delivered);
    }

    #[tokio::test]
    async fn test_amend_unknown_record() {
        let temp_dir = TempDir::new().unwrap();
        let log = JsonlHistoryLog::open(temp_dir.path()).unwrap();
        let amendment = OutcomeAmendment::new(
            Uuid::new_v4(),
            LateOutcome::Notification(NotificationOutcome::delivered(Channel::Push, 1)),
        );
        assert!(matches!(
            log.amend(&amendment).await,
            Err(HistoryError::UnknownRecord(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_lines_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let record = history_record(Disposition::Alerted);
        {
            let log = JsonlHistoryLog::open(temp_dir.path()).unwrap();
            log.append(&record).await.unwrap();
        }

        let files = list_log_files(temp_dir.path()).unwrap();
        let mut file = OpenOptions::new().append(true).open(&files[0]).unwrap();
        writeln!(file, "{{\"kind\":\"record\",\"truncated").unwrap();

        let reopened = JsonlHistoryLog::open(temp_dir.path()).unwrap();
        assert_eq!(reopened.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rotation() {
        let temp_dir = TempDir::new().unwrap();
        let log = JsonlHistoryLog::open(temp_dir.path()).unwrap().with_max_file_size(512);

        let first_file = log.current_file();
        for _ in 0..3 {
            log.append(&history_record(Disposition::Alerted)).await.unwrap();
            // Distinct timestamped file names
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        assert_ne!(log.current_file(), first_file);
        assert!(list_log_files(temp_dir.path()).unwrap().len() >= 2);

        let reopened = JsonlHistoryLog::open(temp_dir.path()).unwrap();
        assert_eq!(reopened.len().await.unwrap(), 3);
    }
}
