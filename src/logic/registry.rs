//! Offender Registry
//!
//! `lookup(offender_id) -> OffenderRecord | NotFound`. The production registry is an
//! external collaborator; `InMemoryRegistry` serves tests and the bundled offender list.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::detection::{safe_name, OffenderId, OffenderRecord};
use super::error::{EngineResult, RegistryError};

/// Directory that photo references default to for bundled offender lists
pub const OFFENDER_IMAGES_DIR: &str = "offender_list/images";

#[async_trait]
pub trait OffenderRegistry: Send + Sync {
    async fn lookup(&self, offender_id: &str) -> Result<OffenderRecord, RegistryError>;
}

/// Registry held in memory
#[derive(Default)]
pub struct InMemoryRegistry {
    records: RwLock<HashMap<OffenderId, OffenderRecord>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = OffenderRecord>) -> Self {
        let registry = Self::new();
        for record in records {
            registry.insert(record);
        }
        registry
    }

    /// Load a JSON array of offender records.
    ///
    /// Records without a photo reference get `offender_list/images/<safe_name>.jpg`.
    pub fn load_from_file(path: &Path) -> EngineResult<Self> {
        let content = fs::read_to_string(path)?;
        let records: Vec<OffenderRecord> = serde_json::from_str(&content)?;

        let registry = Self::with_records(records.into_iter().map(|mut r| {
            if r.photo_ref.is_none() {
                r.photo_ref = Some(default_photo_ref(&r.name));
            }
            r
        }));

        log::info!("Loaded {} offender records from {:?}", registry.len(), path);
        Ok(registry)
    }

    pub fn insert(&self, record: OffenderRecord) {
        self.records.write().insert(record.id.clone(), record);
    }

    pub fn remove(&self, offender_id: &str) -> Option<OffenderRecord> {
        self.records.write().remove(offender_id)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl OffenderRegistry for InMemoryRegistry {
    async fn lookup(&self, offender_id: &str) -> Result<OffenderRecord, RegistryError> {
        self.records
            .read()
            .get(offender_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(offender_id.to_string()))
    }
}

/// Local image path for a given offender name
pub fn default_photo_ref(name: &str) -> String {
    format!("{}/{}.jpg", OFFENDER_IMAGES_DIR, safe_name(name))
}
