//! Commands - API for the UI
//!
//! Thin layer over the engine's stores and history log. Every mutation is
//! persisted to the settings file (when one is configured) after it has been
//! applied in memory.

use std::path::PathBuf;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::logic::contacts::{Contact, NewContact};
use crate::logic::engine::Engine;
use crate::logic::error::{EngineError, EngineResult};
use crate::logic::history::{
    DetectionView, HistoryPage, HistoryRecord, HistoryStats, PageRequest, DEFAULT_PAGE_SIZE,
};
use crate::logic::policy::{AlertPolicy, Profile};
use crate::logic::settings::Settings;

#[derive(Clone)]
pub struct Commands {
    engine: Engine,
    settings_path: Option<PathBuf>,
}

impl Commands {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            settings_path: None,
        }
    }

    /// Persist settings to `path` after every mutation
    pub fn with_settings_file(mut self, path: PathBuf) -> Self {
        self.settings_path = Some(path);
        self
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// A failed save keeps the in-memory change and is only logged
    fn persist(&self) {
        let Some(path) = &self.settings_path else {
            return;
        };
        if let Err(e) = Settings::capture(&self.engine).save(path) {
            log::error!("Failed to persist settings to {:?}: {}", path, e);
        }
    }

    // ========================================================================
    // POLICY COMMANDS
    // ========================================================================

    pub fn get_policy(&self, profile: Profile) -> AlertPolicy {
        self.engine.policies().get(profile).as_ref().clone()
    }

    /// Returns the new policy version
    pub fn set_policy(&self, profile: Profile, policy: AlertPolicy) -> EngineResult<u64> {
        let version = self.engine.policies().set(profile, policy)?;
        self.persist();
        Ok(version)
    }

    pub fn get_active_profile(&self) -> Profile {
        self.engine.policies().active_profile()
    }

    pub fn switch_profile(&self, profile: Profile) -> EngineResult<u64> {
        let version = self.engine.policies().switch_profile(profile);
        self.persist();
        Ok(version)
    }

    // ========================================================================
    // CONTACT COMMANDS
    // ========================================================================

    pub fn list_contacts(&self, profile: Profile) -> Vec<Contact> {
        self.engine.contacts().list(profile).as_ref().clone()
    }

    pub fn add_contact(&self, profile: Profile, contact: NewContact) -> EngineResult<Contact> {
        let added = self.engine.contacts().add(profile, contact)?;
        self.persist();
        Ok(added)
    }

    pub fn update_contact(
        &self,
        profile: Profile,
        id: Uuid,
        contact: NewContact,
    ) -> EngineResult<Contact> {
        let updated = self.engine.contacts().update(profile, id, contact)?;
        self.persist();
        Ok(updated)
    }

    pub fn remove_contact(&self, profile: Profile, id: Uuid) -> EngineResult<Contact> {
        let removed = self.engine.contacts().remove(profile, id)?;
        self.persist();
        Ok(removed)
    }

    pub fn set_primary_contact(&self, profile: Profile, id: Uuid) -> EngineResult<u64> {
        let version = self.engine.contacts().set_primary(profile, id)?;
        self.persist();
        Ok(version)
    }

    // ========================================================================
    // HISTORY COMMANDS
    // ========================================================================

    /// Most recent first
    pub async fn get_history(&self, request: PageRequest) -> EngineResult<HistoryPage<DetectionView>> {
        let page = self.engine.history().page(request).await?;
        Ok(page.map(DetectionView::from))
    }

    pub async fn get_detection(&self, id: Uuid) -> EngineResult<HistoryRecord> {
        self.engine
            .history()
            .get(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("detection {}", id)))
    }

    /// Dashboard feed
    pub async fn recent_activity(&self, limit: Option<usize>) -> EngineResult<Vec<DetectionView>> {
        let request = PageRequest::first(limit.unwrap_or(DEFAULT_PAGE_SIZE));
        let page = self.engine.history().page(request).await?;
        Ok(page.records.iter().map(DetectionView::from).collect())
    }

    pub async fn history_stats(&self) -> EngineResult<HistoryStats> {
        Ok(self.engine.history().stats().await?)
    }

    /// Live records as they are appended
    pub fn subscribe(&self) -> broadcast::Receiver<HistoryRecord> {
        self.engine.subscribe()
    }
}

// ============================================================================
// TESTS
// ============================================================================
