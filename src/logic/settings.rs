//! Persisted user settings
//!
//! Policies and contacts for both profiles plus the active profile, stored as
//! one pretty-printed JSON document. Writes go to a sibling temp file that is
//! renamed over the target, so a crash mid-save leaves the previous file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::logic::contacts::Contact;
use crate::logic::engine::Engine;
use crate::logic::error::EngineResult;
use crate::logic::policy::{AlertPolicy, Profile};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub active_profile: Profile,
    #[serde(default = "AlertPolicy::adult_default")]
    pub adult_policy: AlertPolicy,
    #[serde(default = "AlertPolicy::kid_default")]
    pub kid_policy: AlertPolicy,
    #[serde(default)]
    pub adult_contacts: Vec<Contact>,
    #[serde(default)]
    pub kid_contacts: Vec<Contact>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            active_profile: Profile::Adult,
            adult_policy: AlertPolicy::adult_default(),
            kid_policy: AlertPolicy::kid_default(),
            adult_contacts: Vec::new(),
            kid_contacts: Vec::new(),
        }
    }
}

impl Settings {
    /// `None` when nothing has been saved yet
    pub fn load(path: &Path) -> EngineResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        log::info!("Settings loaded from {:?}", path);
        Ok(Some(settings))
    }

    pub fn save(&self, path: &Path) -> EngineResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;

        log::debug!("Settings saved to {:?}", path);
        Ok(())
    }

    /// Current engine state
    pub fn capture(engine: &Engine) -> Self {
        let policies = engine.policies().snapshot();
        let contacts = engine.contacts().snapshot();

        Self {
            active_profile: policies.active_profile,
            adult_policy: policies.policy(Profile::Adult).as_ref().clone(),
            kid_policy: policies.policy(Profile::Kid).as_ref().clone(),
            adult_contacts: contacts.contacts(Profile::Adult).as_ref().clone(),
            kid_contacts: contacts.contacts(Profile::Kid).as_ref().clone(),
        }
    }

    /// Push into the engine's stores. Invalid policies or contact lists are
    /// rejected before anything after them is applied.
    pub fn apply(self, engine: &Engine) -> EngineResult<()> {
        engine.policies().set(Profile::Adult, self.adult_policy)?;
        engine.policies().set(Profile::Kid, self.kid_policy)?;
        engine.contacts().replace(Profile::Adult, self.adult_contacts)?;
        engine.contacts().replace(Profile::Kid, self.kid_contacts)?;
        engine.policies().switch_profile(self.active_profile);
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::config::EngineConfig;
    use crate::logic::contacts::NewContact;
    use crate::logic::policy::Sensitivity;
    use crate::logic::testing::contact;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let loaded = Settings::load(&dir.path().join("settings.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = Settings {
            active_profile: Profile::Kid,
            adult_contacts: vec![contact("Mom", true), contact("Sister", false)],
            ..Settings::default()
        };
        settings.save(&path).unwrap();

        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(Settings::load(&path).unwrap(), Some(settings));
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"active_profile": "Kid"}"#).unwrap();

        let settings = Settings::load(&path).unwrap().unwrap();
        assert_eq!(settings.active_profile, Profile::Kid);
        assert_eq!(settings.kid_policy, AlertPolicy::kid_default());
        assert!(settings.adult_contacts.is_empty());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn test_capture_apply_roundtrip() {
        let source = Engine::builder(EngineConfig::default()).build();
        source
            .policies()
            .set(
                Profile::Adult,
                AlertPolicy {
                    sensitivity: Sensitivity::High,
                    ..AlertPolicy::adult_default()
                },
            )
            .unwrap();
        source
            .contacts()
            .add(Profile::Kid, NewContact::new("Dad", "+1 555 0101", "Father").primary())
            .unwrap();
        source.policies().switch_profile(Profile::Kid);

        let captured = Settings::capture(&source);
        let target = Engine::builder(EngineConfig::default()).build();
        captured.clone().apply(&target).unwrap();

        assert_eq!(Settings::capture(&target), captured);
        assert_eq!(target.policies().active_profile(), Profile::Kid);
        assert_eq!(target.contacts().list(Profile::Kid)[0].name, "Dad");
    }

    #[test]
    fn test_apply_rejects_invalid_policy() {
        let engine = Engine::builder(EngineConfig::default()).build();
        let settings = Settings {
            adult_policy: AlertPolicy {
                cooldown_secs: 0,
                ..AlertPolicy::adult_default()
            },
            ..Settings::default()
        };

        assert!(settings.apply(&engine).is_err());
        assert_eq!(engine.policies().get(Profile::Adult).cooldown_secs, 600);
    }
}
