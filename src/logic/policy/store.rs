//! Policy Store
//!
//! One active policy per profile, plus the active profile selector.
//! Writes build a new `PolicySet` and swap the `Arc`; readers take a
//! snapshot and never see a half-applied edit.

use std::sync::Arc;

use parking_lot::RwLock;

use super::types::{AlertPolicy, Profile};
use crate::logic::error::{ConfigError, EngineResult};

/// Immutable, versioned view of every profile's policy
#[derive(Debug, Clone, PartialEq)]
pub struct PolicySet {
    pub version: u64,
    pub active_profile: Profile,
    pub adult: Arc<AlertPolicy>,
    pub kid: Arc<AlertPolicy>,
}

impl PolicySet {
    pub fn policy(&self, profile: Profile) -> &Arc<AlertPolicy> {
        match profile {
            Profile::Adult => &self.adult,
            Profile::Kid => &self.kid,
        }
    }

    pub fn active(&self) -> &Arc<AlertPolicy> {
        self.policy(self.active_profile)
    }
}

pub struct PolicyStore {
    current: RwLock<Arc<PolicySet>>,
}

impl PolicyStore {
    /// Store seeded with both profile defaults
    pub fn new() -> Self {
        Self::with_policies(Profile::Adult, AlertPolicy::adult_default(), AlertPolicy::kid_default())
    }

    /// Defaults with the given cooldown on both profiles
    pub fn with_default_cooldown(cooldown_secs: u64) -> Self {
        let adult = AlertPolicy {
            cooldown_secs,
            ..AlertPolicy::adult_default()
        };
        let kid = AlertPolicy {
            cooldown_secs,
            ..AlertPolicy::kid_default()
        };
        Self::with_policies(Profile::Adult, adult, kid)
    }

    pub fn with_policies(active_profile: Profile, adult: AlertPolicy, kid: AlertPolicy) -> Self {
        Self {
            current: RwLock::new(Arc::new(PolicySet {
                version: 1,
                active_profile,
                adult: Arc::new(adult),
                kid: Arc::new(kid),
            })),
        }
    }

    /// Current policy set. Cheap: one `Arc` clone under a read lock.
    pub fn snapshot(&self) -> Arc<PolicySet> {
        self.current.read().clone()
    }

    pub fn version(&self) -> u64 {
        self.current.read().version
    }

    pub fn active_profile(&self) -> Profile {
        self.current.read().active_profile
    }

    pub fn get(&self, profile: Profile) -> Arc<AlertPolicy> {
        self.current.read().policy(profile).clone()
    }

    /// Replace a profile's policy. Invalid policies leave the prior one active.
    pub fn set(&self, profile: Profile, policy: AlertPolicy) -> EngineResult<u64> {
        if policy.profile != profile {
            return Err(ConfigError::new(
                "profile",
                format!("policy is scoped to {} but was stored as {}", policy.profile, profile),
            )
            .into());
        }
        policy.validate()?;

        let policy = Arc::new(policy);
        let version = self.swap(|set| match profile {
            Profile::Adult => set.adult = policy,
            Profile::Kid => set.kid = policy,
        });

        log::info!("{} policy updated (config version {})", profile, version);
        Ok(version)
    }

    pub fn switch_profile(&self, profile: Profile) -> u64 {
        let version = self.swap(|set| set.active_profile = profile);
        log::info!("Active profile switched to {} (config version {})", profile, version);
        version
    }

    /// Clone-modify-swap under the write lock
    fn swap(&self, edit: impl FnOnce(&mut PolicySet)) -> u64 {
        let mut guard = self.current.write();
        let mut next = PolicySet::clone(&guard);
        edit(&mut next);
        next.version = guard.version + 1;
        let version = next.version;
        *guard = Arc::new(next);
        version
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new()
    }
}
