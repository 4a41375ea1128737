//! Contact Directory
//!
//! Ordered emergency contacts per profile with at most one primary.
//! Same snapshot-and-swap storage as the policy store; the escalation
//! cascade walks `cascade_order()` of the snapshot it was handed.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{ConfigError, EngineError, EngineResult};
use super::policy::Profile;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub relation: String,
    #[serde(default)]
    pub is_primary: bool,
}

/// User input for creating or editing a contact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewContact {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub relation: String,
    #[serde(default)]
    pub is_primary: bool,
}

impl NewContact {
    pub fn new(name: &str, phone: &str, relation: &str) -> Self {
        Self {
            name: name.to_string(),
            phone: phone.to_string(),
            relation: relation.to_string(),
            is_primary: false,
        }
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::new("name", "contact name must not be empty"));
        }
        if self.phone.trim().is_empty() {
            return Err(ConfigError::new("phone", "contact phone must not be empty"));
        }
        Ok(())
    }

    fn into_contact(self, id: Uuid) -> Contact {
        Contact {
            id,
            name: self.name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            relation: self.relation.trim().to_string(),
            is_primary: self.is_primary,
        }
    }
}

/// Immutable, versioned view of both profiles' contacts
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryState {
    pub version: u64,
    pub adult: Arc<Vec<Contact>>,
    pub kid: Arc<Vec<Contact>>,
}

impl DirectoryState {
    pub fn contacts(&self, profile: Profile) -> &Arc<Vec<Contact>> {
        match profile {
            Profile::Adult => &self.adult,
            Profile::Kid => &self.kid,
        }
    }
}

/// Primary contact first, then the rest in stored order
pub fn cascade_order(contacts: &[Contact]) -> Vec<Contact> {
    let mut ordered: Vec<Contact> = contacts.iter().filter(|c| c.is_primary).cloned().collect();
    ordered.extend(contacts.iter().filter(|c| !c.is_primary).cloned());
    ordered
}

// ============================================================================
// DIRECTORY
// ============================================================================

pub struct ContactDirectory {
    current: RwLock<Arc<DirectoryState>>,
}

impl ContactDirectory {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(DirectoryState {
                version: 1,
                adult: Arc::new(Vec::new()),
                kid: Arc::new(Vec::new()),
            })),
        }
    }

    pub fn snapshot(&self) -> Arc<DirectoryState> {
        self.current.read().clone()
    }

    pub fn version(&self) -> u64 {
        self.current.read().version
    }

    pub fn list(&self, profile: Profile) -> Arc<Vec<Contact>> {
        self.current.read().contacts(profile).clone()
    }

    pub fn add(&self, profile: Profile, input: NewContact) -> EngineResult<Contact> {
        input.validate()?;
        let contact = input.into_contact(Uuid::new_v4());
        let added = contact.clone();

        self.edit(profile, move |contacts| {
            if contact.is_primary {
                demote_all(contacts);
            }
            contacts.push(contact);
            Ok(())
        })?;

        log::info!("Added {} contact '{}' ({})", profile, added.name, added.id);
        Ok(added)
    }

    /// Replace a contact's details, keeping its id and position
    pub fn update(&self, profile: Profile, id: Uuid, input: NewContact) -> EngineResult<Contact> {
        input.validate()?;
        let contact = input.into_contact(id);
        let updated = contact.clone();

        self.edit(profile, move |contacts| {
            let index = position(contacts, id)?;
            if contact.is_primary {
                demote_all(contacts);
            }
            contacts[index] = contact;
            Ok(())
        })?;

        log::info!("Updated {} contact '{}' ({})", profile, updated.name, id);
        Ok(updated)
    }

    /// Remove a contact. Removing the primary leaves the directory without one.
    pub fn remove(&self, profile: Profile, id: Uuid) -> EngineResult<Contact> {
        let mut removed = None;
        self.edit(profile, |contacts| {
            let index = position(contacts, id)?;
            removed = Some(contacts.remove(index));
            Ok(())
        })?;

        let removed = removed.ok_or_else(|| EngineError::NotFound(format!("contact {}", id)))?;
        log::info!("Removed {} contact '{}' ({})", profile, removed.name, id);
        Ok(removed)
    }

    pub fn set_primary(&self, profile: Profile, id: Uuid) -> EngineResult<u64> {
        let version = self.edit(profile, |contacts| {
            let index = position(contacts, id)?;
            demote_all(contacts);
            contacts[index].is_primary = true;
            Ok(())
        })?;

        log::info!("Primary {} contact set to {}", profile, id);
        Ok(version)
    }

    /// Replace a profile's whole list (settings restore)
    pub fn replace(&self, profile: Profile, contacts: Vec<Contact>) -> EngineResult<u64> {
        let primaries = contacts.iter().filter(|c| c.is_primary).count();
        if primaries > 1 {
            return Err(ConfigError::new(
                "is_primary",
                format!("{} primary contacts; at most one is allowed", primaries),
            )
            .into());
        }
        for contact in &contacts {
            NewContact {
                name: contact.name.clone(),
                phone: contact.phone.clone(),
                relation: contact.relation.clone(),
                is_primary: contact.is_primary,
            }
            .validate()?;
        }

        self.edit(profile, move |current| {
            *current = contacts;
            Ok(())
        })
    }

    /// Clone-modify-swap of one profile's list. Nothing is stored if `apply` fails.
    fn edit(
        &self,
        profile: Profile,
        apply: impl FnOnce(&mut Vec<Contact>) -> EngineResult<()>,
    ) -> EngineResult<u64> {
        let mut guard = self.current.write();
        let mut contacts = Vec::clone(guard.contacts(profile));
        apply(&mut contacts)?;

        let mut next = DirectoryState::clone(&guard);
        match profile {
            Profile::Adult => next.adult = Arc::new(contacts),
            Profile::Kid => next.kid = Arc::new(contacts),
        }
        next.version = guard.version + 1;
        let version = next.version;
        *guard = Arc::new(next);
        Ok(version)
    }
}

impl Default for ContactDirectory {
    fn default() -> Self {
        Self::new()
    }
}

fn position(contacts: &[Contact], id: Uuid) -> EngineResult<usize> {
    contacts
        .iter()
        .position(|c| c.id == id)
        .ok_or_else(|| EngineError::NotFound(format!("contact {}", id)))
}

fn demote_all(contacts: &mut [Contact]) {
    for contact in contacts.iter_mut() {
        contact.is_primary = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primaries(directory: &ContactDirectory) -> usize {
        directory.list(Profile::Adult).iter().filter(|c| c.is_primary).count()
    }

    #[test]
    fn test_add_primary_demotes_previous() {
        let directory = ContactDirectory::new();
        let mom = directory
            .add(Profile::Adult, NewContact::new("Mom", "+1 555 0100", "Mother").primary())
            .unwrap();
        let dad = directory
            .add(Profile::Adult, NewContact::new("Dad", "+1 555 0101", "Father").primary())
            .unwrap();

        assert_eq!(primaries(&directory), 1);
        let list = directory.list(Profile::Adult);
        assert!(!list.iter().find(|c| c.id == mom.id).unwrap().is_primary);
        assert!(list.iter().find(|c| c.id == dad.id).unwrap().is_primary);
    }

    #[test]
    fn test_remove_primary_does_not_promote() {
        let directory = ContactDirectory::new();
        let mom = directory
            .add(Profile::Adult, NewContact::new("Mom", "+1 555 0100", "Mother").primary())
            .unwrap();
        directory
            .add(Profile::Adult, NewContact::new("Sister", "+1 555 0102", "Sister"))
            .unwrap();

        directory.remove(Profile::Adult, mom.id).unwrap();
        assert_eq!(directory.list(Profile::Adult).len(), 1);
        assert_eq!(primaries(&directory), 0);
    }

    #[test]
    fn test_missing_contact_is_not_found() {
        let directory = ContactDirectory::new();
        let version = directory.version();
        assert!(matches!(
            directory.remove(Profile::Adult, Uuid::new_v4()),
            Err(EngineError::NotFound(_))
        ));
        assert!(matches!(
            directory.set_primary(Profile::Kid, Uuid::new_v4()),
            Err(EngineError::NotFound(_))
        ));
        assert_eq!(directory.version(), version);
    }

    #[test]
    fn test_blank_fields_rejected() {
        let directory = ContactDirectory::new();
        let result = directory.add(Profile::Adult, NewContact::new("  ", "+1 555 0100", ""));
        assert!(matches!(result, Err(EngineError::ConfigInvalid(_))));
        let result = directory.add(Profile::Adult, NewContact::new("Mom", "", ""));
        assert!(matches!(result, Err(EngineError::ConfigInvalid(_))));
    }

    #[test]
    fn test_update_keeps_position() {
        let directory = ContactDirectory::new();
        let first = directory.add(Profile::Kid, NewContact::new("Mom", "1", "Mother")).unwrap();
        directory.add(Profile::Kid, NewContact::new("Dad", "2", "Father")).unwrap();

        let updated = directory
            .update(Profile::Kid, first.id, NewContact::new("Mom", "3", "Mother").primary())
            .unwrap();
        assert_eq!(updated.id, first.id);

        let list = directory.list(Profile::Kid);
        assert_eq!(list[0].phone, "3");
        assert!(list[0].is_primary);
        // Profiles are independent
        assert!(directory.list(Profile::Adult).is_empty());
    }

    #[test]
    fn test_cascade_order_primary_first() {
        let directory = ContactDirectory::new();
        directory.add(Profile::Adult, NewContact::new("A", "1", "")).unwrap();
        directory.add(Profile::Adult, NewContact::new("B", "2", "")).unwrap();
        directory.add(Profile::Adult, NewContact::new("C", "3", "").primary()).unwrap();

        let order: Vec<String> = cascade_order(&directory.list(Profile::Adult))
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(order, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_replace_rejects_two_primaries() {
        let directory = ContactDirectory::new();
        let contacts = vec![
            NewContact::new("A", "1", "").primary().into_contact(Uuid::new_v4()),
            NewContact::new("B", "2", "").primary().into_contact(Uuid::new_v4()),
        ];
        assert!(directory.replace(Profile::Adult, contacts).is_err());
    }
}
