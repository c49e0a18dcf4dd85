//! In-process directory store.
//!
//! Backs the test suites and small deployments. Mutations take the write
//! lock only for the structural change; change notifications are
//! dispatched after the lock is released so listeners can read back
//! through the store without deadlocking.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::dn::Dn;
use crate::entry::{Entry, Modification};
use crate::error::{Error, Result};
use crate::filter::SearchFilter;
use crate::scope::SearchScope;
use crate::store::{ChangeListener, DirectoryStore};

/// A [`DirectoryStore`] holding all entries in memory.
#[derive(Default)]
pub struct MemoryDirectory {
    entries: RwLock<HashMap<Dn, Entry>>,
    listeners: RwLock<Vec<Arc<dyn ChangeListener>>>,
}

impl MemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntryAlreadyExists`] if an entry with the same DN
    /// is already present.
    pub fn add_entry(&self, entry: Entry) -> Result<()> {
        {
            let mut entries = self.write_entries();
            if entries.contains_key(entry.dn()) {
                return Err(Error::EntryAlreadyExists(entry.dn().to_string()));
            }
            entries.insert(entry.dn().clone(), entry.clone());
        }
        debug!(dn = %entry.dn(), "entry added");
        for listener in self.listener_snapshot() {
            listener.entry_added(&entry);
        }
        Ok(())
    }

    /// Deletes the entry with the given DN.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchEntry`] if no such entry exists.
    pub fn delete_entry(&self, dn: &Dn) -> Result<()> {
        let removed = {
            let mut entries = self.write_entries();
            entries
                .remove(dn)
                .ok_or_else(|| Error::NoSuchEntry(dn.to_string()))?
        };
        debug!(dn = %dn, "entry deleted");
        for listener in self.listener_snapshot() {
            listener.entry_deleted(&removed);
        }
        Ok(())
    }

    /// Moves the entry at `old_dn` to `new_dn`, keeping its attributes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchEntry`] if the source does not exist, or
    /// [`Error::EntryAlreadyExists`] if the target DN is taken.
    pub fn rename_entry(&self, old_dn: &Dn, new_dn: Dn) -> Result<()> {
        let renamed = {
            let mut entries = self.write_entries();
            if entries.contains_key(&new_dn) {
                return Err(Error::EntryAlreadyExists(new_dn.to_string()));
            }
            let entry = entries
                .remove(old_dn)
                .ok_or_else(|| Error::NoSuchEntry(old_dn.to_string()))?;
            let renamed = entry.with_dn(new_dn.clone());
            entries.insert(new_dn, renamed.clone());
            renamed
        };
        debug!(old_dn = %old_dn, new_dn = %renamed.dn(), "entry renamed");
        for listener in self.listener_snapshot() {
            listener.entry_renamed(old_dn, &renamed);
        }
        Ok(())
    }

    /// Number of entries currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    /// Returns true if the directory holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Dn, Entry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Dn, Entry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    fn listener_snapshot(&self) -> Vec<Arc<dyn ChangeListener>> {
        self.listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl DirectoryStore for MemoryDirectory {
    fn get_entry(&self, dn: &Dn) -> Option<Entry> {
        self.read_entries().get(dn).cloned()
    }

    fn search(&self, base: &Dn, scope: SearchScope, filter: &SearchFilter) -> Vec<Entry> {
        self.read_entries()
            .values()
            .filter(|entry| scope.contains(base, entry.dn()) && filter.matches(entry))
            .cloned()
            .collect()
    }

    fn apply_modify(&self, dn: &Dn, changes: &[Modification]) -> Result<()> {
        let (old_entry, new_entry) = {
            let mut entries = self.write_entries();
            let current = entries
                .get(dn)
                .ok_or_else(|| Error::NoSuchEntry(dn.to_string()))?;
            let old_entry = current.clone();
            let mut updated = current.clone();
            for change in changes {
                updated.apply(change).map_err(|reason| Error::ModifyRejected {
                    dn: dn.to_string(),
                    reason: reason.to_string(),
                })?;
            }
            entries.insert(dn.clone(), updated.clone());
            (old_entry, updated)
        };
        debug!(dn = %dn, changes = changes.len(), "entry modified");
        for listener in self.listener_snapshot() {
            listener.entry_modified(&old_entry, &new_entry);
        }
        Ok(())
    }

    fn subscribe(&self, listener: Arc<dyn ChangeListener>) {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }
}
