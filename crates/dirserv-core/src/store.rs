//! The backend seam: entry lookup, search, modification and change
//! notifications.
//!
//! Everything above this trait (group resolution included) reads the
//! directory live through it; nothing caches entry state.

use std::sync::Arc;

use crate::dn::Dn;
use crate::entry::{Entry, Modification};
use crate::error::Result;
use crate::filter::SearchFilter;
use crate::scope::SearchScope;

/// Synchronous access to the entry store.
///
/// Implementations must be safe to call from many operation threads at
/// once; all calls block until the backend answers.
#[cfg_attr(test, mockall::automock)]
pub trait DirectoryStore: Send + Sync {
    /// Fetches the entry with the given DN, or `None` if it does not exist.
    fn get_entry(&self, dn: &Dn) -> Option<Entry>;

    /// Returns every entry within `scope` of `base` matching `filter`.
    fn search(&self, base: &Dn, scope: SearchScope, filter: &SearchFilter) -> Vec<Entry>;

    /// Applies the attribute changes to the entry with the given DN.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NoSuchEntry`] if the entry does not exist and
    /// [`crate::Error::ModifyRejected`] if the backend refuses the change.
    fn apply_modify(&self, dn: &Dn, changes: &[Modification]) -> Result<()>;

    /// Registers a listener notified after each successful mutation.
    fn subscribe(&self, listener: Arc<dyn ChangeListener>);
}

/// Callbacks fired by a [`DirectoryStore`] after successful mutations.
///
/// Listeners run on the mutating thread, after the store has released its
/// own locks, so they may read back through the store.
pub trait ChangeListener: Send + Sync {
    /// An entry was added.
    fn entry_added(&self, entry: &Entry);

    /// An entry's attributes were changed.
    fn entry_modified(&self, old_entry: &Entry, new_entry: &Entry);

    /// An entry was deleted.
    fn entry_deleted(&self, entry: &Entry);

    /// An entry was renamed; `new_entry` holds its post-rename state.
    fn entry_renamed(&self, old_dn: &Dn, new_entry: &Entry);
}
