//! Lazy, fault-tolerant enumeration of group members.

use std::collections::VecDeque;
use std::sync::Arc;

use dirserv_core::{DirectoryStore, Dn, Entry, Error, Result, SearchFilter, SearchScope};

/// Narrows a member list to entries within a base/scope matching a filter.
#[derive(Debug, Clone)]
pub struct MemberConstraint {
    base: Dn,
    scope: SearchScope,
    filter: SearchFilter,
}

impl MemberConstraint {
    /// Creates a constraint.
    #[must_use]
    pub fn new(base: Dn, scope: SearchScope, filter: SearchFilter) -> Self {
        Self {
            base,
            scope,
            filter,
        }
    }

    fn admits(&self, entry: &Entry) -> bool {
        self.scope.contains(&self.base, entry.dn()) && self.filter.matches(entry)
    }
}

enum Item {
    /// A member reference still to be resolved against the store.
    Reference(Dn),
    /// A member already resolved (dynamic search results).
    Resolved(Entry),
}

/// A single-use enumerator over a group's resolved membership.
///
/// The list is consumed front to back; a member reference that no longer
/// resolves fails that one element with
/// [`Error::DanglingMember`] and the list stays usable. Call
/// [`MemberList::close`] on every exit path; dropping the list closes it
/// as a backstop.
pub struct MemberList {
    store: Arc<dyn DirectoryStore>,
    items: VecDeque<Item>,
    /// Outcome of the next element, computed ahead so `has_more_members`
    /// can answer without consuming anything.
    pending: Option<Result<Entry>>,
    constraint: Option<MemberConstraint>,
    closed: bool,
}

impl MemberList {
    /// Builds a list over member DN references, resolved lazily.
    #[must_use]
    pub fn from_refs(
        store: Arc<dyn DirectoryStore>,
        member_dns: Vec<Dn>,
        constraint: Option<MemberConstraint>,
    ) -> Self {
        Self {
            store,
            items: member_dns.into_iter().map(Item::Reference).collect(),
            pending: None,
            constraint,
            closed: false,
        }
    }

    /// Builds a list over entries already resolved by a search.
    #[must_use]
    pub fn from_entries(store: Arc<dyn DirectoryStore>, entries: Vec<Entry>) -> Self {
        Self {
            store,
            items: entries.into_iter().map(Item::Resolved).collect(),
            pending: None,
            constraint: None,
            closed: false,
        }
    }

    /// Returns true if another element remains. Does not advance.
    pub fn has_more_members(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.prefetch();
        self.pending.is_some()
    }

    /// Consumes the next element and returns its DN, or `None` at the end
    /// of the sequence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DanglingMember`] if the element's entry cannot be
    /// resolved; only that element is lost.
    pub fn next_dn(&mut self) -> Result<Option<Dn>> {
        Ok(self.next_entry()?.map(|entry| entry.dn().clone()))
    }

    /// Consumes the next element and returns its full entry, or `None` at
    /// the end of the sequence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DanglingMember`] if the element's entry cannot be
    /// resolved; only that element is lost.
    pub fn next_entry(&mut self) -> Result<Option<Entry>> {
        if self.closed {
            return Ok(None);
        }
        self.prefetch();
        match self.pending.take() {
            None => Ok(None),
            Some(Ok(entry)) => Ok(Some(entry)),
            Some(Err(err)) => Err(err),
        }
    }

    /// Releases the list. Safe to call at any point, more than once.
    pub fn close(&mut self) {
        self.closed = true;
        self.items.clear();
        self.pending = None;
    }

    /// Works the queue until the next deliverable outcome is staged.
    /// Members excluded by the constraint are skipped silently; a member
    /// that fails to resolve is staged as that element's error.
    fn prefetch(&mut self) {
        while self.pending.is_none() {
            let Some(item) = self.items.pop_front() else {
                return;
            };
            match item {
                Item::Resolved(entry) => {
                    self.pending = Some(Ok(entry));
                }
                Item::Reference(dn) => match self.store.get_entry(&dn) {
                    Some(entry) => {
                        let admitted = self
                            .constraint
                            .as_ref()
                            .map_or(true, |constraint| constraint.admits(&entry));
                        if admitted {
                            self.pending = Some(Ok(entry));
                        }
                    }
                    None => {
                        self.pending = Some(Err(Error::DanglingMember(dn.to_string())));
                    }
                },
            }
        }
    }
}

impl Drop for MemberList {
    fn drop(&mut self) {
        self.close();
    }
}
