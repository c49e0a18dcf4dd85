//! The group capability contract and the per-variant factory seam.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use dirserv_core::{Dn, Entry, Result, SearchFilter, SearchScope};

use crate::manager::RegistryHandle;
use crate::member_list::MemberList;

/// The variant of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupKind {
    /// Explicit member list on the backing entry.
    Static,
    /// Membership derived from one or more membership URLs.
    Dynamic,
    /// Behaves like a static group but delegates to a target group.
    VirtualStatic,
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => f.write_str("static"),
            Self::Dynamic => f.write_str("dynamic"),
            Self::VirtualStatic => f.write_str("virtual-static"),
        }
    }
}

/// A live view over one group entry.
///
/// Instances hold no membership state: every call re-reads the directory,
/// so answers always reflect the current entry content. Any call made
/// after the backing entry has been deleted fails with
/// [`dirserv_core::Error::GroupDetached`]; it is never downgraded to an
/// empty answer.
pub trait Group: Send + Sync {
    /// The DN of the backing entry.
    fn dn(&self) -> &Dn;

    /// Which variant this instance is.
    fn kind(&self) -> GroupKind;

    /// Returns true if `candidate` is a member, resolving nested groups.
    ///
    /// # Errors
    ///
    /// Fails with `GroupDetached` if the backing entry no longer exists.
    fn is_member(&self, candidate: &Dn) -> Result<bool> {
        self.is_member_in(candidate, &mut HashSet::new())
    }

    /// Membership test carrying the set of groups already examined on this
    /// resolution path. A group whose DN is already in `examined`
    /// contributes nothing, which bounds traversal on cyclic nesting.
    fn is_member_in(&self, candidate: &Dn, examined: &mut HashSet<Dn>) -> Result<bool>;

    /// Enumerates all member DNs, including non-cyclic nested resolution.
    ///
    /// # Errors
    ///
    /// Fails with `GroupDetached` if the backing entry no longer exists.
    fn members(&self) -> Result<MemberList>;

    /// Enumerates only the members within `scope` of `base` that match
    /// `filter`; always a subset of [`Group::members`].
    ///
    /// # Errors
    ///
    /// Fails with `GroupDetached` if the backing entry no longer exists.
    fn members_within(
        &self,
        base: &Dn,
        scope: SearchScope,
        filter: &SearchFilter,
    ) -> Result<MemberList>;

    /// DN enumeration carrying the examined set, for nested expansion.
    fn member_dns_in(&self, examined: &mut HashSet<Dn>) -> Result<Vec<Dn>>;

    /// The DNs of groups nested inside this one. Empty for variants
    /// without nesting.
    ///
    /// # Errors
    ///
    /// Fails with `GroupDetached` if the backing entry no longer exists.
    fn nested_group_dns(&self) -> Result<Vec<Dn>>;

    /// Nests `group_dn` inside this group, writing through to the backing
    /// entry.
    ///
    /// # Errors
    ///
    /// Fails with `UnsupportedOperation` if the variant does not nest,
    /// `ModifyRejected` if the DN is already nested or the backend refuses
    /// the write, and `GroupDetached` if the backing entry is gone.
    fn add_nested_group(&self, group_dn: &Dn) -> Result<()>;

    /// Removes `group_dn` from the nested groups, writing through.
    ///
    /// # Errors
    ///
    /// As [`Group::add_nested_group`]; rejected if the DN is not nested.
    fn remove_nested_group(&self, group_dn: &Dn) -> Result<()>;

    /// Adds `entry` as a direct member, writing through.
    ///
    /// # Errors
    ///
    /// Fails with `UnsupportedOperation` for variants without a mutable
    /// member list; otherwise as [`Group::add_nested_group`].
    fn add_member(&self, entry: &Entry) -> Result<()>;

    /// Removes the direct member with the given DN, writing through.
    ///
    /// # Errors
    ///
    /// As [`Group::add_member`].
    fn remove_member(&self, member_dn: &Dn) -> Result<()>;

    /// Whether this variant supports nested groups.
    fn supports_nested_groups(&self) -> bool;

    /// Whether this variant supports member add/remove.
    fn may_alter_member_list(&self) -> bool;
}

/// Recognizes group entries of one variant and constructs instances.
///
/// Definitions are registered with the
/// [`GroupManager`](crate::manager::GroupManager); recognition is driven
/// purely by object classes on the current entry content.
pub trait GroupDefinition: Send + Sync {
    /// The variant this definition produces.
    fn kind(&self) -> GroupKind;

    /// Search filter selecting all entries of this variant, used for the
    /// startup full scan.
    fn definition_filter(&self) -> SearchFilter;

    /// Returns true if the entry defines a group of this variant.
    fn is_group_definition(&self, entry: &Entry) -> bool;

    /// Builds a live group instance over the entry.
    ///
    /// # Errors
    ///
    /// Fails if the entry cannot back a group of this variant.
    fn new_instance(
        &self,
        store: Arc<dyn dirserv_core::DirectoryStore>,
        registry: RegistryHandle,
        entry: &Entry,
    ) -> Result<Arc<dyn Group>>;
}
