//! Virtual static groups: static-looking views over a target group.

use std::collections::HashSet;
use std::sync::Arc;

use dirserv_core::{DirectoryStore, Dn, Entry, Error, Result, SearchFilter, SearchScope};

use crate::group::{Group, GroupDefinition, GroupKind};
use crate::manager::RegistryHandle;
use crate::member_list::{MemberConstraint, MemberList};
use crate::schema::{ATTR_TARGET_GROUP_DN, OC_VIRTUAL_STATIC_GROUP};

/// A group entry that exposes another group's membership as its own.
///
/// For membership purposes it is indistinguishable from a static group;
/// its member list is derived from the target group rather than stored,
/// so direct member mutation is unsupported.
pub struct VirtualStaticGroup {
    dn: Dn,
    store: Arc<dyn DirectoryStore>,
    registry: RegistryHandle,
}

impl VirtualStaticGroup {
    /// Creates a live view over the group entry at `dn`.
    #[must_use]
    pub fn new(store: Arc<dyn DirectoryStore>, registry: RegistryHandle, dn: Dn) -> Self {
        Self {
            dn,
            store,
            registry,
        }
    }

    fn backing_entry(&self) -> Result<Entry> {
        self.store
            .get_entry(&self.dn)
            .ok_or_else(|| Error::GroupDetached(self.dn.to_string()))
    }

    /// Resolves the target group from the live entry.
    fn target(&self) -> Result<Arc<dyn Group>> {
        let entry = self.backing_entry()?;
        let target_text = entry.first(ATTR_TARGET_GROUP_DN).ok_or_else(|| {
            Error::NoSuchEntry(format!(
                "virtual static group {} has no target group attribute",
                self.dn
            ))
        })?;
        let target_dn = Dn::parse(target_text)
            .map_err(|err| Error::InvalidDn(format!("{target_text}: {err}")))?;
        self.registry
            .get(&target_dn)
            .ok_or_else(|| Error::NoSuchEntry(format!("target group {target_dn} is not defined")))
    }
}

impl Group for VirtualStaticGroup {
    fn dn(&self) -> &Dn {
        &self.dn
    }

    fn kind(&self) -> GroupKind {
        GroupKind::VirtualStatic
    }

    fn is_member_in(&self, candidate: &Dn, examined: &mut HashSet<Dn>) -> Result<bool> {
        let target = self.target()?;
        examined.insert(self.dn.clone());
        if examined.contains(target.dn()) {
            return Ok(false);
        }
        target.is_member_in(candidate, examined)
    }

    fn members(&self) -> Result<MemberList> {
        let member_dns = self.member_dns_in(&mut HashSet::new())?;
        Ok(MemberList::from_refs(self.store.clone(), member_dns, None))
    }

    fn members_within(
        &self,
        base: &Dn,
        scope: SearchScope,
        filter: &SearchFilter,
    ) -> Result<MemberList> {
        let member_dns = self.member_dns_in(&mut HashSet::new())?;
        let constraint = MemberConstraint::new(base.clone(), scope, filter.clone());
        Ok(MemberList::from_refs(
            self.store.clone(),
            member_dns,
            Some(constraint),
        ))
    }

    fn member_dns_in(&self, examined: &mut HashSet<Dn>) -> Result<Vec<Dn>> {
        let target = self.target()?;
        examined.insert(self.dn.clone());
        if examined.contains(target.dn()) {
            return Ok(Vec::new());
        }
        target.member_dns_in(examined)
    }

    fn nested_group_dns(&self) -> Result<Vec<Dn>> {
        self.target()?.nested_group_dns()
    }

    fn add_nested_group(&self, group_dn: &Dn) -> Result<()> {
        self.target()?.add_nested_group(group_dn)
    }

    fn remove_nested_group(&self, group_dn: &Dn) -> Result<()> {
        self.target()?.remove_nested_group(group_dn)
    }

    fn add_member(&self, _entry: &Entry) -> Result<()> {
        Err(Error::UnsupportedOperation(
            "virtual static group member lists are derived and cannot be altered".to_string(),
        ))
    }

    fn remove_member(&self, _member_dn: &Dn) -> Result<()> {
        Err(Error::UnsupportedOperation(
            "virtual static group member lists are derived and cannot be altered".to_string(),
        ))
    }

    fn supports_nested_groups(&self) -> bool {
        true
    }

    fn may_alter_member_list(&self) -> bool {
        false
    }
}

/// Recognizes `ds-virtual-static-group` entries.
#[derive(Debug, Default)]
pub struct VirtualStaticGroupDefinition;

impl GroupDefinition for VirtualStaticGroupDefinition {
    fn kind(&self) -> GroupKind {
        GroupKind::VirtualStatic
    }

    fn definition_filter(&self) -> SearchFilter {
        SearchFilter::object_class(OC_VIRTUAL_STATIC_GROUP)
    }

    fn is_group_definition(&self, entry: &Entry) -> bool {
        entry.has_object_class(OC_VIRTUAL_STATIC_GROUP)
    }

    fn new_instance(
        &self,
        store: Arc<dyn DirectoryStore>,
        registry: RegistryHandle,
        entry: &Entry,
    ) -> Result<Arc<dyn Group>> {
        Ok(Arc::new(VirtualStaticGroup::new(
            store,
            registry,
            entry.dn().clone(),
        )))
    }
}
