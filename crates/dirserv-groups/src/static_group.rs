//! Static groups: explicit member lists with nesting.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

use dirserv_core::{
    DirectoryStore, Dn, Entry, Error, Modification, Result, SearchFilter, SearchScope,
};

use crate::group::{Group, GroupDefinition, GroupKind};
use crate::manager::RegistryHandle;
use crate::member_list::{MemberConstraint, MemberList};
use crate::schema::{
    ATTR_MEMBER, ATTR_UNIQUE_MEMBER, OC_GROUP_OF_NAMES, OC_GROUP_OF_UNIQUE_NAMES,
    OC_VIRTUAL_STATIC_GROUP,
};

/// A group whose membership is the literal member list on its entry,
/// plus whatever any nested groups resolve to.
pub struct StaticGroup {
    dn: Dn,
    store: Arc<dyn DirectoryStore>,
    registry: RegistryHandle,
}

impl StaticGroup {
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

    /// Which attribute carries members, per the entry's object classes.
    fn member_attribute(entry: &Entry) -> &'static str {
        if entry.has_object_class(OC_GROUP_OF_UNIQUE_NAMES) {
            ATTR_UNIQUE_MEMBER
        } else {
            ATTR_MEMBER
        }
    }

    /// Member values of the entry as DNs; unparseable values are skipped.
    fn member_dns(entry: &Entry) -> Vec<Dn> {
        entry
            .values(Self::member_attribute(entry))
            .iter()
            .filter_map(|value| match Dn::parse(value) {
                Ok(dn) => Some(dn),
                Err(err) => {
                    warn!(group = %entry.dn(), member = %value, %err, "skipping unparseable member value");
                    None
                }
            })
            .collect()
    }

}

impl Group for StaticGroup {
    fn dn(&self) -> &Dn {
        &self.dn
    }

    fn kind(&self) -> GroupKind {
        GroupKind::Static
    }

    fn is_member_in(&self, candidate: &Dn, examined: &mut HashSet<Dn>) -> Result<bool> {
        let entry = self.backing_entry()?;
        examined.insert(self.dn.clone());

        let members = Self::member_dns(&entry);
        if members.iter().any(|member| member == candidate) {
            return Ok(true);
        }
        for member in members {
            if examined.contains(&member) {
                continue;
            }
            if let Some(nested) = self.registry.get(&member) {
                if nested.is_member_in(candidate, examined)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
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
        let entry = self.backing_entry()?;
        examined.insert(self.dn.clone());

        let direct = Self::member_dns(&entry);
        let mut seen: HashSet<Dn> = HashSet::new();
        let mut result = Vec::new();
        for member in &direct {
            if seen.insert(member.clone()) {
                result.push(member.clone());
            }
        }

        for member in direct {
            if examined.contains(&member) {
                continue;
            }
            if let Some(nested) = self.registry.get(&member) {
                for resolved in nested.member_dns_in(examined)? {
                    if seen.insert(resolved.clone()) {
                        result.push(resolved);
                    }
                }
            }
        }
        Ok(result)
    }

    fn nested_group_dns(&self) -> Result<Vec<Dn>> {
        let entry = self.backing_entry()?;
        Ok(Self::member_dns(&entry)
            .into_iter()
            .filter(|member| self.registry.get(member).is_some())
            .collect())
    }

    fn add_nested_group(&self, group_dn: &Dn) -> Result<()> {
        let entry = self.backing_entry()?;
        let attribute = Self::member_attribute(&entry);
        self.store.apply_modify(
            &self.dn,
            &[Modification::add_value(attribute, group_dn.to_string())],
        )
    }

    fn remove_nested_group(&self, group_dn: &Dn) -> Result<()> {
        let entry = self.backing_entry()?;
        let attribute = Self::member_attribute(&entry);
        self.store.apply_modify(
            &self.dn,
            &[Modification::delete_value(attribute, group_dn.to_string())],
        )
    }

    fn add_member(&self, entry: &Entry) -> Result<()> {
        let backing = self.backing_entry()?;
        let attribute = Self::member_attribute(&backing);
        self.store.apply_modify(
            &self.dn,
            &[Modification::add_value(attribute, entry.dn().to_string())],
        )
    }

    fn remove_member(&self, member_dn: &Dn) -> Result<()> {
        let backing = self.backing_entry()?;
        let attribute = Self::member_attribute(&backing);
        self.store.apply_modify(
            &self.dn,
            &[Modification::delete_value(attribute, member_dn.to_string())],
        )
    }

    fn supports_nested_groups(&self) -> bool {
        true
    }

    fn may_alter_member_list(&self) -> bool {
        true
    }
}

/// Recognizes `groupOfNames` and `groupOfUniqueNames` entries, except
/// those that are virtual static groups.
#[derive(Debug, Default)]
pub struct StaticGroupDefinition;

impl GroupDefinition for StaticGroupDefinition {
    fn kind(&self) -> GroupKind {
        GroupKind::Static
    }

    fn definition_filter(&self) -> SearchFilter {
        SearchFilter::And(vec![
            SearchFilter::Or(vec![
                SearchFilter::object_class(OC_GROUP_OF_NAMES),
                SearchFilter::object_class(OC_GROUP_OF_UNIQUE_NAMES),
            ]),
            SearchFilter::Not(Box::new(SearchFilter::object_class(
                OC_VIRTUAL_STATIC_GROUP,
            ))),
        ])
    }

    fn is_group_definition(&self, entry: &Entry) -> bool {
        (entry.has_object_class(OC_GROUP_OF_NAMES)
            || entry.has_object_class(OC_GROUP_OF_UNIQUE_NAMES))
            && !entry.has_object_class(OC_VIRTUAL_STATIC_GROUP)
    }

    fn new_instance(
        &self,
        store: Arc<dyn DirectoryStore>,
        registry: RegistryHandle,
        entry: &Entry,
    ) -> Result<Arc<dyn Group>> {
        Ok(Arc::new(StaticGroup::new(
            store,
            registry,
            entry.dn().clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirserv_core::MemoryDirectory;

    fn dn(s: &str) -> Dn {
        Dn::parse(s).unwrap()
    }

    fn group_entry(cn: &str, members: &[&str]) -> Entry {
        Entry::builder(dn(&format!("cn={cn},ou=Groups,o=test")))
            .attr("objectClass", ["top", "groupOfNames"])
            .attr("cn", [cn])
            .attr("member", members.iter().copied())
            .build()
    }

    fn store_with(entries: Vec<Entry>) -> Arc<MemoryDirectory> {
        let store = Arc::new(MemoryDirectory::new());
        for entry in entries {
            store.add_entry(entry).unwrap();
        }
        store
    }

    #[test]
    fn direct_membership() {
        let store = store_with(vec![group_entry("g1", &["uid=u1,ou=People,o=test"])]);
        let group = StaticGroup::new(
            store,
            RegistryHandle::detached(),
            dn("cn=g1,ou=Groups,o=test"),
        );

        assert!(group.is_member(&dn("uid=u1,ou=People,o=test")).unwrap());
        assert!(group.is_member(&dn("UID=U1,ou=people,o=test")).unwrap());
        assert!(!group.is_member(&dn("uid=u2,ou=People,o=test")).unwrap());
    }

    #[test]
    fn detached_group_fails_every_call() {
        let store = store_with(vec![]);
        let group = StaticGroup::new(
            store,
            RegistryHandle::detached(),
            dn("cn=gone,ou=Groups,o=test"),
        );

        assert!(matches!(
            group.is_member(&dn("uid=u1,ou=People,o=test")),
            Err(Error::GroupDetached(_))
        ));
        assert!(matches!(group.members(), Err(Error::GroupDetached(_))));
        assert!(matches!(
            group.nested_group_dns(),
            Err(Error::GroupDetached(_))
        ));
        assert!(matches!(
            group.add_nested_group(&dn("cn=g2,ou=Groups,o=test")),
            Err(Error::GroupDetached(_))
        ));
    }

    #[test]
    fn unique_member_attribute_is_honored() {
        let entry = Entry::builder(dn("cn=ug,ou=Groups,o=test"))
            .attr("objectClass", ["top", "groupOfUniqueNames"])
            .attr("cn", ["ug"])
            .attr("uniqueMember", ["uid=u1,ou=People,o=test"])
            .build();
        let store = store_with(vec![entry]);
        let group = StaticGroup::new(
            store,
            RegistryHandle::detached(),
            dn("cn=ug,ou=Groups,o=test"),
        );

        assert!(group.is_member(&dn("uid=u1,ou=People,o=test")).unwrap());
    }

    #[test]
    fn unparseable_member_values_are_skipped() {
        let entry = Entry::builder(dn("cn=g1,ou=Groups,o=test"))
            .attr("objectClass", ["top", "groupOfNames"])
            .attr("cn", ["g1"])
            .attr("member", ["not a dn", "uid=u1,ou=People,o=test"])
            .build();
        let store = store_with(vec![entry]);
        let group = StaticGroup::new(
            store,
            RegistryHandle::detached(),
            dn("cn=g1,ou=Groups,o=test"),
        );

        assert!(group.is_member(&dn("uid=u1,ou=People,o=test")).unwrap());
        let members = group.member_dns_in(&mut HashSet::new()).unwrap();
        assert_eq!(members, vec![dn("uid=u1,ou=People,o=test")]);
    }

    #[test]
    fn write_through_mutation_is_not_idempotent() {
        let store = store_with(vec![group_entry("g1", &["uid=u1,ou=People,o=test"])]);
        let group = StaticGroup::new(
            store.clone(),
            RegistryHandle::detached(),
            dn("cn=g1,ou=Groups,o=test"),
        );

        let user = Entry::builder(dn("uid=u2,ou=People,o=test"))
            .attr("objectClass", ["top", "person"])
            .build();
        group.add_member(&user).unwrap();
        assert!(group.is_member(user.dn()).unwrap());
        assert!(matches!(
            group.add_member(&user),
            Err(Error::ModifyRejected { .. })
        ));

        group.remove_member(user.dn()).unwrap();
        assert!(!group.is_member(user.dn()).unwrap());
        assert!(matches!(
            group.remove_member(user.dn()),
            Err(Error::ModifyRejected { .. })
        ));
    }

    #[test]
    fn static_definition_excludes_virtual_static_entries() {
        let definition = StaticGroupDefinition;
        assert!(definition.is_group_definition(&group_entry("g1", &[])));

        let virtual_entry = Entry::builder(dn("cn=v,ou=Groups,o=test"))
            .attr(
                "objectClass",
                ["top", "groupOfNames", "ds-virtual-static-group"],
            )
            .build();
        assert!(!definition.is_group_definition(&virtual_entry));
    }

    #[test]
    fn reads_are_live_not_cached() {
        let store = store_with(vec![group_entry("g1", &["uid=u1,ou=People,o=test"])]);
        let group = StaticGroup::new(
            store.clone(),
            RegistryHandle::detached(),
            dn("cn=g1,ou=Groups,o=test"),
        );

        assert!(!group.is_member(&dn("uid=u2,ou=People,o=test")).unwrap());
        store
            .apply_modify(
                &dn("cn=g1,ou=Groups,o=test"),
                &[Modification::add_value("member", "uid=u2,ou=People,o=test")],
            )
            .unwrap();
        assert!(group.is_member(&dn("uid=u2,ou=People,o=test")).unwrap());
    }
}
