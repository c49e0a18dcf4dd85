//! Dynamic groups: membership derived from membership URLs.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

use dirserv_core::{DirectoryStore, Dn, Entry, Error, Result, SearchFilter, SearchScope};

use crate::group::{Group, GroupDefinition, GroupKind};
use crate::manager::RegistryHandle;
use crate::member_list::MemberList;
use crate::membership_url::MembershipUrl;
use crate::schema::{ATTR_MEMBER_URL, OC_GROUP_OF_URLS};

/// A group whose members are the union of its membership URL search
/// results. Membership is virtual: nothing is stored on member entries,
/// and the URL set is re-read from the backing entry on every call.
pub struct DynamicGroup {
    dn: Dn,
    store: Arc<dyn DirectoryStore>,
}

impl DynamicGroup {
    /// Creates a live view over the group entry at `dn`.
    #[must_use]
    pub fn new(store: Arc<dyn DirectoryStore>, dn: Dn) -> Self {
        Self { dn, store }
    }

    fn backing_entry(&self) -> Result<Entry> {
        self.store
            .get_entry(&self.dn)
            .ok_or_else(|| Error::GroupDetached(self.dn.to_string()))
    }

    /// Parses the entry's current membership URLs. Malformed values are
    /// dropped, not surfaced: a group whose only URL is malformed simply
    /// has empty membership.
    fn membership_urls(entry: &Entry) -> Vec<MembershipUrl> {
        entry
            .values(ATTR_MEMBER_URL)
            .iter()
            .filter_map(|value| match MembershipUrl::parse(value) {
                Ok(url) => Some(url),
                Err(err) => {
                    warn!(group = %entry.dn(), url = %value, %err, "dropping malformed membership URL");
                    None
                }
            })
            .collect()
    }

    /// Union of all URL search results, deduplicated by DN.
    fn search_members(&self, urls: &[MembershipUrl]) -> Vec<Entry> {
        let mut seen = HashSet::new();
        let mut members = Vec::new();
        for url in urls {
            for entry in self.store.search(url.base(), url.scope(), url.filter()) {
                if seen.insert(entry.dn().clone()) {
                    members.push(entry);
                }
            }
        }
        members
    }
}

impl Group for DynamicGroup {
    fn dn(&self) -> &Dn {
        &self.dn
    }

    fn kind(&self) -> GroupKind {
        GroupKind::Dynamic
    }

    fn is_member_in(&self, candidate: &Dn, examined: &mut HashSet<Dn>) -> Result<bool> {
        let entry = self.backing_entry()?;
        examined.insert(self.dn.clone());

        let Some(candidate_entry) = self.store.get_entry(candidate) else {
            return Ok(false);
        };
        Ok(Self::membership_urls(&entry)
            .iter()
            .any(|url| url.matches(&candidate_entry)))
    }

    fn members(&self) -> Result<MemberList> {
        let entry = self.backing_entry()?;
        let members = self.search_members(&Self::membership_urls(&entry));
        Ok(MemberList::from_entries(self.store.clone(), members))
    }

    fn members_within(
        &self,
        base: &Dn,
        scope: SearchScope,
        filter: &SearchFilter,
    ) -> Result<MemberList> {
        let entry = self.backing_entry()?;

        let mut seen = HashSet::new();
        let mut members = Vec::new();
        for url in Self::membership_urls(&entry) {
            // Narrow each URL's search instead of post-filtering: search
            // from the deeper of the two bases with the conjoined filter.
            // URLs rooted outside the requested base contribute nothing.
            let search_base = if base.is_under(url.base()) {
                base
            } else if url.base().is_under(base) {
                url.base()
            } else {
                continue;
            };
            let combined = url.filter().clone().and_with(filter.clone());
            for candidate in self
                .store
                .search(search_base, SearchScope::Subtree, &combined)
            {
                if url.scope().contains(url.base(), candidate.dn())
                    && scope.contains(base, candidate.dn())
                    && seen.insert(candidate.dn().clone())
                {
                    members.push(candidate);
                }
            }
        }
        Ok(MemberList::from_entries(self.store.clone(), members))
    }

    fn member_dns_in(&self, examined: &mut HashSet<Dn>) -> Result<Vec<Dn>> {
        let entry = self.backing_entry()?;
        examined.insert(self.dn.clone());
        Ok(self
            .search_members(&Self::membership_urls(&entry))
            .into_iter()
            .map(|member| member.dn().clone())
            .collect())
    }

    fn nested_group_dns(&self) -> Result<Vec<Dn>> {
        self.backing_entry()?;
        Ok(Vec::new())
    }

    fn add_nested_group(&self, _group_dn: &Dn) -> Result<()> {
        Err(Error::UnsupportedOperation(
            "dynamic groups do not support nested groups".to_string(),
        ))
    }

    fn remove_nested_group(&self, _group_dn: &Dn) -> Result<()> {
        Err(Error::UnsupportedOperation(
            "dynamic groups do not support nested groups".to_string(),
        ))
    }

    fn add_member(&self, _entry: &Entry) -> Result<()> {
        Err(Error::UnsupportedOperation(
            "dynamic group membership cannot be altered directly".to_string(),
        ))
    }

    fn remove_member(&self, _member_dn: &Dn) -> Result<()> {
        Err(Error::UnsupportedOperation(
            "dynamic group membership cannot be altered directly".to_string(),
        ))
    }

    fn supports_nested_groups(&self) -> bool {
        false
    }

    fn may_alter_member_list(&self) -> bool {
        false
    }
}

/// Recognizes `groupOfURLs` entries.
#[derive(Debug, Default)]
pub struct DynamicGroupDefinition;

impl GroupDefinition for DynamicGroupDefinition {
    fn kind(&self) -> GroupKind {
        GroupKind::Dynamic
    }

    fn definition_filter(&self) -> SearchFilter {
        SearchFilter::object_class(OC_GROUP_OF_URLS)
    }

    fn is_group_definition(&self, entry: &Entry) -> bool {
        entry.has_object_class(OC_GROUP_OF_URLS)
    }

    fn new_instance(
        &self,
        store: Arc<dyn DirectoryStore>,
        _registry: RegistryHandle,
        entry: &Entry,
    ) -> Result<Arc<dyn Group>> {
        // Parse once here so misconfigured URLs get logged at registration
        // time; evaluation always re-reads the live entry regardless.
        DynamicGroup::membership_urls(entry);
        Ok(Arc::new(DynamicGroup::new(store, entry.dn().clone())))
    }
}
