//! The process-wide group registry.
//!
//! One `GroupManager` is constructed at server startup (after the entry
//! store is ready), populated by a full scan, and kept consistent by the
//! store's change notifications. Authorization code asks it membership
//! questions; it is the only entry point other subsystems use.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};
use tracing::{debug, warn};

use dirserv_core::{ChangeListener, DirectoryStore, Dn, Entry, Result, SearchScope};

use crate::config::GroupManagerConfig;
use crate::dynamic_group::DynamicGroupDefinition;
use crate::group::{Group, GroupDefinition, GroupKind};
use crate::static_group::StaticGroupDefinition;
use crate::virtual_static::VirtualStaticGroupDefinition;

/// Shared instance registry, keyed by normalized group DN.
///
/// Lookups take the read lock only; structural mutation takes the write
/// lock only for the map operation itself, so a lookup is never blocked
/// by another group's registration churn.
pub(crate) struct GroupRegistry {
    groups: RwLock<HashMap<Dn, Arc<dyn Group>>>,
}

impl GroupRegistry {
    fn new() -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
        }
    }

    fn get(&self, dn: &Dn) -> Option<Arc<dyn Group>> {
        self.groups
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(dn)
            .cloned()
    }

    fn snapshot(&self) -> Vec<Arc<dyn Group>> {
        self.groups
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    fn insert(&self, group: Arc<dyn Group>) {
        self.groups
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(group.dn().clone(), group);
    }

    fn remove(&self, dn: &Dn) -> Option<Arc<dyn Group>> {
        self.groups
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(dn)
    }

    /// Removes `old_dn` and inserts `group` under its new DN in one
    /// critical section, so no reader observes the group half-moved.
    fn replace(&self, old_dn: &Dn, group: Arc<dyn Group>) {
        let mut groups = self.groups.write().unwrap_or_else(|e| e.into_inner());
        groups.remove(old_dn);
        groups.insert(group.dn().clone(), group);
    }

    fn clear(&self) {
        self.groups
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

/// A weak lookup handle onto the registry, held by group instances for
/// nested-group resolution. Weak so that instances stored in the registry
/// do not keep it alive.
#[derive(Clone)]
pub struct RegistryHandle {
    inner: Weak<GroupRegistry>,
}

impl RegistryHandle {
    fn new(registry: &Arc<GroupRegistry>) -> Self {
        Self {
            inner: Arc::downgrade(registry),
        }
    }

    /// A handle that resolves nothing; nested references are then treated
    /// as plain members.
    #[must_use]
    pub fn detached() -> Self {
        Self { inner: Weak::new() }
    }

    /// Looks up the live group registered under `dn`, if any.
    #[must_use]
    pub fn get(&self, dn: &Dn) -> Option<Arc<dyn Group>> {
        self.inner.upgrade().and_then(|registry| registry.get(dn))
    }
}

/// Tracks every group defined in the directory and answers membership
/// queries against the live entry store.
pub struct GroupManager {
    store: Arc<dyn DirectoryStore>,
    config: GroupManagerConfig,
    definitions: RwLock<Vec<Arc<dyn GroupDefinition>>>,
    registry: Arc<GroupRegistry>,
}

impl GroupManager {
    /// Creates a manager, subscribes it to the store's change
    /// notifications, and populates the registry with a full scan of the
    /// configured bases.
    pub fn start(store: Arc<dyn DirectoryStore>, config: GroupManagerConfig) -> Arc<Self> {
        let manager = Arc::new(Self::new(store, config));
        manager
            .store
            .subscribe(Arc::clone(&manager) as Arc<dyn ChangeListener>);
        manager.synchronize();
        manager
    }

    /// Creates a manager without subscribing or scanning.
    #[must_use]
    pub fn new(store: Arc<dyn DirectoryStore>, config: GroupManagerConfig) -> Self {
        let manager = Self {
            store,
            config,
            definitions: RwLock::new(Vec::new()),
            registry: Arc::new(GroupRegistry::new()),
        };
        if manager.config.builtin_definitions() {
            manager.register_definition(Arc::new(StaticGroupDefinition));
            manager.register_definition(Arc::new(DynamicGroupDefinition));
            manager.register_definition(Arc::new(VirtualStaticGroupDefinition));
        }
        manager
    }

    /// Registers a group definition. Entries matching it become eligible
    /// for registration from this point on; call
    /// [`GroupManager::synchronize`] to pick up pre-existing entries.
    pub fn register_definition(&self, definition: Arc<dyn GroupDefinition>) {
        self.definitions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(definition);
    }

    /// The registered definitions, for introspection.
    #[must_use]
    pub fn definitions(&self) -> Vec<Arc<dyn GroupDefinition>> {
        self.definitions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The group registered under `dn`, or `None` if no live group with
    /// that identity exists. Never fails.
    #[must_use]
    pub fn group_instance(&self, dn: &Dn) -> Option<Arc<dyn Group>> {
        self.registry.get(dn)
    }

    /// A point-in-time snapshot of all registered groups, safe to iterate
    /// while the registry changes underneath.
    #[must_use]
    pub fn group_instances(&self) -> Vec<Arc<dyn Group>> {
        self.registry.snapshot()
    }

    /// A lookup handle suitable for constructing group instances.
    #[must_use]
    pub fn registry_handle(&self) -> RegistryHandle {
        RegistryHandle::new(&self.registry)
    }

    /// Clears the registry without touching the directory. Used for
    /// re-synchronization and shutdown, not normal operation.
    pub fn deregister_all(&self) {
        self.registry.clear();
        debug!("deregistered all groups");
    }

    /// Scans the configured bases and registers every entry matching a
    /// registered definition.
    pub fn synchronize(&self) {
        for definition in self.definitions() {
            let filter = definition.definition_filter();
            for base in self.config.scan_bases() {
                for entry in self.store.search(base, SearchScope::Subtree, &filter) {
                    self.create_and_register(&entry);
                }
            }
        }
    }

    /// Returns true if `candidate` is currently a member of the group
    /// registered under `group_dn`. An unregistered DN is simply not a
    /// group: the answer is false, not an error.
    ///
    /// # Errors
    ///
    /// Propagates resolution failures from the group itself.
    pub fn is_member_of(&self, candidate: &Dn, group_dn: &Dn) -> Result<bool> {
        match self.registry.get(group_dn) {
            Some(group) => group.is_member(candidate),
            None => Ok(false),
        }
    }

    /// All groups the candidate is currently a member of. Groups that
    /// fail to resolve (e.g. deleted mid-iteration) are skipped.
    #[must_use]
    pub fn groups_for(&self, candidate: &Dn) -> Vec<Arc<dyn Group>> {
        self.registry
            .snapshot()
            .into_iter()
            .filter(|group| match group.is_member(candidate) {
                Ok(is_member) => is_member,
                Err(err) => {
                    debug!(group = %group.dn(), %err, "skipping group during membership sweep");
                    false
                }
            })
            .collect()
    }

    /// Builds and registers an instance if the entry matches a
    /// registered definition. Returns true if a registration happened.
    fn create_and_register(&self, entry: &Entry) -> bool {
        for definition in self.definitions() {
            if !definition.is_group_definition(entry) {
                continue;
            }
            match definition.new_instance(
                self.store.clone(),
                self.registry_handle(),
                entry,
            ) {
                Ok(group) => {
                    debug!(dn = %entry.dn(), kind = %definition.kind(), "registered group");
                    self.registry.insert(group);
                    return true;
                }
                Err(err) => {
                    warn!(dn = %entry.dn(), kind = %definition.kind(), %err, "failed to instantiate group");
                    return false;
                }
            }
        }
        false
    }

    fn definition_kind_for(&self, entry: &Entry) -> Option<GroupKind> {
        self.definitions()
            .into_iter()
            .find(|definition| definition.is_group_definition(entry))
            .map(|definition| definition.kind())
    }
}

impl ChangeListener for GroupManager {
    fn entry_added(&self, entry: &Entry) {
        self.create_and_register(entry);
    }

    fn entry_modified(&self, old_entry: &Entry, new_entry: &Entry) {
        // Registration is decided on the post-modify entry state. Content
        // changes on an already-registered group need no registry action,
        // but a variant change must swap the instance.
        let registered = self.registry.get(new_entry.dn());
        match self.definition_kind_for(new_entry) {
            Some(kind) => {
                let needs_instance = registered.map_or(true, |group| group.kind() != kind);
                if needs_instance {
                    self.create_and_register(new_entry);
                }
            }
            None => {
                if registered.is_some() {
                    self.registry.remove(old_entry.dn());
                    debug!(dn = %old_entry.dn(), "deregistered group after object class change");
                }
            }
        }
    }

    fn entry_deleted(&self, entry: &Entry) {
        if self.registry.remove(entry.dn()).is_some() {
            debug!(dn = %entry.dn(), "deregistered deleted group");
        }
    }

    fn entry_renamed(&self, old_dn: &Dn, new_entry: &Entry) {
        let was_registered = self.registry.get(old_dn).is_some();
        let mut replaced = false;
        for definition in self.definitions() {
            if !definition.is_group_definition(new_entry) {
                continue;
            }
            match definition.new_instance(
                self.store.clone(),
                self.registry_handle(),
                new_entry,
            ) {
                Ok(group) => {
                    self.registry.replace(old_dn, group);
                    debug!(old = %old_dn, new = %new_entry.dn(), "re-registered renamed group");
                    replaced = true;
                }
                Err(err) => {
                    warn!(dn = %new_entry.dn(), %err, "failed to re-instantiate renamed group");
                }
            }
            break;
        }
        if !replaced && was_registered {
            self.registry.remove(old_dn);
        }
    }
}
