//! Configuration for the group manager.

use dirserv_core::Dn;

/// Configuration for [`GroupManager`](crate::manager::GroupManager).
#[derive(Debug, Clone)]
pub struct GroupManagerConfig {
    scan_bases: Vec<Dn>,
    builtin_definitions: bool,
}

impl GroupManagerConfig {
    /// Creates a configuration with no scan bases and the built-in group
    /// definitions enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scan_bases: Vec::new(),
            builtin_definitions: true,
        }
    }

    /// Adds a base DN to scan for existing groups at startup.
    #[must_use]
    pub fn with_scan_base(mut self, base: Dn) -> Self {
        self.scan_bases.push(base);
        self
    }

    /// Enables or disables registration of the built-in static, dynamic
    /// and virtual-static definitions.
    #[must_use]
    pub const fn with_builtin_definitions(mut self, enabled: bool) -> Self {
        self.builtin_definitions = enabled;
        self
    }

    /// The base DNs scanned by [`GroupManager::synchronize`](crate::manager::GroupManager::synchronize).
    #[must_use]
    pub fn scan_bases(&self) -> &[Dn] {
        &self.scan_bases
    }

    /// Whether the built-in definitions are registered.
    #[must_use]
    pub const fn builtin_definitions(&self) -> bool {
        self.builtin_definitions
    }
}

impl Default for GroupManagerConfig {
    fn default() -> Self {
        Self::new()
    }
}
