//! Search scopes and scope containment.

use serde::{Deserialize, Serialize};

use crate::dn::Dn;

/// The portion of the tree a search covers, relative to its base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchScope {
    /// The base entry only.
    Base,
    /// Immediate children of the base, excluding the base itself.
    OneLevel,
    /// The base entry and everything below it.
    Subtree,
    /// Everything below the base, excluding the base itself.
    Subordinate,
}

impl SearchScope {
    /// Returns true if `dn` falls within this scope rooted at `base`.
    #[must_use]
    pub fn contains(self, base: &Dn, dn: &Dn) -> bool {
        match self {
            Self::Base => dn == base,
            Self::OneLevel => dn.parent().as_ref() == Some(base),
            Self::Subtree => dn.is_under(base),
            Self::Subordinate => dn.is_descendant_of(base),
        }
    }
}
