//! Membership URLs: the base/scope/filter triples that define dynamic
//! group membership.
//!
//! The accepted shape is the LDAP URL form used in `memberURL` values,
//! e.g. `ldap:///ou=People,o=test??sub?(sn<=2)`. The attribute-list field
//! is accepted and ignored; host and port are not supported since the
//! URL is always evaluated against the local directory.

use std::fmt;

use dirserv_core::{Dn, Entry, Error, Result, SearchFilter, SearchScope};

/// A parsed membership URL.
#[derive(Debug, Clone)]
pub struct MembershipUrl {
    base: Dn,
    scope: SearchScope,
    filter: SearchFilter,
    raw: String,
}

impl MembershipUrl {
    /// Parses a membership URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the text is not an
    /// `ldap:///base?attrs?scope?filter` URL with a valid base DN, scope
    /// token and filter.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let rest = trimmed
            .strip_prefix("ldap://")
            .ok_or_else(|| malformed(trimmed, "missing ldap:// prefix"))?;
        let rest = rest
            .strip_prefix('/')
            .ok_or_else(|| malformed(trimmed, "host names are not supported"))?;

        let mut fields = rest.splitn(4, '?');
        let base_text = fields.next().unwrap_or_default();
        let _attributes = fields.next();
        let scope_text = fields.next().unwrap_or_default();
        let filter_text = fields.next().unwrap_or_default();

        if base_text.is_empty() {
            return Err(malformed(trimmed, "empty base DN"));
        }
        let base =
            Dn::parse(base_text).map_err(|err| malformed(trimmed, &err.to_string()))?;

        let scope = match scope_text.to_ascii_lowercase().as_str() {
            "" | "base" => SearchScope::Base,
            "one" | "onelevel" => SearchScope::OneLevel,
            "sub" | "subtree" => SearchScope::Subtree,
            "subordinate" | "subordinates" => SearchScope::Subordinate,
            other => return Err(malformed(trimmed, &format!("unknown scope `{other}`"))),
        };

        let filter = if filter_text.is_empty() {
            SearchFilter::object_class_present()
        } else {
            SearchFilter::parse(filter_text)
                .map_err(|err| malformed(trimmed, &err.to_string()))?
        };

        Ok(Self {
            base,
            scope,
            filter,
            raw: trimmed.to_string(),
        })
    }

    /// The search base.
    #[must_use]
    pub fn base(&self) -> &Dn {
        &self.base
    }

    /// The search scope.
    #[must_use]
    pub fn scope(&self) -> SearchScope {
        self.scope
    }

    /// The membership filter.
    #[must_use]
    pub fn filter(&self) -> &SearchFilter {
        &self.filter
    }

    /// Returns true if the candidate entry falls within this URL's
    /// base and scope and matches its filter.
    #[must_use]
    pub fn matches(&self, candidate: &Entry) -> bool {
        self.scope.contains(&self.base, candidate.dn()) && self.filter.matches(candidate)
    }
}

impl fmt::Display for MembershipUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn malformed(url: &str, reason: &str) -> Error {
    Error::InvalidUrl(format!("{url}: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dn(s: &str) -> Dn {
        Dn::parse(s).unwrap()
    }

    fn person(uid: &str, sn: &str) -> Entry {
        Entry::builder(dn(&format!("uid={uid},ou=People,o=test")))
            .attr("objectClass", ["top", "person"])
            .attr("sn", [sn])
            .build()
    }

    #[test]
    fn parses_typical_member_url() {
        let url = MembershipUrl::parse("ldap:///o=test??sub?(sn<=2)").unwrap();
        assert_eq!(url.base(), &dn("o=test"));
        assert_eq!(url.scope(), SearchScope::Subtree);
        assert!(url.matches(&person("u1", "1")));
        assert!(!url.matches(&person("u3", "3")));
    }

    #[test]
    fn scope_tokens() {
        for (token, scope) in [
            ("base", SearchScope::Base),
            ("one", SearchScope::OneLevel),
            ("sub", SearchScope::Subtree),
            ("subordinate", SearchScope::Subordinate),
        ] {
            let url =
                MembershipUrl::parse(&format!("ldap:///o=test??{token}?(sn=1)")).unwrap();
            assert_eq!(url.scope(), scope);
        }
        // Empty scope defaults to base.
        let url = MembershipUrl::parse("ldap:///o=test???(sn=1)").unwrap();
        assert_eq!(url.scope(), SearchScope::Base);
    }

    #[test]
    fn missing_filter_matches_everything() {
        let url = MembershipUrl::parse("ldap:///ou=People,o=test??sub").unwrap();
        assert!(url.matches(&person("u1", "1")));
    }

    #[test]
    fn scope_containment_is_enforced() {
        let url = MembershipUrl::parse("ldap:///ou=People,o=test??subordinate?(sn=*)").unwrap();
        assert!(url.matches(&person("u1", "1")));

        let outside = Entry::builder(dn("cn=other,ou=Groups,o=test"))
            .attr("sn", ["1"])
            .build();
        assert!(!url.matches(&outside));
    }

    #[test]
    fn rejects_malformed_urls() {
        assert!(MembershipUrl::parse("http:///o=test??sub?(sn=1)").is_err());
        assert!(MembershipUrl::parse("ldap://host:389/o=test??sub?(sn=1)").is_err());
        assert!(MembershipUrl::parse("ldap:///??sub?(sn=1)").is_err());
        assert!(MembershipUrl::parse("ldap:///o=test??bogus?(sn=1)").is_err());
        assert!(MembershipUrl::parse("ldap:///o=test??sub?(malformed)").is_err());
        assert!(MembershipUrl::parse("ldap:///not a dn??sub?(sn=1)").is_err());
    }

    #[test]
    fn display_preserves_original_text() {
        let text = "ldap:///o=test??sub?(sn<=2)";
        assert_eq!(MembershipUrl::parse(text).unwrap().to_string(), text);
    }
}
