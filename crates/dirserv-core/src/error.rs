//! Error types for directory operations.
//!
//! A single error enum covers the directory core and the group membership
//! engine built on top of it, with stable codes for programmatic handling.

use thiserror::Error;

/// Main error type for directory operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A referenced entry does not exist
    #[error("No such entry: {0}")]
    NoSuchEntry(String),

    /// An entry with the same DN already exists
    #[error("Entry already exists: {0}")]
    EntryAlreadyExists(String),

    /// An operation was attempted on a group whose backing entry is gone
    #[error("Group entry {0} no longer exists in the directory")]
    GroupDetached(String),

    /// The group variant does not support the requested operation
    #[error("Unsupported operation for this group type: {0}")]
    UnsupportedOperation(String),

    /// A member list element references an unresolvable entry
    #[error("Member {0} cannot be resolved")]
    DanglingMember(String),

    /// The backend refused a write-through modification
    #[error("Modification of {dn} rejected: {reason}")]
    ModifyRejected {
        /// Entry that the modification targeted
        dn: String,
        /// Reason reported by the backend
        reason: String,
    },

    /// A distinguished name failed to parse
    #[error("Invalid distinguished name: {0}")]
    InvalidDn(String),

    /// A search filter failed to parse
    #[error("Invalid search filter: {0}")]
    InvalidFilter(String),

    /// A membership URL failed to parse
    #[error("Invalid membership URL: {0}")]
    InvalidUrl(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Specialized result type for directory operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the stable code for this error kind.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NoSuchEntry(_) => "NO_SUCH_ENTRY",
            Self::EntryAlreadyExists(_) => "ENTRY_ALREADY_EXISTS",
            Self::GroupDetached(_) => "GROUP_DETACHED",
            Self::UnsupportedOperation(_) => "UNSUPPORTED_OPERATION",
            Self::DanglingMember(_) => "DANGLING_MEMBER",
            Self::ModifyRejected { .. } => "MODIFY_REJECTED",
            Self::InvalidDn(_) => "INVALID_DN",
            Self::InvalidFilter(_) => "INVALID_FILTER",
            Self::InvalidUrl(_) => "INVALID_URL",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true if this error should be logged as a serious condition.
    ///
    /// Per-element and capability errors are part of normal control flow and
    /// stay quiet; rejected writes and internal failures are worth noise.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(self, Self::ModifyRejected { .. } | Self::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(
            Error::NoSuchEntry("cn=x".to_string()).error_code(),
            "NO_SUCH_ENTRY"
        );
        assert_eq!(
            Error::GroupDetached("cn=g".to_string()).error_code(),
            "GROUP_DETACHED"
        );
        assert_eq!(
            Error::UnsupportedOperation("nesting".to_string()).error_code(),
            "UNSUPPORTED_OPERATION"
        );
        assert_eq!(
            Error::DanglingMember("uid=u".to_string()).error_code(),
            "DANGLING_MEMBER"
        );
        assert_eq!(
            Error::ModifyRejected {
                dn: "cn=g".to_string(),
                reason: "schema violation".to_string(),
            }
            .error_code(),
            "MODIFY_REJECTED"
        );
        assert_eq!(
            Error::InvalidDn("bogus".to_string()).error_code(),
            "INVALID_DN"
        );
        assert_eq!(
            Error::InvalidFilter("(".to_string()).error_code(),
            "INVALID_FILTER"
        );
        assert_eq!(
            Error::InvalidUrl("ldap://".to_string()).error_code(),
            "INVALID_URL"
        );
        assert_eq!(
            Error::Internal("boom".to_string()).error_code(),
            "INTERNAL_ERROR"
        );
    }

    #[test]
    fn display_preserves_reason() {
        let err = Error::ModifyRejected {
            dn: "cn=admins,o=test".to_string(),
            reason: "attribute value already exists".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Modification of cn=admins,o=test rejected: attribute value already exists"
        );
    }

    #[test]
    fn should_log_classification() {
        assert!(Error::Internal("x".to_string()).should_log());
        assert!(Error::ModifyRejected {
            dn: "cn=g".to_string(),
            reason: "r".to_string()
        }
        .should_log());
        assert!(!Error::DanglingMember("uid=u".to_string()).should_log());
        assert!(!Error::GroupDetached("cn=g".to_string()).should_log());
    }
}
