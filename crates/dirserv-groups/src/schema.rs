//! Schema markers the group engine recognizes.
//!
//! Which object classes make an entry a group, and which attributes carry
//! its membership, are fixed schema conventions rather than per-server
//! configuration.

/// Object class of static groups using the `member` attribute.
pub const OC_GROUP_OF_NAMES: &str = "groupOfNames";
/// Object class of static groups using the `uniqueMember` attribute.
pub const OC_GROUP_OF_UNIQUE_NAMES: &str = "groupOfUniqueNames";
/// Object class of dynamic (URL-defined) groups.
pub const OC_GROUP_OF_URLS: &str = "groupOfURLs";
/// Object class of virtual static groups.
pub const OC_VIRTUAL_STATIC_GROUP: &str = "ds-virtual-static-group";

/// Member attribute of `groupOfNames` groups.
pub const ATTR_MEMBER: &str = "member";
/// Member attribute of `groupOfUniqueNames` groups.
pub const ATTR_UNIQUE_MEMBER: &str = "uniqueMember";
/// Membership URL attribute of dynamic groups.
pub const ATTR_MEMBER_URL: &str = "memberURL";
/// Target group attribute of virtual static groups.
pub const ATTR_TARGET_GROUP_DN: &str = "ds-target-group-dn";
