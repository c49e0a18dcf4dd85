//! Group resolution for the directory server.
//!
//! This crate maintains the registry of group instances backed by
//! directory entries and answers live membership questions over them.
//! Three variants are supported: static groups with explicit member
//! lists, dynamic groups whose membership is derived from membership
//! URLs, and virtual static groups that delegate to a target group.

#![deny(missing_docs)]

mod config;
mod dynamic_group;
mod group;
mod manager;
mod member_list;
mod membership_url;
pub mod schema;
mod static_group;
mod virtual_static;

pub use config::GroupManagerConfig;
pub use dynamic_group::{DynamicGroup, DynamicGroupDefinition};
pub use group::{Group, GroupDefinition, GroupKind};
pub use manager::{GroupManager, RegistryHandle};
pub use member_list::{MemberConstraint, MemberList};
pub use membership_url::MembershipUrl;
pub use static_group::{StaticGroup, StaticGroupDefinition};
pub use virtual_static::{VirtualStaticGroup, VirtualStaticGroupDefinition};

/// Convenient result alias that reuses the core error type.
pub type Result<T> = dirserv_core::Result<T>;
