//! Core directory primitives for dirserv.
//!
//! This crate provides the data model (distinguished names, entries,
//! search filters and scopes), the backend seam used by every higher
//! layer, and an in-process store implementation.

#![deny(missing_docs)]

pub mod dn;
pub mod entry;
pub mod error;
pub mod filter;
pub mod memory;
pub mod scope;
pub mod store;

pub use dn::{Dn, DnError, Rdn};
pub use entry::{Entry, EntryBuilder, Modification, ModifyRejection};
pub use error::{Error, Result};
pub use filter::{FilterError, SearchFilter};
pub use memory::MemoryDirectory;
pub use scope::SearchScope;
pub use store::{ChangeListener, DirectoryStore};
