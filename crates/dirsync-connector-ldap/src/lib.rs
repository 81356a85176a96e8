//! # LDAP Changelog Connector
//!
//! Incremental synchronization from the change log of an LDAP directory
//! (Oracle Unified Directory, Oracle Internet Directory, DSEE and other
//! directories publishing `cn=changelog`).
//!
//! ## Features
//!
//! - Change number range from the root DSE, with a fallback for directories
//!   that do not publish the first change number
//! - Windowed paging over the change log
//! - Renames and moves reported with the identifier the entry had before
//! - Exclusion of changes made by given modifiers
//! - SSL/TLS and STARTTLS
//!
//! ## Example
//!
//! ```ignore
//! use dirsync_connector::prelude::*;
//! use dirsync_connector_ldap::{ChangeLogSync, LdapConfig};
//!
//! let config = LdapConfig::new(
//!     "ldap.example.com",
//!     "dc=example,dc=com",
//!     "cn=admin,dc=example,dc=com",
//! )
//! .with_password("secret")
//! .with_ssl();
//!
//! let sync = ChangeLogSync::ldap(config)?;
//! let summary = sync
//!     .sync(None, &mut |delta: SyncDelta| {
//!         println!("{} {:?}", delta.token, delta.uid);
//!         true
//!     })
//!     .await?;
//! ```

pub mod changelog;
pub mod config;
pub mod directory;
pub mod dn;
pub mod filter;

// Re-exports
pub use changelog::{ChangeLogSync, ChangeNumberCursor, ChangeNumberRange, CursorStrategy};
pub use config::{ChangeLogConfig, LdapConfig, ServiceType};
pub use directory::{
    DirectoryEntry, DirectorySearch, EntryLookup, LdapDirectory, RootAttributes, SearchScope,
};
