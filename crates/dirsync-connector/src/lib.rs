//! # Connector Framework
//!
//! Core abstractions shared by directory synchronization connectors.
//!
//! ## Architecture
//!
//! - [`Connector`](traits::Connector) - Base trait all connectors implement
//! - [`SyncOp`](traits::SyncOp) - Incremental synchronization from a change log
//! - [`SyncResultsHandler`](traits::SyncResultsHandler) - Receiver of [`SyncDelta`](traits::SyncDelta) values
//!
//! ## Example
//!
//! ```ignore
//! use dirsync_connector::prelude::*;
//!
//! let mut handler = |delta: SyncDelta| {
//!     println!("{} {:?}", delta.token, delta.uid);
//!     true
//! };
//!
//! let summary = connector.sync(saved_token, &mut handler).await?;
//! if let Some(token) = summary.last_token {
//!     save_token(token);
//! }
//! ```
//!
//! ## Crate Organization
//!
//! - [`error`] - Error types with transient/permanent classification
//! - [`traits`] - Connector and synchronization traits
//! - [`operation`] - Value types (`Uid`, `AttributeSet`, `ConnectorObject`, `Filter`)
//! - [`config`] - Configuration types and traits

pub mod config;
pub mod error;
pub mod operation;
pub mod traits;

/// Prelude module for convenient imports.
///
/// ```
/// use dirsync_connector::prelude::*;
/// ```
pub mod prelude {
    // Error handling
    pub use crate::error::{ConnectorError, ConnectorResult};

    // Traits
    pub use crate::traits::{
        Connector, SyncCompletion, SyncDelta, SyncDeltaType, SyncOp, SyncResultsHandler,
        SyncSummary, SyncToken,
    };

    // Operations
    pub use crate::operation::{AttributeSet, AttributeValue, ConnectorObject, Filter, Uid};

    // Configuration
    pub use crate::config::{ConnectionSettings, ConnectorConfig, TlsConfig};
}

// Re-export async_trait for connector implementors
pub use async_trait::async_trait;
