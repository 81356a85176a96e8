//! Directory change log.
//!
//! - [`ldif`] - Tokenizer for the LDIF carried by a change record
//! - [`changes`] - Change map built from that LDIF
//! - [`cursor`] - Change number range, standard or from the oldest record
//! - [`sync`] - Page loop and per-record resolution

pub mod changes;
pub mod cursor;
pub mod ldif;
pub mod sync;

pub use changes::{interpret, interpret_change, ChangeMap, ChangeType};
pub use cursor::{ChangeNumberCursor, ChangeNumberRange, CursorStrategy};
pub use ldif::Token;
pub use sync::ChangeLogSync;
