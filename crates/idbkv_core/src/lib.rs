//! # idbkv Core
//!
//! The backing store of an IndexedDB-style database over an ordered
//! key-value engine.
//!
//! This crate provides:
//! - Read-your-writes transactions over engine snapshots
//! - The database registry and schema metadata
//! - Versioned record storage with self-healing index entries
//! - Object store, index key, and index cursors
//!
//! Keys and their on-disk layout come from `idbkv_codec`; the engine comes
//! from `idbkv_storage`. [`IdbComparator`] ties the two together.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod comparator;
mod config;
mod error;
mod store;
mod transaction;
mod types;

pub use comparator::IdbComparator;
pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use store::{BackingStore, Cursor, CursorDirection, CursorKind, KeyRange};
pub use transaction::{PendingWrite, Transaction, TransactionIterator, TransactionStatus};
pub use types::{
    DatabaseMetadata, IndexMetadata, ObjectStoreMetadata, RecordIdentifier,
    KEY_GENERATOR_INITIAL_NUMBER, SCHEMA_VERSION,
};
