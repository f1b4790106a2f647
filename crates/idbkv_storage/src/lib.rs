//! # idbkv Storage
//!
//! The ordered key-value engine boundary for idbkv.
//!
//! The backing store above this crate needs an engine with point reads,
//! atomic write batches, snapshots, and bidirectional iterators, all ordered
//! by a pluggable comparator. Engines do not interpret keys or values; the
//! comparator alone decides ordering.
//!
//! ## Available Engines
//!
//! - [`MemoryEngine`] - For testing and ephemeral stores
//! - [`FileEngine`] - Journal-backed persistent storage
//!
//! ## Example
//!
//! ```rust
//! use idbkv_storage::{BytewiseComparator, KvEngine, KvIterator, MemoryEngine, WriteBatch};
//! use std::sync::Arc;
//!
//! let engine = MemoryEngine::new(Arc::new(BytewiseComparator));
//! let mut batch = WriteBatch::new();
//! batch.put(b"a", b"1");
//! batch.put(b"b", b"2");
//! engine.write(&batch).unwrap();
//!
//! let mut iter = engine.iter();
//! iter.seek(b"b");
//! assert_eq!(iter.value(), b"2");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod checksum;
mod comparator;
mod engine;
mod error;
mod file;
mod iterator;
mod memory;
mod table;

pub use batch::{BatchOp, WriteBatch};
pub use checksum::crc32;
pub use comparator::{BytewiseComparator, KeyComparator};
pub use engine::KvEngine;
pub use error::{StorageError, StorageResult};
pub use file::{EngineOptions, FileEngine, JOURNAL_MAGIC, JOURNAL_VERSION};
pub use iterator::KvIterator;
pub use memory::MemoryEngine;
pub use table::{Snapshot, SortedTable, TableIterator};
