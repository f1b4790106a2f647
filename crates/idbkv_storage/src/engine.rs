//! Ordered key-value engine trait.

use crate::batch::WriteBatch;
use crate::comparator::KeyComparator;
use crate::error::StorageResult;
use crate::iterator::KvIterator;
use crate::table::Snapshot;
use std::sync::Arc;

/// An ordered key-value engine.
///
/// Keys are ordered by the engine's [`KeyComparator`], fixed at open time.
///
/// # Invariants
///
/// - `write` applies a whole batch or nothing
/// - A [`Snapshot`] never observes writes made after it was taken
/// - Engines must be `Send + Sync`; callers share them as `Arc<dyn KvEngine>`
///
/// # Implementors
///
/// - [`super::MemoryEngine`] - ephemeral, for tests and scratch stores
/// - [`super::FileEngine`] - journal-backed persistent storage
pub trait KvEngine: Send + Sync {
    /// Reads the current value of a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot serve the read.
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Applies a batch atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch cannot be made durable. Nothing from a
    /// failed batch is visible afterwards.
    fn write(&self, batch: &WriteBatch) -> StorageResult<()>;

    /// Pins the current state.
    fn snapshot(&self) -> Snapshot;

    /// Creates an iterator over the current state.
    fn iter(&self) -> Box<dyn KvIterator> {
        self.snapshot().iter()
    }

    /// Returns the comparator keys are ordered by.
    fn comparator(&self) -> Arc<dyn KeyComparator>;

    /// Writes a single key.
    ///
    /// # Errors
    ///
    /// Same as [`KvEngine::write`].
    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let mut batch = WriteBatch::with_capacity(1);
        batch.put(key, value);
        self.write(&batch)
    }

    /// Removes a single key.
    ///
    /// # Errors
    ///
    /// Same as [`KvEngine::write`].
    fn delete(&self, key: &[u8]) -> StorageResult<()> {
        let mut batch = WriteBatch::with_capacity(1);
        batch.delete(key);
        self.write(&batch)
    }
}
