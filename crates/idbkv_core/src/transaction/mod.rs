//! Read-your-writes transactions over an engine snapshot.
//!
//! A transaction pins a snapshot when it begins and buffers its writes in
//! a comparator-ordered overlay. Reads consult the overlay first, then the
//! snapshot. Commit turns the overlay into one atomic write batch.
//!
//! Iterators created by a transaction merge the overlay with the snapshot
//! and stay correct while the transaction keeps writing.

mod iterator;
mod overlay;
mod state;

pub use iterator::TransactionIterator;
pub use overlay::PendingWrite;
pub use state::TransactionStatus;

use crate::error::CoreResult;
use idbkv_storage::{KeyComparator, KvEngine};
use overlay::Overlay;
use parking_lot::Mutex;
use state::TransactionState;
use std::fmt;
use std::sync::Arc;

/// A transaction handle.
///
/// Clones share the same transaction. Once committed or rolled back every
/// operation except [`Transaction::status`] and [`Transaction::rollback`]
/// fails with `InvalidOperation`.
///
/// # Example
///
/// ```rust
/// use idbkv_core::Transaction;
/// use idbkv_storage::{BytewiseComparator, KvEngine, MemoryEngine};
/// use std::sync::Arc;
///
/// let engine: Arc<dyn KvEngine> = Arc::new(MemoryEngine::new(Arc::new(BytewiseComparator)));
/// let txn = Transaction::begin(Arc::clone(&engine));
/// txn.put(b"k", b"v").unwrap();
/// assert_eq!(txn.get(b"k").unwrap(), Some(b"v".to_vec()));
/// assert_eq!(engine.get(b"k").unwrap(), None);
///
/// txn.commit().unwrap();
/// assert_eq!(engine.get(b"k").unwrap(), Some(b"v".to_vec()));
/// ```
#[derive(Clone)]
pub struct Transaction {
    engine: Arc<dyn KvEngine>,
    shared: Arc<Mutex<TransactionState>>,
}

impl Transaction {
    /// Begins a transaction on `engine`, pinning its current state.
    #[must_use]
    pub fn begin(engine: Arc<dyn KvEngine>) -> Self {
        let overlay = Overlay::new(engine.comparator());
        let snapshot = engine.snapshot();
        Self {
            engine,
            shared: Arc::new(Mutex::new(TransactionState::new(overlay, snapshot))),
        }
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> TransactionStatus {
        self.shared.lock().status
    }

    /// Returns the number of buffered writes.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.shared.lock().overlay.len()
    }

    /// Returns the comparator keys are ordered by.
    #[must_use]
    pub fn comparator(&self) -> Arc<dyn KeyComparator> {
        self.engine.comparator()
    }

    /// Buffers a write of `value` at `key`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the transaction has ended.
    pub fn put(&self, key: &[u8], value: &[u8]) -> CoreResult<()> {
        let mut state = self.shared.lock();
        state.ensure_active()?;
        state.overlay.put(key, value);
        Ok(())
    }

    /// Buffers a removal of `key`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the transaction has ended.
    pub fn remove(&self, key: &[u8]) -> CoreResult<()> {
        let mut state = self.shared.lock();
        state.ensure_active()?;
        state.overlay.remove(key);
        Ok(())
    }

    /// Reads `key` as this transaction sees it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the transaction has ended, or a storage
    /// error from the snapshot read.
    pub fn get(&self, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        let state = self.shared.lock();
        let snapshot = state.active_snapshot()?;
        match state.overlay.get(key) {
            Some(PendingWrite::Put { value }) => Ok(Some(value.clone())),
            Some(PendingWrite::Delete) => Ok(None),
            None => Ok(snapshot.get(key)?),
        }
    }

    /// Applies every buffered write atomically.
    ///
    /// On failure the transaction stays active with its writes intact, so
    /// the caller may retry or roll back.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the transaction has ended, or the
    /// engine's error if the batch could not be written.
    pub fn commit(&self) -> CoreResult<()> {
        let mut state = self.shared.lock();
        state.ensure_active()?;

        if !state.overlay.is_empty() {
            let batch = state.overlay.to_batch();
            if let Err(err) = self.engine.write(&batch) {
                tracing::error!(error = %err, writes = batch.len(), "transaction commit failed");
                return Err(err.into());
            }
            tracing::trace!(writes = batch.len(), "transaction committed");
        }

        state.finish(TransactionStatus::Committed);
        Ok(())
    }

    /// Discards every buffered write. Does nothing if the transaction has
    /// already ended.
    pub fn rollback(&self) {
        let mut state = self.shared.lock();
        if state.status == TransactionStatus::Active {
            state.finish(TransactionStatus::RolledBack);
        }
    }

    /// Creates an iterator over the snapshot merged with this transaction's
    /// writes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the transaction has ended.
    pub fn create_iterator(&self) -> CoreResult<TransactionIterator> {
        let base = self.shared.lock().active_snapshot()?.iter();
        Ok(TransactionIterator::new(
            Arc::clone(&self.shared),
            base,
            self.engine.comparator(),
        ))
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("Transaction")
            .field("status", &state.status)
            .field("pending_writes", &state.overlay.len())
            .finish()
    }
}
