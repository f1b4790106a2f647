//! Transaction state.

use super::overlay::Overlay;
use crate::error::{CoreError, CoreResult};
use idbkv_storage::Snapshot;

/// Lifecycle of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back.
    RolledBack,
}

/// State shared by a transaction handle and every iterator it created.
#[derive(Debug)]
pub(crate) struct TransactionState {
    pub(crate) status: TransactionStatus,
    pub(crate) overlay: Overlay,
    /// Read view pinned at begin; released once the transaction ends.
    pub(crate) snapshot: Option<Snapshot>,
}

impl TransactionState {
    pub(crate) fn new(overlay: Overlay, snapshot: Snapshot) -> Self {
        Self {
            status: TransactionStatus::Active,
            overlay,
            snapshot: Some(snapshot),
        }
    }

    /// Returns the snapshot, failing if the transaction has ended.
    pub(crate) fn active_snapshot(&self) -> CoreResult<&Snapshot> {
        match (self.status, &self.snapshot) {
            (TransactionStatus::Active, Some(snapshot)) => Ok(snapshot),
            (status, _) => Err(CoreError::invalid_operation(format!(
                "transaction is {status:?}, not active"
            ))),
        }
    }

    pub(crate) fn ensure_active(&self) -> CoreResult<()> {
        self.active_snapshot().map(|_| ())
    }

    /// Ends the transaction, releasing its overlay and snapshot.
    pub(crate) fn finish(&mut self, status: TransactionStatus) {
        self.status = status;
        self.overlay.clear();
        self.snapshot = None;
    }
}
