//! Ordered iteration contract.

/// A bidirectional cursor over comparator-ordered keys.
///
/// A freshly created iterator is unpositioned and invalid. `key` and `value`
/// return empty slices while the iterator is invalid; callers check
/// [`KvIterator::is_valid`] first.
pub trait KvIterator: Send {
    /// Positions at the smallest key.
    fn seek_to_first(&mut self);

    /// Positions at the largest key.
    fn seek_to_last(&mut self);

    /// Positions at the first key at or after `target`.
    fn seek(&mut self, target: &[u8]);

    /// Steps to the next larger key. No-op when invalid.
    fn next(&mut self);

    /// Steps to the next smaller key. No-op when invalid.
    fn prev(&mut self);

    /// Returns true if positioned on an entry.
    fn is_valid(&self) -> bool;

    /// Current key.
    fn key(&self) -> &[u8];

    /// Current value.
    fn value(&self) -> &[u8];
}
