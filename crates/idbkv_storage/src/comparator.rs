//! Key comparators.

use std::cmp::Ordering;

/// A total order over raw byte keys.
///
/// The engine sorts, seeks and iterates using the comparator it was opened
/// with. The `name` is persisted by durable engines so a store written with
/// one ordering is never read back with another.
///
/// # Invariants
///
/// - `compare` must be a total order: reflexive, antisymmetric, transitive
/// - `compare` must never panic, including on malformed input
pub trait KeyComparator: Send + Sync {
    /// Stable identifier for this ordering.
    fn name(&self) -> &str;

    /// Compares two keys.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

/// Unsigned lexicographic byte order.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytewiseComparator;

impl KeyComparator for BytewiseComparator {
    fn name(&self) -> &str {
        "idbkv.BytewiseComparator"
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytewise_orders_unsigned() {
        let cmp = BytewiseComparator;
        assert_eq!(cmp.compare(b"a", b"b"), Ordering::Less);
        assert_eq!(cmp.compare(&[0xff], &[0x01]), Ordering::Greater);
        assert_eq!(cmp.compare(b"ab", b"a"), Ordering::Greater);
        assert_eq!(cmp.compare(b"", b""), Ordering::Equal);
    }
}
