//! The engine comparator for idbkv keys.

use idbkv_storage::KeyComparator;
use std::cmp::Ordering;

/// Orders every key the backing store writes.
///
/// The name is persisted by durable engines; it must change if the order
/// ever does.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdbComparator;

impl IdbComparator {
    /// Name recorded with the engine.
    pub const NAME: &'static str = "idb_cmp1";
}

impl KeyComparator for IdbComparator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        match idbkv_codec::compare_keys(a, b) {
            Ok(ordering) => ordering,
            Err(err) => {
                // Engines require a total order, so fall back to bytes.
                tracing::warn!(error = %err, "malformed key in comparison, ordering bytewise");
                a.cmp(b)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idbkv_codec::{IndexDataKey, Key, ObjectStoreDataKey};
    use proptest::prelude::*;

    #[test]
    fn orders_by_key_semantics() {
        let cmp = IdbComparator;
        let a = ObjectStoreDataKey::encode(1, 1, &Key::number(1.0)).unwrap();
        let b = ObjectStoreDataKey::encode(1, 1, &Key::number(1000.0)).unwrap();
        assert_eq!(cmp.compare(&a, &b), Ordering::Less);
        assert_eq!(cmp.compare(&b, &a), Ordering::Greater);
        assert_eq!(cmp.compare(&a, &a), Ordering::Equal);
    }

    #[test]
    fn malformed_keys_fall_back_to_bytes() {
        let cmp = IdbComparator;
        assert_eq!(cmp.compare(&[0xff], &[0xff, 0x01]), Ordering::Less);
    }

    #[derive(Debug, Clone)]
    struct Entry {
        object_store_id: i64,
        index_id: i64,
        user_key: Key,
        primary_key: Key,
        sequence_number: i64,
    }

    impl Entry {
        fn encode(&self) -> Vec<u8> {
            IndexDataKey::encode(
                1,
                self.object_store_id,
                self.index_id,
                &self.user_key.encode(),
                &self.primary_key.encode(),
                self.sequence_number,
            )
            .unwrap()
        }

        fn semantic_cmp(&self, other: &Self) -> Ordering {
            self.object_store_id
                .cmp(&other.object_store_id)
                .then(self.index_id.cmp(&other.index_id))
                .then_with(|| self.user_key.compare(&other.user_key))
                .then_with(|| self.primary_key.compare(&other.primary_key))
                .then(self.sequence_number.cmp(&other.sequence_number))
        }
    }

    fn small_key() -> impl Strategy<Value = Key> {
        let scalar = prop_oneof![
            "[a-c]{0,3}".prop_map(Key::String),
            (-3_i32..3).prop_map(|n| Key::Number(f64::from(n))),
            (0_i32..3).prop_map(|n| Key::Date(f64::from(n))),
        ];
        scalar.prop_recursive(2, 8, 3, |inner| {
            prop::collection::vec(inner, 0..3).prop_map(Key::Array)
        })
    }

    fn entry() -> impl Strategy<Value = Entry> {
        (1_i64..3, 30_i64..32, small_key(), small_key(), 0_i64..300).prop_map(
            |(object_store_id, index_id, user_key, primary_key, sequence_number)| Entry {
                object_store_id,
                index_id,
                user_key,
                primary_key,
                sequence_number,
            },
        )
    }

    proptest! {
        #[test]
        fn index_entries_order_like_their_fields(a in entry(), b in entry()) {
            let cmp = IdbComparator;
            prop_assert_eq!(cmp.compare(&a.encode(), &b.encode()), a.semantic_cmp(&b));
        }

        #[test]
        fn index_entries_decode_to_their_fields(a in entry()) {
            let decoded = IndexDataKey::decode(&a.encode()).unwrap();
            prop_assert_eq!(decoded.object_store_id(), a.object_store_id);
            prop_assert_eq!(decoded.index_id(), a.index_id);
            prop_assert_eq!(decoded.sequence_number(), a.sequence_number);
            prop_assert_eq!(decoded.user_key().unwrap(), a.user_key);
            prop_assert_eq!(decoded.primary_key().unwrap(), a.primary_key);
        }
    }
}
