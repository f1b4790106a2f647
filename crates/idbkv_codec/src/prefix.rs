//! The `(database, object store, index)` prefix every stored key starts with.
//!
//! ```text
//! header: u8 = (db_len - 1) << 5 | (os_len - 1) << 2 | (index_len - 1)
//! db_id:       db_len bytes, little-endian, 1..=8
//! os_id:       os_len bytes, little-endian, 1..=8
//! index_id:    index_len bytes, little-endian, 1..=4
//! ```

use crate::coding::fixed_int_len;
use crate::error::{CodecError, CodecResult};
use crate::reader::KeyReader;
use std::cmp::Ordering;
use std::fmt;

/// Maximum byte width of an encoded database id.
pub const MAX_DATABASE_ID_BYTES: usize = 8;
/// Maximum byte width of an encoded object store id.
pub const MAX_OBJECT_STORE_ID_BYTES: usize = 8;
/// Maximum byte width of an encoded index id.
pub const MAX_INDEX_ID_BYTES: usize = 4;

/// Largest representable index id.
pub const MAX_INDEX_ID: i64 = i32::MAX as i64;

/// Index id of object-store record rows.
pub const OBJECT_STORE_DATA_INDEX_ID: i64 = 1;
/// Index id of exists-entry rows.
pub const EXISTS_ENTRY_INDEX_ID: i64 = 2;
/// Smallest index id assignable to a user index.
pub const MIN_INDEX_ID: i64 = 30;

/// Which keyspace a prefix selects, and so how the rest of the key compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCategory {
    /// `(0, 0, 0)`: store-wide metadata.
    GlobalMetaData,
    /// `(db, 0, 0)`: one database's metadata.
    DatabaseMetaData,
    /// `(db, os, 1)`: object-store records.
    ObjectStoreData,
    /// `(db, os, 2)`: record existence and version.
    ExistsEntry,
    /// `(db, os, idx >= 30)`: index entries.
    IndexData,
    /// Anything else.
    Invalid,
}

/// A decoded key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyPrefix {
    /// Database id; 0 for global metadata.
    pub database_id: i64,
    /// Object store id; 0 for database metadata.
    pub object_store_id: i64,
    /// Index id, or one of the reserved data ids.
    pub index_id: i64,
}

impl KeyPrefix {
    /// Encoding of the global metadata prefix `(0, 0, 0)`.
    pub const GLOBAL_ENCODED: [u8; 4] = [0, 0, 0, 0];

    /// Creates a prefix.
    #[must_use]
    pub const fn new(database_id: i64, object_store_id: i64, index_id: i64) -> Self {
        Self {
            database_id,
            object_store_id,
            index_id,
        }
    }

    /// The global metadata prefix.
    #[must_use]
    pub const fn global() -> Self {
        Self::new(0, 0, 0)
    }

    /// The metadata prefix of one database.
    #[must_use]
    pub const fn database(database_id: i64) -> Self {
        Self::new(database_id, 0, 0)
    }

    /// The prefix that sorts before every key of one object store.
    #[must_use]
    pub const fn object_store(database_id: i64, object_store_id: i64) -> Self {
        Self::new(database_id, object_store_id, 0)
    }

    /// Returns true for a usable database id.
    #[must_use]
    pub const fn is_valid_database_id(id: i64) -> bool {
        id > 0
    }

    /// Returns true for a usable object store id.
    #[must_use]
    pub const fn is_valid_object_store_id(id: i64) -> bool {
        id > 0
    }

    /// Returns true for a usable user index id.
    #[must_use]
    pub const fn is_valid_index_id(id: i64) -> bool {
        id >= MIN_INDEX_ID && id <= MAX_INDEX_ID
    }

    /// Classifies the prefix.
    #[must_use]
    pub fn category(&self) -> KeyCategory {
        match (self.database_id, self.object_store_id, self.index_id) {
            (0, 0, 0) => KeyCategory::GlobalMetaData,
            (0, _, _) => KeyCategory::Invalid,
            (_, 0, 0) => KeyCategory::DatabaseMetaData,
            (_, 0, _) => KeyCategory::Invalid,
            (_, _, OBJECT_STORE_DATA_INDEX_ID) => KeyCategory::ObjectStoreData,
            (_, _, EXISTS_ENTRY_INDEX_ID) => KeyCategory::ExistsEntry,
            (_, _, id) if id >= MIN_INDEX_ID => KeyCategory::IndexData,
            _ => KeyCategory::Invalid,
        }
    }

    /// Orders prefixes by database, then object store, then index.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        (self.database_id, self.object_store_id, self.index_id).cmp(&(
            other.database_id,
            other.object_store_id,
            other.index_id,
        ))
    }

    /// Appends the encoded prefix.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPrefix` for negative ids or an index id above
    /// [`MAX_INDEX_ID`].
    pub fn encode_into(&self, buf: &mut Vec<u8>) -> CodecResult<()> {
        let database_id = id_bits(self.database_id, "database")?;
        let object_store_id = id_bits(self.object_store_id, "object store")?;
        let index_id = id_bits(self.index_id, "index")?;
        if self.index_id > MAX_INDEX_ID {
            return Err(CodecError::invalid_prefix(format!(
                "index id {} exceeds {MAX_INDEX_ID}",
                self.index_id
            )));
        }

        let db_len = fixed_int_len(database_id);
        let os_len = fixed_int_len(object_store_id);
        let index_len = fixed_int_len(index_id);
        let header = ((db_len - 1) << 5) | ((os_len - 1) << 2) | (index_len - 1);

        buf.push(header as u8);
        buf.extend_from_slice(&database_id.to_le_bytes()[..db_len]);
        buf.extend_from_slice(&object_store_id.to_le_bytes()[..os_len]);
        buf.extend_from_slice(&index_id.to_le_bytes()[..index_len]);
        Ok(())
    }

    /// Returns the encoded prefix.
    ///
    /// # Errors
    ///
    /// See [`KeyPrefix::encode_into`].
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(1 + MAX_DATABASE_ID_BYTES + MAX_OBJECT_STORE_ID_BYTES + MAX_INDEX_ID_BYTES);
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    /// Reads a prefix from the front of `reader`.
    ///
    /// # Errors
    ///
    /// Returns an error if the header or any id is truncated.
    pub fn decode(reader: &mut KeyReader<'_>) -> CodecResult<Self> {
        let header = reader.read_byte()?;
        let db_len = usize::from(header >> 5) + 1;
        let os_len = usize::from((header >> 2) & 0x07) + 1;
        let index_len = usize::from(header & 0x03) + 1;

        let database_id = reader.read_fixed_int(db_len)?;
        let object_store_id = reader.read_fixed_int(os_len)?;
        let index_id = reader.read_fixed_int(index_len)?;
        Ok(Self::new(database_id, object_store_id, index_id))
    }
}

fn id_bits(id: i64, what: &str) -> CodecResult<u64> {
    u64::try_from(id).map_err(|_| CodecError::invalid_prefix(format!("negative {what} id {id}")))
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.database_id, self.object_store_id, self.index_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(prefix: KeyPrefix) -> KeyPrefix {
        let encoded = prefix.encode().unwrap();
        let mut reader = KeyReader::new(&encoded);
        let decoded = KeyPrefix::decode(&mut reader).unwrap();
        assert!(reader.is_empty());
        decoded
    }

    #[test]
    fn global_prefix_is_four_zero_bytes() {
        assert_eq!(KeyPrefix::global().encode().unwrap(), KeyPrefix::GLOBAL_ENCODED);
    }

    #[test]
    fn header_records_widths() {
        let encoded = KeyPrefix::new(0x1_0000, 1, 300).encode().unwrap();
        // db: 3 bytes, os: 1 byte, index: 2 bytes.
        assert_eq!(encoded[0], (2 << 5) | 1);
        assert_eq!(encoded.len(), 1 + 3 + 1 + 2);
    }

    #[test]
    fn boundary_ids_round_trip() {
        let wide = [0, 127, 128, (1 << 31) - 1, 1 << 32, i64::MAX];
        for id in wide {
            let prefix = KeyPrefix::new(id, id, 0);
            assert_eq!(round_trip(prefix), prefix);
        }
        for id in [0, 127, 128, MAX_INDEX_ID] {
            let prefix = KeyPrefix::new(1, 1, id);
            assert_eq!(round_trip(prefix), prefix);
        }
    }

    #[test]
    fn maximal_ids_use_maximal_widths() {
        let encoded = KeyPrefix::new(i64::MAX, i64::MAX, MAX_INDEX_ID).encode().unwrap();
        assert_eq!(encoded.len(), 1 + 8 + 8 + 4);
        assert_eq!(encoded[0], 0xff);
    }

    #[test]
    fn out_of_range_ids_are_rejected() {
        assert!(KeyPrefix::new(-1, 0, 0).encode().is_err());
        assert!(KeyPrefix::new(1, -1, 0).encode().is_err());
        assert!(KeyPrefix::new(1, 1, 1 << 32).encode().is_err());
        assert!(KeyPrefix::new(1, 1, MAX_INDEX_ID + 1).encode().is_err());
    }

    #[test]
    fn truncated_prefix_fails() {
        let encoded = KeyPrefix::new(1 << 20, 5, 31).encode().unwrap();
        for len in 0..encoded.len() {
            let mut reader = KeyReader::new(&encoded[..len]);
            assert!(KeyPrefix::decode(&mut reader).is_err());
        }
    }

    #[test]
    fn categories() {
        assert_eq!(KeyPrefix::global().category(), KeyCategory::GlobalMetaData);
        assert_eq!(KeyPrefix::database(3).category(), KeyCategory::DatabaseMetaData);
        assert_eq!(KeyPrefix::new(3, 4, 1).category(), KeyCategory::ObjectStoreData);
        assert_eq!(KeyPrefix::new(3, 4, 2).category(), KeyCategory::ExistsEntry);
        assert_eq!(KeyPrefix::new(3, 4, 30).category(), KeyCategory::IndexData);
        assert_eq!(KeyPrefix::new(3, 4, 3).category(), KeyCategory::Invalid);
        assert_eq!(KeyPrefix::new(3, 0, 30).category(), KeyCategory::Invalid);
        assert_eq!(KeyPrefix::new(0, 4, 1).category(), KeyCategory::Invalid);
    }

    #[test]
    fn prefixes_order_numerically_not_by_width() {
        let small = KeyPrefix::new(255, 9, 1);
        let large = KeyPrefix::new(256, 1, 1);
        assert_eq!(small.compare(&large), Ordering::Less);
    }
}
