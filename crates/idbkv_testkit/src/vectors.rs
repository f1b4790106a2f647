//! Golden vectors for the persisted key encodings.
//!
//! Every vector pins the exact bytes of one encoding. A change to any of
//! them breaks stores that already exist on disk.

use idbkv_codec::{
    encode_int, encode_string, encode_var_int, CodecResult, DatabaseMetaDataKey,
    DatabaseMetaDataType, DatabaseNameKey, IndexDataKey, Key, KeyPath, KeyPrefix,
    MaxDatabaseIdKey, ObjectStoreDataKey, ObjectStoreMetaDataKey, ObjectStoreMetaDataType,
    SchemaVersionKey,
};
use serde::{Deserialize, Serialize};

/// A named encoding and the bytes it must produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Expected output data (hex-encoded).
    pub expected_hex: String,
    /// Whether the bytes embed a native-endian double.
    #[serde(default)]
    pub native_endian: bool,
}

impl TestVector {
    fn new(id: &str, description: &str, expected_hex: &str) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            expected_hex: expected_hex.into(),
            native_endian: false,
        }
    }

    fn native_endian(mut self) -> Self {
        self.native_endian = true;
        self
    }
}

/// Primitive and key encodings.
pub fn key_encoding_vectors() -> Vec<TestVector> {
    vec![
        TestVector::new("int_zero", "fixed int 0 uses one byte", "00"),
        TestVector::new("int_256", "fixed int 256, little-endian", "0001"),
        TestVector::new("var_int_300", "varint 300", "ac02"),
        TestVector::new("string_ab", "UTF-16BE string", "00610062"),
        TestVector::new("key_min", "min probe key", "00"),
        TestVector::new("key_string_a", "string key with varint length", "01010061"),
        TestVector::new("key_number_one", "number key 1.0", "03000000000000f03f").native_endian(),
        TestVector::new("key_array_empty", "empty array key", "0400"),
        TestVector::new("key_array_nested", "array of a string and an empty array", "0402010100610400"),
        TestVector::new("key_null", "null probe key", "05"),
        TestVector::new("key_path_null", "typed null key path", "000000"),
        TestVector::new("key_path_id", "typed string key path \"id\"", "0000010200690064"),
    ]
}

/// Prefix and composite row-key encodings.
pub fn row_key_vectors() -> Vec<TestVector> {
    vec![
        TestVector::new("prefix_global", "global metadata prefix", "00000000"),
        TestVector::new("prefix_db_300", "two-byte database id", "202c010000"),
        TestVector::new("schema_version_key", "schema version row", "0000000000"),
        TestVector::new("max_database_id_key", "max database id row", "0000000001"),
        TestVector::new(
            "database_name_key",
            "name row for origin \"o\" and database \"d\"",
            "00000000c901006f010064",
        ),
        TestVector::new("database_user_version_key", "user version row of database 1", "0001000002"),
        TestVector::new(
            "object_store_name_key",
            "name metadata row of object store 1 in database 1",
            "00010000320100",
        ),
        TestVector::new("object_store_data_key", "record row for key \"a\"", "0001010101010061"),
        TestVector::new(
            "index_data_key",
            "index 30 entry for \"a\" with sequence 2 and primary key \"b\"",
            "0001011e010100610201010062",
        ),
    ]
}

fn encode_vector(id: &str) -> Option<CodecResult<Vec<u8>>> {
    let bytes = match id {
        "int_zero" => encode_int(0),
        "int_256" => encode_int(256),
        "var_int_300" => encode_var_int(300),
        "string_ab" => Ok(encode_string("ab")),
        "key_min" => Ok(Key::Min.encode()),
        "key_string_a" => Ok(Key::string("a").encode()),
        "key_number_one" => Ok(Key::number(1.0).encode()),
        "key_array_empty" => Ok(Key::array(vec![]).encode()),
        "key_array_nested" => Ok(Key::array(vec![Key::string("a"), Key::array(vec![])]).encode()),
        "key_null" => Ok(Key::Null.encode()),
        "key_path_null" => Ok(KeyPath::Null.encode()),
        "key_path_id" => Ok(KeyPath::string("id").encode()),
        "prefix_global" => KeyPrefix::global().encode(),
        "prefix_db_300" => KeyPrefix::database(300).encode(),
        "schema_version_key" => Ok(SchemaVersionKey::encode()),
        "max_database_id_key" => Ok(MaxDatabaseIdKey::encode()),
        "database_name_key" => Ok(DatabaseNameKey::encode("o", "d")),
        "database_user_version_key" => DatabaseMetaDataKey::encode(1, DatabaseMetaDataType::UserVersion),
        "object_store_name_key" => ObjectStoreMetaDataKey::encode(1, 1, ObjectStoreMetaDataType::Name),
        "object_store_data_key" => ObjectStoreDataKey::encode(1, 1, &Key::string("a")),
        "index_data_key" => IndexDataKey::encode(
            1,
            1,
            30,
            &Key::string("a").encode(),
            &Key::string("b").encode(),
            2,
        ),
        _ => return None,
    };
    Some(bytes)
}

/// Encodes the value a vector describes, or `None` for an unknown id.
pub fn actual_bytes(vector: &TestVector) -> Option<CodecResult<Vec<u8>>> {
    encode_vector(&vector.id)
}

/// Every vector as pretty-printed JSON.
pub fn all_vectors_json() -> String {
    let vectors = AllTestVectors {
        keys: key_encoding_vectors(),
        rows: row_key_vectors(),
    };
    serde_json::to_string_pretty(&vectors).expect("Failed to serialize vectors")
}

/// Parses vectors exported by [`all_vectors_json`].
pub fn parse_vectors_json(json: &str) -> serde_json::Result<Vec<TestVector>> {
    let all: AllTestVectors = serde_json::from_str(json)?;
    Ok(all.keys.into_iter().chain(all.rows).collect())
}

#[derive(Debug, Serialize, Deserialize)]
struct AllTestVectors {
    keys: Vec<TestVector>,
    rows: Vec<TestVector>,
}

/// Encodes bytes as lowercase hex.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decodes lowercase or uppercase hex. Panics on malformed input.
pub fn hex_decode(hex: &str) -> Vec<u8> {
    assert!(hex.len() % 2 == 0, "Odd hex length: {hex}");
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).expect("Invalid hex digit"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(vectors: Vec<TestVector>) {
        for vector in vectors {
            if vector.native_endian && cfg!(target_endian = "big") {
                continue;
            }
            let actual = actual_bytes(&vector)
                .unwrap_or_else(|| panic!("No encoder for vector {}", vector.id))
                .unwrap();
            assert_eq!(
                hex_encode(&actual),
                vector.expected_hex,
                "Vector {} failed: {}",
                vector.id,
                vector.description
            );
        }
    }

    #[test]
    fn test_key_encoding_vectors() {
        check(key_encoding_vectors());
    }

    #[test]
    fn test_row_key_vectors() {
        check(row_key_vectors());
    }

    #[test]
    fn test_vectors_decode_back() {
        let data = hex_decode("0001010101010061");
        let key = ObjectStoreDataKey::decode(&data).unwrap();
        assert_eq!(key.user_key().unwrap(), Key::string("a"));

        let entry = IndexDataKey::decode(&hex_decode("0001011e010100610201010062")).unwrap();
        assert_eq!(entry.index_id(), 30);
        assert_eq!(entry.sequence_number(), 2);
        assert_eq!(entry.primary_key().unwrap(), Key::string("b"));
    }

    #[test]
    fn test_all_vectors_json() {
        let json = all_vectors_json();
        let parsed = parse_vectors_json(&json).unwrap();
        assert_eq!(parsed.len(), key_encoding_vectors().len() + row_key_vectors().len());
        assert!(json.contains("index_data_key"));
    }

    #[test]
    fn test_hex_helpers() {
        assert_eq!(hex_encode(&[0x00, 0xab, 0xff]), "00abff");
        assert_eq!(hex_decode("00ABff"), vec![0x00, 0xab, 0xff]);
    }
}
