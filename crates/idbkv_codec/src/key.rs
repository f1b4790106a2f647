//! Polymorphic record keys and their order-preserving tagged encoding.
//!
//! ```text
//! key    := type:u8 payload
//! Min    := 0x00
//! String := 0x01 varint(code units) utf16be
//! Date   := 0x02 f64 (native order)
//! Number := 0x03 f64 (native order)
//! Array  := 0x04 varint(count) key*
//! Null   := 0x05
//! ```
//!
//! Keys of different types order by type byte. `Min` sorts before every
//! key and `Null` after every key, so both serve as range sentinels.

use crate::coding::{compare_utf16, put_double, put_string_with_length, put_var_u64};
use crate::error::{CodecError, CodecResult};
use crate::reader::KeyReader;
use std::cmp::Ordering;

/// Arrays nested deeper than this are rejected on decode.
pub const MAX_KEY_DEPTH: usize = 2000;

/// Type byte of a tagged key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum KeyType {
    /// Sorts before every other key.
    Min = 0,
    /// UTF-16 string.
    String = 1,
    /// Milliseconds since the epoch.
    Date = 2,
    /// IEEE double.
    Number = 3,
    /// Ordered list of keys.
    Array = 4,
    /// Sorts after every other key.
    Null = 5,
}

impl KeyType {
    /// Converts a byte to a key type.
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Min),
            1 => Some(Self::String),
            2 => Some(Self::Date),
            3 => Some(Self::Number),
            4 => Some(Self::Array),
            5 => Some(Self::Null),
            _ => None,
        }
    }

    /// Converts the key type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A record or index key.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    /// Lowest possible key; a probe, never stored as a record key.
    Min,
    /// String key.
    String(String),
    /// Date key, in milliseconds.
    Date(f64),
    /// Number key.
    Number(f64),
    /// Array of keys, compared element by element.
    Array(Vec<Key>),
    /// Highest possible key.
    Null,
}

impl Key {
    /// Creates a string key.
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Creates a number key.
    #[must_use]
    pub const fn number(value: f64) -> Self {
        Self::Number(value)
    }

    /// Creates a date key.
    #[must_use]
    pub const fn date(millis: f64) -> Self {
        Self::Date(millis)
    }

    /// Creates an array key.
    #[must_use]
    pub fn array(items: Vec<Key>) -> Self {
        Self::Array(items)
    }

    /// Returns the key's type.
    #[must_use]
    pub fn key_type(&self) -> KeyType {
        match self {
            Self::Min => KeyType::Min,
            Self::String(_) => KeyType::String,
            Self::Date(_) => KeyType::Date,
            Self::Number(_) => KeyType::Number,
            Self::Array(_) => KeyType::Array,
            Self::Null => KeyType::Null,
        }
    }

    /// Returns false for the `Min` probe, which may not key a record.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Min => false,
            Self::Array(items) => items.iter().all(Self::is_valid),
            _ => true,
        }
    }

    /// Appends the tagged encoding of the key.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(self.key_type().as_byte());
        match self {
            Self::Min | Self::Null => {}
            Self::String(value) => put_string_with_length(buf, value),
            Self::Date(value) | Self::Number(value) => put_double(buf, *value),
            Self::Array(items) => {
                put_var_u64(buf, items.len() as u64);
                for item in items {
                    item.encode_into(buf);
                }
            }
        }
    }

    /// Returns the tagged encoding of the key.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }

    /// Decodes a key that spans all of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not exactly one well-formed key.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let mut reader = KeyReader::new(bytes);
        let key = reader.read_key()?;
        if !reader.is_empty() {
            return Err(CodecError::invalid_key("trailing bytes after key"));
        }
        Ok(key)
    }

    /// Compares two keys in key order.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        let by_type = self.key_type().cmp(&other.key_type());
        if by_type != Ordering::Equal {
            return by_type;
        }
        match (self, other) {
            (Self::String(a), Self::String(b)) => a.chars().cmp(b.chars()),
            (Self::Date(a), Self::Date(b)) | (Self::Number(a), Self::Number(b)) => {
                compare_doubles(*a, *b)
            }
            (Self::Array(a), Self::Array(b)) => a
                .iter()
                .zip(b)
                .map(|(x, y)| x.compare(y))
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            _ => Ordering::Equal,
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

fn compare_doubles(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

impl<'a> KeyReader<'a> {
    /// Reads one tagged key.
    pub fn read_key(&mut self) -> CodecResult<Key> {
        self.read_key_at_depth(0)
    }

    fn read_key_at_depth(&mut self, depth: usize) -> CodecResult<Key> {
        if depth > MAX_KEY_DEPTH {
            return Err(CodecError::invalid_key("array nesting too deep"));
        }
        let type_byte = self.read_byte()?;
        let key = match KeyType::from_byte(type_byte) {
            Some(KeyType::Min) => Key::Min,
            Some(KeyType::Null) => Key::Null,
            Some(KeyType::String) => Key::String(self.read_string_with_length()?),
            Some(KeyType::Date) => Key::Date(self.read_double()?),
            Some(KeyType::Number) => Key::Number(self.read_double()?),
            Some(KeyType::Array) => {
                let count = self.read_count()?;
                let mut items = Vec::with_capacity(count.min(self.remaining().len()));
                for _ in 0..count {
                    items.push(self.read_key_at_depth(depth + 1)?);
                }
                Key::Array(items)
            }
            None => return Err(CodecError::InvalidTypeByte(type_byte)),
        };
        Ok(key)
    }

    /// Returns the exact bytes of the next tagged key without decoding it.
    pub fn extract_key(&mut self) -> CodecResult<&'a [u8]> {
        let start = self.position();
        self.skip_key(0)?;
        Ok(self.consumed_since(start))
    }

    fn skip_key(&mut self, depth: usize) -> CodecResult<()> {
        if depth > MAX_KEY_DEPTH {
            return Err(CodecError::invalid_key("array nesting too deep"));
        }
        let type_byte = self.read_byte()?;
        match KeyType::from_byte(type_byte) {
            Some(KeyType::Min | KeyType::Null) => {}
            Some(KeyType::String) => {
                self.read_utf16_with_length()?;
            }
            Some(KeyType::Date | KeyType::Number) => {
                self.read_bytes(8)?;
            }
            Some(KeyType::Array) => {
                for _ in 0..self.read_count()? {
                    self.skip_key(depth + 1)?;
                }
            }
            None => return Err(CodecError::InvalidTypeByte(type_byte)),
        }
        Ok(())
    }

    fn read_count(&mut self) -> CodecResult<usize> {
        usize::try_from(self.read_var_int()?).map_err(|_| CodecError::IntegerOverflow)
    }
}

/// Compares the next tagged key of each reader without decoding.
///
/// Both readers are advanced past the compared prefix; when the result is
/// `Equal` both have consumed exactly one key.
///
/// # Errors
///
/// Returns an error if either side is not a well-formed key.
pub fn compare_encoded_keys(a: &mut KeyReader<'_>, b: &mut KeyReader<'_>) -> CodecResult<Ordering> {
    compare_encoded_at_depth(a, b, 0)
}

fn compare_encoded_at_depth(
    a: &mut KeyReader<'_>,
    b: &mut KeyReader<'_>,
    depth: usize,
) -> CodecResult<Ordering> {
    if depth > MAX_KEY_DEPTH {
        return Err(CodecError::invalid_key("array nesting too deep"));
    }
    let type_a = read_key_type(a)?;
    let type_b = read_key_type(b)?;
    if type_a != type_b {
        return Ok(type_a.cmp(&type_b));
    }
    let ord = match type_a {
        KeyType::Min | KeyType::Null => Ordering::Equal,
        KeyType::String => compare_utf16(a.read_utf16_with_length()?, b.read_utf16_with_length()?),
        KeyType::Date | KeyType::Number => compare_doubles(a.read_double()?, b.read_double()?),
        KeyType::Array => {
            let len_a = a.read_count()?;
            let len_b = b.read_count()?;
            for _ in 0..len_a.min(len_b) {
                let ord = compare_encoded_at_depth(a, b, depth + 1)?;
                if ord != Ordering::Equal {
                    return Ok(ord);
                }
            }
            len_a.cmp(&len_b)
        }
    };
    Ok(ord)
}

fn read_key_type(reader: &mut KeyReader<'_>) -> CodecResult<KeyType> {
    let byte = reader.read_byte()?;
    KeyType::from_byte(byte).ok_or(CodecError::InvalidTypeByte(byte))
}

/// Compares two complete encoded keys.
///
/// # Errors
///
/// Returns an error if either side is not a well-formed key.
pub fn compare_encoded(a: &[u8], b: &[u8]) -> CodecResult<Ordering> {
    compare_encoded_keys(&mut KeyReader::new(a), &mut KeyReader::new(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reference_rank(key: &Key) -> u8 {
        match key {
            Key::Min => 0,
            Key::String(_) => 1,
            Key::Date(_) => 2,
            Key::Number(_) => 3,
            Key::Array(_) => 4,
            Key::Null => 5,
        }
    }

    // Independent of `Key::compare`: strings order by Rust's `str` order,
    // which is code-point order.
    fn reference_order(a: &Key, b: &Key) -> Ordering {
        match (a, b) {
            (Key::String(x), Key::String(y)) => x.as_str().cmp(y.as_str()),
            (Key::Date(x), Key::Date(y)) | (Key::Number(x), Key::Number(y)) => {
                x.partial_cmp(y).unwrap()
            }
            (Key::Array(x), Key::Array(y)) => {
                for (p, q) in x.iter().zip(y) {
                    let ord = reference_order(p, q);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                x.len().cmp(&y.len())
            }
            _ => reference_rank(a).cmp(&reference_rank(b)),
        }
    }

    fn arb_number() -> impl Strategy<Value = f64> {
        prop_oneof![
            any::<f64>().prop_filter("NaN is not a key", |v| !v.is_nan()),
            (-5i32..5).prop_map(f64::from),
        ]
    }

    fn arb_key() -> impl Strategy<Value = Key> {
        let leaf = prop_oneof![
            Just(Key::Min),
            Just(Key::Null),
            any::<String>().prop_map(Key::String),
            "[a-c\u{ff5e}\u{1f600}]{0,4}".prop_map(Key::String),
            arb_number().prop_map(Key::Date),
            arb_number().prop_map(Key::Number),
        ];
        leaf.prop_recursive(3, 16, 4, |inner| {
            prop::collection::vec(inner, 0..4).prop_map(Key::Array)
        })
    }

    #[test]
    fn type_bytes_order_min_first_null_last() {
        let keys = [
            Key::Min,
            Key::string(""),
            Key::date(-1.0),
            Key::number(f64::NEG_INFINITY),
            Key::array(vec![]),
            Key::Null,
        ];
        for pair in keys.windows(2) {
            assert_eq!(pair[0].compare(&pair[1]), Ordering::Less);
            assert_eq!(
                compare_encoded(&pair[0].encode(), &pair[1].encode()).unwrap(),
                Ordering::Less
            );
        }
    }

    #[test]
    fn string_layout() {
        assert_eq!(Key::string("ab").encode(), vec![1, 2, 0, b'a', 0, b'b']);
    }

    #[test]
    fn number_layout_is_native_endian() {
        let mut expected = vec![3];
        expected.extend_from_slice(&1.5f64.to_ne_bytes());
        assert_eq!(Key::number(1.5).encode(), expected);
    }

    #[test]
    fn array_layout() {
        let key = Key::array(vec![Key::number(0.0), Key::string("x")]);
        let encoded = key.encode();
        assert_eq!(&encoded[..2], &[4, 2]);
        assert_eq!(Key::decode(&encoded).unwrap(), key);
    }

    #[test]
    fn shorter_array_sorts_first() {
        let short = Key::array(vec![Key::number(1.0)]);
        let long = Key::array(vec![Key::number(1.0), Key::Min]);
        assert_eq!(
            compare_encoded(&short.encode(), &long.encode()).unwrap(),
            Ordering::Less
        );
    }

    #[test]
    fn extract_returns_exact_key_bytes() {
        let key = Key::array(vec![Key::string("nested"), Key::array(vec![Key::date(7.0)])]);
        let mut bytes = key.encode();
        let key_len = bytes.len();
        bytes.extend_from_slice(&[0x99, 0x98]);

        let mut reader = KeyReader::new(&bytes);
        assert_eq!(reader.extract_key().unwrap(), &bytes[..key_len]);
        assert_eq!(reader.remaining(), &[0x99, 0x98]);
    }

    #[test]
    fn decode_rejects_unknown_type_byte() {
        assert_eq!(Key::decode(&[0x07]), Err(CodecError::InvalidTypeByte(0x07)));
        assert_eq!(
            compare_encoded(&[0x07], &Key::Null.encode()),
            Err(CodecError::InvalidTypeByte(0x07))
        );
    }

    #[test]
    fn decode_rejects_truncated_payloads() {
        let encoded = Key::array(vec![Key::string("abc"), Key::number(2.0)]).encode();
        for len in 0..encoded.len() {
            assert!(Key::decode(&encoded[..len]).is_err(), "len {len}");
        }
    }

    #[test]
    fn min_is_not_a_valid_record_key() {
        assert!(!Key::Min.is_valid());
        assert!(!Key::array(vec![Key::number(1.0), Key::Min]).is_valid());
        assert!(Key::Null.is_valid());
        assert!(Key::string("").is_valid());
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(key in arb_key()) {
            let encoded = key.encode();
            prop_assert_eq!(Key::decode(&encoded).unwrap(), key);
            let mut reader = KeyReader::new(&encoded);
            prop_assert_eq!(reader.extract_key().unwrap(), &encoded[..]);
        }

        #[test]
        fn encoded_order_matches_key_order(a in arb_key(), b in arb_key()) {
            let expected = reference_order(&a, &b);
            prop_assert_eq!(a.compare(&b), expected);
            prop_assert_eq!(compare_encoded(&a.encode(), &b.encode()).unwrap(), expected);
        }
    }
}
