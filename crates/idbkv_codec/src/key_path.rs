//! Key path metadata values.
//!
//! String key paths may be stored as a bare UTF-16BE string. Every other
//! form starts with two zero bytes and a type byte, which a bare string
//! cannot begin with unless it starts with U+0000.

use crate::coding::{decode_string, put_string, put_string_with_length, put_var_u64};
use crate::error::{CodecError, CodecResult};
use crate::reader::KeyReader;

const TYPED_MARKER: [u8; 2] = [0, 0];

const NULL_TYPE: u8 = 0;
const STRING_TYPE: u8 = 1;
const ARRAY_TYPE: u8 = 2;

/// Where an object store or index reads its key from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KeyPath {
    /// No key path; keys are supplied out of line.
    #[default]
    Null,
    /// A single dotted path.
    String(String),
    /// Several paths forming an array key.
    Array(Vec<String>),
}

impl KeyPath {
    /// Creates a string key path.
    pub fn string(path: impl Into<String>) -> Self {
        Self::String(path.into())
    }

    /// Returns true for [`KeyPath::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Encodes the key path in the typed form.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = TYPED_MARKER.to_vec();
        match self {
            Self::Null => buf.push(NULL_TYPE),
            Self::String(path) => {
                buf.push(STRING_TYPE);
                put_string_with_length(&mut buf, path);
            }
            Self::Array(paths) => {
                buf.push(ARRAY_TYPE);
                put_var_u64(&mut buf, paths.len() as u64);
                for path in paths {
                    put_string_with_length(&mut buf, path);
                }
            }
        }
        buf
    }

    /// Encodes a string key path as a bare string.
    #[must_use]
    pub fn encode_bare(path: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(path.len() * 2);
        put_string(&mut buf, path);
        buf
    }

    /// Decodes either the typed or the bare form.
    ///
    /// # Errors
    ///
    /// Returns an error for truncated data or an unknown type byte.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        if bytes.len() < 3 || bytes[..2] != TYPED_MARKER {
            return decode_string(bytes).map(Self::String);
        }
        let mut reader = KeyReader::new(&bytes[3..]);
        let path = match bytes[2] {
            NULL_TYPE => Self::Null,
            STRING_TYPE => Self::String(reader.read_string_with_length()?),
            ARRAY_TYPE => {
                let count = usize::try_from(reader.read_var_int()?)
                    .map_err(|_| CodecError::IntegerOverflow)?;
                let mut paths = Vec::with_capacity(count.min(bytes.len()));
                for _ in 0..count {
                    paths.push(reader.read_string_with_length()?);
                }
                Self::Array(paths)
            }
            other => {
                return Err(CodecError::invalid_key(format!(
                    "unknown key path type {other}"
                )))
            }
        };
        if !reader.is_empty() {
            return Err(CodecError::invalid_key("trailing bytes after key path"));
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_forms_decode() {
        for path in [
            KeyPath::Null,
            KeyPath::string("a.b"),
            KeyPath::string(""),
            KeyPath::Array(vec!["x".into(), "y.z".into()]),
            KeyPath::Array(vec![]),
        ] {
            assert_eq!(KeyPath::decode(&path.encode()).unwrap(), path);
        }
    }

    #[test]
    fn bare_string_decodes_as_string_path() {
        assert_eq!(
            KeyPath::decode(&KeyPath::encode_bare("id")).unwrap(),
            KeyPath::string("id")
        );
        assert_eq!(KeyPath::decode(&[]).unwrap(), KeyPath::string(""));
    }

    #[test]
    fn typed_null_layout() {
        assert_eq!(KeyPath::Null.encode(), vec![0, 0, 0]);
    }

    #[test]
    fn unknown_type_fails() {
        assert!(KeyPath::decode(&[0, 0, 9]).is_err());
    }
}
