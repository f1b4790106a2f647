//! Atomic write batches.

use crate::error::{StorageError, StorageResult};

const OP_PUT: u8 = 1;
const OP_DELETE: u8 = 2;

/// A single operation in a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Insert or overwrite a key.
    Put {
        /// Key bytes.
        key: Vec<u8>,
        /// Value bytes.
        value: Vec<u8>,
    },
    /// Remove a key. Removing an absent key is not an error.
    Delete {
        /// Key bytes.
        key: Vec<u8>,
    },
}

impl BatchOp {
    /// Returns the key this operation touches.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// An ordered list of writes applied atomically by [`crate::KvEngine::write`].
///
/// Operations apply in insertion order, so a later write to the same key wins.
///
/// # Wire format
///
/// ```text
/// count: u32 LE
/// repeated:
///   op: u8 (1 = put, 2 = delete)
///   key_len: u32 LE, key
///   value_len: u32 LE, value   (put only)
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty batch with room for `capacity` operations.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ops: Vec::with_capacity(capacity),
        }
    }

    /// Appends a put.
    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.ops.push(BatchOp::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        });
    }

    /// Appends a delete.
    pub fn delete(&mut self, key: &[u8]) {
        self.ops.push(BatchOp::Delete { key: key.to_vec() });
    }

    /// Returns the operations in order.
    #[must_use]
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Returns the number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if the batch holds no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Removes all operations.
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Serializes the batch.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.ops.len() * 16);
        buf.extend_from_slice(&(self.ops.len() as u32).to_le_bytes());
        for op in &self.ops {
            match op {
                BatchOp::Put { key, value } => {
                    buf.push(OP_PUT);
                    put_slice(&mut buf, key);
                    put_slice(&mut buf, value);
                }
                BatchOp::Delete { key } => {
                    buf.push(OP_DELETE);
                    put_slice(&mut buf, key);
                }
            }
        }
        buf
    }

    /// Deserializes a batch produced by [`WriteBatch::encode`].
    ///
    /// # Errors
    ///
    /// Returns `Corrupted` if the bytes are truncated, carry an unknown
    /// operation tag, or have trailing garbage.
    pub fn decode(bytes: &[u8]) -> StorageResult<Self> {
        let mut reader = SliceReader { data: bytes, pos: 0 };
        let count = reader.read_u32()? as usize;
        // Each op takes at least five bytes; cap the preallocation accordingly.
        let mut ops = Vec::with_capacity(count.min(bytes.len() / 5));
        for _ in 0..count {
            let op = match reader.read_u8()? {
                OP_PUT => {
                    let key = reader.read_slice()?.to_vec();
                    let value = reader.read_slice()?.to_vec();
                    BatchOp::Put { key, value }
                }
                OP_DELETE => BatchOp::Delete {
                    key: reader.read_slice()?.to_vec(),
                },
                other => {
                    return Err(StorageError::corrupted(format!(
                        "unknown batch operation tag {other}"
                    )))
                }
            };
            ops.push(op);
        }
        if reader.pos != bytes.len() {
            return Err(StorageError::corrupted("trailing bytes after write batch"));
        }
        Ok(Self { ops })
    }
}

fn put_slice(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
    buf.extend_from_slice(data);
}

struct SliceReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    fn read_bytes(&mut self, len: usize) -> StorageResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| StorageError::corrupted("write batch truncated"))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> StorageResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u32(&mut self) -> StorageResult<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_slice(&mut self) -> StorageResult<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.read_bytes(len)
    }
}
