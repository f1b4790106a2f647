//! Journal-backed engine for persistent storage.
//!
//! Directory layout:
//!
//! ```text
//! <path>/
//! ├─ LOCK       # Advisory lock for single-process access
//! └─ JOURNAL    # Header, then CRC32-framed write batches
//! ```
//!
//! The journal header records the comparator name. Every committed
//! [`WriteBatch`] is appended as one frame:
//!
//! ```text
//! | len: u32 LE | crc32(batch): u32 LE | batch bytes |
//! ```
//!
//! Open replays every intact frame into a sorted table. A torn or
//! checksum-failing tail (a crash mid-append) is truncated away.

use crate::batch::WriteBatch;
use crate::checksum::crc32;
use crate::comparator::KeyComparator;
use crate::engine::KvEngine;
use crate::error::{StorageError, StorageResult};
use crate::table::{Snapshot, SortedTable};
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const LOCK_FILE: &str = "LOCK";
const JOURNAL_FILE: &str = "JOURNAL";

/// Magic bytes at the start of the journal.
pub const JOURNAL_MAGIC: [u8; 4] = *b"IKVJ";

/// Current journal format version.
pub const JOURNAL_VERSION: u16 = 1;

const FRAME_HEADER_SIZE: usize = 8;

/// Options for opening a [`FileEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Create the directory if it does not exist.
    pub create_if_missing: bool,
    /// `fsync` the journal after every batch.
    pub sync_writes: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_writes: true,
        }
    }
}

/// A persistent engine: an in-memory sorted table rebuilt from an
/// append-only journal.
///
/// # Durability
///
/// A batch is appended and flushed before it becomes visible. With
/// `sync_writes` it is also `fsync`ed.
///
/// # Example
///
/// ```no_run
/// use idbkv_storage::{BytewiseComparator, EngineOptions, FileEngine, KvEngine};
/// use std::path::Path;
/// use std::sync::Arc;
///
/// let engine = FileEngine::open(
///     Path::new("store"),
///     Arc::new(BytewiseComparator),
///     EngineOptions::default(),
/// )
/// .unwrap();
/// engine.put(b"key", b"value").unwrap();
/// ```
#[derive(Debug)]
pub struct FileEngine {
    path: PathBuf,
    options: EngineOptions,
    journal: Mutex<File>,
    table: RwLock<Arc<SortedTable>>,
    _lock_file: File,
}

impl FileEngine {
    /// Opens or creates an engine directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory is missing and `create_if_missing` is false
    /// - Another process holds the lock (`Locked`)
    /// - The journal was written with another comparator (`ComparatorMismatch`)
    /// - The journal header is unreadable (`Corrupted`)
    /// - I/O errors occur
    pub fn open(
        path: &Path,
        comparator: Arc<dyn KeyComparator>,
        options: EngineOptions,
    ) -> StorageResult<Self> {
        if !path.exists() {
            if options.create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(StorageError::NotFound {
                    path: path.to_path_buf(),
                });
            }
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        let mut journal = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(JOURNAL_FILE))?;

        let mut contents = Vec::new();
        journal.read_to_end(&mut contents)?;

        let mut table = SortedTable::new(Arc::clone(&comparator));
        if contents.is_empty() {
            let header = encode_header(comparator.name());
            journal.write_all(&header)?;
            journal.sync_all()?;
        } else {
            let header_len = check_header(&contents, comparator.name())?;
            let (valid_len, frames) = replay(&contents, header_len, &mut table);
            debug!(frames, keys = table.len(), "replayed journal");
            if valid_len < contents.len() {
                warn!(
                    path = %path.display(),
                    valid_len,
                    file_len = contents.len(),
                    "truncating torn journal tail"
                );
                journal.set_len(valid_len as u64)?;
                journal.sync_all()?;
            }
        }
        journal.seek(SeekFrom::End(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            options,
            journal: Mutex::new(journal),
            table: RwLock::new(Arc::new(table)),
            _lock_file: lock_file,
        })
    }

    /// Deletes an engine directory and everything in it.
    ///
    /// Missing directories are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the files exist but cannot be removed.
    pub fn destroy(path: &Path) -> StorageResult<()> {
        if path.exists() {
            fs::remove_dir_all(path)?;
        }
        Ok(())
    }

    /// Returns the engine directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the options the engine was opened with.
    #[must_use]
    pub fn options(&self) -> EngineOptions {
        self.options
    }
}

impl KvEngine for FileEngine {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.table.read().get(key).map(<[u8]>::to_vec))
    }

    fn write(&self, batch: &WriteBatch) -> StorageResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let payload = batch.encode();
        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&crc32(&payload).to_le_bytes());
        frame.extend_from_slice(&payload);

        // The journal lock is held until the table is updated so replay
        // order always matches visibility order.
        let mut journal = self.journal.lock();
        journal.write_all(&frame)?;
        journal.flush()?;
        if self.options.sync_writes {
            journal.sync_data()?;
        }

        let mut table = self.table.write();
        Arc::make_mut(&mut table).apply(batch);
        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::new(Arc::clone(&self.table.read()))
    }

    fn comparator(&self) -> Arc<dyn KeyComparator> {
        Arc::clone(self.table.read().comparator())
    }
}

fn encode_header(comparator_name: &str) -> Vec<u8> {
    let name = comparator_name.as_bytes();
    let mut header = Vec::with_capacity(JOURNAL_MAGIC.len() + 4 + name.len());
    header.extend_from_slice(&JOURNAL_MAGIC);
    header.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
    header.extend_from_slice(&(name.len() as u16).to_le_bytes());
    header.extend_from_slice(name);
    header
}

/// Validates the header and returns its length.
fn check_header(contents: &[u8], comparator_name: &str) -> StorageResult<usize> {
    let fixed = JOURNAL_MAGIC.len() + 4;
    if contents.len() < fixed || contents[..JOURNAL_MAGIC.len()] != JOURNAL_MAGIC {
        return Err(StorageError::corrupted("bad journal magic"));
    }
    let version = u16::from_le_bytes([contents[4], contents[5]]);
    if version != JOURNAL_VERSION {
        return Err(StorageError::corrupted(format!(
            "unsupported journal version {version}"
        )));
    }
    let name_len = usize::from(u16::from_le_bytes([contents[6], contents[7]]));
    let name = contents
        .get(fixed..fixed + name_len)
        .ok_or_else(|| StorageError::corrupted("journal header truncated"))?;
    if name != comparator_name.as_bytes() {
        return Err(StorageError::ComparatorMismatch {
            expected: comparator_name.to_string(),
            found: String::from_utf8_lossy(name).into_owned(),
        });
    }
    Ok(fixed + name_len)
}

/// Applies intact frames to `table`, returning the length of the valid
/// prefix and the number of frames applied.
fn replay(contents: &[u8], start: usize, table: &mut SortedTable) -> (usize, usize) {
    let mut offset = start;
    let mut frames = 0;
    while contents.len() - offset >= FRAME_HEADER_SIZE {
        let header = &contents[offset..offset + FRAME_HEADER_SIZE];
        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let checksum = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let body_start = offset + FRAME_HEADER_SIZE;
        let Some(payload) = contents.get(body_start..body_start + len) else {
            break;
        };
        if crc32(payload) != checksum {
            break;
        }
        let Ok(batch) = WriteBatch::decode(payload) else {
            break;
        };
        table.apply(&batch);
        offset = body_start + len;
        frames += 1;
    }
    (offset, frames)
}
