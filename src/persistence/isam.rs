//! Key -> blob store over a pair of files.
//!
//! - `<base>.dat`: append-only `[u32 len][payload]` records
//! - `<base>.idx`: 16-byte `[i64 key][u64 offset]` records in ascending key order
//!
//! Both files form one lock domain. Point reads binary-search the index file;
//! scans walk it with a single forward cursor.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use super::data_log::DataLog;
use super::sorted_index::{IndexEntry, SortedIndex};
use crate::Result;

/// What a single-record insert did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Empty payload, nothing written
    Skipped,
    Inserted,
    /// The key existed; its offset now points at the new payload
    Replaced,
}

struct IsamFiles {
    data: DataLog,
    index: SortedIndex,
    /// Next index position returned by `next()`
    cursor: u64,
}

/// Sorted key index + append-only data file
pub struct IsamStore {
    base: PathBuf,
    files: Mutex<IsamFiles>,
}

impl IsamStore {
    /// Open (or create) `<base>.idx` and `<base>.dat`.
    pub fn open<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        if let Some(parent) = base.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let data = DataLog::open(&with_suffix(&base, ".dat"))?;
        let index = SortedIndex::open(&with_suffix(&base, ".idx"))?;
        debug!(
            "Opened store {:?}: {} keys, {} data bytes",
            base,
            index.len(),
            data.len()
        );

        Ok(Self {
            base,
            files: Mutex::new(IsamFiles {
                data,
                index,
                cursor: 0,
            }),
        })
    }

    /// Store `payload` under `key`, replacing any previous value.
    ///
    /// Empty payloads are skipped. The replaced check and the write happen
    /// under the same lock.
    pub fn insert(&self, key: i64, payload: &[u8]) -> Result<InsertOutcome> {
        if payload.is_empty() {
            return Ok(InsertOutcome::Skipped);
        }
        let mut files = self.files.lock();
        let offset = files.data.append(payload)?;
        if files.index.insert(IndexEntry::new(key, offset))? {
            Ok(InsertOutcome::Replaced)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    /// Store many records with a single index rewrite.
    ///
    /// Empty payloads are skipped; for repeated keys the last one wins.
    /// Returns the number of records written.
    pub fn insert_batch<K, B>(&self, entries: &[(K, B)]) -> Result<usize>
    where
        K: Copy + Into<i64>,
        B: AsRef<[u8]>,
    {
        let live: Vec<(i64, &[u8])> = entries
            .iter()
            .filter(|(_, payload)| !payload.as_ref().is_empty())
            .map(|(key, payload)| ((*key).into(), payload.as_ref()))
            .collect();
        if live.is_empty() {
            return Ok(0);
        }

        let mut files = self.files.lock();
        let offsets = files.data.append_all(live.iter().map(|(_, p)| *p))?;
        let batch = live
            .iter()
            .zip(offsets)
            .map(|((key, _), offset)| IndexEntry::new(*key, offset))
            .collect();
        files.index.merge_batch(batch)?;
        Ok(live.len())
    }

    pub fn get(&self, key: i64) -> Result<Option<Vec<u8>>> {
        let mut files = self.files.lock();
        match files.index.find(key)? {
            Some(offset) => Ok(Some(files.data.read(offset)?)),
            None => Ok(None),
        }
    }

    pub fn contains(&self, key: i64) -> Result<bool> {
        let mut files = self.files.lock();
        Ok(files.index.search(key)?.is_ok())
    }

    /// Rewind the scan cursor to the smallest key.
    pub fn reset_cursor(&self) {
        self.files.lock().cursor = 0;
    }

    /// Next record in key order, or `None` at the end.
    ///
    /// One cursor per store; inserts during a scan may shift records under it.
    pub fn next(&self) -> Result<Option<(i64, Vec<u8>)>> {
        let mut files = self.files.lock();
        if files.cursor >= files.index.len() {
            return Ok(None);
        }
        let pos = files.cursor;
        let entry = files.index.entry(pos)?;
        let payload = files.data.read(entry.offset)?;
        files.cursor += 1;
        Ok(Some((entry.key, payload)))
    }

    /// Snapshot of all keys in ascending order.
    pub fn keys(&self) -> Result<Vec<i64>> {
        let mut files = self.files.lock();
        Ok(files.index.read_all()?.into_iter().map(|e| e.key).collect())
    }

    pub fn len(&self) -> u64 {
        self.files.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
