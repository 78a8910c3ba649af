use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::HaystackError;
use crate::Result;

/// Bytes per index record: i64 key + u64 data offset, little endian.
pub const ENTRY_SIZE: u64 = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: i64,
    pub offset: u64,
}

impl IndexEntry {
    pub fn new(key: i64, offset: u64) -> Self {
        Self { key, offset }
    }

    fn encode(&self) -> [u8; ENTRY_SIZE as usize] {
        let mut buf = [0u8; ENTRY_SIZE as usize];
        buf[..8].copy_from_slice(&self.key.to_le_bytes());
        buf[8..].copy_from_slice(&self.offset.to_le_bytes());
        buf
    }

    fn decode(buf: &[u8; ENTRY_SIZE as usize]) -> Self {
        let mut key = [0u8; 8];
        let mut offset = [0u8; 8];
        key.copy_from_slice(&buf[..8]);
        offset.copy_from_slice(&buf[8..]);
        Self {
            key: i64::from_le_bytes(key),
            offset: u64::from_le_bytes(offset),
        }
    }
}

/// Fixed-width index file kept in ascending key order at all times.
///
/// Keys are unique: writing an existing key replaces its offset.
pub struct SortedIndex {
    path: PathBuf,
    file: File,
    entries: u64,
}

impl SortedIndex {
    pub fn open(path: &Path) -> Result<Self> {
        let file = open_rw(path)?;
        let size = file.metadata()?.len();
        if size % ENTRY_SIZE != 0 {
            let keep = size - size % ENTRY_SIZE;
            warn!(
                "Index {:?} has a torn trailing record, truncating {} -> {} bytes",
                path, size, keep
            );
            file.set_len(keep)?;
        }

        let mut index = Self {
            path: path.to_path_buf(),
            entries: file.metadata()?.len() / ENTRY_SIZE,
            file,
        };
        index.repair_order()?;
        Ok(index)
    }

    /// Sort an index written out of order (append-only writers), keeping the
    /// last-written offset for duplicate keys.
    fn repair_order(&mut self) -> Result<()> {
        let entries = self.read_all()?;
        let sorted = entries.windows(2).all(|w| w[0].key < w[1].key);
        if sorted {
            return Ok(());
        }
        let repaired = sort_dedup_last(entries);
        warn!(
            "Index {:?} was not sorted, rewrote {} -> {} entries",
            self.path,
            self.entries,
            repaired.len()
        );
        self.rewrite(&repaired)
    }

    pub fn len(&self) -> u64 {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    pub fn entry(&mut self, pos: u64) -> Result<IndexEntry> {
        if pos >= self.entries {
            return Err(HaystackError::Corrupt(format!(
                "index position {} out of range ({} entries)",
                pos, self.entries
            )));
        }
        self.file.seek(SeekFrom::Start(pos * ENTRY_SIZE))?;
        let mut buf = [0u8; ENTRY_SIZE as usize];
        self.file.read_exact(&mut buf)?;
        Ok(IndexEntry::decode(&buf))
    }

    /// Binary search: `Ok(pos)` on a hit, `Err(insertion point)` otherwise.
    pub fn search(&mut self, key: i64) -> Result<std::result::Result<u64, u64>> {
        let mut low = 0u64;
        let mut high = self.entries;
        while low < high {
            let mid = low + (high - low) / 2;
            let entry = self.entry(mid)?;
            if entry.key == key {
                return Ok(Ok(mid));
            }
            if entry.key < key {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        Ok(Err(low))
    }

    pub fn find(&mut self, key: i64) -> Result<Option<u64>> {
        match self.search(key)? {
            Ok(pos) => Ok(Some(self.entry(pos)?.offset)),
            Err(_) => Ok(None),
        }
    }

    /// Insert keeping the sort order; O(n) in the number of trailing records.
    pub fn insert(&mut self, entry: IndexEntry) -> Result<bool> {
        let replaced = match self.search(entry.key)? {
            Ok(pos) => {
                self.file.seek(SeekFrom::Start(pos * ENTRY_SIZE + 8))?;
                self.file.write_all(&entry.offset.to_le_bytes())?;
                true
            }
            Err(pos) => {
                let start = pos * ENTRY_SIZE;
                let mut tail = Vec::with_capacity(((self.entries - pos) * ENTRY_SIZE) as usize);
                self.file.seek(SeekFrom::Start(start))?;
                (&mut self.file).read_to_end(&mut tail)?;

                self.file.seek(SeekFrom::Start(start))?;
                let mut writer = BufWriter::new(&mut self.file);
                writer.write_all(&entry.encode())?;
                writer.write_all(&tail)?;
                writer.flush()?;
                drop(writer);
                self.entries += 1;
                false
            }
        };
        Ok(replaced)
    }

    /// Merge a batch into the index with one sorted rewrite.
    ///
    /// Later entries win over earlier ones and over existing records with the same key.
    pub fn merge_batch(&mut self, batch: Vec<IndexEntry>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let batch = sort_dedup_last(batch);
        let existing = self.read_all()?;

        let mut merged = Vec::with_capacity(existing.len() + batch.len());
        let mut old = existing.into_iter().peekable();
        let mut new = batch.into_iter().peekable();
        loop {
            match (old.peek(), new.peek()) {
                (Some(o), Some(n)) => {
                    if o.key < n.key {
                        merged.extend(old.next());
                    } else if o.key > n.key {
                        merged.extend(new.next());
                    } else {
                        old.next();
                        merged.extend(new.next());
                    }
                }
                (Some(_), None) => merged.extend(old.next()),
                (None, Some(_)) => merged.extend(new.next()),
                (None, None) => break,
            }
        }
        self.rewrite(&merged)
    }

    pub fn read_all(&mut self) -> Result<Vec<IndexEntry>> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(&mut self.file);
        let mut out = Vec::with_capacity(self.entries as usize);
        let mut buf = [0u8; ENTRY_SIZE as usize];
        for _ in 0..self.entries {
            reader.read_exact(&mut buf)?;
            out.push(IndexEntry::decode(&buf));
        }
        Ok(out)
    }

    /// Replace the file contents: write `<path>.tmp`, fsync, rename over.
    fn rewrite(&mut self, entries: &[IndexEntry]) -> Result<()> {
        let tmp_path = tmp_sibling(&self.path);
        {
            let tmp = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(tmp);
            for entry in entries {
                writer.write_all(&entry.encode())?;
            }
            let tmp = writer.into_inner().map_err(|e| e.into_error())?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        self.file = open_rw(&self.path)?;
        self.entries = entries.len() as u64;
        Ok(())
    }
}

fn open_rw(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)?)
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Stable sort by key, then keep the last entry of each run of equal keys.
fn sort_dedup_last(mut entries: Vec<IndexEntry>) -> Vec<IndexEntry> {
    entries.sort_by_key(|e| e.key);
    let mut out: Vec<IndexEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        match out.last_mut() {
            Some(last) if last.key == entry.key => *last = entry,
            _ => out.push(entry),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn keys(index: &mut SortedIndex) -> Vec<i64> {
        index.read_all().unwrap().iter().map(|e| e.key).collect()
    }

    #[test]
    fn test_insert_keeps_order() {
        let tmp = TempDir::new().unwrap();
        let mut index = SortedIndex::open(&tmp.path().join("t.idx")).unwrap();
        for (i, key) in [5i64, 1, 9, 3, -4].iter().enumerate() {
            index.insert(IndexEntry::new(*key, i as u64)).unwrap();
        }
        assert_eq!(keys(&mut index), vec![-4, 1, 3, 5, 9]);
        assert_eq!(index.find(9).unwrap(), Some(2));
        assert_eq!(index.find(7).unwrap(), None);
    }

    #[test]
    fn test_insert_existing_key_replaces_offset() {
        let tmp = TempDir::new().unwrap();
        let mut index = SortedIndex::open(&tmp.path().join("t.idx")).unwrap();
        index.insert(IndexEntry::new(1, 10)).unwrap();
        index.insert(IndexEntry::new(2, 20)).unwrap();
        assert!(index.insert(IndexEntry::new(1, 30)).unwrap());
        assert_eq!(index.len(), 2);
        assert_eq!(index.find(1).unwrap(), Some(30));
    }

    #[test]
    fn test_merge_batch() {
        let tmp = TempDir::new().unwrap();
        let mut index = SortedIndex::open(&tmp.path().join("t.idx")).unwrap();
        index.insert(IndexEntry::new(2, 0)).unwrap();
        index.insert(IndexEntry::new(6, 1)).unwrap();

        index
            .merge_batch(vec![
                IndexEntry::new(4, 2),
                IndexEntry::new(6, 3),
                IndexEntry::new(1, 4),
                IndexEntry::new(4, 5),
            ])
            .unwrap();

        assert_eq!(keys(&mut index), vec![1, 2, 4, 6]);
        assert_eq!(index.find(4).unwrap(), Some(5));
        assert_eq!(index.find(6).unwrap(), Some(3));
    }

    #[test]
    fn test_open_repairs_unsorted_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("t.idx");
        let mut raw = Vec::new();
        for (key, offset) in [(9i64, 0u64), (3, 1), (9, 2), (1, 3)] {
            raw.extend_from_slice(&IndexEntry::new(key, offset).encode());
        }
        raw.extend_from_slice(&[1, 2, 3]);
        fs::write(&path, raw).unwrap();

        let mut index = SortedIndex::open(&path).unwrap();
        assert_eq!(keys(&mut index), vec![1, 3, 9]);
        assert_eq!(index.find(9).unwrap(), Some(2));
    }
}
