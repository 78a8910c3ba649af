use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::HaystackError;
use crate::Result;

/// Size of the length prefix in front of every payload.
pub const LENGTH_PREFIX: u64 = 4;

/// Append-only payload file.
///
/// Record format:
/// - u32 length (little endian)
/// - raw payload bytes
///
/// Not synchronized; the owning store serializes access.
pub struct DataLog {
    path: PathBuf,
    file: File,
    len: u64,
}

impl DataLog {
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;
        let len = file.seek(SeekFrom::End(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            len,
        })
    }

    /// Append a payload and return its offset.
    pub fn append(&mut self, payload: &[u8]) -> Result<u64> {
        let offset = self.len;
        let len = payload_len(payload)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&len.to_le_bytes())?;
        self.file.write_all(payload)?;
        self.len += LENGTH_PREFIX + payload.len() as u64;
        Ok(offset)
    }

    /// Append several payloads with one buffered write; offsets are returned in order.
    pub fn append_all<'a, I>(&mut self, payloads: I) -> Result<Vec<u64>>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut offsets = Vec::new();
        let mut offset = self.len;
        self.file.seek(SeekFrom::Start(offset))?;
        {
            let mut writer = BufWriter::new(&mut self.file);
            for payload in payloads {
                let len = payload_len(payload)?;
                writer.write_all(&len.to_le_bytes())?;
                writer.write_all(payload)?;
                offsets.push(offset);
                offset += LENGTH_PREFIX + payload.len() as u64;
            }
            writer.flush()?;
        }
        self.len = offset;
        Ok(offsets)
    }

    /// Read the payload stored at `offset`.
    pub fn read(&mut self, offset: u64) -> Result<Vec<u8>> {
        if offset + LENGTH_PREFIX > self.len {
            return Err(HaystackError::Corrupt(format!(
                "data offset {} past end of {:?} ({} bytes)",
                offset, self.path, self.len
            )));
        }
        self.file.seek(SeekFrom::Start(offset))?;

        let mut len_buf = [0u8; 4];
        self.file.read_exact(&mut len_buf)?;
        let len = u32::from_le_bytes(len_buf) as u64;

        if offset + LENGTH_PREFIX + len > self.len {
            return Err(HaystackError::Corrupt(format!(
                "record at {} claims {} bytes, beyond end of {:?}",
                offset, len, self.path
            )));
        }

        let mut payload = vec![0u8; len as usize];
        self.file.read_exact(&mut payload)?;
        Ok(payload)
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn payload_len(payload: &[u8]) -> Result<u32> {
    u32::try_from(payload.len())
        .map_err(|_| HaystackError::invalid(format!("payload of {} bytes is too large", payload.len())))
}
