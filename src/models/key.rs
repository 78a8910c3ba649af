//! 64-bit storage keys.
//!
//! Layout, most significant byte first:
//!
//! ```text
//! [63:56] kind | [55:40] site | [39:8] primary id | [7:0] reserved
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Record kind stored in the top byte of a key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum KeyKind {
    PostById = 0,
    CommentById = 1,
    CommentsByPost = 2,
    PostsByTag = 3,
    TagInfo = 4,
}

impl KeyKind {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(KeyKind::PostById),
            1 => Some(KeyKind::CommentById),
            2 => Some(KeyKind::CommentsByPost),
            3 => Some(KeyKind::PostsByTag),
            4 => Some(KeyKind::TagInfo),
            _ => None,
        }
    }
}

/// Site identifier
pub type SiteId = u16;

/// Packed identity of a stored record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CompoundKey {
    /// Raw kind byte; unknown values survive a round trip
    pub kind: u8,
    pub site_id: SiteId,
    pub primary_id: u32,
    pub reserved: u8,
}

impl CompoundKey {
    pub fn new(kind: KeyKind, site_id: SiteId, primary_id: u32) -> Self {
        Self {
            kind: kind as u8,
            site_id,
            primary_id,
            reserved: 0,
        }
    }

    /// Key of a document record
    pub fn post(site_id: SiteId, primary_id: u32) -> Self {
        Self::new(KeyKind::PostById, site_id, primary_id)
    }

    pub fn kind(&self) -> Option<KeyKind> {
        KeyKind::from_u8(self.kind)
    }

    pub fn pack(&self) -> u64 {
        ((self.kind as u64) << 56)
            | ((self.site_id as u64) << 40)
            | ((self.primary_id as u64) << 8)
            | self.reserved as u64
    }

    pub fn unpack(packed: u64) -> Self {
        Self {
            kind: (packed >> 56) as u8,
            site_id: (packed >> 40) as u16,
            primary_id: (packed >> 8) as u32,
            reserved: packed as u8,
        }
    }

    /// Storage keys are signed; the bit pattern is preserved.
    pub fn to_storage_key(&self) -> i64 {
        self.pack() as i64
    }

    pub fn from_storage_key(key: i64) -> Self {
        Self::unpack(key as u64)
    }
}

impl fmt::Display for CompoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "{:?}", kind)?,
            None => write!(f, "Unknown({})", self.kind)?,
        }
        write!(
            f,
            " site:{} id:{} (packed:0x{:x})",
            self.site_id,
            self.primary_id,
            self.pack()
        )
    }
}
