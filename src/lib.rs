//! Generate HOOMD test fixtures and write them as gsd trajectories.
//!
//! The crate is layered in three parts:
//!
//! - the gsd file layer ([`writer::GSDWriter`] and [`reader::GSDReader`]), which stores named,
//!   typed `N x M` chunks per frame,
//! - the HOOMD schema layer ([`hoomd`]), which maps a typed [`hoomd::Frame`] onto those chunks,
//! - the [`fixture`] generator, which builds a small lattice system and appends two frames.
pub use crate::chunk::Chunk;
pub use crate::error::{Error, Result};
pub use crate::hoomd::{Frame, HoomdReader, HoomdWriter};
pub use crate::reader::GSDReader;
pub use crate::writer::GSDWriter;

mod chunk;
mod error;
pub mod fixture;
pub mod hoomd;
pub mod reader;
pub mod writer;

/// Magic number at the start of every gsd file.
pub const MAGIC: u64 = 0x65DF65DF65DF65DF;
/// The file layer version we write.
pub const GSD_VERSION: u32 = make_version(2, 0);
/// Longest chunk name we accept, excluding the terminating NUL.
pub const MAX_NAME_LEN: usize = 63;
/// The name list is allocated in units of this many bytes.
pub const NAME_SIZE: u64 = 64;

pub(crate) const INITIAL_INDEX_ENTRIES: u64 = 128;
pub(crate) const INITIAL_NAMELIST_BYTES: u64 = 1024;

/// Pack a `major.minor` pair the way gsd stores versions.
pub const fn make_version(major: u16, minor: u16) -> u32 {
    (major as u32) << 16 | minor as u32
}

/// Split a packed version back into `(major, minor)`.
pub const fn split_version(version: u32) -> (u32, u32) {
    (version >> 16, version & 0xffff)
}

/// Element type of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChunkType {
    U8 = 1,
    U16 = 2,
    U32 = 3,
    U64 = 4,
    I8 = 5,
    I16 = 6,
    I32 = 7,
    I64 = 8,
    F32 = 9,
    F64 = 10,
    Character = 11,
}

impl ChunkType {
    /// Size of a single element in bytes.
    pub const fn size(self) -> usize {
        match self {
            ChunkType::U8 | ChunkType::I8 | ChunkType::Character => 1,
            ChunkType::U16 | ChunkType::I16 => 2,
            ChunkType::U32 | ChunkType::I32 | ChunkType::F32 => 4,
            ChunkType::U64 | ChunkType::I64 | ChunkType::F64 => 8,
        }
    }
}

impl TryFrom<u8> for ChunkType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        let kind = match value {
            1 => ChunkType::U8,
            2 => ChunkType::U16,
            3 => ChunkType::U32,
            4 => ChunkType::U64,
            5 => ChunkType::I8,
            6 => ChunkType::I16,
            7 => ChunkType::I32,
            8 => ChunkType::I64,
            9 => ChunkType::F32,
            10 => ChunkType::F64,
            11 => ChunkType::Character,
            weird => return Err(Error::InvalidChunkType(weird)),
        };
        Ok(kind)
    }
}

/// The fixed-size header at the start of a gsd file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub magic: u64,
    pub index_location: u64,
    pub index_allocated_entries: u64,
    pub namelist_location: u64,
    /// Size of the name list block, counted in units of [`NAME_SIZE`] bytes.
    pub namelist_allocated_entries: u64,
    pub schema_version: u32,
    pub gsd_version: u32,
    pub application: [u8; 64],
    pub schema: [u8; 64],
}

impl Header {
    pub const SIZE: usize = 256;

    pub fn new(application: &str, schema: &str, schema_version: u32) -> Self {
        Self {
            magic: MAGIC,
            index_location: Self::SIZE as u64,
            index_allocated_entries: INITIAL_INDEX_ENTRIES,
            namelist_location: Self::SIZE as u64 + INITIAL_INDEX_ENTRIES * IndexEntry::SIZE as u64,
            namelist_allocated_entries: INITIAL_NAMELIST_BYTES / NAME_SIZE,
            schema_version,
            gsd_version: GSD_VERSION,
            application: fixed_str(application),
            schema: fixed_str(schema),
        }
    }

    pub fn to_le_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0; Self::SIZE];
        bytes[0..8].copy_from_slice(&self.magic.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.index_location.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.index_allocated_entries.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.namelist_location.to_le_bytes());
        bytes[32..40].copy_from_slice(&self.namelist_allocated_entries.to_le_bytes());
        bytes[40..44].copy_from_slice(&self.schema_version.to_le_bytes());
        bytes[44..48].copy_from_slice(&self.gsd_version.to_le_bytes());
        bytes[48..112].copy_from_slice(&self.application);
        bytes[112..176].copy_from_slice(&self.schema);
        // The remaining 80 bytes are reserved and stay zeroed.
        bytes
    }

    pub fn from_le_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let u64_at = |at: usize| u64::from_le_bytes(slice_array(&bytes[at..at + 8]));
        let u32_at = |at: usize| u32::from_le_bytes(slice_array(&bytes[at..at + 4]));
        Self {
            magic: u64_at(0),
            index_location: u64_at(8),
            index_allocated_entries: u64_at(16),
            namelist_location: u64_at(24),
            namelist_allocated_entries: u64_at(32),
            schema_version: u32_at(40),
            gsd_version: u32_at(44),
            application: slice_array(&bytes[48..112]),
            schema: slice_array(&bytes[112..176]),
        }
    }

    /// Size of the index block in bytes, or `None` if it does not fit in a `u64`.
    pub fn index_nbytes(&self) -> Option<u64> {
        self.index_allocated_entries.checked_mul(IndexEntry::SIZE as u64)
    }

    /// Size of the name list block in bytes, or `None` if it does not fit in a `u64`.
    pub fn namelist_nbytes(&self) -> Option<u64> {
        self.namelist_allocated_entries.checked_mul(NAME_SIZE)
    }

    pub fn application(&self) -> String {
        from_fixed_str(&self.application)
    }

    pub fn schema(&self) -> String {
        from_fixed_str(&self.schema)
    }
}

/// An entry in the index, locating one chunk of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub frame: u64,
    pub n: u64,
    /// Byte offset of the chunk data. Zero marks an unused slot.
    pub location: i64,
    pub m: u32,
    pub id: u16,
    pub kind: u8,
    pub flags: u8,
}

impl IndexEntry {
    pub const SIZE: usize = 32;

    pub fn to_le_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0; Self::SIZE];
        bytes[0..8].copy_from_slice(&self.frame.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.n.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.location.to_le_bytes());
        bytes[24..28].copy_from_slice(&self.m.to_le_bytes());
        bytes[28..30].copy_from_slice(&self.id.to_le_bytes());
        bytes[30] = self.kind;
        bytes[31] = self.flags;
        bytes
    }

    pub fn from_le_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            frame: u64::from_le_bytes(slice_array(&bytes[0..8])),
            n: u64::from_le_bytes(slice_array(&bytes[8..16])),
            location: i64::from_le_bytes(slice_array(&bytes[16..24])),
            m: u32::from_le_bytes(slice_array(&bytes[24..28])),
            id: u16::from_le_bytes(slice_array(&bytes[28..30])),
            kind: bytes[30],
            flags: bytes[31],
        }
    }

    pub fn is_used(&self) -> bool {
        self.location != 0
    }

    pub fn chunk_type(&self) -> Result<ChunkType> {
        ChunkType::try_from(self.kind)
    }

    /// Number of data bytes this entry points at.
    ///
    /// Returns `Ok(None)` when the shape is too large to address.
    pub fn nbytes(&self) -> Result<Option<u64>> {
        let size = self.chunk_type()?.size() as u64;
        Ok(self
            .n
            .checked_mul(self.m as u64)
            .and_then(|count| count.checked_mul(size)))
    }
}

/// Copy a slice of known length into an array.
///
/// # Panics
///
/// Panics if the lengths differ. All callers slice with constant bounds.
fn slice_array<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut array = [0; N];
    array.copy_from_slice(slice);
    array
}

fn fixed_str<const N: usize>(s: &str) -> [u8; N] {
    let mut array = [0; N];
    // Keep one byte for the terminating NUL.
    let len = usize::min(s.len(), N - 1);
    array[..len].copy_from_slice(&s.as_bytes()[..len]);
    array
}

fn from_fixed_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_packing() {
        assert_eq!(make_version(2, 0), 0x20000);
        assert_eq!(split_version(make_version(1, 4)), (1, 4));
    }

    #[test]
    fn header_layout() {
        let header = Header::new("gsdfix", "hoomd", make_version(1, 4));
        let bytes = header.to_le_bytes();
        assert_eq!(&bytes[0..8], &MAGIC.to_le_bytes());
        assert_eq!(&bytes[112..117], b"hoomd");
        assert!(bytes[176..].iter().all(|&b| b == 0));
        assert_eq!(Header::from_le_bytes(&bytes), header);
        assert_eq!(header.schema(), "hoomd");
        assert_eq!(header.namelist_location, 256 + 128 * 32);
        assert_eq!(&bytes[32..40], &16u64.to_le_bytes());
        assert_eq!(header.namelist_nbytes(), Some(1024));
    }

    #[test]
    fn index_entry_layout() {
        let entry = IndexEntry {
            frame: 3,
            n: 16,
            location: 4096,
            m: 3,
            id: 7,
            kind: ChunkType::F32 as u8,
            flags: 0,
        };
        let bytes = entry.to_le_bytes();
        assert_eq!(bytes[30], 9);
        assert_eq!(IndexEntry::from_le_bytes(&bytes), entry);
        assert_eq!(entry.nbytes().unwrap(), Some(16 * 3 * 4));

        let huge = IndexEntry {
            n: u64::MAX / 2,
            ..entry
        };
        assert_eq!(huge.nbytes().unwrap(), None);
    }

    #[test]
    fn fixed_str_truncates() {
        let s: [u8; 4] = fixed_str("hoomd");
        assert_eq!(&s, b"hoo\0");
        assert_eq!(from_fixed_str(&s), "hoo");
    }
}
