use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use log::debug;

use crate::{split_version, Chunk, Error, Header, IndexEntry, Result, MAGIC};

/// Reads chunks from a gsd file.
///
/// The header, name list, and index are loaded when the reader is constructed. Chunk data is only
/// read on request.
#[derive(Debug)]
pub struct GSDReader<R> {
    pub file: R,
    header: Header,
    names: Vec<String>,
    /// Used index entries, sorted by frame and then by id.
    index: Vec<IndexEntry>,
    /// Length of the stream in bytes.
    len: u64,
}

impl GSDReader<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        debug!("opened gsd file {:?}", path.as_ref());
        Self::new(file)
    }
}

impl<R: Read + Seek> GSDReader<R> {
    /// The major file layer version we know how to read.
    pub const MAJOR_VERSION: u32 = 2;

    pub fn new(mut file: R) -> Result<Self> {
        let len = file.seek(SeekFrom::End(0))?;
        file.seek(SeekFrom::Start(0))?;
        let mut bytes = [0; Header::SIZE];
        file.read_exact(&mut bytes)?;
        let header = Header::from_le_bytes(&bytes);
        if header.magic != MAGIC {
            return Err(Error::InvalidMagic(header.magic));
        }
        let (major, minor) = split_version(header.gsd_version);
        if major != Self::MAJOR_VERSION {
            return Err(Error::UnsupportedVersion { major, minor });
        }

        let names = read_namelist(&mut file, &header, len)?;
        let mut index = read_index(&mut file, &header, len)?;
        // Entries are committed frame by frame, but do not rely on the order within a frame.
        index.sort_by_key(|entry| (entry.frame, entry.id));

        Ok(Self {
            file,
            header,
            names,
            index,
            len,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn application(&self) -> String {
        self.header.application()
    }

    pub fn schema(&self) -> String {
        self.header.schema()
    }

    /// Returns the schema version as `(major, minor)`.
    pub fn schema_version(&self) -> (u32, u32) {
        split_version(self.header.schema_version)
    }

    /// Number of frames in the file.
    ///
    /// A frame that holds no chunks at all cannot be told apart from the end of the file, so
    /// trailing empty frames are not counted.
    pub fn nframes(&self) -> u64 {
        self.index.last().map_or(0, |entry| entry.frame + 1)
    }

    /// All chunk names in the file, in id order.
    pub fn chunk_names(&self) -> &[String] {
        &self.names
    }

    /// The index entries stored for `frame`.
    pub fn frame_entries(&self, frame: u64) -> &[IndexEntry] {
        let start = self.index.partition_point(|entry| entry.frame < frame);
        let end = self.index.partition_point(|entry| entry.frame <= frame);
        &self.index[start..end]
    }

    /// The name that belongs to an index entry.
    pub fn entry_name(&self, entry: &IndexEntry) -> Option<&str> {
        self.names.get(entry.id as usize).map(String::as_str)
    }

    /// Find the index entry for the chunk `name` in `frame`, if it was written there.
    pub fn find_chunk(&self, frame: u64, name: &str) -> Option<IndexEntry> {
        let id = u16::try_from(self.names.iter().position(|n| n == name)?).ok()?;
        self.frame_entries(frame)
            .iter()
            .find(|entry| entry.id == id)
            .copied()
    }

    /// Whether the chunk `name` was written in `frame`.
    pub fn chunk_exists(&self, frame: u64, name: &str) -> bool {
        self.find_chunk(frame, name).is_some()
    }

    /// Read the data an index entry points at.
    pub fn read_entry(&mut self, entry: &IndexEntry) -> Result<Chunk> {
        let kind = entry.chunk_type()?;
        let what = match self.entry_name(entry) {
            Some(name) => format!("chunk '{name}' in frame {}", entry.frame),
            None => format!("chunk {} in frame {}", entry.id, entry.frame),
        };
        let location = u64::try_from(entry.location).unwrap_or(u64::MAX);
        let nbytes = check_extent(&what, location, entry.nbytes()?, self.len)?;

        let mut data = vec![0; nbytes];
        self.file.seek(SeekFrom::Start(location))?;
        self.file.read_exact(&mut data)?;
        Ok(Chunk {
            kind,
            n: entry.n,
            m: entry.m,
            data,
        })
    }

    /// Read the chunk `name` in `frame`.
    pub fn read_chunk(&mut self, frame: u64, name: &str) -> Result<Chunk> {
        let nframes = self.nframes();
        if frame >= nframes {
            return Err(Error::FrameOutOfRange { frame, nframes });
        }
        let entry = self
            .find_chunk(frame, name)
            .ok_or_else(|| Error::MissingChunk {
                name: name.to_string(),
                frame,
            })?;
        self.read_entry(&entry)
    }
}

/// Check that `nbytes` bytes at `location` lie within a stream of `len` bytes, and return the
/// size as a buffer length.
fn check_extent(what: &str, location: u64, nbytes: Option<u64>, len: u64) -> Result<usize> {
    let nbytes = nbytes.ok_or_else(|| Error::TooLarge(what.to_string()))?;
    if !location.checked_add(nbytes).is_some_and(|end| end <= len) {
        return Err(Error::OutOfBounds {
            what: what.to_string(),
            location,
            nbytes,
            len,
        });
    }
    usize::try_from(nbytes).map_err(|_| Error::TooLarge(what.to_string()))
}

fn read_namelist<R: Read + Seek>(file: &mut R, header: &Header, len: u64) -> Result<Vec<String>> {
    let nbytes = check_extent(
        "name list",
        header.namelist_location,
        header.namelist_nbytes(),
        len,
    )?;
    let mut block = vec![0; nbytes];
    file.seek(SeekFrom::Start(header.namelist_location))?;
    file.read_exact(&mut block)?;

    // An empty name ends the list, as does the end of the block.
    block
        .split(|&b| b == 0)
        .take_while(|name| !name.is_empty())
        .map(|name| String::from_utf8(name.to_vec()).map_err(|_| Error::InvalidUtf8Name))
        .collect()
}

fn read_index<R: Read + Seek>(file: &mut R, header: &Header, len: u64) -> Result<Vec<IndexEntry>> {
    let nbytes = check_extent("index", header.index_location, header.index_nbytes(), len)?;
    let mut block = vec![0; nbytes];
    file.seek(SeekFrom::Start(header.index_location))?;
    file.read_exact(&mut block)?;

    Ok(block
        .chunks_exact(IndexEntry::SIZE)
        .map(|bytes| IndexEntry::from_le_bytes(&crate::slice_array(bytes)))
        .take_while(IndexEntry::is_used)
        .collect())
}
