use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, trace};

use crate::{Chunk, Error, Header, IndexEntry, Result, MAX_NAME_LEN, NAME_SIZE};

/// Appends chunks to a gsd file, frame by frame.
///
/// Chunks written between two calls to [`GSDWriter::end_frame`] belong to the same frame. Their
/// index entries are only committed to the file once the frame is ended.
pub struct GSDWriter<W: Write + Seek> {
    file: W,
    header: Header,
    /// Committed index entries, in the order they are stored in the file.
    index: Vec<IndexEntry>,
    /// Index entries of the frame that is currently being written.
    pending: Vec<IndexEntry>,
    names: Vec<String>,
    ids: HashMap<String, u16>,
    /// Bytes of the name list block that are in use.
    namelist_used: u64,
    frame: u64,
    /// Position one byte past the last byte in the file.
    end: u64,
}

impl GSDWriter<BufWriter<File>> {
    /// Create a new file at `path`, truncating whatever was there.
    pub fn create<P: AsRef<Path>>(
        path: P,
        application: &str,
        schema: &str,
        schema_version: u32,
    ) -> Result<Self> {
        let file = File::create(&path)?;
        debug!("created gsd file {:?}", path.as_ref());
        Self::new(BufWriter::new(file), application, schema, schema_version)
    }
}

impl<W: Write + Seek> GSDWriter<W> {
    /// Initialize an empty gsd file in `file`, starting at its current position.
    ///
    /// The writer assumes it owns the stream from the start, so pass a fresh or rewound stream.
    pub fn new(mut file: W, application: &str, schema: &str, schema_version: u32) -> Result<Self> {
        let header = Header::new(application, schema, schema_version);
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header.to_le_bytes())?;
        write_zeros(
            &mut file,
            header.index_allocated_entries * IndexEntry::SIZE as u64,
        )?;
        let namelist_nbytes = header.namelist_allocated_entries * NAME_SIZE;
        write_zeros(&mut file, namelist_nbytes)?;
        let end = header.namelist_location + namelist_nbytes;

        Ok(Self {
            file,
            header,
            index: Vec::new(),
            pending: Vec::new(),
            names: Vec::new(),
            ids: HashMap::new(),
            namelist_used: 0,
            frame: 0,
            end,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The frame that chunks are currently written into.
    pub fn current_frame(&self) -> u64 {
        self.frame
    }

    /// Append a chunk to the current frame.
    pub fn write_chunk(&mut self, name: &str, chunk: &Chunk) -> Result<()> {
        if chunk.n == 0 || chunk.m == 0 {
            return Err(Error::EmptyChunk(name.to_string()));
        }
        if chunk.expected_nbytes() != Some(chunk.data.len()) {
            return Err(Error::ChunkShape {
                name: name.to_string(),
                kind: chunk.kind,
                n: chunk.n,
                m: chunk.m,
                nbytes: chunk.data.len(),
            });
        }

        let id = self.name_id(name)?;
        if self.pending.iter().any(|entry| entry.id == id) {
            return Err(Error::DuplicateChunk(name.to_string()));
        }

        let location = self.end;
        self.file.seek(SeekFrom::Start(location))?;
        self.file.write_all(&chunk.data)?;
        self.end += chunk.data.len() as u64;

        self.pending.push(IndexEntry {
            frame: self.frame,
            n: chunk.n,
            location: location as i64,
            m: chunk.m,
            id,
            kind: chunk.kind as u8,
            flags: 0,
        });
        debug!(
            "wrote chunk '{name}' ({:?}, {}x{}) to frame {} at {location}",
            chunk.kind, chunk.n, chunk.m, self.frame
        );

        Ok(())
    }

    /// Commit the index entries of the current frame and start the next one.
    pub fn end_frame(&mut self) -> Result<()> {
        let mut pending = std::mem::take(&mut self.pending);
        pending.sort_by_key(|entry| entry.id);

        let needed = (self.index.len() + pending.len()) as u64;
        if needed > self.header.index_allocated_entries {
            self.grow_index(needed)?;
        }

        let location =
            self.header.index_location + (self.index.len() * IndexEntry::SIZE) as u64;
        self.file.seek(SeekFrom::Start(location))?;
        for entry in &pending {
            self.file.write_all(&entry.to_le_bytes())?;
        }
        self.index.extend(pending);
        self.frame += 1;

        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }

    /// Finish the file, committing any chunks written since the last [`GSDWriter::end_frame`].
    pub fn close(mut self) -> Result<()> {
        if !self.pending.is_empty() {
            self.end_frame()?;
        }
        self.flush()
    }

    /// Look up the id of `name`, appending it to the name list if it is new.
    fn name_id(&mut self, name: &str) -> Result<u16> {
        if let Some(&id) = self.ids.get(name) {
            return Ok(id);
        }
        if name.is_empty() || name.len() > MAX_NAME_LEN || name.contains('\0') {
            return Err(Error::InvalidName(name.to_string()));
        }
        let id: u16 = self
            .names
            .len()
            .try_into()
            .map_err(|_| Error::InvalidName(name.to_string()))?;

        let nbytes = name.len() as u64 + 1;
        if self.namelist_used + nbytes > self.header.namelist_allocated_entries * NAME_SIZE {
            self.grow_namelist(self.namelist_used + nbytes)?;
        }
        self.file.seek(SeekFrom::Start(
            self.header.namelist_location + self.namelist_used,
        ))?;
        self.file.write_all(name.as_bytes())?;
        self.file.write_all(&[0])?;
        self.namelist_used += nbytes;

        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        Ok(id)
    }

    /// Move the index to the end of the file with room for at least `needed` entries.
    fn grow_index(&mut self, needed: u64) -> Result<()> {
        let mut allocated = self.header.index_allocated_entries.max(1);
        while allocated < needed {
            allocated *= 2;
        }
        trace!(
            "moving index of {} entries to {} with room for {allocated}",
            self.index.len(),
            self.end
        );

        let location = self.end;
        self.file.seek(SeekFrom::Start(location))?;
        for entry in &self.index {
            self.file.write_all(&entry.to_le_bytes())?;
        }
        write_zeros(
            &mut self.file,
            (allocated - self.index.len() as u64) * IndexEntry::SIZE as u64,
        )?;
        self.end += allocated * IndexEntry::SIZE as u64;

        self.header.index_location = location;
        self.header.index_allocated_entries = allocated;
        self.write_header()
    }

    /// Move the name list to the end of the file with room for at least `needed` bytes.
    ///
    /// The block stays a whole number of [`NAME_SIZE`] units.
    fn grow_namelist(&mut self, needed: u64) -> Result<()> {
        let mut entries = self.header.namelist_allocated_entries.max(1);
        while entries * NAME_SIZE < needed {
            entries *= 2;
        }
        let allocated = entries * NAME_SIZE;
        trace!(
            "moving name list of {} names to {} with room for {allocated} bytes",
            self.names.len(),
            self.end
        );

        let location = self.end;
        self.file.seek(SeekFrom::Start(location))?;
        for name in &self.names {
            self.file.write_all(name.as_bytes())?;
            self.file.write_all(&[0])?;
        }
        write_zeros(&mut self.file, allocated - self.namelist_used)?;
        self.end += allocated;

        self.header.namelist_location = location;
        self.header.namelist_allocated_entries = entries;
        self.write_header()
    }

    fn write_header(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&self.header.to_le_bytes())?;
        Ok(())
    }
}

impl<W: Write + Seek> Drop for GSDWriter<W> {
    fn drop(&mut self) {
        // Errors cannot be reported from here. Use `close` to observe them.
        let _ = self.file.flush();
    }
}

fn write_zeros<W: Write>(file: &mut W, mut count: u64) -> std::io::Result<()> {
    const BLOCK: [u8; 4096] = [0; 4096];
    while count > 0 {
        let n = u64::min(count, BLOCK.len() as u64) as usize;
        file.write_all(&BLOCK[..n])?;
        count -= n as u64;
    }
    Ok(())
}
