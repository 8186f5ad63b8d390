use thiserror::Error;

use crate::ChunkType;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O operation failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("found invalid magic number '{0:#018x}', this is not a gsd file")]
    InvalidMagic(u64),

    #[error("unsupported gsd version {major}.{minor}")]
    UnsupportedVersion { major: u32, minor: u32 },

    #[error("found invalid chunk type id {0}")]
    InvalidChunkType(u8),

    #[error("expected a chunk of type {expected:?}, found {found:?}")]
    WrongChunkType {
        expected: ChunkType,
        found: ChunkType,
    },

    #[error("chunk '{name}' of type {kind:?} with shape {n}x{m} does not fit in {nbytes} bytes")]
    ChunkShape {
        name: String,
        kind: ChunkType,
        n: u64,
        m: u32,
        nbytes: usize,
    },

    #[error("invalid chunk name '{0}', names must be 1 to {max} bytes without NUL", max = crate::MAX_NAME_LEN)]
    InvalidName(String),

    #[error("chunk '{0}' was already written in this frame")]
    DuplicateChunk(String),

    #[error("chunk '{0}' is empty, gsd does not store empty chunks")]
    EmptyChunk(String),

    #[error("frame {frame} is out of range for a file with {nframes} frames")]
    FrameOutOfRange { frame: u64, nframes: u64 },

    #[error("chunk '{name}' is not present in frame {frame}")]
    MissingChunk { name: String, frame: u64 },

    #[error("{name} has length {found}, expected {expected}")]
    ShapeMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("unsupported schema '{schema}' version {major}.{minor}")]
    UnsupportedSchema {
        schema: String,
        major: u32,
        minor: u32,
    },

    #[error("{what} of {nbytes} bytes at offset {location} runs past the end of the file ({len} bytes)")]
    OutOfBounds {
        what: String,
        location: u64,
        nbytes: u64,
        len: u64,
    },

    #[error("{0} is too large to address")]
    TooLarge(String),

    #[error("name list entry is not valid utf-8")]
    InvalidUtf8Name,
}

pub type Result<T> = std::result::Result<T, Error>;
