#![allow(dead_code)]

use std::path::PathBuf;

use tempfile::TempDir;

use gsdfix::fixture::{self, FixtureParams};
use gsdfix::hoomd::{Frame, HoomdReader};

/// A fixture written into its own temporary directory.
///
/// The directory, and the file in it, are removed when this is dropped.
pub struct Written {
    pub dir: TempDir,
    pub path: PathBuf,
    /// The frames as they were handed to the writer.
    pub appended: [Frame; 2],
}

pub fn write_fixture(params: &FixtureParams) -> gsdfix::Result<Written> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(fixture::FILE_NAME);
    let appended = fixture::write_fixture(&path, params)?;
    Ok(Written {
        dir,
        path,
        appended,
    })
}

/// Write the default fixture and read all of its frames back.
pub fn read_back() -> gsdfix::Result<Box<[Frame]>> {
    let written = write_fixture(&FixtureParams::default())?;
    let mut reader = HoomdReader::open(&written.path)?;
    reader.read_all_frames()
}
