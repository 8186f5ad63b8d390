use std::io::Cursor;

use bencher::{benchmark_group, benchmark_main, Bencher};
use gsdfix::fixture::{self, FixtureParams};
use gsdfix::hoomd::{HoomdReader, HoomdWriter};

benchmark_main!(writing, reading);
benchmark_group!(writing, write_fixture, append_large_frames);
benchmark_group!(reading, read_fixture);

fn write_fixture(b: &mut Bencher) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(fixture::FILE_NAME);
    let params = FixtureParams::default();
    b.iter(|| fixture::write_fixture(&path, &params).unwrap());
}

fn append_large_frames(b: &mut Bencher) {
    let params = FixtureParams { m: 20, spacing: 1.0 };
    let first = fixture::initial_frame(&params);
    let second = fixture::second_frame(&first);
    b.iter(|| {
        let mut bytes = Vec::new();
        let mut writer = HoomdWriter::new(Cursor::new(&mut bytes)).unwrap();
        writer.append(&first).unwrap();
        writer.append(&second).unwrap();
        writer.close().unwrap();
        bytes.len()
    });
}

fn read_fixture(b: &mut Bencher) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(fixture::FILE_NAME);
    fixture::write_fixture(&path, &FixtureParams::default()).unwrap();
    b.iter(|| {
        let mut reader = HoomdReader::open(&path).unwrap();
        reader.read_all_frames().unwrap()
    });
}
