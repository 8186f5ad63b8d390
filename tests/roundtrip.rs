use glam::{IVec3, Vec3, Vec4};

use gsdfix::fixture::{self, FixtureParams};
use gsdfix::hoomd::HoomdReader;

mod common;

#[test]
fn two_frames() -> gsdfix::Result<()> {
    let frames = common::read_back()?;
    assert_eq!(frames.len(), 2);
    Ok(())
}

#[test]
fn frames_match_what_was_appended() -> gsdfix::Result<()> {
    let written = common::write_fixture(&FixtureParams::default())?;
    let mut reader = HoomdReader::open(&written.path)?;
    for (index, appended) in written.appended.iter().enumerate() {
        let frame = reader.read_frame(index as u64)?;
        assert_eq!(&frame, appended, "frame {index} does not match");
    }
    Ok(())
}

#[test]
fn first_frame() -> gsdfix::Result<()> {
    let frames = common::read_back()?;
    let p = &frames[0].particles;
    assert_eq!(p.n, 16);
    assert_eq!(p.mass, [123.5; 16]);
    assert_eq!(p.charge, [-1.0; 16]);
    assert_eq!(p.diameter, [5.0; 16]);
    assert_eq!(p.body, [3; 16]);
    assert_eq!(p.typeid, [1; 16]);
    assert_eq!(p.types, ["octahedron"]);
    assert_eq!(p.moment_inertia, [Vec3::new(1.0, 2.0, 3.0); 16]);
    assert_eq!(p.velocity, [Vec3::new(4.0, 5.0, 6.0); 16]);
    assert_eq!(p.angmom, [Vec4::new(7.0, 8.0, 9.0, 10.0); 16]);
    assert_eq!(p.image, [IVec3::new(0, 0, 1); 16]);
    assert_eq!(p.orientation, [Vec4::new(1.0, 0.0, 0.0, 0.0); 16]);
    assert_eq!(p.position, fixture::lattice_positions(&FixtureParams::default()));

    let c = &frames[0].configuration;
    assert_eq!(c.step, 1);
    assert_eq!(c.dimensions, 3);
    assert_eq!(c.box_, [3.0, 3.0, 3.0, 0.0, 0.0, 0.0]);
    Ok(())
}

#[test]
fn second_frame() -> gsdfix::Result<()> {
    let frames = common::read_back()?;
    let p = &frames[1].particles;
    assert_eq!(p.mass, [321.5; 16]);
    assert_eq!(p.orientation, [Vec4::new(1.0, 0.0, 0.0, 1.0); 16]);
    assert_eq!(p.image, [IVec3::ZERO; 16]);
    assert_eq!(p.types, ["my_new_name"]);
    assert_eq!(p.typeid, [1; 16]);

    // Unchanged attributes come back through frame 0.
    assert_eq!(p.charge, [-1.0; 16]);
    assert_eq!(p.velocity, [Vec3::new(4.0, 5.0, 6.0); 16]);
    assert_eq!(p.position, frames[0].particles.position);
    assert_eq!(frames[1].configuration, frames[0].configuration);
    Ok(())
}

#[test]
fn topology() -> gsdfix::Result<()> {
    let frames = common::read_back()?;
    for frame in frames.iter() {
        assert_eq!(frame.bonds.n, 2);
        assert_eq!(frame.bonds.typeid, [0, 1]);
        assert_eq!(frame.bonds.types, ["typea", "typeb"]);
        assert_eq!(frame.bonds.group, [[0, 1], [1, 2]]);

        assert_eq!(frame.angles.n, 3);
        assert_eq!(frame.angles.typeid, [0, 1, 2]);
        assert_eq!(frame.angles.types, ["bond_a", "bond_b", "bond_c"]);
        assert_eq!(frame.angles.group, [[0, 1, 2], [1, 2, 3], [2, 3, 4]]);

        assert_eq!(frame.dihedrals.n, 4);
        assert_eq!(frame.dihedrals.typeid, [0, 1, 2, 3]);
        assert_eq!(frame.dihedrals.types, ["dih_a", "dih_b", "dih_c", "dih_d"]);
        assert_eq!(
            frame.dihedrals.group,
            [[0, 1, 2, 3], [1, 2, 3, 4], [2, 3, 4, 5], [3, 4, 5, 6]]
        );

        assert_eq!(frame.impropers.n, 0);
        assert_eq!(frame.pairs.n, 0);
        assert_eq!(frame.constraints.n, 0);
    }
    Ok(())
}

/// The second frame only stores what differs from the first.
#[test]
fn second_frame_is_sparse() -> gsdfix::Result<()> {
    let written = common::write_fixture(&FixtureParams::default())?;
    let reader = HoomdReader::open(&written.path)?;
    let file = &reader.file;

    let mut stored: Vec<_> = file
        .frame_entries(1)
        .iter()
        .filter_map(|entry| file.entry_name(entry))
        .collect();
    stored.sort();
    assert_eq!(
        stored,
        [
            "particles/image",
            "particles/mass",
            "particles/orientation",
            "particles/types"
        ]
    );

    // Defaults are never stored, and frame 0 stores everything else.
    assert!(file.chunk_exists(0, "particles/position"));
    assert!(file.chunk_exists(0, "bonds/group"));
    assert!(!file.chunk_exists(0, "configuration/dimensions"));
    assert!(!file.chunk_exists(0, "impropers/N"));
    Ok(())
}

#[test]
fn frames_iterator_reads_in_order() -> gsdfix::Result<()> {
    let written = common::write_fixture(&FixtureParams::default())?;
    let mut reader = HoomdReader::open(&written.path)?;
    let masses: Vec<f32> = reader
        .frames()
        .map(|frame| frame.map(|frame| frame.particles.mass[0]))
        .collect::<gsdfix::Result<_>>()?;
    assert_eq!(masses, [123.5, 321.5]);
    Ok(())
}

#[test]
fn out_of_range_frame() -> gsdfix::Result<()> {
    let written = common::write_fixture(&FixtureParams::default())?;
    let mut reader = HoomdReader::open(&written.path)?;
    assert!(matches!(
        reader.read_frame(2),
        Err(gsdfix::Error::FrameOutOfRange {
            frame: 2,
            nframes: 2
        })
    ));
    Ok(())
}

#[test]
fn larger_lattice() -> gsdfix::Result<()> {
    let params = FixtureParams { m: 4, spacing: 0.8 };
    let written = common::write_fixture(&params)?;
    let mut reader = HoomdReader::open(&written.path)?;
    let frame = reader.read_frame(1)?;
    assert_eq!(frame.particles.n, 128);
    assert_eq!(frame.particles.position.len(), 128);
    assert_eq!(frame.particles.position, fixture::lattice_positions(&params));
    Ok(())
}
