//! The two-frame test fixture.
//!
//! A small cubic lattice of particles with constant properties and a handful of bonds, angles and
//! dihedrals. The second frame copies the first and changes orientation, mass, image and types so
//! that readers can check frame-to-frame differences.
use std::path::{Path, PathBuf};

use glam::{IVec3, Vec3, Vec4};
use log::info;

use crate::hoomd::{Frame, GroupData, HoomdWriter};
use crate::Result;

/// Name of the fixture file.
pub const FILE_NAME: &str = "python_output.gsd";

pub const INITIAL_MASS: f32 = 123.5;
/// Mass assigned after frame 1 has been appended. It never reaches the file.
pub const INTERIM_MASS: f32 = 13.5;
pub const SECOND_MASS: f32 = 321.5;
pub const INITIAL_TYPE: &str = "octahedron";
pub const SECOND_TYPE: &str = "my_new_name";

/// Parameters of the lattice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixtureParams {
    /// The system holds `2 * m^3` particles.
    pub m: u32,
    /// Distance between neighbouring lattice sites.
    pub spacing: f64,
}

impl Default for FixtureParams {
    fn default() -> Self {
        Self { m: 2, spacing: 1.0 }
    }
}

impl FixtureParams {
    pub fn n_particles(&self) -> usize {
        2 * (self.m as usize).pow(3)
    }

    /// Number of lattice sites along each axis.
    pub fn extent(&self) -> usize {
        lattice_extent(self.n_particles())
    }

    /// Edge length of the cubic box.
    pub fn box_length(&self) -> f64 {
        self.extent() as f64 * self.spacing
    }
}

/// Smallest `k` such that a `k x k x k` lattice holds `n` sites.
pub fn lattice_extent(n: usize) -> usize {
    let mut k = (n as f64).cbrt().ceil() as usize;
    // Correct for rounding in the cube root of exact cubes.
    while k.pow(3) < n {
        k += 1;
    }
    while k > 0 && (k - 1).pow(3) >= n {
        k -= 1;
    }
    k
}

/// `num` evenly spaced values over `[start, stop)`.
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    if num == 0 {
        return Vec::new();
    }
    let step = (stop - start) / num as f64;
    (0..num).map(|i| start + i as f64 * step).collect()
}

/// The first `n` sites of the lattice, centered on the origin.
///
/// Sites are ordered like a nested loop over x, y and z, with z varying fastest.
pub fn lattice_positions(params: &FixtureParams) -> Vec<Vec3> {
    let n = params.n_particles();
    let l = params.box_length();
    let values = linspace(-l / 2.0, l / 2.0, params.extent());
    let axis = &values;

    axis.iter()
        .flat_map(move |&x| {
            axis.iter()
                .flat_map(move |&y| axis.iter().map(move |&z| [x, y, z]))
        })
        .take(n)
        .map(|[x, y, z]| Vec3::new(x as f32, y as f32, z as f32))
        .collect()
}

/// The first frame, before anything is appended.
pub fn initial_frame(params: &FixtureParams) -> Frame {
    let n = params.n_particles();
    let l = params.box_length() as f32;

    let mut frame = Frame::default();

    let particles = &mut frame.particles;
    particles.n = n as u32;
    particles.position = lattice_positions(params);
    particles.mass = vec![INITIAL_MASS; n];
    particles.charge = vec![-1.0; n];
    particles.diameter = vec![5.0; n];
    particles.body = vec![3; n];
    particles.moment_inertia = vec![Vec3::new(1.0, 2.0, 3.0); n];
    particles.velocity = vec![Vec3::new(4.0, 5.0, 6.0); n];
    particles.angmom = vec![Vec4::new(7.0, 8.0, 9.0, 10.0); n];
    particles.image = vec![IVec3::new(0, 0, 1); n];
    particles.orientation = vec![Vec4::new(1.0, 0.0, 0.0, 0.0); n];
    particles.typeid = vec![1; n];
    particles.types = vec![INITIAL_TYPE.to_string()];

    frame.configuration.box_ = [l, l, l, 0.0, 0.0, 0.0];
    frame.configuration.step = 1;
    frame.configuration.dimensions = 3;

    frame.bonds = GroupData {
        n: 2,
        types: names(&["typea", "typeb"]),
        typeid: vec![0, 1],
        group: vec![[0, 1], [1, 2]],
    };
    frame.angles = GroupData {
        n: 3,
        types: names(&["bond_a", "bond_b", "bond_c"]),
        typeid: vec![0, 1, 2],
        group: vec![[0, 1, 2], [1, 2, 3], [2, 3, 4]],
    };
    frame.dihedrals = GroupData {
        n: 4,
        types: names(&["dih_a", "dih_b", "dih_c", "dih_d"]),
        typeid: vec![0, 1, 2, 3],
        group: vec![[0, 1, 2, 3], [1, 2, 3, 4], [2, 3, 4, 5], [3, 4, 5, 6]],
    };

    frame
}

/// Derive the second frame from the first.
///
/// The result is an independent copy. Nothing in it aliases `frame`.
pub fn second_frame(frame: &Frame) -> Frame {
    let n = frame.particles.n as usize;
    let mut second = frame.clone();
    let particles = &mut second.particles;
    particles.orientation = vec![Vec4::new(1.0, 0.0, 0.0, 1.0); n];
    particles.mass = vec![SECOND_MASS; n];
    particles.image = vec![IVec3::ZERO; n];
    particles.typeid = vec![1; n];
    particles.types = vec![SECOND_TYPE.to_string()];
    second
}

/// Write the fixture to `path`, returning both frames as they were appended.
pub fn write_fixture<P: AsRef<Path>>(path: P, params: &FixtureParams) -> Result<[Frame; 2]> {
    let path = path.as_ref();
    let mut file = HoomdWriter::create(path)?;

    let mut frame = initial_frame(params);
    file.append(&frame)?;
    let first = frame.clone();

    // The first frame is already serialized, so this only shows up in the copy below, where it is
    // overwritten right away.
    frame.particles.mass = vec![INTERIM_MASS; frame.particles.n as usize];

    let second = second_frame(&frame);
    file.append(&second)?;
    file.close()?;

    info!(
        "wrote 2 frames with {} particles to {path:?}",
        params.n_particles()
    );
    Ok([first, second])
}

/// Where the fixture goes by default: next to the tests that read it.
pub fn default_output_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join(FILE_NAME)
}

fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}
