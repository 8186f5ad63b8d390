//! Frames in the HOOMD schema, and how they map onto gsd chunks.
//!
//! Every attribute of a [`Frame`] is stored as its own chunk, named `group/attribute`. Chunks
//! are written sparsely. A chunk that is identical to the one in frame 0 is left out, and so is a
//! chunk that equals the schema default, as long as frame 0 did not store it either. A reader
//! fills the gaps by looking in frame 0 first and falling back to the default after that.
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::Path;

use glam::{IVec3, Vec3, Vec4};
use log::{debug, info};

use crate::{make_version, split_version, Chunk, Error, GSDReader, GSDWriter, Result};

pub const SCHEMA: &str = "hoomd";
pub const SCHEMA_VERSION: u32 = make_version(1, 4);

/// Simulation box and step metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationData {
    pub step: u64,
    pub dimensions: u8,
    /// Box lengths followed by tilt factors: `[Lx, Ly, Lz, xy, xz, yz]`.
    pub box_: [f32; 6],
}

impl Default for ConfigurationData {
    fn default() -> Self {
        Self {
            step: 0,
            dimensions: 3,
            box_: [1.0, 1.0, 1.0, 0.0, 0.0, 0.0],
        }
    }
}

/// Per-particle properties.
///
/// Each array is either empty, meaning unset, or holds exactly `n` values. Unset arrays are not
/// written and read back as the schema default.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleData {
    pub n: u32,
    pub types: Vec<String>,
    pub typeid: Vec<u32>,
    pub mass: Vec<f32>,
    pub charge: Vec<f32>,
    pub diameter: Vec<f32>,
    pub body: Vec<i32>,
    pub moment_inertia: Vec<Vec3>,
    pub position: Vec<Vec3>,
    /// Quaternions as `(s, x, y, z)`. Stored as-is, without normalization.
    pub orientation: Vec<Vec4>,
    pub velocity: Vec<Vec3>,
    pub angmom: Vec<Vec4>,
    pub image: Vec<IVec3>,
}

impl ParticleData {
    pub const DEFAULT_TYPE: &'static str = "A";
    pub const DEFAULT_MASS: f32 = 1.0;
    pub const DEFAULT_DIAMETER: f32 = 1.0;
    pub const DEFAULT_BODY: i32 = -1;
    pub const DEFAULT_ORIENTATION: Vec4 = Vec4::new(1.0, 0.0, 0.0, 0.0);
}

impl Default for ParticleData {
    fn default() -> Self {
        Self {
            n: 0,
            types: vec![Self::DEFAULT_TYPE.to_string()],
            typeid: Vec::new(),
            mass: Vec::new(),
            charge: Vec::new(),
            diameter: Vec::new(),
            body: Vec::new(),
            moment_inertia: Vec::new(),
            position: Vec::new(),
            orientation: Vec::new(),
            velocity: Vec::new(),
            angmom: Vec::new(),
            image: Vec::new(),
        }
    }
}

/// A topology table of `M`-tuples of particle indices.
///
/// Bonds and pairs use `M = 2`, angles `M = 3`, and dihedrals and impropers `M = 4`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupData<const M: usize> {
    pub n: u32,
    pub types: Vec<String>,
    pub typeid: Vec<u32>,
    pub group: Vec<[u32; M]>,
}

/// Distance constraints between pairs of particles.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstraintData {
    pub n: u32,
    pub value: Vec<f32>,
    pub group: Vec<[u32; 2]>,
}

/// One snapshot of the system state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub configuration: ConfigurationData,
    pub particles: ParticleData,
    pub bonds: GroupData<2>,
    pub angles: GroupData<3>,
    pub dihedrals: GroupData<4>,
    pub impropers: GroupData<4>,
    pub constraints: ConstraintData,
    pub pairs: GroupData<2>,
}

impl Frame {
    /// Check that every set array matches the count of its group.
    pub fn validate(&self) -> Result<()> {
        let p = &self.particles;
        let n = p.n as usize;
        check_len("particles/typeid", n, p.typeid.len())?;
        check_len("particles/mass", n, p.mass.len())?;
        check_len("particles/charge", n, p.charge.len())?;
        check_len("particles/diameter", n, p.diameter.len())?;
        check_len("particles/body", n, p.body.len())?;
        check_len("particles/moment_inertia", n, p.moment_inertia.len())?;
        check_len("particles/position", n, p.position.len())?;
        check_len("particles/orientation", n, p.orientation.len())?;
        check_len("particles/velocity", n, p.velocity.len())?;
        check_len("particles/angmom", n, p.angmom.len())?;
        check_len("particles/image", n, p.image.len())?;

        self.bonds.validate("bonds")?;
        self.angles.validate("angles")?;
        self.dihedrals.validate("dihedrals")?;
        self.impropers.validate("impropers")?;
        self.pairs.validate("pairs")?;

        let c = &self.constraints;
        check_len("constraints/value", c.n as usize, c.value.len())?;
        check_len("constraints/group", c.n as usize, c.group.len())?;

        Ok(())
    }

    /// Encode every attribute next to its schema default.
    fn fields(&self) -> Vec<Field> {
        let mut fields = Vec::new();

        let c = &self.configuration;
        let defaults = ConfigurationData::default();
        fields.push(Field::set(
            "configuration/step",
            Chunk::from_u64s(&[c.step], 1),
            Chunk::from_u64s(&[defaults.step], 1),
        ));
        fields.push(Field::set(
            "configuration/dimensions",
            Chunk::from_u8s(&[c.dimensions], 1),
            Chunk::from_u8s(&[defaults.dimensions], 1),
        ));
        fields.push(Field::set(
            "configuration/box",
            Chunk::from_f32s(&c.box_, 6),
            Chunk::from_f32s(&defaults.box_, 6),
        ));

        let p = &self.particles;
        let n = p.n as usize;
        fields.push(Field::set(
            "particles/N",
            Chunk::from_u32s(&[p.n], 1),
            Chunk::from_u32s(&[0], 1),
        ));
        fields.push(Field {
            name: "particles/types".to_string(),
            value: (!p.types.is_empty()).then(|| Chunk::from_strings(&p.types)),
            default: Some(Chunk::from_strings(&[ParticleData::DEFAULT_TYPE])),
        });
        fields.push(u32_field("particles/typeid", &p.typeid, 1, &[0], n));
        fields.push(f32_field("particles/mass", &p.mass, 1, &[ParticleData::DEFAULT_MASS], n));
        fields.push(f32_field("particles/charge", &p.charge, 1, &[0.0], n));
        fields.push(f32_field(
            "particles/diameter",
            &p.diameter,
            1,
            &[ParticleData::DEFAULT_DIAMETER],
            n,
        ));
        fields.push(i32_field("particles/body", &p.body, 1, &[ParticleData::DEFAULT_BODY], n));
        fields.push(f32_field(
            "particles/moment_inertia",
            &flatten3(&p.moment_inertia),
            3,
            &[0.0; 3],
            n,
        ));
        fields.push(f32_field("particles/position", &flatten3(&p.position), 3, &[0.0; 3], n));
        fields.push(f32_field(
            "particles/orientation",
            &flatten4(&p.orientation),
            4,
            &ParticleData::DEFAULT_ORIENTATION.to_array(),
            n,
        ));
        fields.push(f32_field("particles/velocity", &flatten3(&p.velocity), 3, &[0.0; 3], n));
        fields.push(f32_field("particles/angmom", &flatten4(&p.angmom), 4, &[0.0; 4], n));
        let image: Vec<i32> = p.image.iter().flat_map(|v| v.to_array()).collect();
        fields.push(i32_field("particles/image", &image, 3, &[0; 3], n));

        self.bonds.push_fields("bonds", &mut fields);
        self.angles.push_fields("angles", &mut fields);
        self.dihedrals.push_fields("dihedrals", &mut fields);
        self.impropers.push_fields("impropers", &mut fields);

        let c = &self.constraints;
        let n = c.n as usize;
        fields.push(Field::set(
            "constraints/N",
            Chunk::from_u32s(&[c.n], 1),
            Chunk::from_u32s(&[0], 1),
        ));
        fields.push(f32_field("constraints/value", &c.value, 1, &[0.0], n));
        fields.push(u32_field("constraints/group", &c.group.concat(), 2, &[0; 2], n));

        self.pairs.push_fields("pairs", &mut fields);

        fields
    }
}

impl<const M: usize> GroupData<M> {
    fn validate(&self, prefix: &str) -> Result<()> {
        let n = self.n as usize;
        check_len(&format!("{prefix}/typeid"), n, self.typeid.len())?;
        check_len(&format!("{prefix}/group"), n, self.group.len())
    }

    fn push_fields(&self, prefix: &str, fields: &mut Vec<Field>) {
        let n = self.n as usize;
        fields.push(Field::set(
            format!("{prefix}/N"),
            Chunk::from_u32s(&[self.n], 1),
            Chunk::from_u32s(&[0], 1),
        ));
        fields.push(Field {
            name: format!("{prefix}/types"),
            value: (!self.types.is_empty()).then(|| Chunk::from_strings(&self.types)),
            default: None,
        });
        fields.push(u32_field(&format!("{prefix}/typeid"), &self.typeid, 1, &[0], n));
        fields.push(u32_field(
            &format!("{prefix}/group"),
            &self.group.concat(),
            M as u32,
            &[0; M],
            n,
        ));
    }
}

/// One encoded attribute of a frame.
struct Field {
    name: String,
    /// `None` if the attribute is unset in this frame.
    value: Option<Chunk>,
    /// `None` if the default is empty, which gsd cannot store.
    default: Option<Chunk>,
}

impl Field {
    fn set(name: impl Into<String>, value: Chunk, default: Chunk) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
            default: Some(default),
        }
    }
}

// These helpers take flat values with `m` columns and the default of a single row.
fn f32_field(name: &str, values: &[f32], m: u32, default: &[f32], n: usize) -> Field {
    Field {
        name: name.to_string(),
        value: (!values.is_empty()).then(|| Chunk::from_f32s(values, m)),
        default: (n > 0).then(|| Chunk::from_f32s(&default.repeat(n), m)),
    }
}

fn u32_field(name: &str, values: &[u32], m: u32, default: &[u32], n: usize) -> Field {
    Field {
        name: name.to_string(),
        value: (!values.is_empty()).then(|| Chunk::from_u32s(values, m)),
        default: (n > 0).then(|| Chunk::from_u32s(&default.repeat(n), m)),
    }
}

fn i32_field(name: &str, values: &[i32], m: u32, default: &[i32], n: usize) -> Field {
    Field {
        name: name.to_string(),
        value: (!values.is_empty()).then(|| Chunk::from_i32s(values, m)),
        default: (n > 0).then(|| Chunk::from_i32s(&default.repeat(n), m)),
    }
}

fn flatten3(values: &[Vec3]) -> Vec<f32> {
    values.iter().flat_map(|v| v.to_array()).collect()
}

fn flatten4(values: &[Vec4]) -> Vec<f32> {
    values.iter().flat_map(|v| v.to_array()).collect()
}

fn check_len(name: &str, expected: usize, found: usize) -> Result<()> {
    // An empty array is unset, which is always fine.
    if found == 0 || found == expected {
        Ok(())
    } else {
        Err(Error::ShapeMismatch {
            name: name.to_string(),
            expected,
            found,
        })
    }
}

/// Appends [`Frame`]s to a new HOOMD gsd file.
pub struct HoomdWriter<W: Write + Seek> {
    file: GSDWriter<W>,
    /// The effective contents of frame 0, including defaults that were not stored.
    initial: Option<HashMap<String, Chunk>>,
    /// Names of the chunks that frame 0 actually stored.
    initial_stored: HashSet<String>,
}

impl HoomdWriter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!("creating hoomd trajectory {:?}", path.as_ref());
        let file = GSDWriter::create(path, &application(), SCHEMA, SCHEMA_VERSION)?;
        Ok(Self::from_writer(file))
    }
}

impl<W: Write + Seek> HoomdWriter<W> {
    pub fn new(file: W) -> Result<Self> {
        let file = GSDWriter::new(file, &application(), SCHEMA, SCHEMA_VERSION)?;
        Ok(Self::from_writer(file))
    }

    fn from_writer(file: GSDWriter<W>) -> Self {
        Self {
            file,
            initial: None,
            initial_stored: HashSet::new(),
        }
    }

    /// Number of frames appended so far.
    pub fn len(&self) -> u64 {
        self.file.current_frame()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate `frame` and append it as the next frame.
    ///
    /// The frame is serialized right away. Changing it afterwards does not affect the file.
    pub fn append(&mut self, frame: &Frame) -> Result<()> {
        frame.validate()?;
        let index = self.file.current_frame();
        let fields = frame.fields();

        let mut nstored = 0;
        for field in &fields {
            let Some(value) = &field.value else { continue };
            if let Some(initial) = &self.initial {
                if initial.get(&field.name) == Some(value) {
                    debug!("skipping '{}' in frame {index}, matches frame 0", field.name);
                    continue;
                }
            }
            if field.default.as_ref() == Some(value) && !self.initial_stored.contains(&field.name)
            {
                debug!("skipping '{}' in frame {index}, default value", field.name);
                continue;
            }
            self.store(&field.name, value)?;
            nstored += 1;
        }

        // A frame without chunks leaves no trace in the index, so always store something.
        if nstored == 0 {
            let step = &fields[0];
            debug_assert_eq!(step.name, "configuration/step");
            if let Some(value) = &step.value {
                self.store(&step.name, value)?;
            }
        }

        if self.initial.is_none() {
            let initial = fields
                .into_iter()
                .filter_map(|field| Some((field.name, field.value.or(field.default)?)))
                .collect();
            self.initial = Some(initial);
        }

        self.file.end_frame()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.file.flush()
    }

    pub fn close(self) -> Result<()> {
        self.file.close()
    }

    fn store(&mut self, name: &str, value: &Chunk) -> Result<()> {
        self.file.write_chunk(name, value)?;
        if self.initial.is_none() {
            self.initial_stored.insert(name.to_string());
        }
        Ok(())
    }
}

/// Reads [`Frame`]s from a HOOMD gsd file.
#[derive(Debug)]
pub struct HoomdReader<R> {
    pub file: GSDReader<R>,
}

impl HoomdReader<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_reader(GSDReader::open(path)?)
    }
}

impl<R: Read + Seek> HoomdReader<R> {
    pub fn new(file: R) -> Result<Self> {
        Self::from_reader(GSDReader::new(file)?)
    }

    /// Wrap a gsd reader, checking that it holds a HOOMD schema we understand.
    pub fn from_reader(file: GSDReader<R>) -> Result<Self> {
        let schema = file.schema();
        let (major, minor) = file.schema_version();
        let (supported, _) = split_version(SCHEMA_VERSION);
        if schema != SCHEMA || major != supported {
            return Err(Error::UnsupportedSchema {
                schema,
                major,
                minor,
            });
        }
        Ok(Self { file })
    }

    /// Number of frames in the file.
    pub fn len(&self) -> u64 {
        self.file.nframes()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read frame `index`, filling unstored attributes from frame 0 or the schema default.
    pub fn read_frame(&mut self, index: u64) -> Result<Frame> {
        let nframes = self.len();
        if index >= nframes {
            return Err(Error::FrameOutOfRange {
                frame: index,
                nframes,
            });
        }

        let defaults = ConfigurationData::default();
        let configuration = ConfigurationData {
            step: self.scalar(index, "configuration/step", Chunk::to_u64s)?.unwrap_or(defaults.step),
            dimensions: self
                .scalar(index, "configuration/dimensions", Chunk::to_u8s)?
                .unwrap_or(defaults.dimensions),
            box_: match self.lookup(index, "configuration/box")? {
                Some(chunk) => {
                    let values = chunk.to_f32s()?;
                    let values: [f32; 6] = values.try_into().map_err(|v: Vec<f32>| {
                        Error::ShapeMismatch {
                            name: "configuration/box".to_string(),
                            expected: 6,
                            found: v.len(),
                        }
                    })?;
                    values
                }
                None => defaults.box_,
            },
        };

        let n = self.scalar(index, "particles/N", Chunk::to_u32s)?.unwrap_or(0);
        let nu = n as usize;
        let particles = ParticleData {
            n,
            types: self
                .strings(index, "particles/types")?
                .unwrap_or_else(|| vec![ParticleData::DEFAULT_TYPE.to_string()]),
            typeid: self.rows(index, "particles/typeid", nu, Chunk::to_u32s, &[0])?,
            mass: self.rows(
                index,
                "particles/mass",
                nu,
                Chunk::to_f32s,
                &[ParticleData::DEFAULT_MASS],
            )?,
            charge: self.rows(index, "particles/charge", nu, Chunk::to_f32s, &[0.0])?,
            diameter: self.rows(
                index,
                "particles/diameter",
                nu,
                Chunk::to_f32s,
                &[ParticleData::DEFAULT_DIAMETER],
            )?,
            body: self.rows(
                index,
                "particles/body",
                nu,
                Chunk::to_i32s,
                &[ParticleData::DEFAULT_BODY],
            )?,
            moment_inertia: self
                .rows(index, "particles/moment_inertia", nu, Chunk::to_f32s, &[0.0; 3])?
                .chunks_exact(3)
                .map(Vec3::from_slice)
                .collect(),
            position: self
                .rows(index, "particles/position", nu, Chunk::to_f32s, &[0.0; 3])?
                .chunks_exact(3)
                .map(Vec3::from_slice)
                .collect(),
            orientation: self
                .rows(
                    index,
                    "particles/orientation",
                    nu,
                    Chunk::to_f32s,
                    &ParticleData::DEFAULT_ORIENTATION.to_array(),
                )?
                .chunks_exact(4)
                .map(Vec4::from_slice)
                .collect(),
            velocity: self
                .rows(index, "particles/velocity", nu, Chunk::to_f32s, &[0.0; 3])?
                .chunks_exact(3)
                .map(Vec3::from_slice)
                .collect(),
            angmom: self
                .rows(index, "particles/angmom", nu, Chunk::to_f32s, &[0.0; 4])?
                .chunks_exact(4)
                .map(Vec4::from_slice)
                .collect(),
            image: self
                .rows(index, "particles/image", nu, Chunk::to_i32s, &[0; 3])?
                .chunks_exact(3)
                .map(IVec3::from_slice)
                .collect(),
        };

        let cn = self.scalar(index, "constraints/N", Chunk::to_u32s)?.unwrap_or(0) as usize;
        let constraints = ConstraintData {
            n: cn as u32,
            value: self.rows(index, "constraints/value", cn, Chunk::to_f32s, &[0.0])?,
            group: self.tuples(index, "constraints/group", cn)?,
        };

        Ok(Frame {
            configuration,
            particles,
            bonds: self.group(index, "bonds")?,
            angles: self.group(index, "angles")?,
            dihedrals: self.group(index, "dihedrals")?,
            impropers: self.group(index, "impropers")?,
            constraints,
            pairs: self.group(index, "pairs")?,
        })
    }

    /// Read all frames in order.
    pub fn read_all_frames(&mut self) -> Result<Box<[Frame]>> {
        (0..self.len())
            .map(|index| self.read_frame(index))
            .collect()
    }

    /// Iterate over the frames in order.
    pub fn frames(&mut self) -> impl Iterator<Item = Result<Frame>> + '_ {
        (0..self.len()).map(move |index| self.read_frame(index))
    }

    /// Find `name` in frame `index`, or else in frame 0.
    fn lookup(&mut self, index: u64, name: &str) -> Result<Option<Chunk>> {
        let entry = self
            .file
            .find_chunk(index, name)
            .or_else(|| self.file.find_chunk(0, name));
        entry.map(|entry| self.file.read_entry(&entry)).transpose()
    }

    fn scalar<T: Copy>(
        &mut self,
        index: u64,
        name: &str,
        decode: fn(&Chunk) -> Result<Vec<T>>,
    ) -> Result<Option<T>> {
        match self.lookup(index, name)? {
            Some(chunk) => Ok(decode(&chunk)?.first().copied()),
            None => Ok(None),
        }
    }

    fn strings(&mut self, index: u64, name: &str) -> Result<Option<Vec<String>>> {
        self.lookup(index, name)?
            .map(|chunk| chunk.to_strings())
            .transpose()
    }

    /// Read `n` rows shaped like `default`, or `n` copies of `default` if the chunk is absent.
    fn rows<T: Copy>(
        &mut self,
        index: u64,
        name: &str,
        n: usize,
        decode: fn(&Chunk) -> Result<Vec<T>>,
        default: &[T],
    ) -> Result<Vec<T>> {
        let Some(chunk) = self.lookup(index, name)? else {
            return Ok(default.repeat(n));
        };
        let values = decode(&chunk)?;
        let expected = n * default.len();
        if values.len() != expected {
            return Err(Error::ShapeMismatch {
                name: name.to_string(),
                expected,
                found: values.len(),
            });
        }
        Ok(values)
    }

    fn tuples<const M: usize>(&mut self, index: u64, name: &str, n: usize) -> Result<Vec<[u32; M]>> {
        let flat = self.rows(index, name, n, Chunk::to_u32s, &[0; M])?;
        Ok(flat
            .chunks_exact(M)
            .map(|row| std::array::from_fn(|k| row[k]))
            .collect())
    }

    fn group<const M: usize>(&mut self, index: u64, prefix: &str) -> Result<GroupData<M>> {
        let n = self
            .scalar(index, &format!("{prefix}/N"), Chunk::to_u32s)?
            .unwrap_or(0);
        Ok(GroupData {
            n,
            types: self
                .strings(index, &format!("{prefix}/types"))?
                .unwrap_or_default(),
            typeid: self.rows(index, &format!("{prefix}/typeid"), n as usize, Chunk::to_u32s, &[0])?,
            group: self.tuples(index, &format!("{prefix}/group"), n as usize)?,
        })
    }
}

fn application() -> String {
    format!("gsdfix {}", env!("CARGO_PKG_VERSION"))
}
