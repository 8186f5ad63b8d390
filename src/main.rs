//! Write the HOOMD test fixture, or take a look inside a gsd file.
use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;

use gsdfix::fixture::{self, FixtureParams};
use gsdfix::hoomd::HoomdReader;

#[derive(Parser)]
#[command(version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the two-frame lattice fixture.
    Generate {
        /// Output path (gsd). Defaults to `tests/python_output.gsd` in the crate directory.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// The lattice holds `2 * m^3` particles.
        #[arg(short, default_value_t = FixtureParams::default().m)]
        m: u32,

        /// Distance between neighbouring lattice sites.
        #[arg(long, default_value_t = FixtureParams::default().spacing)]
        spacing: f64,
    },
    /// Print a one-line summary of every frame in a HOOMD gsd file.
    ///
    /// The columns are the frame index, step, number of particles, bonds, angles and dihedrals,
    /// followed by the particle types. They are separated by tabs.
    Inspect {
        /// Input path (gsd).
        input: PathBuf,

        /// Also list the chunks that are stored in each frame.
        #[arg(long)]
        chunks: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match args.command {
        Command::Generate { output, m, spacing } => {
            let output = output.unwrap_or_else(fixture::default_output_path);
            let params = FixtureParams { m, spacing };
            info!(
                "generating {} particles on a lattice with {} sites per axis",
                params.n_particles(),
                params.extent()
            );
            fixture::write_fixture(&output, &params)?;
        }
        Command::Inspect { input, chunks } => inspect(input, chunks)?,
    }

    Ok(())
}

fn inspect(input: PathBuf, chunks: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = HoomdReader::open(&input)?;
    info!(
        "{:?} was written by '{}' and holds {} frames",
        input,
        reader.file.application(),
        reader.len()
    );

    let mut stdout = std::io::stdout().lock();
    for index in 0..reader.len() {
        let frame = reader.read_frame(index)?;
        writeln!(
            stdout,
            "{index}\t{}\t{}\t{}\t{}\t{}\t{}",
            frame.configuration.step,
            frame.particles.n,
            frame.bonds.n,
            frame.angles.n,
            frame.dihedrals.n,
            frame.particles.types.join(",")
        )?;

        if chunks {
            for entry in reader.file.frame_entries(index) {
                let name = reader.file.entry_name(entry).unwrap_or("?");
                writeln!(
                    stdout,
                    "\t{name}\t{:?}\t{}x{}",
                    entry.chunk_type()?,
                    entry.n,
                    entry.m
                )?;
            }
        }
    }

    Ok(())
}
