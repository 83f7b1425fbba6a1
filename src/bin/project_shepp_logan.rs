// ----------------------------------- CLI -----------------------------------
#[derive(clap::Parser, Debug, Clone)]
#[command(name = "project_shepp_logan", about = "Analytic projections of the 3D Shepp-Logan phantom")]
pub struct Cli {

    /// Acquisition geometry (TOML)
    #[arg(short, long)]
    pub geometry: PathBuf,

    /// Where to write the projections (MetaImage)
    #[arg(short, long)]
    pub output: PathBuf,

    /// Number of detector pixels along u and v
    #[arg(short, long, value_parser = parse_pair::<usize>, default_value = "256,256")]
    pub dimension: (usize, usize),

    /// Pixel spacing along u and v, in mm
    #[arg(short, long, value_parser = parse_pair::<f64>, default_value = "1,1")]
    pub spacing: (f64, f64),

    /// Half-height of the phantom's skull, in mm
    #[arg(long, default_value = "128")]
    pub phantom_scale: f64,

    /// Standard deviation of Gaussian noise added to the line integrals
    #[arg(long)]
    pub noise: Option<f64>,

    /// Seed of the noise generator
    #[arg(long, default_value = "0")]
    pub seed: u64,

    /// Also voxelise the phantom into this file, for use as a reference image
    #[arg(long)]
    pub reference: Option<PathBuf>,

    /// Voxels of the reference image
    #[arg(long, value_parser = parse_triplet::<usize>, default_value = "128,128,128")]
    pub nvoxels: (usize, usize, usize),

    /// Full size of the reference image in mm
    #[arg(long, value_parser = parse_triplet::<f64>, default_value = "256,256,256")]
    pub size: (f64, f64, f64),

    /// Maximum number of rayon threads
    #[arg(short = 'j', long, default_value = "4")]
    pub threads: usize,
}

// --------------------------------------------------------------------------------

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;

use cbct::{
    config::cli::set_threads,
    grid::{Detector, Grid},
    io::{geometry::read_geometry, metaimage::{write_projections, write_volume}},
    phantom::{add_noise, draw, project, shepp_logan},
    utils::{init_logging, parse_pair, parse_triplet, timing::Progress},
};

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    let args = Cli::parse();
    set_threads(args.threads);

    let geometry = read_geometry(&args.geometry)?;
    let (nu, nv) = args.dimension;
    let (du, dv) = args.spacing;
    let detector = Detector::centred([du, dv], [nu, nv]);
    let phantom = shepp_logan(args.phantom_scale);

    let mut progress = Progress::new();
    progress.start(&format!("Projecting Shepp-Logan phantom onto {} views", geometry.len()));
    let mut projections = project(&phantom, &geometry, detector);
    if let Some(sigma) = args.noise {
        add_noise(&mut projections, sigma, args.seed)?;
    }
    progress.done();

    if let Some(dir) = args.output.parent() { std::fs::create_dir_all(dir)?; }
    write_projections(&projections, &args.output)?;
    progress.done_with_message(&format!("Wrote {}", args.output.display()));

    if let Some(path) = &args.reference {
        let volume = draw(&phantom, Grid::centred(args.size, args.nvoxels));
        write_volume(&volume, path)?;
        progress.done_with_message(&format!("Wrote reference image {}", path.display()));
    }
    Ok(())
}
