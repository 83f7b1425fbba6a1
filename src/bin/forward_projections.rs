// ----------------------------------- CLI -----------------------------------
#[derive(clap::Parser, Debug, Clone)]
#[command(name = "forward_projections", about = "Project a volume onto the detector of every projection of a geometry")]
pub struct Cli {

    /// Volume to be projected (MetaImage)
    pub input: PathBuf,

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

    /// Centre of the first pixel in mm [default: centred detector]
    #[arg(long, value_parser = parse_pair::<f64>, allow_hyphen_values = true)]
    pub origin: Option<(f64, f64)>,

    #[arg(short, long, value_enum, default_value_t)]
    pub method: Algorithm,

    #[arg(long, value_enum, default_value_t)]
    pub hardware: Hardware,

    /// Maximum number of rayon threads
    #[arg(short = 'j', long, default_value = "4")]
    pub threads: usize,
}

// --------------------------------------------------------------------------------

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;

use cbct::{
    backend::{Hardware, backend, forward_project_all},
    config::cli::set_threads,
    grid::Detector,
    io::{geometry::read_geometry, metaimage::{read_volume, write_projections}},
    projector::Algorithm,
    utils::{init_logging, parse_pair, timing::Progress},
};

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    let args = Cli::parse();
    set_threads(args.threads);
    let backend = backend(args.hardware)?;

    let mut progress = Progress::new();
    progress.start("Reading volume and geometry");
    let volume = read_volume(&args.input)?;
    let geometry = read_geometry(&args.geometry)?;
    progress.done();

    let (nu, nv) = args.dimension;
    let (du, dv) = args.spacing;
    let detector = match args.origin {
        Some((u, v)) => Detector::new([u, v], [du, dv], [nu, nv]),
        None         => Detector::centred([du, dv], [nu, nv]),
    };

    progress.start(&format!("Projecting {} views with {:?}", geometry.len(), args.method));
    let projections = forward_project_all(backend.as_ref(), &volume, &geometry, detector, args.method);
    progress.done();

    if let Some(dir) = args.output.parent() { std::fs::create_dir_all(dir)?; }
    write_projections(&projections, &args.output)?;
    progress.done_with_message(&format!("Wrote {}", args.output.display()));
    Ok(())
}
