// ----------------------------------- CLI -----------------------------------
#[derive(clap::Parser, Debug, Clone)]
#[command(name = "fdk", about = "Reconstruct a cone-beam CT volume with Feldkamp-Davis-Kress")]
pub struct Cli {

    /// MetaImage files containing the projections, in acquisition order
    #[arg(required = true)]
    pub projections: Vec<PathBuf>,

    /// Acquisition geometry (TOML)
    #[arg(short, long)]
    pub geometry: PathBuf,

    /// Where to write the reconstructed volume (MetaImage)
    #[arg(short, long)]
    pub output: PathBuf,

    #[command(flatten)]
    pub reconstruction: FdkArgs,

    /// Zero the voxels which are not seen by every projection
    #[arg(long)]
    pub fov: bool,

    /// Maximum number of rayon threads
    #[arg(short = 'j', long, default_value = "4")]
    pub threads: usize,
}

// --------------------------------------------------------------------------------

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use ndarray::{Axis, concatenate};

use cbct::{
    config::cli::{FdkArgs, set_threads},
    fdk::Fdk,
    fov::apply_field_of_view,
    image::ProjectionStack,
    io::{geometry::read_geometry, metaimage::{read_projections, write_volume}},
    utils::{group_digits, init_logging, projection_bar, timing::Progress},
};

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    let args = Cli::parse();
    let config = args.reconstruction.fdk_config()?;
    set_threads(args.threads);

    let mut progress = Progress::new();
    progress.start("Reading geometry and projections");
    let geometry = read_geometry(&args.geometry)?;
    let stack = read_all(&args.projections)?;
    progress.done();
    println!("{} projections of {} x {} pixels, volume of {} voxels",
             stack.len(), stack.detector.n[0], stack.detector.n[1], group_digits(config.grid.len()));

    // Before starting the potentially long computation, make sure that we can
    // write the result to the requested destination.
    if let Some(dir) = args.output.parent() { std::fs::create_dir_all(dir)?; }

    let bar = projection_bar(stack.len());
    let fdk = Fdk::new(config)?.with_progress(bar.clone());
    let mut volume = fdk.reconstruct(&geometry, &stack)?;
    bar.finish();
    progress.done_with_message("Reconstructed");

    if args.fov {
        volume = apply_field_of_view(volume, &geometry, &stack.detector, config.displaced_detector);
        progress.done_with_message("Applied field of view");
    }
    write_volume(&volume, &args.output)?;
    progress.done_with_message(&format!("Wrote {}", args.output.display()));
    Ok(())
}

/// Concatenate the projections found in all the files
fn read_all(paths: &[PathBuf]) -> Result<ProjectionStack, Box<dyn Error>> {
    let stacks = paths.iter().map(|p| read_projections(p)).collect::<Result<Vec<_>, _>>()?;
    let Some(first) = stacks.first() else { return Err("no projection files".into()) };
    let detector = first.detector;
    if stacks.len() == 1 { return Ok(stacks.into_iter().next().ok_or("no projection files")?) }
    let views: Vec<_> = stacks.iter().map(|s| s.data.view()).collect();
    let data = concatenate(Axis(0), &views)?;
    Ok(ProjectionStack::new(detector, data)?)
}
