// ----------------------------------- CLI -----------------------------------
#[derive(clap::Parser, Debug, Clone)]
#[command(name = "inline_fdk", about = "FDK reconstruction of projections as they are acquired")]
pub struct Cli {

    /// One MetaImage file per projection, in acquisition order. If there are
    /// fewer files than projections, the last file is reused.
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

    /// Simulated time between acquisitions, in ms
    #[arg(long, default_value = "200")]
    pub delay: u64,

    /// Maximum number of rayon threads
    #[arg(short = 'j', long, default_value = "4")]
    pub threads: usize,
}

// --------------------------------------------------------------------------------

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use cbct::{
    config::cli::{FdkArgs, set_threads},
    inline::{MetaImageFiles, StreamingReconstruction, replay},
    io::geometry::read_geometry,
    utils::{init_logging, timing::Progress},
};

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    let args = Cli::parse();
    let config = args.reconstruction.fdk_config()?;
    set_threads(args.threads);
    if let Some(dir) = args.output.parent() { std::fs::create_dir_all(dir)?; }

    let geometry = read_geometry(&args.geometry)?;
    let mut progress = Progress::new();
    let (feeder, finished) = StreamingReconstruction::start(config, MetaImageFiles, Some(args.output.clone()))?;

    // Mock an acquisition on a separate thread
    let Cli { projections, delay, .. } = args;
    let acquisition = std::thread::spawn(move || -> cbct::error::Result<()> {
        let offsets = geometry.offset_x_range();
        tracing::info!(projections = geometry.len(), ?offsets, "Acquisition started");
        let last_file = projections.len() - 1;
        replay(&feeder, &geometry, |i| projections[i.min(last_file)].clone(), Duration::from_millis(delay))
    });

    let volume = finished.wait();
    let acquired = acquisition.join().map_err(|_| "acquisition thread panicked")?;
    // A failed reconstruction also stops the acquisition: report its cause first
    let volume = volume?;
    acquired?;
    progress.done_with_message(&format!("Reconstructed {:?} voxels", volume.grid.n));
    Ok(())
}
