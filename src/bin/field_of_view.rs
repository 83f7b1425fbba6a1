// ----------------------------------- CLI -----------------------------------
#[derive(clap::Parser, Debug, Clone)]
#[command(name = "field_of_view", about = "Mask out the parts of a reconstruction not seen by every projection")]
pub struct Cli {

    /// Reconstructed volume (MetaImage)
    pub reconstruction: PathBuf,

    /// Any of the projection files, to obtain the detector layout
    #[arg(short, long)]
    pub projections: PathBuf,

    /// Acquisition geometry (TOML)
    #[arg(short, long)]
    pub geometry: PathBuf,

    /// Output (MetaImage)
    #[arg(short, long)]
    pub output: PathBuf,

    /// Write the binary mask rather than the masked reconstruction
    #[arg(long)]
    pub mask: bool,

    /// The detector is displaced: points seen on one side of the orbit only
    /// are in the field of view
    #[arg(long)]
    pub displaced: bool,
}

// --------------------------------------------------------------------------------

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;

use cbct::{
    fov::{apply_field_of_view, field_of_view},
    io::{geometry::read_geometry, metaimage::{read_projections, read_volume, write_volume}},
    utils::init_logging,
};

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    let args = Cli::parse();
    let geometry = read_geometry(&args.geometry)?;
    let detector = read_projections(&args.projections)?.detector;
    let volume = read_volume(&args.reconstruction)?;
    let output = if args.mask {
        field_of_view(volume.grid, &geometry, &detector, args.displaced)
    } else {
        apply_field_of_view(volume, &geometry, &detector, args.displaced)
    };
    write_volume(&output, &args.output)?;
    tracing::info!(path = %args.output.display(), "Wrote field of view");
    Ok(())
}
