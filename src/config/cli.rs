//! Reconstruction options common to the `fdk` and `inline_fdk` executables

/// Volume and filter settings, given either as flags or in a TOML file
#[derive(clap::Args, Debug, Clone)]
pub struct FdkArgs {
    /// TOML reconstruction config. Overrides all the other reconstruction flags
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of voxels in each dimension
    #[arg(short, long, value_parser = parse_triplet::<usize>, default_value = "128,128,128")]
    pub nvoxels: (usize, usize, usize),

    /// Voxel spacing in mm
    #[arg(short, long, value_parser = parse_triplet::<Lengthf64>, default_value = "1,1,1")]
    pub spacing: (Lengthf64, Lengthf64, Lengthf64),

    /// Centre of the first voxel in mm [default: centred volume]
    #[arg(long, value_parser = parse_triplet::<Lengthf64>, allow_hyphen_values = true)]
    pub origin: Option<(Lengthf64, Lengthf64, Lengthf64)>,

    /// Forward projector used by reprojection
    #[arg(long, value_enum, default_value_t)]
    pub algorithm: Algorithm,

    #[arg(long, value_enum, default_value_t)]
    pub hardware: Hardware,

    /// Hann cutoff of the ramp filter (fraction of Nyquist, 0 = off)
    #[arg(long, default_value = "0")]
    pub hann: Ratiof64,

    /// Hann cutoff along detector columns (0 = off)
    #[arg(long, default_value = "0")]
    pub hann_y: Ratiof64,

    /// Truncation correction, as a fraction of the detector width
    #[arg(long, default_value = "0")]
    pub pad: Ratiof64,

    /// Disable displaced-detector weighting
    #[arg(long)]
    pub no_displaced_detector: bool,

    /// Disable Parker short-scan weighting
    #[arg(long)]
    pub no_short_scan: bool,
}

impl FdkArgs {

    pub fn fdk_config(&self) -> Result<FdkConfig, ReconError> {
        if let Some(path) = &self.config {
            return read_config_file(path)?.fdk_config();
        }
        let ramp = RampParameters { hann_cut: self.hann, hann_cut_y: self.hann_y, truncation: self.pad };
        ramp.validate()?;
        let (nx, ny, nz) = self.nvoxels;
        let (dx, dy, dz) = self.spacing;
        let grid = match self.origin {
            Some((x, y, z)) => Grid::new(Point::new(x, y, z), Vector::new(dx, dy, dz), [nx, ny, nz]),
            None => Grid::centred((dx * nx as f64, dy * ny as f64, dz * nz as f64), (nx, ny, nz)),
        };
        Ok(FdkConfig {
            grid,
            ramp,
            algorithm: self.algorithm,
            hardware: self.hardware,
            displaced_detector: !self.no_displaced_detector,
            short_scan: !self.no_short_scan,
        })
    }
}

/// Set the maximum number of rayon threads
pub fn set_threads(threads: usize) {
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
        Err(e) => tracing::warn!("{e}"),
        Ok(_)  => tracing::info!("Using up to {threads} threads."),
    }
}

// ----- Imports ------------------------------------------------------------------------------------------
use std::path::PathBuf;

use crate::{
    backend::Hardware,
    config::fdk::read_config_file,
    error::ReconError,
    fdk::FdkConfig,
    grid::Grid,
    projector::Algorithm,
    ramp::RampParameters,
    types::{Lengthf64, Point, Ratiof64, Vector},
    utils::parse_triplet,
};
