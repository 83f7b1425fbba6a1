//! Where the forward and back projections are executed.
//!
//! A `Backend` loops over the pixels of a projection (forward) or the voxels
//! of a volume (back), delegating the work for each one to `projector`. The
//! CPU backend distributes the loop over rayon's thread pool; the serial
//! backend runs it on the calling thread.

/// Available execution backends
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Hardware {
    #[default]
    Cpu,
    Serial,
    Cuda,
    #[value(name = "opencl")]
    OpenCl,
}

impl std::fmt::Display for Hardware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Cpu    => "cpu",
            Self::Serial => "serial",
            Self::Cuda   => "cuda",
            Self::OpenCl => "opencl",
        };
        write!(f, "{name}")
    }
}

/// How the batch reconstruction should split the projections between jobs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CostProfile {
    /// Number of partial volumes worth accumulating concurrently
    pub workers: usize,
}

pub trait Backend: Send + Sync {

    fn hardware(&self) -> Hardware;

    /// Overwrite `projection` with the line integrals of `volume` seen from
    /// projection `index` of `geometry`.
    fn forward(&self, volume: &Volume, geometry: &Geometry, index: usize, algorithm: Algorithm, projection: &mut Projection);

    /// Add the distance-weighted back-projection of `projection` to `volume`.
    fn back_project(&self, projection: &Projection, volume: &mut Volume, geometry: &Geometry, index: usize);

    fn cost_profile(&self) -> CostProfile;
}

/// Data-parallel over pixels and voxels, on the current rayon thread pool
#[derive(Clone, Copy, Debug, Default)]
pub struct Cpu;

/// Everything on the calling thread
#[derive(Clone, Copy, Debug, Default)]
pub struct Serial;

impl Backend for Cpu {

    fn hardware(&self) -> Hardware { Hardware::Cpu }

    fn forward(&self, volume: &Volume, geometry: &Geometry, index: usize, algorithm: Algorithm, projection: &mut Projection) {
        let rays = ForwardRays::new(volume, geometry, index, algorithm, projection.detector);
        Zip::indexed(&mut projection.data)
            .par_for_each(|(iv, iu), pixel| *pixel = rays.pixel(iu, iv));
    }

    fn back_project(&self, projection: &Projection, volume: &mut Volume, geometry: &Geometry, index: usize) {
        let bp = BackProjector::new(projection, &volume.grid, geometry, index);
        Zip::indexed(&mut volume.data)
            .par_for_each(|(iz, iy, ix), voxel| *voxel += bp.voxel(ix, iy, iz));
    }

    fn cost_profile(&self) -> CostProfile {
        CostProfile { workers: rayon::current_num_threads() }
    }
}

impl Backend for Serial {

    fn hardware(&self) -> Hardware { Hardware::Serial }

    fn forward(&self, volume: &Volume, geometry: &Geometry, index: usize, algorithm: Algorithm, projection: &mut Projection) {
        let rays = ForwardRays::new(volume, geometry, index, algorithm, projection.detector);
        Zip::indexed(&mut projection.data)
            .for_each(|(iv, iu), pixel| *pixel = rays.pixel(iu, iv));
    }

    fn back_project(&self, projection: &Projection, volume: &mut Volume, geometry: &Geometry, index: usize) {
        let bp = BackProjector::new(projection, &volume.grid, geometry, index);
        Zip::indexed(&mut volume.data)
            .for_each(|(iz, iy, ix), voxel| *voxel += bp.voxel(ix, iy, iz));
    }

    fn cost_profile(&self) -> CostProfile { CostProfile { workers: 1 } }
}

/// Instantiate the requested backend. GPU backends are not built into this
/// crate and are rejected before any work is done.
pub fn backend(hardware: Hardware) -> Result<Box<dyn Backend>> {
    match hardware {
        Hardware::Cpu    => Ok(Box::new(Cpu)),
        Hardware::Serial => Ok(Box::new(Serial)),
        Hardware::Cuda | Hardware::OpenCl => Err(ReconError::BackendUnavailable(hardware)),
    }
}

/// Forward project `volume` through every projection of `geometry`
pub fn forward_project_all(
    backend  : &dyn Backend,
    volume   : &Volume,
    geometry : &Geometry,
    detector : Detector,
    algorithm: Algorithm,
) -> ProjectionStack {
    let mut stack = ProjectionStack::zeros(detector, geometry.len());
    for (index, mut slot) in stack.data.outer_iter_mut().enumerate() {
        let mut projection = Projection::zeros(detector);
        backend.forward(volume, geometry, index, algorithm, &mut projection);
        slot.assign(&projection.data);
    }
    stack
}

// ----- Imports ------------------------------------------------------------------------------------------
use ndarray::Zip;
use serde::Deserialize;

use geometry::Geometry;

use crate::{
    error::{ReconError, Result},
    grid::Detector,
    image::{Projection, ProjectionStack, Volume},
    projector::{Algorithm, BackProjector, ForwardRays},
};
