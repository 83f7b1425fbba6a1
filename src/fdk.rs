//! Feldkamp-Davis-Kress filtered back-projection.
//!
//! Each projection goes through the same chain:
//!
//! 1. displaced-detector weighting (if enabled)
//! 2. Parker short-scan weighting (if enabled and the orbit is a short scan)
//! 3. FDK cosine, angular-gap and magnification weights
//! 4. ramp filter
//! 5. distance-weighted back-projection, added into the volume
//!
//! The volume is passed by value into every step and handed back, so partial
//! reconstructions can be moved between threads without locking.

/// Everything needed to set up a reconstruction
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FdkConfig {
    /// Where the volume is reconstructed
    pub grid: Grid,
    pub ramp: RampParameters,
    /// Used by forward projections in the same run; back-projection is
    /// always voxel driven
    pub algorithm: Algorithm,
    pub hardware: Hardware,
    pub displaced_detector: bool,
    pub short_scan: bool,
}

impl FdkConfig {
    /// Default filtering on the CPU, with both redundancy weightings enabled
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            ramp: RampParameters::default(),
            algorithm: Algorithm::default(),
            hardware: Hardware::default(),
            displaced_detector: true,
            short_scan: true,
        }
    }
}

pub struct Fdk {
    config: FdkConfig,
    backend: Box<dyn Backend>,
    ramp: RampFilter,
    /// Lateral offsets of the whole acquisition, when they are known before
    /// the geometry is complete
    offset_range: Option<(Lengthf64, Lengthf64)>,
    progress: Option<ProgressBar>,
}

/// Weightings which depend on the whole geometry, computed once per geometry
struct Prepared {
    gaps: Vec<Radiansf64>,
    displaced: Option<DisplacedDetector>,
    parker: Option<ParkerShortScan>,
}

impl Fdk {

    /// Fails if the requested backend is not available
    pub fn new(config: FdkConfig) -> Result<Self> {
        let backend = backend(config.hardware)?;
        Ok(Self::with_backend(config, backend))
    }

    pub fn with_backend(config: FdkConfig, backend: Box<dyn Backend>) -> Self {
        tracing::debug!(hardware = %backend.hardware(), ramp = ?config.ramp, "FDK set up");
        Self { config, backend, ramp: RampFilter::new(config.ramp), offset_range: None, progress: None }
    }

    /// Use these lateral offsets for displaced-detector weighting, rather
    /// than those of the geometry passed to each step
    pub fn with_offset_range(mut self, range: (Lengthf64, Lengthf64)) -> Self {
        self.offset_range = Some(range);
        self
    }

    /// Advance `bar` by one for every projection reconstructed in batch mode
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    pub fn config(&self) -> &FdkConfig { &self.config }

    pub fn backend(&self) -> &dyn Backend { self.backend.as_ref() }

    fn prepare(&self, geometry: &Geometry) -> Prepared {
        let displaced = self.config.displaced_detector.then(|| match self.offset_range {
            Some((lo, hi)) => DisplacedDetector::new(lo, hi),
            None           => DisplacedDetector::from_geometry(geometry),
        });
        let parker = self.config.short_scan.then(|| ParkerShortScan::new(geometry));
        Prepared { gaps: geometry.angular_gaps(), displaced, parker }
    }

    /// Add the contribution of projection `index` of `geometry` to `volume`.
    /// Angular gaps (and short-scan detection) use all the projections
    /// currently in `geometry`.
    pub fn reconstruct_projection(
        &self,
        volume    : Volume,
        projection: &Projection,
        geometry  : &Geometry,
        index     : usize,
    ) -> Result<Volume> {
        let prepared = self.prepare(geometry);
        self.accumulate(volume, projection, geometry, index, &prepared)
    }

    fn accumulate(
        &self,
        mut volume: Volume,
        projection: &Projection,
        geometry  : &Geometry,
        index     : usize,
        prepared  : &Prepared,
    ) -> Result<Volume> {
        if volume.grid != self.config.grid {
            return Err(ReconError::Shape(format!(
                "volume grid {:?} differs from configured grid {:?}", volume.grid, self.config.grid)));
        }
        let mut weighted = projection.clone();
        if let Some(displaced) = &prepared.displaced {
            weighted = displaced.apply(weighted, geometry, index)?;
        }
        if let Some(parker) = &prepared.parker {
            weighted = parker.apply(weighted, geometry, index);
        }
        let weighted = fdk_weights(weighted, geometry, index, prepared.gaps[index]);
        let filtered = self.ramp.apply(&weighted);
        self.backend.back_project(&filtered, &mut volume, geometry, index);
        Ok(volume)
    }

    /// Reconstruct every projection in `stack`, whose `i`th slice was acquired
    /// with record `i` of `geometry`.
    pub fn reconstruct(&self, geometry: &Geometry, stack: &ProjectionStack) -> Result<Volume> {
        if stack.len() != geometry.len() {
            return Err(ReconError::Shape(format!(
                "{} projections but {} geometry records", stack.len(), geometry.len())));
        }
        let grid = self.config.grid;
        let n = geometry.len();
        let prepared = self.prepare(geometry);
        if let Some(displaced) = &prepared.displaced { displaced.coverage(&stack.detector)?; }
        if let Some(parker)    = &prepared.parker    { parker.check_fan(&stack.detector, geometry); }

        let workers = self.backend.cost_profile().workers.max(1);
        tracing::info!(projections = n, workers, voxels = %group_digits(grid.len()), "Reconstructing");

        let one_projection = |volume: Volume, index: usize| -> Result<Volume> {
            let volume = self.accumulate(volume, &stack.slice(index), geometry, index, &prepared)?;
            if let Some(bar) = &self.progress { bar.inc(1) }
            Ok(volume)
        };

        if workers == 1 {
            return (0..n).try_fold(Volume::zeros(grid), one_projection);
        }

        // Every job accumulates into its own volume, which is expensive to
        // create and to combine, so aim for one job per worker.
        let job_size = n.div_ceil(workers).max(1);
        (0..n)
            .into_par_iter()
            .with_min_len(job_size)
            .with_max_len(job_size)
            .try_fold(|| Volume::zeros(grid), one_projection)
            .try_reduce(|| Volume::zeros(grid), |a, b| Ok(elementwise_add(a, b)))
    }
}

/// Batch FDK reconstruction of `stack`, acquired with `geometry`
pub fn reconstruct(geometry: &Geometry, stack: &ProjectionStack, config: FdkConfig) -> Result<Volume> {
    Fdk::new(config)?.reconstruct(geometry, stack)
}

// ----- Imports ------------------------------------------------------------------------------------------
use indicatif::ProgressBar;
use rayon::prelude::*;

use geometry::Geometry;

use crate::{
    backend::{Backend, Hardware, backend},
    error::{ReconError, Result},
    grid::Grid,
    image::{Projection, ProjectionStack, Volume, elementwise_add},
    projector::Algorithm,
    ramp::{RampFilter, RampParameters},
    types::{Lengthf64, Radiansf64},
    utils::group_digits,
    weights::{DisplacedDetector, ParkerShortScan, fdk_weights},
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Serial, forward_project_all};
    use crate::grid::Detector;
    use crate::phantom::Ellipsoid;
    use crate::types::Point;
    use float_eq::assert_float_eq;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};

    fn sphere_setup(views: usize) -> (Geometry, ProjectionStack, Grid) {
        let geometry = Geometry::circular_orbit(views, 500.0, 1000.0, 0.0, 360.0).unwrap();
        let detector = Detector::centred([2.0, 2.0], [96, 64]);
        let sphere = Ellipsoid::sphere(Point::origin(), 30.0, 1.0);
        let stack = crate::phantom::project(&[sphere], &geometry, detector);
        (geometry, stack, Grid::centred((80.0, 80.0, 80.0), (20, 20, 20)))
    }

    #[test]
    fn sphere_is_reconstructed_with_unit_density() {
        let (geometry, stack, grid) = sphere_setup(90);
        let volume = reconstruct(&geometry, &stack, FdkConfig::new(grid)).unwrap();
        // Voxels well inside the sphere
        let inside: Vec<f32> = itertools::iproduct!(7..13, 7..13, 8..12)
            .map(|(ix, iy, iz)| volume[[ix, iy, iz]])
            .collect();
        let mean = inside.iter().sum::<f32>() / inside.len() as f32;
        assert_float_eq!(mean, 1.0, abs <= 0.05);
        // Corner of the volume, well outside the sphere
        assert_float_eq!(volume[[1, 10, 10]], 0.0, abs <= 0.1);
    }

    #[test]
    fn serial_and_parallel_agree() {
        let (geometry, stack, grid) = sphere_setup(24);
        let parallel = reconstruct(&geometry, &stack, FdkConfig::new(grid)).unwrap();
        let serial = Fdk::with_backend(FdkConfig::new(grid), Box::new(Serial)).reconstruct(&geometry, &stack).unwrap();
        for (a, b) in parallel.values().zip(serial.values()) {
            assert_float_eq!(a, b, abs <= 1e-4);
        }
    }

    #[test]
    fn projections_accumulate_one_at_a_time() {
        let (geometry, stack, grid) = sphere_setup(12);
        let fdk = Fdk::new(FdkConfig::new(grid)).unwrap();
        let batch = fdk.reconstruct(&geometry, &stack).unwrap();
        let mut volume = Volume::zeros(grid);
        for i in 0..geometry.len() {
            volume = fdk.reconstruct_projection(volume, &stack.slice(i), &geometry, i).unwrap();
        }
        for (a, b) in batch.values().zip(volume.values()) {
            assert_float_eq!(a, b, abs <= 1e-4);
        }
    }

    #[test]
    fn unavailable_backend_fails_before_work() {
        let grid = Grid::centred((10.0, 10.0, 10.0), (2, 2, 2));
        let config = FdkConfig { hardware: Hardware::Cuda, ..FdkConfig::new(grid) };
        let geometry = Geometry::circular_orbit(2, 500.0, 1000.0, 0.0, 360.0).unwrap();
        let stack = ProjectionStack::zeros(Detector::centred([1.0, 1.0], [4, 4]), 2);
        assert!(matches!(reconstruct(&geometry, &stack, config), Err(ReconError::BackendUnavailable(Hardware::Cuda))));
    }

    #[test]
    fn stack_must_match_geometry() {
        let grid = Grid::centred((10.0, 10.0, 10.0), (2, 2, 2));
        let geometry = Geometry::circular_orbit(3, 500.0, 1000.0, 0.0, 360.0).unwrap();
        let stack = ProjectionStack::zeros(Detector::centred([1.0, 1.0], [4, 4]), 2);
        assert!(matches!(reconstruct(&geometry, &stack, FdkConfig::new(grid)), Err(ReconError::Shape(_))));
    }

    #[test]
    fn forward_projection_of_reconstruction_resembles_input() {
        let (geometry, stack, grid) = sphere_setup(60);
        let volume = reconstruct(&geometry, &stack, FdkConfig::new(grid)).unwrap();
        let reprojected = forward_project_all(&Serial, &volume, &geometry, stack.detector, Algorithm::Joseph);
        // Central ray crosses the full diameter of the sphere
        let (nv, nu) = stack.detector.shape();
        assert_float_eq!(reprojected.data[[0, nv / 2, nu / 2]], stack.data[[0, nv / 2, nu / 2]], rmax <= 0.1);
    }
}
