//! Forward and backward projection between volumes and detector images.
//!
//! + Forward projection is ray driven: the volume is integrated along the
//!   segment joining the source to each detector pixel centre. The integral
//!   along one segment is calculated by one of the algorithms in `siddon`,
//!   `joseph` or `raycast`.
//!
//! + Back-projection is voxel driven: each voxel centre is projected through
//!   the projection matrix onto the detector, where the image is interpolated
//!   bilinearly and weighted by the FDK distance factor.
//!
//! This module computes the contribution of a single pixel or voxel. Looping
//! over pixels and voxels (serially or in parallel) is the business of the
//! `backend`s.

pub mod siddon;
pub mod joseph;
pub mod raycast;

/// Algorithm used to integrate the volume along a ray
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Exact intersection length of the ray with every voxel it crosses
    Siddon,
    /// Interpolated samples, one per voxel plane along the ray's main axis
    #[default]
    Joseph,
    /// Interpolated samples at a fixed step of half the smallest voxel size
    RayCastInterpolator,
}

impl Algorithm {
    #[inline]
    pub fn integrate(self, volume: &Volume, source: &Point, target: &Point) -> Intensityf32 {
        match self {
            Self::Siddon              =>  siddon::integrate(volume, source, target),
            Self::Joseph              =>  joseph::integrate(volume, source, target),
            Self::RayCastInterpolator => raycast::integrate(volume, source, target),
        }
    }
}

/// Everything needed to trace the rays of one projection
pub struct ForwardRays<'v> {
    volume: &'v Volume,
    algorithm: Algorithm,
    detector: Detector,
    source: Point,
    gantry_to_world: Rotation,
    offset: (Lengthf64, Lengthf64),
    plane: Lengthf64,
}

impl<'v> ForwardRays<'v> {

    pub fn new(volume: &'v Volume, geometry: &Geometry, index: usize, algorithm: Algorithm, detector: Detector) -> Self {
        Self {
            volume, algorithm, detector,
            source: geometry.source_position(index),
            gantry_to_world: geometry.rotation(index).transpose(),
            offset: (geometry.projection_offsets_x()[index], geometry.projection_offsets_y()[index]),
            plane: geometry.source_to_isocenter_distances()[index] - geometry.source_to_detector_distances()[index],
        }
    }

    /// World position of the centre of pixel `(iu, iv)`
    #[inline]
    pub fn pixel_position(&self, iu: usize, iv: usize) -> Point {
        let u = self.detector.u(iu) + self.offset.0;
        let v = self.detector.v(iv) + self.offset.1;
        Point::from(self.gantry_to_world * Vector::new(u, v, self.plane))
    }

    /// Line integral through the volume from the source to pixel `(iu, iv)`
    #[inline]
    pub fn pixel(&self, iu: usize, iv: usize) -> Intensityf32 {
        self.algorithm.integrate(self.volume, &self.source, &self.pixel_position(iu, iv))
    }
}

/// Everything needed to back-project one projection.
///
/// The homogeneous detector coordinates of voxel `[i, j, k]` are
/// `h0 + i hx + j hy + k hz`, so the projection matrix is applied once per
/// axis rather than once per voxel.
pub struct BackProjector<'p> {
    projection: &'p Projection,
    sid: f64,
    h0: Vector,
    hx: Vector,
    hy: Vector,
    hz: Vector,
}

impl<'p> BackProjector<'p> {

    pub fn new(projection: &'p Projection, grid: &Grid, geometry: &Geometry, index: usize) -> Self {
        let m = geometry.matrix(index);
        let column = |x: f64, y: f64, z: f64, w: f64| m * nalgebra::Vector4::new(x, y, z, w);
        let (o, s) = (grid.origin, grid.spacing);
        Self {
            projection,
            sid: geometry.source_to_isocenter_distances()[index],
            h0: column(o.x, o.y, o.z, 1.0),
            hx: column(s.x, 0.0, 0.0, 0.0),
            hy: column(0.0, s.y, 0.0, 0.0),
            hz: column(0.0, 0.0, s.z, 0.0),
        }
    }

    /// Contribution of this projection to voxel `[ix, iy, iz]`
    #[inline]
    pub fn voxel(&self, ix: usize, iy: usize, iz: usize) -> Intensityf32 {
        let h = self.h0 + self.hx * ix as f64 + self.hy * iy as f64 + self.hz * iz as f64;
        let w = h.z;
        // Voxels level with, or behind, the source receive nothing
        if w >= 0.0 { return 0.0 }
        let (cu, cv) = self.projection.detector.continuous_index(h.x / w, h.y / w);
        let distance_weight = (self.sid / w).powi(2);
        self.projection.bilinear(cu, cv) * distance_weight as f32
    }
}

/// Index and value of the smallest of three
#[inline]
pub(crate) fn argmin(v: [f64; 3]) -> (usize, f64) {
    let mut best = (0, v[0]);
    for (k, &x) in v.iter().enumerate().skip(1) {
        if x < best.1 { best = (k, x) }
    }
    best
}

// ----- Imports ------------------------------------------------------------------------------------------
use serde::Deserialize;

use geometry::{Geometry, Rotation};

use crate::{
    grid::{Detector, Grid},
    image::{Projection, Volume},
    types::{Intensityf32, Lengthf64, Point, Vector},
};
