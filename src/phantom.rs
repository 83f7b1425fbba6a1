//! Analytic phantoms: objects whose projections can be computed exactly, for
//! simulating acquisitions and checking reconstructions.
//!
//! The rotation axis of the gantry is `y`, so ellipsoids are oriented by an
//! angle about `y`.

/// Solid ellipsoid of uniform density. Overlapping ellipsoids add up.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ellipsoid {
    pub centre: Point,
    pub semi_axes: Vector,
    /// Rotation about the `y` axis, in degrees
    pub angle: Degreesf64,
    pub density: Intensityf32,
}

impl Ellipsoid {

    pub fn new(centre: Point, semi_axes: Vector, angle: Degreesf64, density: Intensityf32) -> Self {
        Self { centre, semi_axes, angle, density }
    }

    pub fn sphere(centre: Point, radius: Lengthf64, density: Intensityf32) -> Self {
        Self::new(centre, Vector::new(radius, radius, radius), 0.0, density)
    }

    /// Position of `p` in the frame where this ellipsoid is the unit sphere
    fn to_unit_frame(&self, v: &Vector) -> Vector {
        let rotation = rotate_y(radian_(degree(self.angle)));
        (rotation.transpose() * v).component_div(&self.semi_axes)
    }

    pub fn contains(&self, p: &Point) -> bool {
        self.to_unit_frame(&(p - self.centre)).norm_squared() <= 1.0
    }

    /// Length of the segment `p1 -> p2` which lies inside the ellipsoid
    pub fn intersection_length(&self, p1: &Point, p2: &Point) -> Lengthf64 {
        let o = self.to_unit_frame(&(p1 - self.centre));
        let e = self.to_unit_frame(&(p2 - p1));
        // |o + t e|² = 1
        let a = e.norm_squared();
        if a == 0.0 { return 0.0 }
        let b = 2.0 * o.dot(&e);
        let c = o.norm_squared() - 1.0;
        let discriminant = b * b - 4.0 * a * c;
        if discriminant <= 0.0 { return 0.0 }
        let root = discriminant.sqrt();
        let t0 = ((-b - root) / (2.0 * a)).max(0.0);
        let t1 = ((-b + root) / (2.0 * a)).min(1.0);
        (t1 - t0).max(0.0) * (p2 - p1).norm()
    }
}

/// Axis-aligned box, for checking projectors against exact lengths
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cuboid {
    pub lower: Point,
    pub upper: Point,
}

impl Cuboid {

    pub fn new(lower: Point, upper: Point) -> Self { Self { lower, upper } }

    pub fn intersection_length(&self, p1: &Point, p2: &Point) -> Lengthf64 {
        clip_to_box(&self.lower, &self.upper, p1, p2)
            .map_or(0.0, |(t0, t1)| (t1 - t0) * (p2 - p1).norm())
    }
}

/// The 3D Shepp-Logan head phantom, with its outer ellipsoid reaching
/// `0.92 scale` mm from the centre along `z`. The skull has density 2 and
/// the brain 1.02, with low-contrast (±0.02) features inside.
pub fn shepp_logan(scale: Lengthf64) -> Vec<Ellipsoid> {
    #[rustfmt::skip]
    let table: [([f64; 3], [f64; 3], Degreesf64, Intensityf32); 10] = [
        // semi axes              centre                    angle  density
        ([0.69  , 0.90, 0.92 ], [ 0.0 ,  0.0  ,  0.0  ],   0.0,  2.0 ),
        ([0.6624, 0.88, 0.874], [ 0.0 ,  0.0  ,  0.0  ],   0.0, -0.98),
        ([0.41  , 0.21, 0.16 ], [-0.22, -0.25 ,  0.0  ], 108.0, -0.02),
        ([0.31  , 0.22, 0.11 ], [ 0.22, -0.25 ,  0.0  ],  72.0, -0.02),
        ([0.21  , 0.50, 0.25 ], [ 0.0 , -0.25 ,  0.35 ],   0.0,  0.02),
        ([0.046 , 0.046,0.046], [ 0.0 , -0.25 ,  0.10 ],   0.0,  0.02),
        ([0.046 , 0.02, 0.023], [-0.08, -0.25 , -0.65 ],   0.0,  0.01),
        ([0.046 , 0.02, 0.023], [ 0.06, -0.25 , -0.65 ],  90.0,  0.01),
        ([0.056 , 0.1 , 0.04 ], [ 0.06,  0.625, -0.105],  90.0,  0.02),
        ([0.056 , 0.1 , 0.056], [ 0.0 ,  0.625,  0.1  ],   0.0, -0.02),
    ];
    table.iter()
        .map(|&([a, b, c], [x, y, z], angle, density)| Ellipsoid::new(
            Point::new(x * scale, y * scale, z * scale),
            Vector::new(a * scale, b * scale, c * scale),
            angle,
            density,
        ))
        .collect()
}

/// Voxelise `ellipsoids` on `grid`: each voxel takes the summed density of
/// the ellipsoids containing its centre.
pub fn draw(ellipsoids: &[Ellipsoid], grid: Grid) -> Volume {
    let mut volume = Volume::zeros(grid);
    Zip::indexed(&mut volume.data).par_for_each(|(iz, iy, ix), voxel| {
        let p = grid.voxel_centre([ix, iy, iz]);
        *voxel = ellipsoids.iter()
            .filter(|e| e.contains(&p))
            .map(|e| e.density)
            .sum();
    });
    volume
}

/// Exact line integral of `ellipsoids` from the source of projection `index`
/// to the detector point `(u, v)`
pub fn line_integral(ellipsoids: &[Ellipsoid], geometry: &Geometry, index: usize, u: Lengthf64, v: Lengthf64) -> Intensityf32 {
    let source = geometry.source_position(index);
    let pixel = geometry.detector_position(index, u, v);
    ellipsoids.iter()
        .map(|e| e.intersection_length(&source, &pixel) * e.density as f64)
        .sum::<f64>() as Intensityf32
}

/// Simulated acquisition of `ellipsoids` with `geometry`
pub fn project(ellipsoids: &[Ellipsoid], geometry: &Geometry, detector: Detector) -> ProjectionStack {
    let mut stack = ProjectionStack::zeros(detector, geometry.len());
    stack.data.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(index, mut projection)| {
            for ((iv, iu), pixel) in projection.indexed_iter_mut() {
                *pixel = line_integral(ellipsoids, geometry, index, detector.u(iu), detector.v(iv));
            }
        });
    stack
}

/// Add zero-mean Gaussian noise of standard deviation `sigma` to every pixel.
/// The same `seed` always gives the same noise.
pub fn add_noise(stack: &mut ProjectionStack, sigma: f64, seed: u64) -> Result<()> {
    let normal = Normal::new(0.0, sigma)
        .map_err(|e| ReconError::Parameter(format!("noise sigma {sigma}: {e}")))?;
    let mut rng = StdRng::seed_from_u64(seed);
    stack.data.mapv_inplace(|x| x + normal.sample(&mut rng) as Intensityf32);
    Ok(())
}

// ----- Imports ------------------------------------------------------------------------------------------
use ndarray::{Axis, Zip, parallel::prelude::*};
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal};

use geometry::{Geometry, rotate_y};
use units::{degree, radian_};

use crate::{
    error::{ReconError, Result},
    grid::{Detector, Grid, clip_to_box},
    image::{ProjectionStack, Volume},
    types::{Degreesf64, Intensityf32, Lengthf64, Point, Vector},
};
