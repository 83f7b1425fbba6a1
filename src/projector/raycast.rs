//! Ray casting with trilinear interpolation at a fixed step.
//!
//! The clipped ray is divided into equal steps no longer than half the
//! smallest voxel spacing and the volume is sampled at the middle of each
//! step.

use crate::image::Volume;
use crate::types::{Intensityf32, Point};

pub fn integrate(volume: &Volume, source: &Point, target: &Point) -> Intensityf32 {
    let grid = &volume.grid;
    let Some((t0, t1)) = grid.clip(source, target) else { return 0.0 };
    let d = target - source;
    let length = (t1 - t0) * d.norm();
    if length == 0.0 { return 0.0 }

    let step = 0.5 * grid.spacing.min();
    let n = (length / step).ceil().max(1.0) as usize;
    let q0 = grid.continuous_index(&(source + d * t0));
    let q1 = grid.continuous_index(&(source + d * t1));
    let dq = (q1 - q0) / n as f64;

    let sum: f64 = (0..n)
        .map(|j| volume.trilinear(&(q0 + dq * (j as f64 + 0.5))) as f64)
        .sum();
    (sum * length / n as f64) as Intensityf32
}
