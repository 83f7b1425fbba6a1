//! Exact line integrals: the length of the ray inside every voxel it crosses,
//! weighted by that voxel's value.
//!
//! The ray is followed from the point where it enters the volume. For each
//! axis we keep track of the distance along the ray to the next voxel
//! boundary perpendicular to that axis; the nearest of these three is the
//! boundary crossed next. Moving in the negative direction along an axis is
//! handled by stepping the index down rather than up.

use crate::image::Volume;
use crate::types::{Intensityf32, Point};

use super::argmin;

/// Positions very close to a voxel boundary are snapped onto it, so that
/// `floor` picks the voxel the ray is actually entering.
const EPS: f64 = 1e-9;

pub fn integrate(volume: &Volume, source: &Point, target: &Point) -> Intensityf32 {
    let grid = &volume.grid;
    let Some((t0, t1)) = grid.clip(source, target) else { return 0.0 };
    let d = target - source;
    let length = d.norm();
    if length == 0.0 { return 0.0 }
    let direction = d / length;

    // Distance from the entry point to the point where the ray leaves the
    // volume, or reaches its target.
    let end = (t1 - t0) * length;

    // Entry point in units of voxels, measured from the lower corner: voxel
    // `i` spans `[i, i+1)`.
    let entry = (source + d * t0 - grid.lower_corner()).component_div(&grid.spacing);

    let mut index       = [0_usize; 3];
    let mut delta_up    = [true; 3];
    let mut remaining   = [usize::MAX; 3];
    let mut next_boundary = [f64::INFINITY; 3];
    let mut voxel_size    = [f64::INFINITY; 3];

    for k in 0..3 {
        let n = grid.n[k];
        let mut c = entry[k];
        let nearest = c.round();
        if (c - nearest).abs() < EPS { c = nearest }
        let dir = direction[k];
        if dir > 0.0 {
            let i = (c.floor().max(0.0) as usize).min(n - 1);
            index[k]     = i;
            remaining[k] = n - i;
            voxel_size[k] = grid.spacing[k] / dir;
            next_boundary[k] = (i as f64 + 1.0 - c).max(0.0) * voxel_size[k];
        } else if dir < 0.0 {
            let i = ((c.ceil() - 1.0).max(0.0) as usize).min(n - 1);
            index[k]     = i;
            delta_up[k]  = false;
            remaining[k] = i + 1;
            voxel_size[k] = grid.spacing[k] / -dir;
            next_boundary[k] = (c - i as f64).max(0.0) * voxel_size[k];
        } else {
            index[k] = (c.floor().max(0.0) as usize).min(n - 1);
        }
    }

    // How far we have moved since entering the volume
    let mut here = 0.0;
    let mut integral = 0.0_f64;

    loop {
        // Which voxel boundary will be hit next, and its position
        let (dimension, boundary) = argmin(next_boundary);

        // The weight is the length of the ray in this voxel
        let weight = boundary.min(end) - here;
        if weight > 0.0 {
            let [ix, iy, iz] = index;
            integral += weight * volume.data[[iz, iy, ix]] as f64;
        }

        // Reached the end of the ray, inside or at the edge of the volume
        if boundary >= end { break }

        // Move along the ray until it leaves this voxel
        here = boundary;
        next_boundary[dimension] += voxel_size[dimension];

        // Move index across the boundary we are crossing
        remaining[dimension] -= 1;
        if remaining[dimension] == 0 { break }
        if delta_up[dimension] { index[dimension] += 1 } else { index[dimension] -= 1 }
    }
    integral as Intensityf32
}
