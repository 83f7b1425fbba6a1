//! Figures of merit for comparing a reconstruction with a reference image.

/// Agreement between a test image and a reference image
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImageQuality {
    /// Mean absolute difference
    pub error_per_pixel: f64,
    /// Mean squared difference
    pub mse: f64,
    /// Peak signal to noise ratio, in dB
    pub psnr: f64,
    /// Number of voxels compared
    pub n: usize,
}

impl std::fmt::Display for ImageQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "error per pixel = {:.5}   MSE = {:.6}   PSNR = {:.2} dB   ({} voxels)",
               self.error_per_pixel, self.mse, self.psnr, group_digits(self.n))
    }
}

/// Compare `test` with `reference`, voxel by voxel.
///
/// Only voxels whose reference value lies within `reference_range` take
/// part. PSNR is relative to `peak`.
pub fn image_quality(
    test: &Volume,
    reference: &Volume,
    reference_range: RangeInclusive<Intensityf32>,
    peak: f64,
) -> Result<ImageQuality> {
    if test.grid.n != reference.grid.n {
        return Err(ReconError::Shape(format!(
            "cannot compare {:?} volume with {:?} reference", test.grid.n, reference.grid.n)));
    }
    let (mut abs_sum, mut square_sum, mut n) = (0.0, 0.0, 0);
    for (t, r) in test.values().zip(reference.values()) {
        if !reference_range.contains(&r) { continue }
        n += 1;
        if t != r {
            let d = (r - t) as f64;
            abs_sum += d.abs();
            square_sum += d * d;
        }
    }
    if n == 0 {
        return Err(ReconError::Parameter(format!("no reference values within {reference_range:?}")));
    }
    let mse = square_sum / n as f64;
    Ok(ImageQuality {
        error_per_pixel: abs_sum / n as f64,
        mse,
        psnr: 20.0 * peak.log10() - 10.0 * mse.log10(),
        n,
    })
}

/// Region of interest
#[derive(Clone, Copy, Debug)]
pub enum Roi {
    Sphere { centre: Point, radius: Lengthf64 },
    /// Infinite cylinder parallel to the rotation axis `y`
    CylinderY { x: Lengthf64, z: Lengthf64, radius: Lengthf64 },
}

impl Roi {
    pub fn contains(&self, p: &Point) -> bool {
        match *self {
            Roi::Sphere { centre, radius } => (p - centre).norm_squared() < radius * radius,
            Roi::CylinderY { x, z, radius } => {
                let (dx, dz) = (p.x - x, p.z - z);
                dx * dx + dz * dz < radius * radius
            }
        }
    }
}

/// Values of the voxels whose centres lie inside `roi`
pub fn values_inside_roi(volume: &Volume, roi: Roi) -> Vec<Intensityf32> {
    let grid = volume.grid;
    volume.data.indexed_iter()
        .filter(|&((iz, iy, ix), _)| roi.contains(&grid.voxel_centre([ix, iy, iz])))
        .map(|(_, &value)| value)
        .collect()
}

pub fn mean(data: &[Intensityf32]) -> Option<f64> {
    if data.is_empty() { return None }
    Some(data.iter().map(|&x| x as f64).sum::<f64>() / data.len() as f64)
}

// ----- Imports ------------------------------------------------------------------------------------------
use std::ops::RangeInclusive;

use crate::{
    error::{ReconError, Result},
    image::Volume,
    types::{Intensityf32, Lengthf64, Point},
    utils::group_digits,
};

#[cfg(test)]
mod test_image_quality {
    use super::*;
    use crate::grid::Grid;
    use float_eq::assert_float_eq;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};

    fn volume(values: Vec<f32>) -> Volume {
        Volume::from_vec(Grid::centred((4.0, 1.0, 1.0), (4, 1, 1)), values).unwrap()
    }

    #[test]
    fn differences_within_reference_range() {
        let reference = volume(vec![0.0, 1.0, 1.0, 5.0]);
        let test      = volume(vec![0.5, 1.0, 0.8, 0.0]);
        // Voxel 1 is identical, voxel 3 is out of range
        let q = image_quality(&test, &reference, 0.0..=2.0, 2.0).unwrap();
        assert_eq!(q.n, 3);
        assert_float_eq!(q.error_per_pixel, 0.7 / 3.0, abs <= 1e-7);
        assert_float_eq!(q.mse, (0.25 + 0.04) / 3.0, abs <= 1e-7);
        assert_float_eq!(q.psnr, 20.0 * 2_f64.log10() - 10.0 * (0.29_f64 / 3.0).log10(), abs <= 1e-5);
    }

    #[test]
    fn identical_images() {
        let a = volume(vec![1.0, 2.0, 3.0, 4.0]);
        let q = image_quality(&a, &a, 0.0..=10.0, 2.0).unwrap();
        assert_eq!(q.n, 4);
        assert_eq!(q.mse, 0.0);
        assert!(q.psnr.is_infinite());
    }

    #[test]
    fn empty_reference_range() {
        let a = volume(vec![1.0, 2.0, 3.0, 4.0]);
        assert!(matches!(image_quality(&a, &a, 5.0..=6.0, 2.0), Err(ReconError::Parameter(_))));
    }

    #[test]
    fn mismatched_grids() {
        let a = volume(vec![0.0; 4]);
        let b = Volume::zeros(Grid::centred((4.0, 1.0, 1.0), (2, 2, 1)));
        assert!(matches!(image_quality(&a, &b, 0.0..=1.0, 2.0), Err(ReconError::Shape(_))));
    }
}

#[cfg(test)]
mod test_in_roi {
    use super::*;
    use crate::grid::Grid;
    use rstest::rstest;

    // Arrange for outer voxels to be centred at +/- 100.0, when n = 10
    const MAGIC: Lengthf64 = 10.0 / 9.0 * 200.0;

    #[rstest(/**/    l ,  n,        centre        ,    r , expected_len,
             case(MAGIC, 10, (  0.0,   0.0,   0.0), 173.3, 1000), // r > sqrt(3) * 100; all voxel centres inside sphere
             case(MAGIC, 10, (  0.0,   0.0,   0.0), 173.2,  992), // r < sqrt(3) * 100; 992 = 8 corners missing
             case(MAGIC,  9, (  0.0,   0.0,   0.0), 173.2,  729), // all 9^3 included: coarser grid => outer centres closer
             case(MAGIC, 10, (200.0, 200.0, 200.0), 173.3,    1), // single voxel at one corner of box
             case(MAGIC, 10, (200.0, 200.0, 200.0), 173.2,    0), // slightly smaller r excludes the corner
    )]
    fn number_of_included_voxels_in_sphere(
        l: Lengthf64,
        n: usize,
        centre: (Lengthf64, Lengthf64, Lengthf64),
        r: Lengthf64,
        expected_len: usize
    ) {
        let volume = Volume::filled(Grid::centred((l, l, l), (n, n, n)), 1.0);
        let centre = Point::new(centre.0, centre.1, centre.2);
        let inside = values_inside_roi(&volume, Roi::Sphere { centre, radius: r });
        assert_eq!(inside.len(), expected_len);
    }

    #[rstest(/**/    l ,  n,   centre      ,    r , expected_len,
             case(MAGIC, 10, (  0.0,   0.0), 141.5, 1000), // r > sqrt(2) * 100; all voxel centres inside cylinder
             case(MAGIC, 10, (  0.0,   0.0), 141.4,  960), // r < sqrt(2) * 100; 960 = 4*n corners missing
             case(MAGIC, 10, (200.0, 200.0), 141.5,   10), // one row of voxels at one corner of box
             case(MAGIC, 10, (200.0, 200.0), 141.4,    0), // slightly smaller r excludes the corner
    )]
    fn number_of_included_voxels_in_y_cylinder(
        l: Lengthf64,
        n: usize,
        centre: (Lengthf64, Lengthf64),
        r: Lengthf64,
        expected_len: usize
    ) {
        let volume = Volume::filled(Grid::centred((l, l, l), (n, n, n)), 1.0);
        let inside = values_inside_roi(&volume, Roi::CylinderY { x: centre.0, z: centre.1, radius: r });
        assert_eq!(inside.len(), expected_len);
        if expected_len > 0 { assert_eq!(mean(&inside), Some(1.0)) }
    }
}
