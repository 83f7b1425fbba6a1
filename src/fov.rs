//! The region of a reconstruction which is seen by every projection

/// Is `p` projected onto the detector by every projection of `geometry`?
///
/// With `displaced`, a point also counts as seen when its mirror image
/// through the central ray falls on the detector, as the far side of a
/// displaced detector fills in the missing half.
pub fn is_in_field_of_view(p: &Point, geometry: &Geometry, detector: &Detector, displaced: bool) -> bool {
    let (u_lo, u_hi) = detector.u_extent();
    let (v_lo, v_hi) = detector.v_extent();
    let on_detector_u = |u: Lengthf64| (u_lo..=u_hi).contains(&u);
    (0..geometry.len()).all(|i| {
        let (u, v, w) = geometry.project(i, p);
        if w >= 0.0 || !(v_lo..=v_hi).contains(&v) { return false }
        on_detector_u(u) || (displaced && on_detector_u(-u - 2.0 * geometry.offset_x(i)))
    })
}

/// Mask with 1 in voxels whose centres are in the field of view, 0 elsewhere
pub fn field_of_view(grid: Grid, geometry: &Geometry, detector: &Detector, displaced: bool) -> Volume {
    let mut mask = Volume::zeros(grid);
    Zip::indexed(&mut mask.data).par_for_each(|(iz, iy, ix), value| {
        if is_in_field_of_view(&grid.voxel_centre([ix, iy, iz]), geometry, detector, displaced) {
            *value = 1.0;
        }
    });
    let inside = mask.values().filter(|&x| x > 0.0).count();
    tracing::debug!(inside = %group_digits(inside), voxels = %group_digits(grid.len()), "Field of view");
    mask
}

/// Zero every voxel of `volume` which lies outside the field of view
pub fn apply_field_of_view(mut volume: Volume, geometry: &Geometry, detector: &Detector, displaced: bool) -> Volume {
    let mask = field_of_view(volume.grid, geometry, detector, displaced);
    Zip::from(&mut volume.data).and(&mask.data).par_for_each(|v, &m| *v *= m);
    volume
}

// ----- Imports ------------------------------------------------------------------------------------------
use ndarray::Zip;

use geometry::Geometry;

use crate::{
    grid::{Detector, Grid},
    image::Volume,
    types::{Lengthf64, Point},
    utils::group_digits,
};

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};

    fn orbit() -> Geometry { Geometry::circular_orbit(36, 500.0, 1000.0, 0.0, 360.0).unwrap() }

    // The detector is 100 mm wide, so the field of view has a radius just
    // under 25 mm at magnification 2 (slightly less because of the divergent
    // beam), and 50 mm high near the isocenter.
    #[rstest(/**/      x ,    y ,    z , expected,
             case(  0.0,   0.0,   0.0, true ),
             case( 20.0,   0.0,   0.0, true ),
             case(  0.0,   0.0, -20.0, true ),
             case( 30.0,   0.0,   0.0, false),
             case(  0.0,  20.0,   0.0, true ),
             case(  0.0,  30.0,   0.0, false),
    )]
    fn centred_detector(x: f64, y: f64, z: f64, expected: bool) {
        let detector = Detector::centred([1.0, 1.0], [101, 101]);
        assert_eq!(is_in_field_of_view(&Point::new(x, y, z), &orbit(), &detector, false), expected);
    }

    #[test]
    fn displaced_detector_doubles_radius() {
        // Pixel centres from -10 mm to 90 mm: only the mirror image of points
        // on the far side hits the detector
        let detector = Detector::new([-10.0, -50.0], [1.0, 1.0], [101, 101]);
        let geometry = orbit();
        let p = Point::new(35.0, 0.0, 0.0);
        assert!(!is_in_field_of_view(&p, &geometry, &detector, false));
        assert!( is_in_field_of_view(&p, &geometry, &detector, true));
        assert!(!is_in_field_of_view(&Point::new(50.0, 0.0, 0.0), &geometry, &detector, true));
    }

    #[test]
    fn mask_zeroes_outside() {
        let grid = Grid::centred((100.0, 10.0, 100.0), (10, 1, 10));
        let detector = Detector::centred([1.0, 1.0], [101, 101]);
        let volume = apply_field_of_view(Volume::filled(grid, 3.0), &orbit(), &detector, false);
        assert_eq!(volume[[5, 0, 5]], 3.0);
        assert_eq!(volume[[0, 0, 0]], 0.0);
        assert_eq!(volume[[9, 0, 5]], 0.0);
        assert!(volume.values().all(|x| x == 0.0 || x == 3.0));
    }
}
