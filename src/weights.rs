//! Per-pixel weights applied to projections before ramp filtering.
//!
//! All weights depend only on the lateral position of a pixel column in the
//! central-ray frame: `u_c = u + projection offset x - source offset x`, the
//! distance from the foot of the perpendicular dropped from the source onto
//! the detector.

/// Weighting of projections acquired with a laterally displaced detector,
/// which covers one side of the object fully and the other only partly.
/// Rays measured twice (the overlap around the central ray) are blended with
/// Wang's smooth ramp; rays measured once are doubled, undoing the factor ½
/// that FDK applies to account for every ray being measured twice over a
/// full orbit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplacedDetector {
    min_offset_x: Lengthf64,
    max_offset_x: Lengthf64,
}

/// Which part of the fan the detector sees, in the central-ray frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Coverage {
    /// Both sides are covered equally: no weighting needed
    Symmetric,
    /// Rays with `|u_c| <= overlap` are seen twice per orbit, those beyond
    /// (on the covered side) once. `flip` is set when the detector is
    /// displaced towards negative `u`.
    Displaced { overlap: Lengthf64, flip: bool },
}

impl DisplacedDetector {

    pub fn new(min_offset_x: Lengthf64, max_offset_x: Lengthf64) -> Self {
        Self { min_offset_x, max_offset_x }
    }

    /// Offsets taken from every projection of `geometry`
    pub fn from_geometry(geometry: &Geometry) -> Self {
        let (lo, hi) = geometry.offset_x_range().unwrap_or((0.0, 0.0));
        Self::new(lo, hi)
    }

    /// Lateral interval `[inferior, superior]` which is seen in every
    /// projection, whatever its offset
    pub fn covered(&self, detector: &Detector) -> (Lengthf64, Lengthf64) {
        let (u_min, u_max) = detector.u_extent();
        (u_min + self.max_offset_x, u_max + self.min_offset_x)
    }

    pub fn coverage(&self, detector: &Detector) -> Result<Coverage> {
        let (inferior, superior) = self.covered(detector);
        let tolerance = 0.1 * detector.spacing[0].abs();
        if (inferior + superior).abs() <= tolerance {
            return Ok(Coverage::Symmetric);
        }
        let overlap = (-inferior).min(superior);
        if overlap <= 0.0 {
            return Err(ReconError::DetectorDisplacement(overlap));
        }
        Ok(Coverage::Displaced { overlap, flip: inferior + superior < 0.0 })
    }

    pub fn apply(&self, mut projection: Projection, geometry: &Geometry, index: usize) -> Result<Projection> {
        let detector = projection.detector;
        let Coverage::Displaced { overlap, flip } = self.coverage(&detector)? else {
            return Ok(projection);
        };
        let sdd = geometry.source_to_detector_distances()[index];
        let offset = geometry.offset_x(index);
        let limit = (overlap / sdd).atan();
        for (iu, mut column) in projection.data.axis_iter_mut(Axis(1)).enumerate() {
            let u = detector.u(iu) + offset;
            let u = if flip { -u } else { u };
            let weight = if u < -overlap {
                0.0
            } else if u > overlap {
                2.0
            } else {
                1.0 + (FRAC_PI_2 * (u / sdd).atan() / limit).sin()
            };
            column.mapv_inplace(|x| x * weight as Weightf32);
        }
        Ok(projection)
    }
}

/// Parker's weights for short scans: rays measured twice near the ends of the
/// arc are smoothly down-weighted so that every ray ends up with a total
/// weight of 2 (which FDK's global ½ then brings back to one).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParkerShortScan {
    /// `None` when the orbit is not a short scan
    scan: Option<ShortScan>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct ShortScan {
    /// Gantry angle at which the arc starts: the one following its hole
    first_angle: Radiansf64,
    /// Half of the arc beyond π
    delta: Radiansf64,
}

impl ParkerShortScan {

    pub fn new(geometry: &Geometry) -> Self {
        let angles = geometry.gantry_angles_radians();
        let scan = largest_gap(&angles)
            .filter(|&(_, gap)| gap >= SHORT_SCAN_GAP)
            .map(|(before, gap)| {
                let first_angle = (angles[before] + gap).rem_euclid(TAU);
                let delta = 0.5 * (TAU - gap - PI);
                if delta < 0.0 {
                    tracing::warn!(arc = (TAU - gap).to_degrees(), "Short scan covers less than 180 degrees");
                }
                ShortScan { first_angle, delta }
            });
        Self { scan }
    }

    pub fn is_short_scan(&self) -> bool { self.scan.is_some() }

    /// Half of the arc beyond π, if this is a short scan
    pub fn delta(&self) -> Option<Radiansf64> { self.scan.map(|s| s.delta) }

    /// Warn if the arc is too short for the fan seen by `detector`
    pub fn check_fan(&self, detector: &Detector, geometry: &Geometry) {
        let Some(ShortScan { delta, .. }) = self.scan else { return };
        let (u_min, u_max) = detector.u_extent();
        let fan = (0..geometry.len())
            .map(|i| {
                let (sdd, offset) = (geometry.source_to_detector_distances()[i], geometry.offset_x(i));
                ((u_min + offset).abs().max((u_max + offset).abs()) / sdd).atan()
            })
            .fold(0.0, f64::max);
        if delta < fan {
            tracing::warn!(delta = delta.to_degrees(), fan = fan.to_degrees(),
                           "Short scan arc is smaller than 180 degrees plus the fan angle");
        }
    }

    pub fn apply(&self, mut projection: Projection, geometry: &Geometry, index: usize) -> Projection {
        let Some(ShortScan { first_angle, delta }) = self.scan else { return projection };
        let detector = projection.detector;
        let sdd = geometry.source_to_detector_distances()[index];
        let offset = geometry.offset_x(index);
        let beta = (geometry.gantry_angles()[index].to_radians() - first_angle).rem_euclid(TAU);
        for (iu, mut column) in projection.data.axis_iter_mut(Axis(1)).enumerate() {
            let alpha = -((detector.u(iu) + offset) / sdd).atan();
            let weight = parker_weight(beta, alpha, delta);
            column.mapv_inplace(|x| x * weight as Weightf32);
        }
        projection
    }
}

/// Parker's weight for the ray at fan angle `alpha` in the projection at
/// `beta` radians from the start of a `π + 2 delta` arc
pub fn parker_weight(beta: Radiansf64, alpha: Radiansf64, delta: Radiansf64) -> Ratiof64 {
    let sin2 = |x: f64| { let s = x.sin(); s * s };
    if beta <= 2.0 * (delta - alpha) {
        if delta - alpha <= 0.0 { return 0.0 }
        2.0 * sin2(FRAC_PI_4 * beta / (delta - alpha))
    } else if beta <= PI - 2.0 * alpha {
        2.0
    } else if beta <= PI + 2.0 * delta {
        2.0 * sin2(FRAC_PI_4 * (PI + 2.0 * delta - beta) / (delta + alpha))
    } else {
        0.0
    }
}

/// The weights of the FDK formula proper: the cosine of the angle between the
/// ray and the central ray, the angular interval the projection represents,
/// and the ramp magnification factor `sdd / (2 sid)`.
pub fn fdk_weights(mut projection: Projection, geometry: &Geometry, index: usize, angular_gap: Radiansf64) -> Projection {
    let detector = projection.detector;
    let sdd = geometry.source_to_detector_distances()[index];
    let sid = geometry.source_to_isocenter_distances()[index];
    let (offset_u, offset_v) = (
        geometry.offset_x(index),
        geometry.projection_offsets_y()[index] - geometry.source_offsets_y()[index],
    );
    let global = angular_gap * sdd / (2.0 * sid);
    Zip::indexed(&mut projection.data).for_each(|(iv, iu), x| {
        let (u, v) = (detector.u(iu) + offset_u, detector.v(iv) + offset_v);
        let cosine = sdd / (sdd * sdd + u * u + v * v).sqrt();
        *x *= (cosine * global) as Weightf32;
    });
    projection
}

// ----- Imports ------------------------------------------------------------------------------------------
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI, TAU};

use ndarray::{Axis, Zip};

use geometry::{Geometry, SHORT_SCAN_GAP, largest_gap};

use crate::{
    error::{ReconError, Result},
    grid::Detector,
    image::Projection,
    types::{Lengthf64, Radiansf64, Ratiof64, Weightf32},
};

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};
    use proptest::prelude::*;
    use rstest::rstest;

    fn ones(detector: Detector) -> Projection {
        let mut p = Projection::zeros(detector);
        p.data.fill(1.0);
        p
    }

    fn offset_geometry(offsets: &[f64]) -> Geometry {
        Geometry::from_records(offsets.iter().enumerate().map(|(i, &px)| geometry::ProjectionParams {
            projection_offset_x: px,
            ..geometry::ProjectionParams::circular(1000.0, 1500.0, i as f64 * 10.0)
        })).unwrap()
    }

    #[test]
    fn centred_detector_is_symmetric() {
        let detector = Detector::centred([1.0, 1.0], [101, 3]);
        let geometry = offset_geometry(&[0.0, 0.0]);
        let dd = DisplacedDetector::from_geometry(&geometry);
        assert_eq!(dd.coverage(&detector).unwrap(), Coverage::Symmetric);
        let p = dd.apply(ones(detector), &geometry, 0).unwrap();
        assert_eq!(p, ones(detector));
    }

    #[rstest(/**/ offset, flip,
             case( 30.0, false),
             case(-30.0, true ),
    )]
    fn displaced_detector_weights(offset: f64, flip: bool) {
        // Pixel centres from -50 to 50, shifted by `offset`
        let detector = Detector::centred([1.0, 1.0], [101, 2]);
        let geometry = offset_geometry(&[offset]);
        let dd = DisplacedDetector::from_geometry(&geometry);
        assert_eq!(dd.coverage(&detector).unwrap(), Coverage::Displaced { overlap: 20.0, flip });
        let p = dd.apply(ones(detector), &geometry, 0).unwrap();
        let weight_at = |u_c: f64| p.data[[1, (u_c - offset + 50.0).round() as usize]];
        let sign = if flip { -1.0 } else { 1.0 };
        assert_float_eq!(weight_at(sign * 70.0), 2.0, ulps <= 1);
        assert_float_eq!(weight_at(sign * 25.0), 2.0, ulps <= 1);
        assert_float_eq!(weight_at(0.0), 1.0, abs <= 1e-6);
        // Complementary rays sum to 2
        for u in [3.0, 10.0, 19.0] {
            assert_float_eq!(weight_at(u) + weight_at(-u), 2.0, abs <= 1e-5);
        }
        assert!(weight_at(sign * 10.0) > 1.0);
    }

    #[test]
    fn displaced_detector_must_cover_central_ray() {
        let detector = Detector::centred([1.0, 1.0], [101, 2]);
        let geometry = offset_geometry(&[60.0]);
        let dd = DisplacedDetector::from_geometry(&geometry);
        assert!(matches!(dd.apply(ones(detector), &geometry, 0), Err(ReconError::DetectorDisplacement(_))));
    }

    #[test]
    fn full_scan_is_not_short() {
        let geometry = Geometry::circular_orbit(36, 1000.0, 1500.0, 0.0, 360.0).unwrap();
        let parker = ParkerShortScan::new(&geometry);
        assert!(!parker.is_short_scan());
        let detector = Detector::centred([1.0, 1.0], [11, 2]);
        assert_eq!(parker.apply(ones(detector), &geometry, 5), ones(detector));
    }

    #[test]
    fn short_scan_delta() {
        // 0..=220 degrees every 2: arc of 220, hole of 140
        let geometry = Geometry::circular_orbit(111, 1000.0, 1500.0, 0.0, 222.0).unwrap();
        let parker = ParkerShortScan::new(&geometry);
        assert_float_eq!(parker.delta().unwrap(), 20_f64.to_radians(), abs <= 1e-9);
        let detector = Detector::centred([2.0, 2.0], [64, 2]);
        let first = parker.apply(ones(detector), &geometry, 0);
        assert!(first.data.iter().all(|&w| w.abs() < 1e-6));
        let middle = parker.apply(ones(detector), &geometry, 55);
        assert!(middle.data.iter().all(|&w| (w - 2.0).abs() < 1e-6));
    }

    proptest! {
        #[test]
        fn parker_weights_of_conjugate_rays_sum_to_two(
            delta in 0.31..0.6_f64,
            alpha in -0.3..0.3_f64,
            fraction in 0.0..1.0_f64,
        ) {
            let beta = fraction * (PI - 2.0 * alpha);
            let w = parker_weight(beta, alpha, delta);
            prop_assert!((0.0..=2.0).contains(&w));
            let conjugate = beta + PI + 2.0 * alpha;
            if conjugate <= PI + 2.0 * delta {
                let sum = w + parker_weight(conjugate, -alpha, delta);
                prop_assert!((sum - 2.0).abs() < 1e-9, "sum = {sum}");
            } else {
                prop_assert!((w - 2.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn fdk_weight_on_central_ray() {
        let mut geometry = Geometry::new();
        geometry.add_circular(500.0, 1000.0, 0.0).unwrap();
        let detector = Detector::centred([10.0, 10.0], [3, 3]);
        let p = fdk_weights(ones(detector), &geometry, 0, 0.1);
        // 0.1 * 1000 / (2 * 500)
        assert_float_eq!(p.data[[1, 1]], 0.1, rmax <= 1e-6);
        let corner = 1000.0 / (1000.0_f64.powi(2) + 200.0).sqrt() * 0.1;
        assert_float_eq!(p.data[[0, 2]] as f64, corner, rmax <= 1e-6);
    }
}
