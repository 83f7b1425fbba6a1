// Reconstruction of simulated acquisitions of the Shepp-Logan phantom

use float_eq::assert_float_eq;

use cbct::{
    fdk::{FdkConfig, reconstruct},
    fom::{Roi, image_quality, mean, values_inside_roi},
    grid::{Detector, Grid},
    phantom::{add_noise, draw, project, shepp_logan},
    types::{Point, Vector},
    Geometry,
};

const SCALE: f64 = 60.0;

fn grid() -> Grid { Grid::new(Point::new(-63.0, -63.0, -63.0), Vector::new(2.0, 2.0, 2.0), [64, 64, 64]) }

fn detector() -> Detector { Detector::centred([2.0, 2.0], [128, 128]) }

fn geometry() -> Geometry { Geometry::circular_orbit(180, 500.0, 1000.0, 0.0, 360.0).unwrap() }

fn centre() -> Roi { Roi::Sphere { centre: Point::origin(), radius: 10.0 } }

#[test]
fn full_scan() {
    let phantom = shepp_logan(SCALE);
    let geometry = geometry();
    let projections = project(&phantom, &geometry, detector());
    let volume = reconstruct(&geometry, &projections, FdkConfig::new(grid())).unwrap();
    let reference = draw(&phantom, grid());

    // Compare the brain only: the skull is thinner than a voxel
    let quality = image_quality(&volume, &reference, 0.9..=1.1, 2.0).unwrap();
    assert!(quality.error_per_pixel <= 0.02, "{quality}");
    assert!(quality.psnr >= 30.0, "{quality}");

    let got  = mean(&values_inside_roi(&volume   , centre())).unwrap();
    let want = mean(&values_inside_roi(&reference, centre())).unwrap();
    assert_float_eq!(got, want, abs <= 0.03);
}

#[test]
fn noisy_projections() {
    let phantom = shepp_logan(SCALE);
    let geometry = geometry();
    let mut projections = project(&phantom, &geometry, detector());
    add_noise(&mut projections, 1.0, 42).unwrap();
    let mut config = FdkConfig::new(grid());
    config.ramp.hann_cut = 0.8;
    let volume = reconstruct(&geometry, &projections, config).unwrap();
    let reference = draw(&phantom, grid());

    let got  = mean(&values_inside_roi(&volume   , centre())).unwrap();
    let want = mean(&values_inside_roi(&reference, centre())).unwrap();
    assert_float_eq!(got, want, abs <= 0.05);
}

#[test]
fn air_outside_the_phantom() {
    let phantom = shepp_logan(SCALE);
    let geometry = geometry();
    let projections = project(&phantom, &geometry, detector());
    let volume = reconstruct(&geometry, &projections, FdkConfig::new(grid())).unwrap();
    // Beyond the skull along x, but well inside the field of view
    let air = Roi::Sphere { centre: Point::new(52.0, 0.0, 0.0), radius: 4.0 };
    let got = mean(&values_inside_roi(&volume, air)).unwrap();
    assert_float_eq!(got, 0.0, abs <= 0.05);
}
