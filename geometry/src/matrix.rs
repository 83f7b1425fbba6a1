use nalgebra::{Matrix3, Matrix3x4, Matrix4};

use units::{degree, radian_, todo::{Degreesf64, Radiansf64}};

use crate::ProjectionParams;

/// Homogeneous map from world coordinates to detector coordinates
pub type ProjectionMatrix = Matrix3x4<f64>;
pub type Rotation = Matrix3<f64>;

#[rustfmt::skip]
pub fn rotate_x(a: Radiansf64) -> Rotation {
    let (s, c) = a.sin_cos();
    Matrix3::new(1.0, 0.0, 0.0,
                 0.0,   c,  -s,
                 0.0,   s,   c)
}

#[rustfmt::skip]
pub fn rotate_y(a: Radiansf64) -> Rotation {
    let (s, c) = a.sin_cos();
    Matrix3::new(  c, 0.0,   s,
                 0.0, 1.0, 0.0,
                  -s, 0.0,   c)
}

#[rustfmt::skip]
pub fn rotate_z(a: Radiansf64) -> Rotation {
    let (s, c) = a.sin_cos();
    Matrix3::new(  c,  -s, 0.0,
                   s,   c, 0.0,
                 0.0, 0.0, 1.0)
}

/// Rotation taking world coordinates into the gantry frame, in which the
/// source lies on the `+z` axis.
pub fn rotation(gantry: Degreesf64, out_of_plane: Degreesf64, in_plane: Degreesf64) -> Rotation {
    let rad = |a| radian_(degree(a));
    rotate_z(-rad(in_plane)) * rotate_x(-rad(out_of_plane)) * rotate_y(-rad(gantry))
}

/// Compose the projection matrix of a single acquisition.
///
/// The world point is rotated into the gantry frame, shifted so that the
/// (offset) source lies on the `z` axis, projected by the cone onto the
/// detector plane, and finally shifted by the difference between the source
/// and detector offsets. The third homogeneous coordinate is `z' - sid`, so
/// it vanishes at the source and equals `-sid` at the isocenter.
#[rustfmt::skip]
pub fn projection_matrix(p: &ProjectionParams) -> ProjectionMatrix {
    let (sid, sdd) = (p.sid, p.sdd);
    let (sx, sy) = (p.source_offset_x, p.source_offset_y);
    let (px, py) = (p.projection_offset_x, p.projection_offset_y);

    let rotate = rotation(p.gantry_angle, p.out_of_plane_angle, p.in_plane_angle).to_homogeneous();

    let mut centre_source = Matrix4::identity();
    centre_source[(0, 3)] = -sx;
    centre_source[(1, 3)] = -sy;

    let magnify = Matrix3x4::new(-sdd,  0.0, 0.0,  0.0,
                                  0.0, -sdd, 0.0,  0.0,
                                  0.0,  0.0, 1.0, -sid);

    let shift = Matrix3::new(1.0, 0.0, sx - px,
                             0.0, 1.0, sy - py,
                             0.0, 0.0,     1.0);

    shift * magnify * centre_source * rotate
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;
    use rstest::rstest;

    #[rstest(/**/ gantry, out_of_plane, in_plane,
             case(  0.0,  0.0,   0.0),
             case( 37.0,  0.0,   0.0),
             case(-90.0,  5.0,   0.0),
             case(210.0, -3.0,  12.0),
    )]
    fn rotations_are_orthonormal(gantry: f64, out_of_plane: f64, in_plane: f64) {
        let r = rotation(gantry, out_of_plane, in_plane);
        let should_be_identity = r * r.transpose();
        let identity = Matrix3::<f64>::identity();
        for (a, b) in should_be_identity.iter().zip(identity.iter()) {
            assert_float_eq!(*a, *b, abs <= 1e-12);
        }
        assert_float_eq!(r.determinant(), 1.0, abs <= 1e-12);
    }

    #[test]
    fn quarter_turn_about_y_takes_z_to_x() {
        let v = rotate_y(std::f64::consts::FRAC_PI_2) * nalgebra::Vector3::new(0.0, 0.0, 1.0);
        assert_float_eq!([v.x, v.y, v.z], [1.0, 0.0, 0.0], abs <= [1e-15; 3]);
    }
}
