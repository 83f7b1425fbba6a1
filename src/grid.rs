//! The position, size and granularity of reconstructed volumes and of
//! detector images.

use crate::types::{BoxDim_u, Index2_u, Index3_u, Lengthf64, Point, Vector};

/// A regular 3D grid of voxels.
///
/// `origin` is the centre of the first voxel (the ITK/MetaImage convention),
/// so voxel `[i, j, k]` is centred at `origin + [i, j, k] * spacing`. Spacings
/// must be positive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Grid {
    pub origin: Point,
    pub spacing: Vector,
    /// Number of voxels along `x`, `y` and `z`
    pub n: BoxDim_u,
}

impl Grid {

    pub fn new(origin: Point, spacing: Vector, n: BoxDim_u) -> Self {
        Self { origin, spacing, n }
    }

    /// `n` voxels filling a box of `full_size`, centred on the isocenter
    pub fn centred(
        full_size: (Lengthf64, Lengthf64, Lengthf64),
        (nx, ny, nz): (usize, usize, usize),
    ) -> Self {
        let (dx, dy, dz) = full_size;
        let spacing = Vector::new(dx / nx as f64, dy / ny as f64, dz / nz as f64);
        let origin = Point::new(-dx / 2.0 + spacing.x / 2.0,
                                -dy / 2.0 + spacing.y / 2.0,
                                -dz / 2.0 + spacing.z / 2.0);
        Self { origin, spacing, n: [nx, ny, nz] }
    }

    pub fn len(&self) -> usize { self.n.iter().product() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Shape of the corresponding `ndarray`, slowest axis first: `(z, y, x)`
    pub fn shape(&self) -> (usize, usize, usize) {
        let [nx, ny, nz] = self.n;
        (nz, ny, nx)
    }

    /// Find centre of voxel with given 3D index
    pub fn voxel_centre(&self, [i, j, k]: Index3_u) -> Point {
        let s = self.spacing;
        Point::new(self.origin.x + i as f64 * s.x,
                   self.origin.y + j as f64 * s.y,
                   self.origin.z + k as f64 * s.z)
    }

    /// Position in units of voxels; voxel centres lie on integers
    pub fn continuous_index(&self, p: &Point) -> Vector {
        (p - self.origin).component_div(&self.spacing)
    }

    /// Outer corner of the first voxel
    pub fn lower_corner(&self) -> Point { self.origin - self.spacing / 2.0 }

    /// Outer corner of the last voxel
    pub fn upper_corner(&self) -> Point {
        let [nx, ny, nz] = self.n;
        self.voxel_centre([nx, ny, nz]) - self.spacing / 2.0
    }

    /// The part of the segment `p1 -> p2` which lies inside the grid, as
    /// parameters `0 <= t0 < t1 <= 1` along the segment.
    pub fn clip(&self, p1: &Point, p2: &Point) -> Option<(f64, f64)> {
        clip_to_box(&self.lower_corner(), &self.upper_corner(), p1, p2)
    }

    /// Point at which the segment `p1 -> p2` enters the grid
    pub fn entry(&self, p1: &Point, p2: &Point) -> Option<Point> {
        self.clip(p1, p2).map(|(t0, _)| p1 + (p2 - p1) * t0)
    }
}

/// The part of the segment `p1 -> p2` which lies inside the axis-aligned box
/// with corners `lo` and `hi`, as parameters `0 <= t0 < t1 <= 1` along the
/// segment.
pub fn clip_to_box(lo: &Point, hi: &Point, p1: &Point, p2: &Point) -> Option<(f64, f64)> {
    let d = p2 - p1;
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for k in 0..3 {
        if d[k] == 0.0 {
            // Parallel to this pair of faces: either always between them, or never
            if p1[k] < lo[k] || p1[k] > hi[k] { return None }
            continue;
        }
        let a = (lo[k] - p1[k]) / d[k];
        let b = (hi[k] - p1[k]) / d[k];
        t0 = t0.max(a.min(b));
        t1 = t1.min(a.max(b));
    }
    if t0 < t1 { Some((t0, t1)) } else { None }
}

/// Pixel layout of a flat-panel detector.
///
/// Detector coordinates are in mm in the detector plane: `u` along the rows
/// (perpendicular to the rotation axis) and `v` along the rotation axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detector {
    /// `(u, v)` of the centre of the first pixel
    pub origin: [Lengthf64; 2],
    pub spacing: [Lengthf64; 2],
    /// Number of pixels along `u` and `v`
    pub n: Index2_u,
}

impl Detector {

    pub fn new(origin: [Lengthf64; 2], spacing: [Lengthf64; 2], n: Index2_u) -> Self {
        Self { origin, spacing, n }
    }

    /// Detector whose centre lies on the projection of the isocenter
    pub fn centred(spacing: [Lengthf64; 2], n: Index2_u) -> Self {
        let origin = [-(n[0] as f64 - 1.0) * spacing[0] / 2.0,
                      -(n[1] as f64 - 1.0) * spacing[1] / 2.0];
        Self { origin, spacing, n }
    }

    /// Shape of the corresponding `ndarray`: `(v, u)`
    pub fn shape(&self) -> (usize, usize) { (self.n[1], self.n[0]) }

    pub fn u(&self, iu: usize) -> Lengthf64 { self.origin[0] + iu as f64 * self.spacing[0] }
    pub fn v(&self, iv: usize) -> Lengthf64 { self.origin[1] + iv as f64 * self.spacing[1] }

    /// Position in units of pixels; pixel centres lie on integers
    pub fn continuous_index(&self, u: Lengthf64, v: Lengthf64) -> (f64, f64) {
        ((u - self.origin[0]) / self.spacing[0],
         (v - self.origin[1]) / self.spacing[1])
    }

    /// Smallest and largest `u` of any pixel centre
    pub fn u_extent(&self) -> (Lengthf64, Lengthf64) {
        let (a, b) = (self.u(0), self.u(self.n[0].saturating_sub(1)));
        (a.min(b), a.max(b))
    }

    /// Smallest and largest `v` of any pixel centre
    pub fn v_extent(&self) -> (Lengthf64, Lengthf64) {
        let (a, b) = (self.v(0), self.v(self.n[1].saturating_sub(1)));
        (a.min(b), a.max(b))
    }
}

#[cfg(test)]
mod test_grid {
    use super::*;
    use rstest::rstest;
    use float_eq::assert_float_eq;

    #[rstest(/**/ index,   expected_position,
             case([0,0,0], [-1.0, -1.0, -1.0]),
             case([0,0,1], [-1.0, -1.0,  1.0]),
             case([0,1,0], [-1.0,  1.0, -1.0]),
             case([0,1,1], [-1.0,  1.0,  1.0]),
             case([1,0,0], [ 1.0, -1.0, -1.0]),
             case([1,0,1], [ 1.0, -1.0,  1.0]),
             case([1,1,0], [ 1.0,  1.0, -1.0]),
             case([1,1,1], [ 1.0,  1.0,  1.0]),
    )]
    fn test_voxel_centre(index: Index3_u, expected_position: [Lengthf64; 3]) {
        let grid = Grid::centred((4.0, 4.0, 4.0), (2,2,2));
        let c = grid.voxel_centre(index);
        assert_float_eq!([c.x, c.y, c.z], expected_position, ulps <= [1, 1, 1]);
    }

    #[test]
    fn corners_enclose_outer_voxels() {
        let grid = Grid::new(Point::new(-127.0, -127.0, -127.0), Vector::new(2.0, 2.0, 2.0), [128, 128, 128]);
        let (lo, hi) = (grid.lower_corner(), grid.upper_corner());
        assert_float_eq!([lo.x, lo.y, lo.z], [-128.0; 3], ulps <= [1; 3]);
        assert_float_eq!([hi.x, hi.y, hi.z], [ 128.0; 3], ulps <= [1; 3]);
    }

    #[rstest(/**/     p1            ,      p2           , expected,
             // straight through along x
             case((-20.0, 0.0, 0.0), ( 20.0, 0.0,  0.0), Some((0.25, 0.75))),
             // starts inside
             case((  0.0, 0.0, 0.0), ( 20.0, 0.0,  0.0), Some((0.0 , 0.5 ))),
             // parallel to x, but above the box
             case((-20.0, 6.0, 0.0), ( 20.0, 6.0,  0.0), None),
             // stops short of the box
             case((-20.0, 0.0, 0.0), (-15.0, 0.0,  0.0), None),
             // diagonal in xz through the centre
             case((-10.0, 0.0,-10.0), ( 10.0, 0.0, 10.0), Some((0.25, 0.75))),
    )]
    fn clip_segment(p1: (f64, f64, f64), p2: (f64, f64, f64), expected: Option<(f64, f64)>) {
        let grid = Grid::centred((20.0, 10.0, 10.0), (4, 2, 2));
        let p1 = Point::new(p1.0, p1.1, p1.2);
        let p2 = Point::new(p2.0, p2.1, p2.2);
        match (grid.clip(&p1, &p2), expected) {
            (None, None) => (),
            (Some(got), Some(want)) => assert_float_eq!(got, want, abs <= (1e-12, 1e-12)),
            (got, want) => panic!("clip gave {got:?}, expected {want:?}"),
        }
    }

    #[test]
    fn centred_detector() {
        let d = Detector::centred([2.0, 4.0], [4, 3]);
        assert_eq!(d.origin, [-3.0, -4.0]);
        assert_eq!(d.u_extent(), (-3.0, 3.0));
        assert_eq!(d.v_extent(), (-4.0, 4.0));
        assert_eq!(d.continuous_index(1.0, 0.0), (2.0, 1.0));
    }
}
