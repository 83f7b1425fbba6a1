use ndarray::{Array2, Array3, Axis, s};

use crate::error::{ReconError, Result};
use crate::grid::{Detector, Grid};
use crate::types::{Index3_u, Intensityf32, Vector};

/// 3D image of scalar intensities. Data are stored `[z][y][x]`, so `x` varies
/// fastest, as in raw image files.
#[derive(Clone, Debug, PartialEq)]
pub struct Volume {
    pub grid: Grid,
    pub data: Array3<Intensityf32>,
}

impl Volume {

    pub fn new(grid: Grid, data: Array3<Intensityf32>) -> Result<Self> {
        if data.dim() != grid.shape() {
            return Err(ReconError::Shape(format!(
                "volume data {:?} does not match grid {:?}", data.dim(), grid.shape())));
        }
        Ok(Self { grid, data })
    }

    pub fn zeros(grid: Grid) -> Self {
        Self { grid, data: Array3::zeros(grid.shape()) }
    }

    pub fn filled(grid: Grid, value: Intensityf32) -> Self {
        Self { grid, data: Array3::from_elem(grid.shape(), value) }
    }

    /// Build from values listed with `x` varying fastest
    pub fn from_vec(grid: Grid, data: Vec<Intensityf32>) -> Result<Self> {
        let n = data.len();
        let data = Array3::from_shape_vec(grid.shape(), data)
            .map_err(|_| ReconError::Shape(format!(
                "{n} values cannot fill a {:?} volume", grid.shape())))?;
        Ok(Self { grid, data })
    }

    /// Values with `x` varying fastest
    pub fn values(&self) -> impl Iterator<Item = Intensityf32> + '_ {
        self.data.iter().copied()
    }

    /// Trilinear interpolation at a continuous voxel index. Positions beyond
    /// the outermost voxel centres take the value of the nearest edge.
    pub fn trilinear(&self, index: &Vector) -> Intensityf32 {
        let [nx, ny, nz] = self.grid.n;
        let (ix, fx) = split_clamped(index.x, nx);
        let (iy, fy) = split_clamped(index.y, ny);
        let (iz, fz) = split_clamped(index.z, nz);
        let (jx, jy, jz) = ((ix + 1).min(nx - 1), (iy + 1).min(ny - 1), (iz + 1).min(nz - 1));
        let d = &self.data;
        let lerp = |a: f32, b: f32, f: f32| a + (b - a) * f;
        let c00 = lerp(d[[iz, iy, ix]], d[[iz, iy, jx]], fx);
        let c01 = lerp(d[[iz, jy, ix]], d[[iz, jy, jx]], fx);
        let c10 = lerp(d[[jz, iy, ix]], d[[jz, iy, jx]], fx);
        let c11 = lerp(d[[jz, jy, ix]], d[[jz, jy, jx]], fx);
        lerp(lerp(c00, c01, fy), lerp(c10, c11, fy), fz)
    }
}

/// Integer part and fraction of a continuous index, clamped to `[0, n-1]`
#[inline]
fn split_clamped(x: f64, n: usize) -> (usize, f32) {
    let x = x.clamp(0.0, (n - 1) as f64);
    let i = (x.floor() as usize).min(n.saturating_sub(2));
    (i, (x - i as f64) as f32)
}

impl core::ops::Index<Index3_u> for Volume {
    type Output = Intensityf32;
    #[inline]
    fn index(&self, [ix, iy, iz]: Index3_u) -> &Self::Output { &self.data[[iz, iy, ix]] }
}

impl core::ops::IndexMut<Index3_u> for Volume {
    #[inline]
    fn index_mut(&mut self, [ix, iy, iz]: Index3_u) -> &mut Self::Output { &mut self.data[[iz, iy, ix]] }
}

impl core::ops::AddAssign<&Volume> for Volume {
    fn add_assign(&mut self, rhs: &Volume) {
        assert_eq!(self.grid, rhs.grid, "Cannot add volumes on different grids");
        self.data += &rhs.data;
    }
}

/// Sum two partial reconstructions
pub fn elementwise_add(mut a: Volume, b: Volume) -> Volume {
    a += &b;
    a
}

/// One detector image, stored `[v][u]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
    pub detector: Detector,
    pub data: Array2<Intensityf32>,
}

impl Projection {

    pub fn zeros(detector: Detector) -> Self {
        Self { detector, data: Array2::zeros(detector.shape()) }
    }

    pub fn new(detector: Detector, data: Array2<Intensityf32>) -> Result<Self> {
        if data.dim() != detector.shape() {
            return Err(ReconError::Shape(format!(
                "projection data {:?} does not match detector {:?}", data.dim(), detector.shape())));
        }
        Ok(Self { detector, data })
    }

    /// Bilinear interpolation at a continuous pixel index. Zero outside the
    /// detector; within half a pixel of the edge the edge value is used.
    #[inline]
    pub fn bilinear(&self, cu: f64, cv: f64) -> Intensityf32 {
        let [nu, nv] = self.detector.n;
        if cu < -0.5 || cv < -0.5 || cu > nu as f64 - 0.5 || cv > nv as f64 - 0.5 {
            return 0.0;
        }
        let (iu, fu) = split_clamped(cu, nu);
        let (iv, fv) = split_clamped(cv, nv);
        let (ju, jv) = ((iu + 1).min(nu - 1), (iv + 1).min(nv - 1));
        let d = &self.data;
        let top    = d[[iv, iu]] + (d[[iv, ju]] - d[[iv, iu]]) * fu;
        let bottom = d[[jv, iu]] + (d[[jv, ju]] - d[[jv, iu]]) * fu;
        top + (bottom - top) * fv
    }
}

/// Several detector images acquired with the same detector, stored `[i][v][u]`
/// where `i` is the projection index.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectionStack {
    pub detector: Detector,
    pub data: Array3<Intensityf32>,
}

impl ProjectionStack {

    pub fn zeros(detector: Detector, n: usize) -> Self {
        let (nv, nu) = detector.shape();
        Self { detector, data: Array3::zeros((n, nv, nu)) }
    }

    pub fn new(detector: Detector, data: Array3<Intensityf32>) -> Result<Self> {
        let (_, nv, nu) = data.dim();
        if (nv, nu) != detector.shape() {
            return Err(ReconError::Shape(format!(
                "projection stack {:?} does not match detector {:?}", data.dim(), detector.shape())));
        }
        Ok(Self { detector, data })
    }

    pub fn from_projections(detector: Detector, projections: &[Projection]) -> Result<Self> {
        let mut stack = Self::zeros(detector, projections.len());
        for (i, p) in projections.iter().enumerate() {
            stack.set(i, p)?;
        }
        Ok(stack)
    }

    pub fn len(&self) -> usize { self.data.len_of(Axis(0)) }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn slice(&self, i: usize) -> Projection {
        Projection { detector: self.detector, data: self.data.index_axis(Axis(0), i).to_owned() }
    }

    pub fn set(&mut self, i: usize, projection: &Projection) -> Result<()> {
        if projection.detector.shape() != self.detector.shape() {
            return Err(ReconError::Shape(format!(
                "cannot place a {:?} projection into a {:?} stack",
                projection.detector.shape(), self.detector.shape())));
        }
        self.data.slice_mut(s![i, .., ..]).assign(&projection.data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;
    use float_eq::assert_float_eq;
    use rstest::rstest;

    fn ramp_volume() -> Volume {
        // value = x index + 10 * y index + 100 * z index
        let grid = Grid::new(Point::origin(), Vector::new(1.0, 1.0, 1.0), [3, 4, 5]);
        let mut v = Volume::zeros(grid);
        for ix in 0..3 { for iy in 0..4 { for iz in 0..5 {
            v[[ix, iy, iz]] = (ix + 10 * iy + 100 * iz) as f32;
        }}}
        v
    }

    #[rstest(/**/  index          , expected,
             case((0.0, 0.0, 0.0),     0.0),
             case((1.5, 0.0, 0.0),     1.5),
             case((0.0, 2.25, 0.0),   22.5),
             case((1.0, 1.0, 3.5),  361.0),
             // clamped beyond the last voxel centre
             case((7.0, -3.0, 0.0),    2.0),
    )]
    fn trilinear_reproduces_linear_function(index: (f64, f64, f64), expected: f32) {
        let v = ramp_volume();
        let got = v.trilinear(&Vector::new(index.0, index.1, index.2));
        assert_float_eq!(got, expected, abs <= 1e-4);
    }

    #[rstest(/**/  cu ,  cv , expected,
             case( 0.0,  0.0,   0.0),
             case( 0.5,  0.0,   0.5),
             case( 1.0,  1.5,  16.0),
             case(-0.4,  0.0,   0.0),
             case( 3.4,  2.0,  23.0),
             case(-0.6,  0.0,   0.0),
             case( 3.6,  0.0,   0.0),
             case( 1.0, -2.0,   0.0),
    )]
    fn bilinear_is_zero_outside(cu: f64, cv: f64, expected: f32) {
        let detector = Detector::new([0.0, 0.0], [1.0, 1.0], [4, 3]);
        let data = Array2::from_shape_fn(detector.shape(), |(v, u)| (u + 10 * v) as f32);
        let p = Projection::new(detector, data).unwrap();
        assert_float_eq!(p.bilinear(cu, cv), expected, abs <= 1e-5);
    }

    #[test]
    fn stack_slices() {
        let detector = Detector::centred([1.0, 1.0], [4, 2]);
        let mut stack = ProjectionStack::zeros(detector, 3);
        let mut p = Projection::zeros(detector);
        p.data.fill(7.0);
        stack.set(1, &p).unwrap();
        assert_eq!(stack.slice(1), p);
        assert_eq!(stack.slice(0), Projection::zeros(detector));
        let wrong = Projection::zeros(Detector::centred([1.0, 1.0], [3, 2]));
        assert!(stack.set(2, &wrong).is_err());
    }

    #[test]
    fn volume_shape_is_checked() {
        let grid = Grid::centred((10.0, 10.0, 10.0), (2, 3, 4));
        assert!(Volume::from_vec(grid, vec![0.0; 24]).is_ok());
        assert!(Volume::from_vec(grid, vec![0.0; 23]).is_err());
        assert!(Volume::new(grid, Array3::zeros((2, 3, 4))).is_err());
    }
}
