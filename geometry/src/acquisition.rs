use serde::{Deserialize, Serialize};
use thiserror::Error;

use units::{degree, radian_, todo::{Degreesf64, Lengthf64, Radiansf64, Ratiof64}};

use crate::{Point, ProjectionMatrix, Rotation, Vector, projection_matrix, rotation};
use crate::gaps::{angular_gaps, angular_gaps_with_next};

/// Parameters of one acquired projection. Lengths in mm, angles in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectionParams {
    /// Source to isocenter distance
    pub sid: Lengthf64,
    /// Source to detector distance
    pub sdd: Lengthf64,
    pub gantry_angle: Degreesf64,
    #[serde(default)] pub projection_offset_x: Lengthf64,
    #[serde(default)] pub projection_offset_y: Lengthf64,
    #[serde(default)] pub out_of_plane_angle : Degreesf64,
    #[serde(default)] pub in_plane_angle     : Degreesf64,
    #[serde(default)] pub source_offset_x    : Lengthf64,
    #[serde(default)] pub source_offset_y    : Lengthf64,
}

impl ProjectionParams {

    /// Centred source and detector, no tilts
    pub fn circular(sid: Lengthf64, sdd: Lengthf64, gantry_angle: Degreesf64) -> Self {
        Self {
            sid, sdd, gantry_angle,
            projection_offset_x: 0.0, projection_offset_y: 0.0,
            out_of_plane_angle : 0.0, in_plane_angle     : 0.0,
            source_offset_x    : 0.0, source_offset_y    : 0.0,
        }
    }

    fn check_finite(&self) -> Result<(), GeometryError> {
        let fields = [
            ("sid"                , self.sid),
            ("sdd"                , self.sdd),
            ("gantry_angle"       , self.gantry_angle),
            ("projection_offset_x", self.projection_offset_x),
            ("projection_offset_y", self.projection_offset_y),
            ("out_of_plane_angle" , self.out_of_plane_angle),
            ("in_plane_angle"     , self.in_plane_angle),
            ("source_offset_x"    , self.source_offset_x),
            ("source_offset_y"    , self.source_offset_y),
        ];
        match fields.into_iter().find(|(_, value)| !value.is_finite()) {
            Some((field, value)) => Err(GeometryError::NonFinite { field, value }),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("geometry parameter `{field}` must be finite, got {value}")]
    NonFinite { field: &'static str, value: f64 },
}

/// Append-only sequence of projection records, stored one array per field,
/// plus the derived projection matrices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geometry {
    sid                 : Vec<Lengthf64>,
    sdd                 : Vec<Lengthf64>,
    gantry_angles       : Vec<Degreesf64>,
    projection_offsets_x: Vec<Lengthf64>,
    projection_offsets_y: Vec<Lengthf64>,
    out_of_plane_angles : Vec<Degreesf64>,
    in_plane_angles     : Vec<Degreesf64>,
    source_offsets_x    : Vec<Lengthf64>,
    source_offsets_y    : Vec<Lengthf64>,
    matrices            : Vec<ProjectionMatrix>,
}

impl Geometry {

    pub fn new() -> Self { Self::default() }

    pub fn from_records(records: impl IntoIterator<Item = ProjectionParams>) -> Result<Self, GeometryError> {
        let mut geometry = Self::new();
        for record in records {
            geometry.add_projection(record)?;
        }
        Ok(geometry)
    }

    /// `n` equiangular projections on a centred circular orbit, starting at
    /// `first_angle` and covering `arc` (both in degrees).
    pub fn circular_orbit(
        n: usize,
        sid: Lengthf64,
        sdd: Lengthf64,
        first_angle: Degreesf64,
        arc: Degreesf64,
    ) -> Result<Self, GeometryError> {
        let step = arc / n as f64;
        Self::from_records((0..n).map(|i| ProjectionParams::circular(sid, sdd, first_angle + i as f64 * step)))
    }

    /// Append a record and its projection matrix; returns the index of the new
    /// record.
    pub fn add_projection(&mut self, p: ProjectionParams) -> Result<usize, GeometryError> {
        p.check_finite()?;
        self.sid                 .push(p.sid);
        self.sdd                 .push(p.sdd);
        self.gantry_angles       .push(p.gantry_angle);
        self.projection_offsets_x.push(p.projection_offset_x);
        self.projection_offsets_y.push(p.projection_offset_y);
        self.out_of_plane_angles .push(p.out_of_plane_angle);
        self.in_plane_angles     .push(p.in_plane_angle);
        self.source_offsets_x    .push(p.source_offset_x);
        self.source_offsets_y    .push(p.source_offset_y);
        self.matrices            .push(projection_matrix(&p));
        Ok(self.len() - 1)
    }

    pub fn add_circular(&mut self, sid: Lengthf64, sdd: Lengthf64, gantry_angle: Degreesf64) -> Result<usize, GeometryError> {
        self.add_projection(ProjectionParams::circular(sid, sdd, gantry_angle))
    }

    pub fn len(&self) -> usize {
        let n = self.matrices.len();
        for field in [&self.sid, &self.sdd, &self.gantry_angles,
                      &self.projection_offsets_x, &self.projection_offsets_y,
                      &self.out_of_plane_angles, &self.in_plane_angles,
                      &self.source_offsets_x, &self.source_offsets_y] {
            assert_eq!(field.len(), n, "Geometry per-field arrays are out of step");
        }
        n
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn source_to_isocenter_distances(&self) -> &[Lengthf64] { &self.sid }
    pub fn source_to_detector_distances (&self) -> &[Lengthf64] { &self.sdd }
    pub fn gantry_angles                (&self) -> &[Degreesf64] { &self.gantry_angles }
    pub fn projection_offsets_x         (&self) -> &[Lengthf64] { &self.projection_offsets_x }
    pub fn projection_offsets_y         (&self) -> &[Lengthf64] { &self.projection_offsets_y }
    pub fn out_of_plane_angles          (&self) -> &[Degreesf64] { &self.out_of_plane_angles }
    pub fn in_plane_angles              (&self) -> &[Degreesf64] { &self.in_plane_angles }
    pub fn source_offsets_x             (&self) -> &[Lengthf64] { &self.source_offsets_x }
    pub fn source_offsets_y             (&self) -> &[Lengthf64] { &self.source_offsets_y }
    pub fn matrices                     (&self) -> &[ProjectionMatrix] { &self.matrices }

    pub fn matrix(&self, i: usize) -> &ProjectionMatrix { &self.matrices[i] }

    pub fn record(&self, i: usize) -> ProjectionParams {
        ProjectionParams {
            sid                : self.sid[i],
            sdd                : self.sdd[i],
            gantry_angle       : self.gantry_angles[i],
            projection_offset_x: self.projection_offsets_x[i],
            projection_offset_y: self.projection_offsets_y[i],
            out_of_plane_angle : self.out_of_plane_angles[i],
            in_plane_angle     : self.in_plane_angles[i],
            source_offset_x    : self.source_offsets_x[i],
            source_offset_y    : self.source_offsets_y[i],
        }
    }

    pub fn records(&self) -> impl Iterator<Item = ProjectionParams> + '_ {
        (0..self.len()).map(|i| self.record(i))
    }

    pub fn gantry_angles_radians(&self) -> Vec<Radiansf64> {
        self.gantry_angles.iter().map(|&a| radian_(degree(a))).collect()
    }

    /// World-to-gantry rotation of projection `i`
    pub fn rotation(&self, i: usize) -> Rotation {
        rotation(self.gantry_angles[i], self.out_of_plane_angles[i], self.in_plane_angles[i])
    }

    /// Position of the X-ray source in world coordinates
    pub fn source_position(&self, i: usize) -> Point {
        let in_gantry_frame = Vector::new(self.source_offsets_x[i], self.source_offsets_y[i], self.sid[i]);
        Point::from(self.rotation(i).transpose() * in_gantry_frame)
    }

    /// World position of the detector point with detector coordinates `(u, v)`
    pub fn detector_position(&self, i: usize, u: Lengthf64, v: Lengthf64) -> Point {
        let in_gantry_frame = Vector::new(
            u + self.projection_offsets_x[i],
            v + self.projection_offsets_y[i],
            self.sid[i] - self.sdd[i],
        );
        Point::from(self.rotation(i).transpose() * in_gantry_frame)
    }

    /// Project a world point through matrix `i`. Returns detector coordinates
    /// `(u, v)` and the homogeneous coordinate `w`, which is zero only for
    /// points in the plane of the source.
    pub fn project(&self, i: usize, p: &Point) -> (Lengthf64, Lengthf64, f64) {
        let h = self.matrices[i] * p.to_homogeneous();
        (h[0] / h[2], h[1] / h[2], h[2])
    }

    /// Ratio of the size of the shadow on the detector to the size of the
    /// object at the isocenter
    pub fn magnification(&self, i: usize) -> Ratiof64 { self.sdd[i] / self.sid[i] }

    /// See `gaps::angular_gaps`
    pub fn angular_gaps(&self) -> Vec<Radiansf64> { angular_gaps(&self.gantry_angles_radians()) }

    pub fn angular_gaps_with_next(&self) -> Vec<Radiansf64> { angular_gaps_with_next(&self.gantry_angles_radians()) }

    /// Lateral offset of the detector relative to the central ray
    pub fn offset_x(&self, i: usize) -> Lengthf64 {
        self.projection_offsets_x[i] - self.source_offsets_x[i]
    }

    /// Smallest and largest lateral offset over the whole acquisition
    pub fn offset_x_range(&self) -> Option<(Lengthf64, Lengthf64)> {
        (0..self.len())
            .map(|i| self.offset_x(i))
            .fold(None, |acc, x| match acc {
                None => Some((x, x)),
                Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
            })
    }
}
