//! Circular cone-beam acquisition geometry.
//!
//! A `Geometry` is an append-only list of projection records. Each record
//! describes where the source and the detector were when one projection was
//! acquired, and carries the 3x4 projection matrix which maps world points (mm)
//! onto the detector plane (mm).
//!
//! Conventions: the gantry rotates about the world `y` axis; at gantry angle 0
//! the source sits on the `+z` axis at `sid` from the isocenter, and the
//! detector is perpendicular to `z`, `sdd` from the source. Angles are stored
//! in degrees.

mod matrix;
mod acquisition;
mod gaps;

pub use matrix::{ProjectionMatrix, Rotation, projection_matrix, rotation, rotate_x, rotate_y, rotate_z};
pub use acquisition::{Geometry, GeometryError, ProjectionParams};
pub use gaps::{angular_gaps, angular_gaps_with_next, largest_gap, SHORT_SCAN_GAP};

pub type Point  = nalgebra::Point3 <f64>;
pub type Vector = nalgebra::Vector3<f64>;
