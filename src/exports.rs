pub use geometry::{Geometry, GeometryError, ProjectionParams};

pub use crate::backend::{Backend, Hardware};
pub use crate::error::ReconError;
pub use crate::fdk::{Fdk, FdkConfig, reconstruct};
pub use crate::grid::{Detector, Grid};
pub use crate::image::{Projection, ProjectionStack, Volume};
pub use crate::inline::{AcquiredProjection, Feeder, Finished, ProjectionReader, StreamingReconstruction};
pub use crate::projector::Algorithm;
pub use crate::ramp::{RampFilter, RampParameters};
pub use crate::types::{Point, Vector};
