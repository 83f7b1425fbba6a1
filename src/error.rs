use std::path::PathBuf;

use thiserror::Error;

use geometry::GeometryError;

use crate::backend::Hardware;

#[derive(Debug, Error)]
pub enum ReconError {
    #[error("Malformed geometry: {0}")]
    Geometry(#[from] GeometryError),

    #[error("The {0} backend is not built into this binary")]
    BackendUnavailable(Hardware),

    #[error("Missed projection: expected record {expected}, received record {received}")]
    MissedProjection { expected: usize, received: usize },

    #[error("Streaming reconstruction was aborted before the last projection")]
    PipelineAborted,

    #[error("Reconstruction thread panicked: {0}")]
    ReconstructionPanicked(String),

    #[error("Displaced detector does not cover the central ray (overlap half-width {0} mm)")]
    DetectorDisplacement(f64),

    #[error("Invalid parameter: {0}")]
    Parameter(String),

    #[error("Inconsistent shapes: {0}")]
    Shape(String),

    #[error("Cannot parse `{path}`: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Cannot serialize geometry: {0}")]
    Serialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, ReconError>;
