//! Reading and writing images, projections and acquisition geometries

pub mod raw;
pub mod metaimage;
pub mod geometry;
