mod exports;
pub use exports::*;

pub mod backend;
pub mod config;
pub mod error;
pub mod fdk;
pub mod fom;
pub mod fov;
pub mod grid;
pub mod image;
pub mod inline;
pub mod io;
pub mod phantom;
pub mod projector;
pub mod ramp;
pub mod types;
pub mod utils;
pub mod weights;
