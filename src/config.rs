//! Configuration files and the command-line options shared by the binaries

pub mod cli;
pub mod fdk;
