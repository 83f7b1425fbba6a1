//! Configuration file parser for FDK reconstructions
//!
//! ```toml
//! nvoxels = [128, 128, 128]
//! spacing = ["2 mm", "2 mm", "2 mm"]
//! origin  = ["-127 mm", "-127 mm", "-127 mm"]  # optional: centred if missing
//! algorithm = "joseph"
//! hardware  = "cpu"
//! hann = 0.8
//! ```

fn deserialize_uom_3d_opt<'d, D, T>(deserializer: D) -> Result<Option<(T, T, T)>, D::Error>
where
    D: Deserializer<'d>,
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    Option::<(&str, &str, &str)>::deserialize(deserializer)?
        .map(|(x,y,z)| tr_tup_res((x.parse(), y.parse(), z.parse())))
        .transpose()
        .map_err(de::Error::custom)
}

fn deserialize_uom_3d<'d, D, T>(deserializer: D) -> Result<(T, T, T), D::Error>
where
    D: Deserializer<'d>,
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let (x, y, z) = <(&str, &str, &str)>::deserialize(deserializer)?;
    tr_tup_res((x.parse(), y.parse(), z.parse()))
        .map_err(de::Error::custom)
}

/// Transpose 3-tuple of `Result`
///
/// `Ok` if all elements `Ok`; if any element is an `Err` return the first one.
///
/// # Examples
/// `(Ok(a),  Ok(b),  Ok(c)) -> Ok((a, b, c))`
/// `(Ok(a), Err(b),  Ok(c)) -> Err(b)`
/// `(Ok(a), Err(b), Err(c)) -> Err(b)`
fn tr_tup_res<O, E>((x,y,z): (Result<O, E>, Result<O, E>, Result<O, E>)) -> Result<(O, O, O), E> {
    Ok((x?, y?, z?))
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct Config {

    /// Number of voxels along `x`, `y` and `z`
    pub nvoxels: (usize, usize, usize),

    #[serde(deserialize_with = "deserialize_uom_3d")]
    pub spacing: (Length, Length, Length),

    /// Centre of the first voxel. If missing, the volume is centred on the
    /// isocenter.
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_uom_3d_opt")]
    pub origin: Option<(Length, Length, Length)>,

    #[serde(default)]
    pub algorithm: Algorithm,

    #[serde(default)]
    pub hardware: Hardware,

    /// Hann cutoff of the ramp filter, as a fraction of Nyquist
    #[serde(default)]
    pub hann: Ratiof64,

    /// Hann cutoff along detector columns
    #[serde(default)]
    pub hann_y: Ratiof64,

    /// Truncation correction, as a fraction of the detector width
    #[serde(default)]
    pub truncation: Ratiof64,

    #[serde(default = "enabled")]
    pub displaced_detector: bool,

    #[serde(default = "enabled")]
    pub short_scan: bool,
}

fn enabled() -> bool { true }

impl Config {

    pub fn grid(&self) -> Grid {
        let (nx, ny, nz) = self.nvoxels;
        let (dx, dy, dz) = self.spacing;
        let spacing = Vector::new(mm_(dx), mm_(dy), mm_(dz));
        match self.origin {
            Some((x, y, z)) => Grid::new(Point::new(mm_(x), mm_(y), mm_(z)), spacing, [nx, ny, nz]),
            None => Grid::centred((spacing.x * nx as f64, spacing.y * ny as f64, spacing.z * nz as f64), (nx, ny, nz)),
        }
    }

    /// Fails if the ramp filter settings are out of range
    pub fn fdk_config(&self) -> Result<FdkConfig, ReconError> {
        let ramp = RampParameters { hann_cut: self.hann, hann_cut_y: self.hann_y, truncation: self.truncation };
        ramp.validate()?;
        Ok(FdkConfig {
            grid: self.grid(),
            ramp,
            algorithm: self.algorithm,
            hardware: self.hardware,
            displaced_detector: self.displaced_detector,
            short_scan: self.short_scan,
        })
    }
}

pub fn read_config_file(path: &Path) -> Result<Config, ReconError> {
    let config: String = fs::read_to_string(path)?;
    Ok(toml::from_str(&config)?)
}

// ----- Imports ------------------------------------------------------------------------------------------
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, de};

use units::{Length, mm_};

use crate::{
    backend::Hardware,
    error::ReconError,
    fdk::FdkConfig,
    grid::Grid,
    projector::Algorithm,
    ramp::RampParameters,
    types::{Point, Ratiof64, Vector},
};

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;
    use rstest::rstest;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};

    use units::{cm, mm};

    // ----- Test an example on-disk config file -----------------------------------------
    #[test]
    fn test_config_file() -> Result<(), ReconError> {
        let config = read_config_file(Path::new("fdk-config.toml"))?;
        assert_eq!(config.nvoxels, (64, 64, 64));
        assert_eq!(config.spacing, (mm(4.0), mm(4.0), mm(4.0)));
        assert_eq!(config.origin, Some((mm(-126.0), mm(-126.0), mm(-126.0))));
        assert_eq!(config.algorithm, Algorithm::Joseph);
        assert_eq!(config.hardware, Hardware::Cpu);
        assert_eq!(config.hann, 0.8);
        assert!(config.displaced_detector);
        Ok(())
    }

    // ----- Some helpers to make the tests more concise ---------------------------------
    //  ---  Parse string as TOML  -------------------------
    fn parse<'d, D: Deserialize<'d>>(input: &'d str) -> D {
        toml::from_str(input).unwrap()
    }
    //  ---  Parse string as TOML, with explicit error reporting -------------------------
    fn parse_config(input: &str) -> Result<Config, toml::de::Error> {
        toml::from_str(input)
    }
    //  ---  Macro for concise assertions about values of parsed fields ------------------
    macro_rules! check {
        ($type:ident($text:expr).$field:ident = $expected:expr) => {
            let config: $type = parse::<$type>($text);
            println!("DESERIALIZED: {config:?}");
            assert_eq!(config.$field, $expected);
        };
        ($type:ident($text:expr) fields: $($field:ident = $expected:expr);+$(;)?) => {
            let config: $type = parse::<$type>($text);
            println!("DESERIALIZED: {config:?}");
            $(assert_eq!(config.$field, $expected);)*
        }
    }

    const MINIMAL: &str = r#"
        nvoxels = [10, 20, 30]
        spacing = ["1 mm", "2 mm", "0.3 cm"]
    "#;

    // ----- Test deserializing of individual aspects of the Config type ----------------
    #[test]
    fn config_defaults() {
        check!{Config(MINIMAL) fields:
               nvoxels            = (10, 20, 30);
               spacing            = (mm(1.0), mm(2.0), cm(0.3));
               origin             = None;
               algorithm          = Algorithm::Joseph;
               hardware           = Hardware::Cpu;
               hann               = 0.0;
               hann_y             = 0.0;
               truncation         = 0.0;
               displaced_detector = true;
               short_scan         = true;
        }
    }

    #[test]
    fn config_choices() {
        let text = format!("{MINIMAL}\n{}", r#"
            algorithm = "ray_cast_interpolator"
            hardware = "opencl"
            hann = 0.5
            hann_y = 0.25
            truncation = 0.1
            short_scan = false
        "#);
        let config = parse_config(&text).unwrap();
        assert_eq!(config.algorithm, Algorithm::RayCastInterpolator);
        assert_eq!(config.hardware, Hardware::OpenCl);
        assert!(!config.short_scan);
        let fdk = config.fdk_config().unwrap();
        assert_eq!(fdk.ramp, RampParameters { hann_cut: 0.5, hann_cut_y: 0.25, truncation: 0.1 });
    }

    #[rstest(/**/ setting,
             case("hann = -0.5"),
             case("hann_y = -1.0"),
             case("truncation = -0.1"),
    )]
    fn config_rejects_negative_ramp_settings(setting: &str) {
        let config = parse_config(&format!("{MINIMAL}\n{setting}")).unwrap();
        assert!(matches!(config.fdk_config(), Err(ReconError::Parameter(_))));
    }

    // ----- Make sure that unknown fields are not accepted -----------------------------
    #[test]
    fn config_reject_unknown_field() {
        let text = format!("{MINIMAL}\nunknown_field = 666");
        assert!(parse_config(&text).is_err());
    }

    #[test]
    fn config_requires_grid() {
        assert!(parse_config("spacing = [\"1 mm\", \"1 mm\", \"1 mm\"]").is_err());
        assert!(parse_config("nvoxels = [1, 1, 1]").is_err());
    }

    #[test]
    fn config_rejects_quantities_which_are_not_lengths() {
        assert!(parse_config("nvoxels = [1, 1, 1]\nspacing = [\"1 kg\", \"1 mm\", \"1 mm\"]").is_err());
        assert!(parse_config("nvoxels = [1, 1, 1]\nspacing = [1.0, 1.0, 1.0]").is_err());
    }

    // ----- Test the grid implied by the config -----------------------------------------
    #[test]
    fn centred_grid_when_origin_missing() {
        let grid = parse_config(MINIMAL).unwrap().grid();
        assert_eq!(grid.n, [10, 20, 30]);
        assert_float_eq!(grid.origin.x, -4.5, abs <= 1e-9);
        assert_float_eq!(grid.origin.y, -19.0, abs <= 1e-9);
        assert_float_eq!(grid.origin.z, -43.5, abs <= 1e-9);
        assert_float_eq!(grid.spacing.z, 3.0, abs <= 1e-9);
    }

    #[test]
    fn explicit_origin() {
        let text = format!("{MINIMAL}\norigin = [\"-1 cm\", \"0 mm\", \"2.5 mm\"]");
        let grid = parse_config(&text).unwrap().grid();
        assert_float_eq!((grid.origin.x, grid.origin.y, grid.origin.z), (-10.0, 0.0, 2.5), abs <= (1e-9, 1e-9, 1e-9));
    }
}
