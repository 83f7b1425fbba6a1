//! Acquisition geometries as TOML, one `[[projection]]` table per record:
//!
//! ```toml
//! [[projection]]
//! sid = 1000.0
//! sdd = 1536.0
//! gantry_angle = 0.0
//! projection_offset_x = -120.0   # optional, as are the other offsets and tilts
//! ```

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct GeometryFile {
    #[serde(default)]
    projection: Vec<ProjectionParams>,
}

pub fn geometry_from_str(text: &str) -> Result<Geometry> {
    let file: GeometryFile = toml::from_str(text)?;
    Ok(Geometry::from_records(file.projection)?)
}

pub fn geometry_to_string(geometry: &Geometry) -> Result<String> {
    let file = GeometryFile { projection: geometry.records().collect() };
    Ok(toml::to_string(&file)?)
}

pub fn read_geometry(path: &Path) -> Result<Geometry> {
    let geometry = geometry_from_str(&std::fs::read_to_string(path)?)?;
    tracing::debug!(path = %path.display(), projections = geometry.len(), "Read geometry");
    Ok(geometry)
}

pub fn write_geometry(geometry: &Geometry, path: &Path) -> Result<()> {
    std::fs::write(path, geometry_to_string(geometry)?)?;
    Ok(())
}

// ----- Imports ------------------------------------------------------------------------------------------
use std::path::Path;

use serde::{Deserialize, Serialize};

use ::geometry::{Geometry, ProjectionParams};

use crate::error::Result;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconError;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};

    #[test]
    fn offsets_and_tilts_are_optional() -> Result<()> {
        let geometry = geometry_from_str(r#"
            [[projection]]
            sid = 1000.0
            sdd = 1536.0
            gantry_angle = 10.0

            [[projection]]
            sid = 1000.0
            sdd = 1536.0
            gantry_angle = 11.0
            projection_offset_x = -120.0
            in_plane_angle = 0.5
        "#)?;
        assert_eq!(geometry.len(), 2);
        assert_eq!(geometry.gantry_angles(), &[10.0, 11.0]);
        assert_eq!(geometry.projection_offsets_x(), &[0.0, -120.0]);
        assert_eq!(geometry.in_plane_angles(), &[0.0, 0.5]);
        Ok(())
    }

    #[test]
    fn unknown_field_is_rejected() {
        let result = geometry_from_str("[[projection]]\nsid = 1.0\nsdd = 2.0\ngantry_angle = 0.0\nsdd2 = 3.0\n");
        assert!(matches!(result, Err(ReconError::Config(_))));
    }

    #[test]
    fn empty_file_gives_empty_geometry() -> Result<()> {
        assert!(geometry_from_str("")?.is_empty());
        Ok(())
    }
}
