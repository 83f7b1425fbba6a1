//! MetaImage (`.mhd` header with a separate raw data file)
//!
//! Only uncompressed data in an external file are supported. `MET_FLOAT`
//! data are read as they are; `MET_USHORT` data are taken to be raw detector
//! counts and are converted into line integrals.

/// Contents of a MetaImage header
#[derive(Clone, Debug, PartialEq)]
pub struct Header {
    pub dim_size: Vec<usize>,
    pub offset: Vec<f64>,
    pub spacing: Vec<f64>,
    pub element_type: ElementType,
    pub big_endian: bool,
    /// Relative to the directory containing the header
    pub data_file: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementType { Float, UShort }

impl Header {

    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let format_error = |reason: String| ReconError::Format { path: path.to_path_buf(), reason };
        let fields: HashMap<&str, &str> = text.lines()
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim(), value.trim()))
            .collect();
        let get = |key: &str| fields.get(key).copied()
            .ok_or_else(|| format_error(format!("missing `{key}`")));
        let numbers = |key: &str, value: &str| -> Result<Vec<f64>> {
            value.split_whitespace()
                .map(|x| x.parse::<f64>().map_err(|e| format_error(format!("`{key}`: {e}"))))
                .collect()
        };

        let ndims: usize = get("NDims")?.parse().map_err(|e| format_error(format!("`NDims`: {e}")))?;
        let dim_size = get("DimSize")?.split_whitespace()
            .map(|x| x.parse::<usize>().map_err(|e| format_error(format!("`DimSize`: {e}"))))
            .collect::<Result<Vec<_>>>()?;
        let offset = match ["Offset", "Position", "Origin"].iter().find_map(|k| fields.get(k).map(|v| (*k, *v))) {
            Some((key, value)) => numbers(key, value)?,
            None => vec![0.0; ndims],
        };
        let spacing = match fields.get("ElementSpacing") {
            Some(value) => numbers("ElementSpacing", value)?,
            None => vec![1.0; ndims],
        };
        if dim_size.len() != ndims || offset.len() != ndims || spacing.len() != ndims {
            return Err(format_error(format!("expected {ndims} values in `DimSize`, `Offset` and `ElementSpacing`")));
        }
        let element_type = match get("ElementType")? {
            "MET_FLOAT"  => ElementType::Float,
            "MET_USHORT" => ElementType::UShort,
            other => return Err(format_error(format!("unsupported element type `{other}`"))),
        };
        if fields.get("CompressedData").map_or(false, |v| v.eq_ignore_ascii_case("true")) {
            return Err(format_error("compressed data are not supported".into()));
        }
        let big_endian = ["BinaryDataByteOrderMSB", "ElementByteOrderMSB"].iter()
            .any(|k| fields.get(k).map_or(false, |v| v.eq_ignore_ascii_case("true")));
        let data_file = get("ElementDataFile")?;
        if data_file == "LOCAL" || data_file.starts_with("LIST") || data_file.contains('%') {
            return Err(format_error(format!("unsupported `ElementDataFile = {data_file}`")));
        }
        Ok(Self { dim_size, offset, spacing, element_type, big_endian, data_file: data_file.into() })
    }

    fn render(&self) -> String {
        let join = |xs: &[f64]| xs.iter().map(|x| format!("{x}")).collect::<Vec<_>>().join(" ");
        let sizes = self.dim_size.iter().map(usize::to_string).collect::<Vec<_>>().join(" ");
        let element_type = match self.element_type {
            ElementType::Float  => "MET_FLOAT",
            ElementType::UShort => "MET_USHORT",
        };
        format!("ObjectType = Image\n\
                 NDims = {}\n\
                 BinaryData = True\n\
                 BinaryDataByteOrderMSB = {}\n\
                 CompressedData = False\n\
                 Offset = {}\n\
                 ElementSpacing = {}\n\
                 DimSize = {}\n\
                 ElementType = {}\n\
                 ElementDataFile = {}\n",
                self.dim_size.len(),
                if self.big_endian { "True" } else { "False" },
                join(&self.offset), join(&self.spacing), sizes, element_type,
                self.data_file.display())
    }

    pub fn n_elements(&self) -> usize { self.dim_size.iter().product() }
}

/// Header and voxel values, `x` varying fastest
pub fn read(path: &Path) -> Result<(Header, Vec<Intensityf32>)> {
    let header = Header::parse(&std::fs::read_to_string(path)?, path)?;
    let data_path = path.parent().unwrap_or_else(|| Path::new(".")).join(&header.data_file);
    let bytes = std::fs::read(&data_path)?;
    let width = match header.element_type { ElementType::Float => 4, ElementType::UShort => 2 };
    let expected = header.n_elements() * width;
    if bytes.len() != expected {
        return Err(ReconError::Format {
            path: data_path,
            reason: format!("expected {expected} bytes, found {}", bytes.len()),
        });
    }
    let big = header.big_endian;
    let data: Vec<Intensityf32> = match header.element_type {
        ElementType::Float => bytes.chunks_exact(4)
            .map(|c| { let b = [c[0], c[1], c[2], c[3]]; if big { f32::from_be_bytes(b) } else { f32::from_le_bytes(b) } })
            .collect(),
        ElementType::UShort => {
            let table = lookup_table();
            bytes.chunks_exact(2)
                .map(|c| { let b = [c[0], c[1]]; if big { u16::from_be_bytes(b) } else { u16::from_le_bytes(b) } })
                .map(|count| table[count as usize])
                .collect()
        }
    };
    tracing::debug!(path = %path.display(), size = ?header.dim_size, "Read MetaImage");
    Ok((header, data))
}

/// Write `header` to `path` and `data` (as `MET_FLOAT`) to its data file
fn write(path: &Path, dim_size: Vec<usize>, offset: Vec<f64>, spacing: Vec<f64>, data: impl Iterator<Item = f32>) -> Result<()> {
    let data_name = path.with_extension("raw");
    let data_file = data_name.file_name().map(PathBuf::from)
        .ok_or_else(|| ReconError::Format { path: path.to_path_buf(), reason: "not a file name".into() })?;
    let header = Header {
        dim_size, offset, spacing,
        element_type: ElementType::Float,
        big_endian: false,
        data_file,
    };
    std::fs::write(path, header.render())?;
    raw::write(data, &data_name)?;
    tracing::debug!(path = %path.display(), size = ?header.dim_size, "Wrote MetaImage");
    Ok(())
}

pub fn read_volume(path: &Path) -> Result<Volume> {
    let (header, data) = read(path)?;
    if header.dim_size.len() != 3 {
        return Err(ReconError::Format { path: path.to_path_buf(), reason: format!("expected 3 dimensions, found {}", header.dim_size.len()) });
    }
    let (d, o, s) = (&header.dim_size, &header.offset, &header.spacing);
    let grid = Grid::new(Point::new(o[0], o[1], o[2]), Vector::new(s[0], s[1], s[2]), [d[0], d[1], d[2]]);
    Volume::from_vec(grid, data)
}

pub fn write_volume(volume: &Volume, path: &Path) -> Result<()> {
    let Grid { origin, spacing, n } = volume.grid;
    write(path, n.to_vec(), vec![origin.x, origin.y, origin.z], vec![spacing.x, spacing.y, spacing.z],
          volume.values())
}

/// Read a 2D image or a 3D stack of projections
pub fn read_projections(path: &Path) -> Result<ProjectionStack> {
    let (header, data) = read(path)?;
    let (d, o, s) = (&header.dim_size, &header.offset, &header.spacing);
    let n = match d.len() {
        2 => 1,
        3 => d[2],
        other => return Err(ReconError::Format { path: path.to_path_buf(), reason: format!("expected 2 or 3 dimensions, found {other}") }),
    };
    let detector = Detector::new([o[0], o[1]], [s[0], s[1]], [d[0], d[1]]);
    let data = Array3::from_shape_vec((n, d[1], d[0]), data)
        .map_err(|e| ReconError::Shape(e.to_string()))?;
    ProjectionStack::new(detector, data)
}

/// Read a file containing exactly one projection
pub fn read_projection(path: &Path) -> Result<Projection> {
    let stack = read_projections(path)?;
    if stack.len() != 1 {
        return Err(ReconError::Format { path: path.to_path_buf(), reason: format!("expected one projection, found {}", stack.len()) });
    }
    Ok(stack.slice(0))
}

pub fn write_projections(stack: &ProjectionStack, path: &Path) -> Result<()> {
    let Detector { origin, spacing, n } = stack.detector;
    write(path, vec![n[0], n[1], stack.len()], vec![origin[0], origin[1], 0.0], vec![spacing[0], spacing[1], 1.0],
          stack.data.iter().copied())
}

pub fn write_projection(projection: &Projection, path: &Path) -> Result<()> {
    let Detector { origin, spacing, n } = projection.detector;
    write(path, n.to_vec(), origin.to_vec(), spacing.to_vec(), projection.data.iter().copied())
}

// ----- Imports ------------------------------------------------------------------------------------------
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ndarray::Array3;

use crate::{
    error::{ReconError, Result},
    grid::{Detector, Grid},
    image::{Projection, ProjectionStack, Volume},
    io::raw::{self, lookup_table},
    types::{Intensityf32, Point, Vector},
};
