//! Read / write headerless little-endian binary arrays

use std::fs::File;
use std::io::{Write, Read, BufWriter, BufReader};
use std::path::Path;

type IORes<T> = std::io::Result<T>;

pub fn write(data: impl Iterator<Item = f32>, path: &Path) -> IORes<()> {
    let file = File::create(path)?;
    let mut buf = BufWriter::new(file);
    for datum in data {
        buf.write_all(&datum.to_le_bytes())?;
    }
    buf.flush()
}

pub fn read<'a>(path: &Path) -> IORes<impl Iterator<Item = IORes<f32>> + 'a> {
    read_words(path, f32::from_le_bytes)
}

/// Read unsigned 16-bit detector counts
pub fn read_u16<'a>(path: &Path) -> IORes<impl Iterator<Item = IORes<u16>> + 'a> {
    read_words(path, u16::from_le_bytes)
}

pub fn write_u16(data: impl Iterator<Item = u16>, path: &Path) -> IORes<()> {
    let file = File::create(path)?;
    let mut buf = BufWriter::new(file);
    for datum in data {
        buf.write_all(&datum.to_le_bytes())?;
    }
    buf.flush()
}

fn read_words<'a, T, const N: usize>(
    path: &Path,
    convert: fn([u8; N]) -> T,
) -> IORes<impl Iterator<Item = IORes<T>> + 'a>
where
    T: 'a,
{
    let file = File::open(path)?;
    let mut buf = BufReader::new(file);
    let mut buffer = [0; N];

    Ok(std::iter::from_fn(move || {
        use std::io::ErrorKind::UnexpectedEof;
        match buf.read_exact(&mut buffer) {
            Ok(()) => Some(Ok(convert(buffer))),
            Err(e) if e.kind() == UnexpectedEof => None,
            Err(e) => Some(Err(e)),
        }
    }))
}

/// Line integral of attenuation corresponding to a raw detector count
#[inline]
pub fn count_to_line_integral(count: u16) -> f32 {
    (65536.0 / (count as f64 + 1.0)).ln() as f32
}

/// `count_to_line_integral` for every possible count
pub fn lookup_table() -> Vec<f32> {
    (0..=u16::MAX).map(count_to_line_integral).collect()
}
