/// Units which are simply type aliases for floats rather than having an
/// implementation as a `uom` `Quantity`.
///
/// These appear in the numerical inner loops (projectors, filters, weights)
/// where `uom` wrappers would get in the way, but we still want some clues in
/// the source as to what they represent.

/// Lengths in mm
pub type Lengthf64    = f64;
/// Angles in degrees, as stored in acquisition geometries
pub type Degreesf64   = f64;
/// Angles in radians
pub type Radiansf64   = f64;
pub type Ratiof64     = f64;
pub type Weightf32    = f32;
/// Attenuation coefficients, line integrals and their reconstructions
pub type Intensityf32 = f32;
