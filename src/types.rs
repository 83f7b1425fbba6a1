pub use geometry::{Point, Vector};

pub use units::todo::{Degreesf64, Intensityf32, Lengthf64, Radiansf64, Ratiof64, Weightf32};

#[allow(non_camel_case_types)] pub type Index3_u = [usize; 3];
#[allow(non_camel_case_types)] pub type BoxDim_u = [usize; 3];
#[allow(non_camel_case_types)] pub type Index2_u = [usize; 2];
