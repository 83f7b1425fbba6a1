pub use uom;

pub mod todo;

/// Quantities stored as `f64`, with millimetres as the base unit of length
pub mod mms {
  pub mod f64 {
    use uom::{ISQ, system};
    ISQ!(uom::si, f64, (millimeter, kilogram, second, ampere, kelvin, mole, candela));
  }
}

pub use uom::si::Quantity;
pub use mms::f64::{Angle, Length, Ratio};

mod units {
  pub use uom::si::{length::{micrometer, millimeter, centimeter, meter},
                    ratio ::ratio,
                    angle ::{radian, degree},
  };
}

// Making values from float literals seems to be very long-winded, so provide
// some pithily-named convenience constructors.

/// Generate a function called NAME which returns QUANTITY by interpreting its
/// argument as UNIT
///
/// wrap!(NAME QUANTITY UNIT);
macro_rules! wrap {
  ($name:ident $quantity:ident $unit:ident ) => {
    pub fn $name(x: f64) -> $quantity { $quantity::new::<units::$unit>(x) }
  };
}

wrap!(um     Length   micrometer);
wrap!(mm     Length   millimeter);
wrap!(cm     Length   centimeter);
wrap!(m      Length        meter);
wrap!(ratio  Ratio         ratio);
wrap!(radian Angle        radian);
wrap!(degree Angle        degree);

// Reverse direction of the above
pub fn mm_    (x: Length) -> f64 { x.get::<units::millimeter>() }
pub fn ratio_ (x: Ratio ) -> f64 { x.get::<units::ratio>() }
pub fn radian_(x: Angle ) -> f64 { x.get::<units::radian>() }
pub fn degree_(x: Angle ) -> f64 { x.get::<units::degree>() }

#[macro_export]
macro_rules! assert_uom_eq {
  ($unit:ident, $lhs:expr, $rhs:expr, $algo:ident <= $tol:expr) => {
    float_eq::assert_float_eq!($lhs.get::<$unit>(), $rhs.get::<$unit>(), $algo <= $tol)
  };
}

#[cfg(test)]
mod tests {
  use super::*;
  use rstest::rstest;
  use float_eq::assert_float_eq;

  #[test]
  fn lengths_sum_across_units() {
    let v = vec![mm(1.0), cm(1.0), um(500.0)];
    let total: Length = v.into_iter().sum();
    use units::micrometer;
    assert_uom_eq!(micrometer, total, mm(11.5), ulps <= 1);
  }

  #[rstest(/**/ text      , expected,
           case("2 mm"    ,    2.0),
           case("1.5 cm"  ,   15.0),
           case("0.25 m"  ,  250.0),
           case("-127 mm" , -127.0),
  )]
  fn parse_length_with_unit(text: &str, expected: f64) {
    let length: Length = text.parse().unwrap();
    assert_float_eq!(mm_(length), expected, ulps <= 1);
  }

  #[test]
  fn degrees_to_radians() {
    assert_float_eq!(radian_(degree(180.0)), std::f64::consts::PI, ulps <= 1);
    assert_float_eq!(degree_(radian(std::f64::consts::FRAC_PI_2)), 90.0, ulps <= 1);
  }
}
