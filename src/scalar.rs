//! Floating-point precision abstraction.
//!
//! Every numerical routine in this crate is generic over a [`Real`] scalar,
//! which is implemented for `f32` and `f64`. The trait pairs the scalar with
//! the tolerance below which a value is treated as a structural zero: sparse
//! entries under the tolerance are dropped on ingestion, and the solver uses
//! the same threshold to detect breakdowns and rank deficiency.

use std::fmt::{Debug, Display};
use std::iter::Sum;
use std::ops::{AddAssign, DivAssign, MulAssign, SubAssign};

use num_traits::Float;

/// A real scalar usable by the solver kernels.
///
/// The bound on [`num_traits::Float`] supplies the arithmetic, `abs`, `sqrt`
/// and `mul_add`; the trait adds the per-precision tolerance and explicit
/// `f64` conversions (random draws and reporting go through `f64`).
pub trait Real:
    Float
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
    + Sum
    + Default
    + Debug
    + Display
    + Send
    + Sync
    + 'static
{
    /// Numerical tolerance: values with magnitude below this are treated as
    /// structural zeros.
    const TOL: Self;

    /// Lossy conversion from `f64`.
    fn from_f64(value: f64) -> Self;

    /// Widening (or identity) conversion to `f64`.
    fn to_f64(self) -> f64;
}

impl Real for f32 {
    const TOL: f32 = 1.0e-7;

    #[inline]
    fn from_f64(value: f64) -> f32 {
        value as f32
    }

    #[inline]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

impl Real for f64 {
    const TOL: f64 = 1.0e-14;

    #[inline]
    fn from_f64(value: f64) -> f64 {
        value
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerances_match_precision() {
        assert!(f32::TOL > f32::EPSILON);
        assert!(f64::TOL > f64::EPSILON);
        assert!(f64::TOL < f32::TOL as f64);
    }

    #[test]
    fn conversions_round_trip() {
        let x = 0.125_f64;
        assert_eq!(f64::from_f64(x), x);
        assert_eq!(f32::from_f64(x).to_f64(), x);
    }
}
