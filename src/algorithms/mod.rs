//! Core iterative machinery.
//!
//! The [`arnoldi`] module implements the truncated Arnoldi recurrence in
//! the two storage disciplines the driver needs: a full basis for the
//! standard solve, and a rolling window of `t + 1` columns for the
//! memory-priority solve.

pub mod arnoldi;

pub use arnoldi::{ArnoldiOutcome, RollingWindow};

use crate::scalar::Real;

/// The norm below which a candidate basis vector is considered zero and the
/// Krylov subspace invariant.
#[inline]
pub fn breakdown_tolerance<R: Real>() -> R {
    R::TOL
}
