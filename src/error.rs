//! This module defines the custom error types for the library.
//!
//! All failure conditions of the sGMRES driver are collected into a single
//! enum wrapped by [`SolverError`]. Two outcomes that look like failures are
//! deliberately *not* errors: a zero initial residual (the system is already
//! solved) and a lucky Arnoldi breakdown (the Krylov subspace became
//! invariant early); both are reported through the success path of the
//! solver. Rank deficiency of the sketched least-squares matrix, on the
//! other hand, aborts the solve and carries the sketched residual norm so
//! the caller still receives an estimate.
//!
//! Using the [`thiserror`] crate allows us to create idiomatic error types
//! with minimal boilerplate.

use thiserror::Error;

/// Represents all possible errors that can occur during an sGMRES solve.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct SolverError(#[from] SolverErrorKind);

/// Private enum containing the distinct kinds of errors.
/// This separation allows for a clean `Display` implementation via
/// [`thiserror`] while keeping the variant set free to evolve.
#[derive(Error, Debug, PartialEq)]
pub(crate) enum SolverErrorKind {
    /// The requested Krylov subspace dimension is incompatible with the
    /// operator: the driver requires 1 <= k < n - 1.
    #[error("Invalid subspace dimension: k = {k} must satisfy 1 <= k < n - 1 (n = {n}).")]
    SubspaceDimension { k: usize, n: usize },

    /// The Arnoldi truncation parameter is out of range: 1 <= t <= k.
    #[error("Invalid truncation: t = {t} must satisfy 1 <= t <= k (k = {k}).")]
    Truncation { t: usize, k: usize },

    /// Indicates that the dimensions of the operator and a supplied vector
    /// are incompatible.
    #[error("Dimension mismatch: operator has dimension {operator_dim} but vector has {vector_len} entries.")]
    DimensionMismatch {
        operator_dim: usize,
        vector_len: usize,
    },

    /// The pivoted QR of the sketched least-squares matrix met a diagonal
    /// entry below the numerical tolerance. The solution vector is left
    /// untouched; `sketched_residual` is the norm of the initial sketched
    /// residual, returned in place of an estimate.
    #[error("Rank-deficient sketch at column {step}: sketched residual {sketched_residual:.3e}.")]
    RankDeficientSketch { step: usize, sketched_residual: f64 },
}

impl SolverError {
    /// Whether this error reports a rank-deficient sketched LS matrix.
    pub fn is_rank_deficient(&self) -> bool {
        matches!(self.0, SolverErrorKind::RankDeficientSketch { .. })
    }

    /// The norm of the initial sketched residual, available when the solve
    /// aborted on a rank-deficient sketch.
    pub fn sketched_residual(&self) -> Option<f64> {
        match self.0 {
            SolverErrorKind::RankDeficientSketch {
                sketched_residual, ..
            } => Some(sketched_residual),
            _ => None,
        }
    }
}

// Manually implement PartialEq for the public error type.
// We compare the inner `SolverErrorKind`.
impl PartialEq for SolverError {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
