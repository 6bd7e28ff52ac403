//! This module defines the core abstraction for linear operators.
//!
//! The Arnoldi process never needs individual matrix entries; its only
//! requirement is the matrix-vector product. Writing the solver against a
//! "linear operator" rather than a concrete storage format keeps one
//! implementation usable with CSC input (the default), CSR input, dense
//! matrices in tests, or any operator-like object a caller provides.
//!
//! The contract is accumulating: `apply` adds `A * x` into `y`, matching
//! the sparse kernels, so callers compose products without intermediate
//! buffers. Operators are square; `dim` is both the row and column count.

use crate::kernels::dense::{dense_mv, ColMat};
use crate::kernels::vector::copy;
use crate::scalar::Real;
use crate::sparse::{CscMatrix, CsrMatrix};

/// A square linear operator defined by its matrix-vector product.
pub trait LinearOperator<R: Real> {
    /// The operator dimension (rows == columns).
    fn dim(&self) -> usize;

    /// y <- y + A * x.
    ///
    /// # Panics
    ///
    /// Implementations panic if `x` or `y` do not have length [`dim`].
    ///
    /// [`dim`]: LinearOperator::dim
    fn apply(&self, x: &[R], y: &mut [R]);

    /// r <- b - A * x.
    ///
    /// The default implementation copies `b`, applies the operator into a
    /// scratch vector and subtracts; sparse implementations override it
    /// with a fused loop.
    fn residual(&self, x: &[R], b: &[R], r: &mut [R]) {
        copy(r, b);
        let mut ax = vec![R::zero(); self.dim()];
        self.apply(x, &mut ax);
        for (ri, axi) in r.iter_mut().zip(&ax) {
            *ri -= *axi;
        }
    }
}

impl<R: Real> LinearOperator<R> for CscMatrix<R> {
    #[inline]
    fn dim(&self) -> usize {
        assert_eq!(self.nrows(), self.ncols(), "operator must be square");
        self.nrows()
    }

    #[inline]
    fn apply(&self, x: &[R], y: &mut [R]) {
        self.spmv(x, y);
    }

    #[inline]
    fn residual(&self, x: &[R], b: &[R], r: &mut [R]) {
        CscMatrix::residual(self, x, b, r);
    }
}

impl<R: Real> LinearOperator<R> for CsrMatrix<R> {
    #[inline]
    fn dim(&self) -> usize {
        assert_eq!(self.nrows(), self.ncols(), "operator must be square");
        self.nrows()
    }

    #[inline]
    fn apply(&self, x: &[R], y: &mut [R]) {
        self.spmv(x, y);
    }

    #[inline]
    fn residual(&self, x: &[R], b: &[R], r: &mut [R]) {
        CsrMatrix::residual(self, x, b, r);
    }
}

/// Dense square matrices act as operators too. This is the implementation
/// the unit tests lean on: small problems with easily verified products.
impl<R: Real> LinearOperator<R> for ColMat<R> {
    #[inline]
    fn dim(&self) -> usize {
        assert_eq!(self.nrows(), self.ncols(), "operator must be square");
        self.nrows()
    }

    #[inline]
    fn apply(&self, x: &[R], y: &mut [R]) {
        dense_mv(y, self, x);
    }
}
