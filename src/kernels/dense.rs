//! Column-major dense matrices and their kernels.
//!
//! [`ColMat`] is the storage type shared by the Arnoldi basis, the
//! least-squares block, the sketched block and the Householder reflector
//! store. Column `j` of an `m x n` matrix occupies the contiguous index
//! range `[j * m, (j + 1) * m)`, so a column is always available as a plain
//! slice and every vector kernel applies to it directly.

use rand::rngs::StdRng;
use rand::Rng;
use rayon::prelude::*;

use super::vector::{axpy_seq, dot_seq, PAR_BLOCK};
use crate::scalar::Real;

/// A dense column-major matrix.
#[derive(Clone, Debug)]
pub struct ColMat<R> {
    nrows: usize,
    ncols: usize,
    data: Vec<R>,
}

impl<R: Real> ColMat<R> {
    /// An `nrows x ncols` matrix of zeros.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            data: vec![R::zero(); nrows * ncols],
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Column `j` as a slice.
    #[inline]
    pub fn col(&self, j: usize) -> &[R] {
        debug_assert!(j < self.ncols);
        &self.data[j * self.nrows..(j + 1) * self.nrows]
    }

    /// Column `j` as a mutable slice.
    #[inline]
    pub fn col_mut(&mut self, j: usize) -> &mut [R] {
        debug_assert!(j < self.ncols);
        &mut self.data[j * self.nrows..(j + 1) * self.nrows]
    }

    /// Columns `[0, j)` as one slice together with column `j` mutable.
    /// This is the borrow split the Gram-Schmidt loop needs: orthogonalize
    /// the candidate (column `j`) against earlier columns.
    pub fn split_at_col(&mut self, j: usize) -> (&[R], &mut [R]) {
        debug_assert!(j < self.ncols);
        let (head, tail) = self.data.split_at_mut(j * self.nrows);
        (&head[..], &mut tail[..self.nrows])
    }

    /// Column `src` immutable together with column `dst` mutable
    /// (`src != dst`).
    pub fn col_pair_mut(&mut self, src: usize, dst: usize) -> (&[R], &mut [R]) {
        assert_ne!(src, dst, "col_pair_mut: columns must differ");
        let m = self.nrows;
        if src < dst {
            let (head, tail) = self.data.split_at_mut(dst * m);
            (&head[src * m..(src + 1) * m], &mut tail[..m])
        } else {
            let (head, tail) = self.data.split_at_mut(src * m);
            (&tail[..m], &mut head[dst * m..(dst + 1) * m])
        }
    }

    /// Swaps columns `a` and `b` in place.
    pub fn swap_cols(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let (lo, hi) = (a.min(b), a.max(b));
        let m = self.nrows;
        let (head, tail) = self.data.split_at_mut(hi * m);
        head[lo * m..(lo + 1) * m].swap_with_slice(&mut tail[..m]);
    }

    /// The backing storage, column-major.
    pub fn as_slice(&self) -> &[R] {
        &self.data
    }

    /// The backing storage, column-major, mutable.
    pub fn as_mut_slice(&mut self) -> &mut [R] {
        &mut self.data
    }

    /// Frobenius norm.
    pub fn norm_fro(&self) -> R {
        super::vector::dot(&self.data, &self.data).sqrt()
    }
}

/// y <- y + A * x, with `A` column-major `m x n`.
///
/// The loop is organized as one AXPY per column; for large `m` the rows are
/// chunked across the pool and each chunk walks all columns, so no two
/// threads touch the same part of `y`.
pub fn dense_mv<R: Real>(y: &mut [R], a: &ColMat<R>, x: &[R]) {
    let (m, n) = (a.nrows(), a.ncols());
    assert_eq!(y.len(), m, "dense_mv: output length mismatch");
    assert_eq!(x.len(), n, "dense_mv: input length mismatch");

    if m < PAR_BLOCK {
        for j in 0..n {
            axpy_seq(y, a.col(j), x[j]);
        }
    } else {
        y.par_chunks_mut(PAR_BLOCK)
            .enumerate()
            .for_each(|(chunk, yb)| {
                let base = chunk * PAR_BLOCK;
                for j in 0..n {
                    let col = &a.col(j)[base..base + yb.len()];
                    axpy_seq(yb, col, x[j]);
                }
            });
    }
}

/// C <- C + A * B, with `A` `m x n` and `B` `n x k`.
pub fn dense_mm<R: Real>(c: &mut ColMat<R>, a: &ColMat<R>, b: &ColMat<R>) {
    assert_eq!(c.nrows(), a.nrows(), "dense_mm: row mismatch");
    assert_eq!(a.ncols(), b.nrows(), "dense_mm: inner dimension mismatch");
    assert_eq!(c.ncols(), b.ncols(), "dense_mm: column mismatch");
    for j in 0..b.ncols() {
        dense_mv(c.col_mut(j), a, b.col(j));
    }
}

/// C <- C + A^T * B, with `A` stored `m x n` and used transposed,
/// `B` `m x k`, `C` `n x k`.
///
/// Each output entry is a column-column dot product, which is the
/// cache-friendly orientation for column-major inputs.
pub fn dense_mm_tn<R: Real>(c: &mut ColMat<R>, a: &ColMat<R>, b: &ColMat<R>) {
    assert_eq!(a.nrows(), b.nrows(), "dense_mm_tn: inner dimension mismatch");
    assert_eq!(c.nrows(), a.ncols(), "dense_mm_tn: row mismatch");
    assert_eq!(c.ncols(), b.ncols(), "dense_mm_tn: column mismatch");
    for j in 0..b.ncols() {
        let bj = b.col(j);
        let cj = c.col_mut(j);
        for i in 0..cj.len() {
            cj[i] += dot_seq(a.col(i), bj);
        }
    }
}

/// An `nrows x ncols` matrix of i.i.d. standard normal entries, generated
/// with the Box-Muller transform.
pub fn gaussian<R: Real>(nrows: usize, ncols: usize, rng: &mut StdRng) -> ColMat<R> {
    let mut mat = ColMat::zeros(nrows, ncols);
    let data = mat.as_mut_slice();
    let mut i = 0;
    while i < data.len() {
        // Map [0, 1) draws to (0, 1] so the logarithm stays finite.
        let u1: f64 = 1.0 - rng.random::<f64>();
        let u2: f64 = rng.random::<f64>();
        let radius = (-2.0 * u1.ln()).sqrt();
        let angle = 2.0 * std::f64::consts::PI * u2;
        data[i] = R::from_f64(radius * angle.cos());
        if i + 1 < data.len() {
            data[i + 1] = R::from_f64(radius * angle.sin());
        }
        i += 2;
    }
    mat
}
