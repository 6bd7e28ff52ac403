//! Compressed sparse matrix storage and products.
//!
//! Two layouts are provided. [`CscMatrix`] stores columns contiguously and
//! is the layout the solver, the loader and the sketch generator work with;
//! its mat-vec scatters into the output, so it runs sequentially.
//! [`CsrMatrix`] stores rows contiguously; its mat-vec gathers per row and
//! parallelizes cleanly across rows.
//!
//! Invariants held by both (checked in debug builds): the pointer array
//! starts at 0, ends at `nnz`, and is monotone; indices inside one
//! column/row are strictly increasing; every stored value has magnitude at
//! least [`Real::TOL`].

use rayon::prelude::*;

use crate::kernels::vector::{copy, PAR_BLOCK};
use crate::scalar::Real;

/// A sparse matrix in compressed sparse column form.
#[derive(Clone, Debug)]
pub struct CscMatrix<R> {
    nrows: usize,
    ncols: usize,
    colptr: Vec<usize>,
    rowidx: Vec<usize>,
    values: Vec<R>,
}

impl<R: Real> CscMatrix<R> {
    /// Builds a matrix from raw CSC arrays.
    pub fn from_parts(
        nrows: usize,
        ncols: usize,
        colptr: Vec<usize>,
        rowidx: Vec<usize>,
        values: Vec<R>,
    ) -> Self {
        assert_eq!(colptr.len(), ncols + 1, "CSC: colptr length mismatch");
        assert_eq!(rowidx.len(), values.len(), "CSC: index/value length mismatch");
        assert_eq!(colptr[0], 0, "CSC: colptr must start at 0");
        assert_eq!(colptr[ncols], rowidx.len(), "CSC: colptr must end at nnz");
        debug_assert!(colptr.windows(2).all(|w| w[0] <= w[1]));
        debug_assert!((0..ncols)
            .all(|j| (colptr[j] + 1..colptr[j + 1]).all(|i| rowidx[i - 1] < rowidx[i])));
        debug_assert!(rowidx.iter().all(|&i| i < nrows));
        debug_assert!(values.iter().all(|v| v.abs() >= R::TOL));
        Self {
            nrows,
            ncols,
            colptr,
            rowidx,
            values,
        }
    }

    /// Builds a matrix from `(row, col, value)` triplets. Duplicates are
    /// summed; entries below [`Real::TOL`] after summation are dropped.
    pub fn from_triplets(nrows: usize, ncols: usize, triplets: &[(usize, usize, R)]) -> Self {
        let mut entries: Vec<(usize, usize, R)> = Vec::with_capacity(triplets.len());
        let mut sorted: Vec<(usize, usize, R)> = triplets.to_vec();
        sorted.sort_by_key(|&(row, col, _)| (col, row));
        for &(row, col, val) in &sorted {
            assert!(row < nrows && col < ncols, "CSC: triplet out of bounds");
            match entries.last_mut() {
                Some(last) if last.0 == row && last.1 == col => last.2 += val,
                _ => entries.push((row, col, val)),
            }
        }

        let mut colptr = vec![0usize; ncols + 1];
        let mut rowidx = Vec::with_capacity(entries.len());
        let mut values = Vec::with_capacity(entries.len());
        let mut cur_col = 0;
        for (row, col, val) in entries {
            if val.abs() < R::TOL {
                continue;
            }
            while cur_col < col {
                colptr[cur_col + 1] = values.len();
                cur_col += 1;
            }
            rowidx.push(row);
            values.push(val);
        }
        while cur_col < ncols {
            colptr[cur_col + 1] = values.len();
            cur_col += 1;
        }
        Self::from_parts(nrows, ncols, colptr, rowidx, values)
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// y <- y + A * x.
    ///
    /// Column-oriented scatter: different columns hit overlapping rows of
    /// `y`, so the loop stays sequential.
    pub fn spmv(&self, x: &[R], y: &mut [R]) {
        assert_eq!(x.len(), self.ncols, "spmv: input length mismatch");
        assert_eq!(y.len(), self.nrows, "spmv: output length mismatch");
        for j in 0..self.ncols {
            let xj = x[j];
            for idx in self.colptr[j]..self.colptr[j + 1] {
                y[self.rowidx[idx]] = self.values[idx].mul_add(xj, y[self.rowidx[idx]]);
            }
        }
    }

    /// r <- b - A * x.
    pub fn residual(&self, x: &[R], b: &[R], r: &mut [R]) {
        assert_eq!(b.len(), self.nrows, "residual: rhs length mismatch");
        copy(r, b);
        for j in 0..self.ncols {
            let xj = x[j];
            for idx in self.colptr[j]..self.colptr[j + 1] {
                r[self.rowidx[idx]] -= self.values[idx] * xj;
            }
        }
    }

    /// C <- C + A * X, with `X` and `C` dense column-major blocks.
    ///
    /// Equivalent to one [`CscMatrix::spmv`] per column of `X`; the columns
    /// are independent and run on the pool. Only the first `ncols_used`
    /// columns are touched, which lets a caller reuse a wide buffer after an
    /// early Arnoldi termination.
    pub fn mul_dense(
        &self,
        x: &crate::kernels::dense::ColMat<R>,
        c: &mut crate::kernels::dense::ColMat<R>,
        ncols_used: usize,
    ) {
        assert_eq!(x.nrows(), self.ncols, "mul_dense: input row mismatch");
        assert_eq!(c.nrows(), self.nrows, "mul_dense: output row mismatch");
        assert!(ncols_used <= x.ncols() && ncols_used <= c.ncols());
        let p = self.ncols;
        let m = self.nrows;
        c.as_mut_slice()
            .par_chunks_mut(m)
            .take(ncols_used)
            .zip(x.as_slice().par_chunks(p).take(ncols_used))
            .for_each(|(cj, xj)| self.spmv(xj, cj));
    }
}

/// A sparse matrix in compressed sparse row form.
#[derive(Clone, Debug)]
pub struct CsrMatrix<R> {
    nrows: usize,
    ncols: usize,
    rowptr: Vec<usize>,
    colidx: Vec<usize>,
    values: Vec<R>,
}

impl<R: Real> CsrMatrix<R> {
    /// Builds a matrix from raw CSR arrays.
    pub fn from_parts(
        nrows: usize,
        ncols: usize,
        rowptr: Vec<usize>,
        colidx: Vec<usize>,
        values: Vec<R>,
    ) -> Self {
        assert_eq!(rowptr.len(), nrows + 1, "CSR: rowptr length mismatch");
        assert_eq!(colidx.len(), values.len(), "CSR: index/value length mismatch");
        assert_eq!(rowptr[0], 0, "CSR: rowptr must start at 0");
        assert_eq!(rowptr[nrows], colidx.len(), "CSR: rowptr must end at nnz");
        debug_assert!(rowptr.windows(2).all(|w| w[0] <= w[1]));
        debug_assert!(colidx.iter().all(|&j| j < ncols));
        debug_assert!(values.iter().all(|v| v.abs() >= R::TOL));
        Self {
            nrows,
            ncols,
            rowptr,
            colidx,
            values,
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// y <- y + A * x. Row-oriented gather, parallel across rows.
    pub fn spmv(&self, x: &[R], y: &mut [R]) {
        assert_eq!(x.len(), self.ncols, "spmv: input length mismatch");
        assert_eq!(y.len(), self.nrows, "spmv: output length mismatch");
        let row = |i: usize, yi: &mut R| {
            let mut acc = *yi;
            for idx in self.rowptr[i]..self.rowptr[i + 1] {
                acc = self.values[idx].mul_add(x[self.colidx[idx]], acc);
            }
            *yi = acc;
        };
        if self.nrows < PAR_BLOCK {
            for (i, yi) in y.iter_mut().enumerate() {
                row(i, yi);
            }
        } else {
            y.par_iter_mut().enumerate().for_each(|(i, yi)| row(i, yi));
        }
    }

    /// r <- b - A * x.
    pub fn residual(&self, x: &[R], b: &[R], r: &mut [R]) {
        assert_eq!(b.len(), self.nrows, "residual: rhs length mismatch");
        copy(r, b);
        let row = |i: usize, ri: &mut R| {
            let mut acc = *ri;
            for idx in self.rowptr[i]..self.rowptr[i + 1] {
                acc = acc - self.values[idx] * x[self.colidx[idx]];
            }
            *ri = acc;
        };
        if self.nrows < PAR_BLOCK {
            for (i, ri) in r.iter_mut().enumerate() {
                row(i, ri);
            }
        } else {
            r.par_iter_mut().enumerate().for_each(|(i, ri)| row(i, ri));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tridiag_csc(n: usize) -> CscMatrix<f64> {
        let mut triplets = Vec::new();
        for j in 0..n {
            if j > 0 {
                triplets.push((j - 1, j, -1.0));
            }
            triplets.push((j, j, 2.0));
            if j + 1 < n {
                triplets.push((j + 1, j, -1.0));
            }
        }
        CscMatrix::from_triplets(n, n, &triplets)
    }

    #[test]
    fn csc_spmv_tridiagonal() {
        let a = tridiag_csc(3);
        let x = vec![1.0, 2.0, 3.0];
        let mut y = vec![0.0; 3];
        a.spmv(&x, &mut y);
        assert_eq!(y, vec![0.0, 0.0, 4.0]);
    }

    #[test]
    fn csc_residual_of_exact_solution_is_zero() {
        let n = 10;
        let a = tridiag_csc(n);
        let x = vec![1.0; n];
        let mut b = vec![0.0; n];
        a.spmv(&x, &mut b);
        let mut r = vec![9.0; n];
        a.residual(&x, &b, &mut r);
        assert!(r.iter().all(|&v| v.abs() <= 1e-14));
    }

    #[test]
    fn from_triplets_sums_duplicates_and_drops_small() {
        let triplets = vec![
            (0, 0, 1.0),
            (0, 0, 2.0),
            (1, 1, 1.0),
            (1, 1, -1.0),
            (2, 2, 5.0),
        ];
        let a = CscMatrix::from_triplets(3, 3, &triplets);
        // (1, 1) cancels to zero and is dropped.
        assert_eq!(a.nnz(), 2);
        let mut y = vec![0.0; 3];
        a.spmv(&[1.0, 1.0, 1.0], &mut y);
        assert_eq!(y, vec![3.0, 0.0, 5.0]);
    }

    #[test]
    fn csr_spmv_matches_csc() {
        // Same 4x4 matrix in both layouts.
        let triplets: Vec<(usize, usize, f64)> = vec![
            (0, 0, 2.0),
            (0, 3, 1.0),
            (1, 1, -3.0),
            (2, 0, 4.0),
            (2, 2, 1.0),
            (3, 3, 0.5),
        ];
        let csc = CscMatrix::from_triplets(4, 4, &triplets);

        let mut by_row = triplets.clone();
        by_row.sort_by_key(|&(r, c, _)| (r, c));
        let mut rowptr = vec![0usize; 5];
        let mut colidx = Vec::new();
        let mut values = Vec::new();
        let mut cur = 0;
        for (r, c, v) in by_row {
            while cur < r {
                rowptr[cur + 1] = values.len();
                cur += 1;
            }
            colidx.push(c);
            values.push(v);
        }
        while cur < 4 {
            rowptr[cur + 1] = values.len();
            cur += 1;
        }
        let csr = CsrMatrix::from_parts(4, 4, rowptr, colidx, values);

        let x = vec![1.0, -1.0, 2.0, 4.0];
        let mut y_csc = vec![0.0; 4];
        let mut y_csr = vec![0.0; 4];
        csc.spmv(&x, &mut y_csc);
        csr.spmv(&x, &mut y_csr);
        for (a, b) in y_csc.iter().zip(&y_csr) {
            assert!((a - b).abs() <= 1e-14);
        }
    }

    #[test]
    fn mul_dense_is_columnwise_spmv() {
        use crate::kernels::dense::ColMat;
        let a = tridiag_csc(5);
        let mut x = ColMat::zeros(5, 3);
        for j in 0..3 {
            for i in 0..5 {
                x.col_mut(j)[i] = (i + j) as f64;
            }
        }
        let mut c = ColMat::zeros(5, 3);
        a.mul_dense(&x, &mut c, 3);
        for j in 0..3 {
            let mut y = vec![0.0; 5];
            a.spmv(x.col(j), &mut y);
            assert_eq!(c.col(j), &y[..]);
        }
    }
}
