//! Randomized subspace embeddings.
//!
//! The solver compresses the n-dimensional least-squares problem into an
//! m-dimensional one, m = 2 * (k + 1), through a random sketch matrix that
//! approximately preserves norms on every k-dimensional subspace. The
//! default is a sparse sign embedding: a CSC matrix with exactly
//! s = ceil(2 * ln(k + 1)) nonzeros per column, entries +-1/sqrt(s) (unit
//! column norm, so the embedding preserves norms in expectation), and
//! every row of the embedding touched by at least one column. The dense
//! Gaussian alternative trades m * n extra reals of memory for the
//! classical Johnson-Lindenstrauss construction.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::kernels::dense::{dense_mm, dense_mv, gaussian, ColMat};
use crate::scalar::Real;
use crate::sparse::CscMatrix;

/// Which embedding the driver builds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SketchKind {
    /// Sparse sign embedding (the default and recommended variant).
    #[default]
    Sparse,
    /// Dense Gaussian embedding with N(0, 1/m) entries.
    Gauss,
}

/// A materialized sketch matrix of shape `m x n`.
#[derive(Clone, Debug)]
pub enum Sketch<R> {
    Sparse(CscMatrix<R>),
    Gauss(ColMat<R>),
}

impl<R: Real> Sketch<R> {
    /// Builds the embedding for a subspace dimension `k` over an operator
    /// dimension `n`.
    pub fn build(kind: SketchKind, k: usize, n: usize, rng: &mut StdRng) -> Self {
        match kind {
            SketchKind::Sparse => Sketch::Sparse(sparse_embedding(k, n, rng)),
            SketchKind::Gauss => Sketch::Gauss(gaussian_embedding(k, n, rng)),
        }
    }

    /// The embedding dimension m.
    pub fn rows(&self) -> usize {
        match self {
            Sketch::Sparse(mat) => mat.nrows(),
            Sketch::Gauss(mat) => mat.nrows(),
        }
    }

    /// y <- y + S * x.
    pub fn apply_vec(&self, x: &[R], y: &mut [R]) {
        match self {
            Sketch::Sparse(mat) => mat.spmv(x, y),
            Sketch::Gauss(mat) => dense_mv(y, mat, x),
        }
    }

    /// C <- C + S * X over the first `ncols_used` columns of `X` and `C`.
    pub fn apply_mat(&self, x: &ColMat<R>, c: &mut ColMat<R>, ncols_used: usize) {
        match self {
            Sketch::Sparse(mat) => mat.mul_dense(x, c, ncols_used),
            Sketch::Gauss(mat) => {
                if ncols_used == x.ncols() && ncols_used == c.ncols() {
                    dense_mm(c, mat, x);
                } else {
                    for j in 0..ncols_used {
                        dense_mv(c.col_mut(j), mat, x.col(j));
                    }
                }
            }
        }
    }
}

/// Embedding row count for a subspace dimension `k`.
pub fn embedding_rows(k: usize) -> usize {
    2 * (k + 1)
}

/// Nonzeros per column of the sparse embedding.
pub fn nonzeros_per_column(k: usize) -> usize {
    (2.0 * ((k + 1) as f64).ln()).ceil() as usize
}

/// Builds the sparse sign embedding.
///
/// Each column receives `s` distinct row indices, drawn uniformly with
/// rejection against earlier draws in the same column, and independent
/// +-1/sqrt(s) values. If some embedding row ends up with no entry at all
/// the whole matrix is discarded and regenerated: full row coverage is what
/// makes the construction an oblivious subspace embedding with overwhelming
/// probability.
pub fn sparse_embedding<R: Real>(k: usize, n: usize, rng: &mut StdRng) -> CscMatrix<R> {
    let m = embedding_rows(k);
    let s = nonzeros_per_column(k).min(m);
    let magnitude = R::from_f64(1.0 / (s as f64).sqrt());

    let mut rowidx: Vec<usize> = Vec::with_capacity(s * n);
    let mut values: Vec<R> = Vec::with_capacity(s * n);
    let mut column: Vec<usize> = Vec::with_capacity(s);

    loop {
        rowidx.clear();
        values.clear();
        let mut covered = vec![false; m];

        for _ in 0..n {
            column.clear();
            while column.len() < s {
                let row = rng.random_range(0..m);
                if !column.contains(&row) {
                    column.push(row);
                }
            }
            column.sort_unstable();
            for &row in &column {
                covered[row] = true;
                rowidx.push(row);
                values.push(if rng.random::<bool>() {
                    magnitude
                } else {
                    -magnitude
                });
            }
        }

        if covered.iter().all(|&hit| hit) {
            break;
        }
        log::debug!("sparse embedding left a row empty; regenerating");
    }

    let colptr: Vec<usize> = (0..=n).map(|j| j * s).collect();
    CscMatrix::from_parts(m, n, colptr, rowidx, values)
}

/// Builds the dense Gaussian embedding: an `m x n` matrix of i.i.d.
/// N(0, 1/m) entries.
pub fn gaussian_embedding<R: Real>(k: usize, n: usize, rng: &mut StdRng) -> ColMat<R> {
    let m = embedding_rows(k);
    let mut mat = gaussian(m, n, rng);
    let inv_sqrt_m = R::from_f64(1.0 / (m as f64).sqrt());
    for entry in mat.as_mut_slice() {
        *entry *= inv_sqrt_m;
    }
    mat
}

/// The random source for one driver call: the caller's seed, or the system
/// clock when none was given (in which case the run is not reproducible).
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    let seed = seed.unwrap_or_else(|| {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    });
    StdRng::seed_from_u64(seed)
}
