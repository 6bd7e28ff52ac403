//! Pivoted Householder thin-QR of a tall matrix.
//!
//! The factorization overwrites the input `m x k` matrix with the
//! upper-triangular factor R (entries below the diagonal are stored as
//! exact zeros), records the unit Householder vectors in a separate
//! `m x k` reflector store and the column pivots in a permutation vector,
//! and applies every reflector to a caller-supplied side vector as it is
//! built — the driver passes the sketched residual here, so after the
//! factorization the side vector already holds `Q^T * c`.
//!
//! Every inner product in this module uses the *sequential* dot kernel:
//! pivot choices compare tail norms, and a thread-dependent reduction order
//! could flip a near-tie and change the whole factorization. With the
//! sequential kernel the output is a deterministic function of the input.

use crate::kernels::dense::ColMat;
use crate::kernels::vector::{axpy_seq, dot_seq, norm_seq};
use crate::scalar::Real;

/// A column of the factorized matrix turned out numerically zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RankDeficient {
    /// The factorization (or back-substitution) step that failed.
    pub step: usize,
}

/// The orthogonal factor in compact reflector form, plus the column
/// permutation chosen by pivoting.
///
/// Reflector `j` lives in column `j` of the store, rows `j..m`, normalized
/// to unit length; `Q = H_0 * H_1 * ... * H_{k-1}` with
/// `H_j = I - 2 * q_j * q_j^T`.
#[derive(Clone, Debug)]
pub struct PivotedQr<R> {
    reflectors: ColMat<R>,
    perm: Vec<usize>,
}

impl<R: Real> PivotedQr<R> {
    /// Factorizes `w` in place, applying the reflectors to `c` as they are
    /// built.
    ///
    /// On entry `w` is `m x k` with `m > k`; on success it holds R in its
    /// leading `k x k` block and exact zeros below the diagonal. `c` must
    /// have length `m` and holds `Q^T * c` on return.
    ///
    /// Fails with [`RankDeficient`] when the pivoted tail norm at some step
    /// falls below [`Real::TOL`]; `w` and `c` are left partially updated
    /// and must not be reused.
    pub fn factorize_with_side(w: &mut ColMat<R>, c: &mut [R]) -> Result<Self, RankDeficient> {
        let m = w.nrows();
        let k = w.ncols();
        assert!(m > k, "thin QR requires a tall matrix (m = {m}, k = {k})");
        assert_eq!(c.len(), m, "side vector length mismatch");

        let mut reflectors = ColMat::zeros(m, k);
        let mut perm: Vec<usize> = (0..k).collect();

        for j in 0..k {
            // Column pivot: bring the remaining column with the largest
            // tail norm to position j. Ties keep the leftmost column.
            let mut best = j;
            let mut best_norm = norm_seq(&w.col(j)[j..]);
            for l in (j + 1)..k {
                let tail = norm_seq(&w.col(l)[j..]);
                if tail > best_norm {
                    best = l;
                    best_norm = tail;
                }
            }
            if best != j {
                w.swap_cols(j, best);
                perm.swap(j, best);
            }

            if best_norm < R::TOL {
                return Err(RankDeficient { step: j });
            }

            // Householder direction: x + sign(x_0) * ||x|| * e_0, with
            // sign(0) = +1, stored unit-length.
            {
                let qj = &mut reflectors.col_mut(j)[j..];
                qj.copy_from_slice(&w.col(j)[j..]);
                let sign = if qj[0] < R::zero() { -R::one() } else { R::one() };
                qj[0] += sign * best_norm;
                let len = norm_seq(qj);
                for entry in qj.iter_mut() {
                    *entry /= len;
                }
            }

            // Reflect the trailing columns, including column j itself.
            let qj = &reflectors.col(j)[j..];
            let two = R::from_f64(2.0);
            for l in j..k {
                let target = &mut w.col_mut(l)[j..];
                let alpha = two * dot_seq(qj, target);
                axpy_seq(target, qj, -alpha);
            }

            // The reflection annihilates the tail of column j only up to
            // round-off; store the zeros exactly.
            for entry in &mut w.col_mut(j)[j + 1..] {
                *entry = R::zero();
            }

            // Carry the side vector along.
            let beta = two * dot_seq(qj, &c[j..]);
            axpy_seq(&mut c[j..], qj, -beta);
        }

        Ok(Self { reflectors, perm })
    }

    /// The number of reflectors, i.e. the factorized column count.
    pub fn steps(&self) -> usize {
        self.reflectors.ncols()
    }

    /// The column permutation: source column `perm()[j]` of the input ended
    /// up factorized at position `j`.
    pub fn perm(&self) -> &[usize] {
        &self.perm
    }

    /// v <- Q * v: reflectors applied from the last to the first.
    pub fn apply_q(&self, v: &mut [R]) {
        assert_eq!(v.len(), self.reflectors.nrows(), "apply_q: length mismatch");
        let two = R::from_f64(2.0);
        for j in (0..self.steps()).rev() {
            let qj = &self.reflectors.col(j)[j..];
            let alpha = two * dot_seq(qj, &v[j..]);
            axpy_seq(&mut v[j..], qj, -alpha);
        }
    }

    /// v <- Q^T * v: reflectors applied from the first to the last.
    pub fn apply_qt(&self, v: &mut [R]) {
        assert_eq!(v.len(), self.reflectors.nrows(), "apply_qt: length mismatch");
        let two = R::from_f64(2.0);
        for j in 0..self.steps() {
            let qj = &self.reflectors.col(j)[j..];
            let alpha = two * dot_seq(qj, &v[j..]);
            axpy_seq(&mut v[j..], qj, -alpha);
        }
    }
}

/// Solves `R * y = rhs[..k]` by back-substitution, with `R` the triangular
/// factor left in the leading block of a factorized matrix.
///
/// Fails with [`RankDeficient`] if a diagonal entry is below [`Real::TOL`].
pub fn solve_upper<R: Real>(r: &ColMat<R>, rhs: &[R], y: &mut [R]) -> Result<(), RankDeficient> {
    let k = r.ncols();
    assert!(rhs.len() >= k, "back-substitution: rhs too short");
    assert_eq!(y.len(), k, "back-substitution: output length mismatch");

    for j in (0..k).rev() {
        let mut sum = rhs[j];
        for l in (j + 1)..k {
            sum -= r.col(l)[j] * y[l];
        }
        let diag = r.col(j)[j];
        if diag.abs() < R::TOL {
            return Err(RankDeficient { step: j });
        }
        y[j] = sum / diag;
    }
    Ok(())
}

/// Scatters the permuted solution back to input-column order:
/// `out[perm[j]] = y[j]`.
pub fn unpermute<R: Real>(perm: &[usize], y: &[R], out: &mut [R]) {
    assert_eq!(perm.len(), y.len());
    assert_eq!(perm.len(), out.len());
    for (j, &p) in perm.iter().enumerate() {
        out[p] = y[j];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::dense::gaussian;
    use crate::sketch::seeded_rng;

    fn reconstruct_column(qr: &PivotedQr<f64>, r: &ColMat<f64>, j: usize) -> Vec<f64> {
        // Column j of Q * R. R is stored at full column height with exact
        // zeros below the diagonal, so the column can be lifted directly.
        let mut full = r.col(j).to_vec();
        qr.apply_q(&mut full);
        full
    }

    fn factor_gaussian(m: usize, k: usize, seed: u64) -> (ColMat<f64>, ColMat<f64>, PivotedQr<f64>, Vec<f64>, Vec<f64>) {
        let mut rng = seeded_rng(Some(seed));
        let original = gaussian(m, k, &mut rng);
        let mut factored = original.clone();
        let c_original: Vec<f64> = (0..m).map(|i| (i as f64).sin()).collect();
        let mut c = c_original.clone();
        let qr = PivotedQr::factorize_with_side(&mut factored, &mut c).unwrap();
        (original, factored, qr, c_original, c)
    }

    #[test]
    fn factorization_reconstructs_the_input() {
        let (original, r, qr, _, _) = factor_gaussian(30, 8, 1);
        for j in 0..8 {
            let rebuilt = reconstruct_column(&qr, &r, j);
            let source = original.col(qr.perm()[j]);
            for (a, b) in rebuilt.iter().zip(source) {
                assert!((a - b).abs() <= 1e-12, "QR reconstruction off: {a} vs {b}");
            }
        }
    }

    #[test]
    fn r_is_exactly_upper_triangular() {
        let (_, r, _, _, _) = factor_gaussian(24, 6, 2);
        for j in 0..6 {
            for i in (j + 1)..24 {
                assert_eq!(r.col(j)[i], 0.0);
            }
        }
    }

    #[test]
    fn pivoted_diagonal_is_nonincreasing() {
        let (_, r, _, _, _) = factor_gaussian(40, 10, 3);
        for j in 1..10 {
            assert!(
                r.col(j)[j].abs() <= r.col(j - 1)[j - 1].abs() + 1e-12,
                "pivoting should order the diagonal by magnitude"
            );
        }
    }

    #[test]
    fn permutation_is_a_bijection() {
        let (_, _, qr, _, _) = factor_gaussian(40, 12, 4);
        let mut seen = vec![false; 12];
        for &p in qr.perm() {
            assert!(p < 12 && !seen[p]);
            seen[p] = true;
        }
    }

    #[test]
    fn q_is_orthogonal() {
        let (_, _, qr, _, _) = factor_gaussian(20, 5, 5);
        let m = 20;
        // Columns of Q from the standard basis; pairwise inner products.
        let mut q_cols: Vec<Vec<f64>> = Vec::new();
        for i in 0..m {
            let mut e = vec![0.0; m];
            e[i] = 1.0;
            qr.apply_q(&mut e);
            q_cols.push(e);
        }
        for a in 0..m {
            for b in 0..m {
                let expected = if a == b { 1.0 } else { 0.0 };
                let inner = dot_seq(&q_cols[a], &q_cols[b]);
                assert!((inner - expected).abs() <= 1e-12);
            }
        }
    }

    #[test]
    fn apply_qt_inverts_apply_q() {
        let (_, _, qr, _, _) = factor_gaussian(18, 6, 9);
        let original: Vec<f64> = (0..18).map(|i| (i as f64 * 0.3).cos()).collect();
        let mut v = original.clone();
        qr.apply_q(&mut v);
        qr.apply_qt(&mut v);
        for (a, b) in v.iter().zip(&original) {
            assert!((a - b).abs() <= 1e-13);
        }
    }

    #[test]
    fn side_vector_holds_qt_c() {
        let (_, _, qr, c_original, c_after) = factor_gaussian(25, 7, 6);
        // Applying Q to Q^T c must give c back.
        let mut roundtrip = c_after.clone();
        qr.apply_q(&mut roundtrip);
        for (a, b) in roundtrip.iter().zip(&c_original) {
            assert!((a - b).abs() <= 1e-12);
        }
    }

    #[test]
    fn back_substitution_solves_the_triangular_system() {
        let (_, r, _, _, _) = factor_gaussian(30, 9, 7);
        let y_true: Vec<f64> = (0..9).map(|j| 1.0 + 0.5 * j as f64).collect();
        // rhs = R * y_true.
        let mut rhs = vec![0.0; 9];
        for j in 0..9 {
            for i in 0..=j {
                rhs[i] += r.col(j)[i] * y_true[j];
            }
        }
        let mut y = vec![0.0; 9];
        solve_upper(&r, &rhs, &mut y).unwrap();
        for (a, b) in y.iter().zip(&y_true) {
            assert!((a - b).abs() <= 1e-10);
        }
    }

    #[test]
    fn zero_column_is_reported_rank_deficient() {
        let mut w: ColMat<f64> = ColMat::zeros(12, 3);
        // Two independent columns, one exact zero column.
        for i in 0..12 {
            w.col_mut(0)[i] = (i + 1) as f64;
            w.col_mut(1)[i] = if i % 2 == 0 { 1.0 } else { -1.0 };
        }
        let mut c = vec![0.0; 12];
        let err = PivotedQr::factorize_with_side(&mut w, &mut c).unwrap_err();
        assert_eq!(err.step, 2);
    }

    #[test]
    fn unpermute_scatters_by_pivot() {
        let perm = vec![2, 0, 1];
        let y = vec![10.0, 20.0, 30.0];
        let mut out = vec![0.0; 3];
        unpermute(&perm, &y, &mut out);
        assert_eq!(out, vec![20.0, 30.0, 10.0]);
    }
}
