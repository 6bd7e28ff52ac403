//! Dense vector kernels.
//!
//! Every reduction comes in two flavors. The *parallel* variant
//! ([`dot`], [`norm`]) splits the input into fixed-size blocks reduced on
//! the rayon pool; the shape of that reduction tree depends on the thread
//! count, so results are not bit-identical across configurations. The
//! *sequential* variant ([`dot_seq`], [`norm_seq`]) always reduces in the
//! same order and is the one the QR factorization is built on, keeping the
//! Householder products reproducible for a fixed input.
//!
//! Inner loops run `UNROLL` independent accumulator lanes of `mul_add`;
//! inputs shorter than one unrolled block fall back to a plain scalar loop.

use rayon::prelude::*;

use crate::scalar::Real;

/// Accumulator lanes per unrolled iteration.
pub(crate) const UNROLL: usize = 4;

/// Minimum length before a kernel moves onto the thread pool. Below this,
/// fork-join overhead dominates the arithmetic.
pub(crate) const PAR_BLOCK: usize = 8192;

/// dst <- src. Plain block copy; the compiler lowers this to wide moves.
#[inline]
pub fn copy<R: Real>(dst: &mut [R], src: &[R]) {
    assert_eq!(dst.len(), src.len(), "copy: length mismatch");
    dst.copy_from_slice(src);
}

/// Sequential dot product with a deterministic reduction order.
pub fn dot_seq<R: Real>(x: &[R], y: &[R]) -> R {
    assert_eq!(x.len(), y.len(), "dot: length mismatch");
    let n = x.len();

    if n < UNROLL * UNROLL {
        let mut acc = R::zero();
        for i in 0..n {
            acc = x[i].mul_add(y[i], acc);
        }
        return acc;
    }

    let mut lanes = [R::zero(); UNROLL];
    let x_blocks = x.chunks_exact(UNROLL);
    let y_blocks = y.chunks_exact(UNROLL);
    let x_tail = x_blocks.remainder();
    let y_tail = y_blocks.remainder();

    for (xb, yb) in x_blocks.zip(y_blocks) {
        lanes[0] = xb[0].mul_add(yb[0], lanes[0]);
        lanes[1] = xb[1].mul_add(yb[1], lanes[1]);
        lanes[2] = xb[2].mul_add(yb[2], lanes[2]);
        lanes[3] = xb[3].mul_add(yb[3], lanes[3]);
    }

    let mut acc = (lanes[0] + lanes[1]) + (lanes[2] + lanes[3]);
    for (xi, yi) in x_tail.iter().zip(y_tail) {
        acc = xi.mul_add(*yi, acc);
    }
    acc
}

/// Thread-parallel dot product. The per-block partial sums are produced by
/// [`dot_seq`]; the combination across blocks is a rayon reduction.
pub fn dot<R: Real>(x: &[R], y: &[R]) -> R {
    assert_eq!(x.len(), y.len(), "dot: length mismatch");
    if x.len() < PAR_BLOCK {
        return dot_seq(x, y);
    }
    x.par_chunks(PAR_BLOCK)
        .zip(y.par_chunks(PAR_BLOCK))
        .map(|(xb, yb)| dot_seq(xb, yb))
        .sum()
}

/// Sequential Euclidean norm.
pub fn norm_seq<R: Real>(x: &[R]) -> R {
    dot_seq(x, x).sqrt()
}

/// Thread-parallel Euclidean norm.
pub fn norm<R: Real>(x: &[R]) -> R {
    dot(x, x).sqrt()
}

/// Normalizes `x` to unit Euclidean length and returns the norm it had.
///
/// If the norm is below [`Real::TOL`] the vector is left untouched; the
/// caller decides whether that is a breakdown or a converged residual.
pub fn normalize<R: Real>(x: &mut [R]) -> R {
    let s = norm(x);
    if s < R::TOL {
        return s;
    }
    scale(x, s.recip());
    s
}

/// x <- alpha * x.
pub fn scale<R: Real>(x: &mut [R], alpha: R) {
    if x.len() < PAR_BLOCK {
        for xi in x.iter_mut() {
            *xi *= alpha;
        }
    } else {
        x.par_chunks_mut(PAR_BLOCK).for_each(|block| {
            for xi in block.iter_mut() {
                *xi *= alpha;
            }
        });
    }
}

/// Sequential y <- y + alpha * x.
pub fn axpy_seq<R: Real>(y: &mut [R], x: &[R], alpha: R) {
    assert_eq!(x.len(), y.len(), "axpy: length mismatch");
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi = xi.mul_add(alpha, *yi);
    }
}

/// Thread-parallel y <- y + alpha * x. This is the solution-update kernel
/// (`x += y_j * v_j` with `v_j` a basis column).
pub fn axpy<R: Real>(y: &mut [R], x: &[R], alpha: R) {
    assert_eq!(x.len(), y.len(), "axpy: length mismatch");
    if y.len() < PAR_BLOCK {
        axpy_seq(y, x, alpha);
    } else {
        y.par_chunks_mut(PAR_BLOCK)
            .zip(x.par_chunks(PAR_BLOCK))
            .for_each(|(yb, xb)| axpy_seq(yb, xb, alpha));
    }
}

/// One modified Gram-Schmidt step: y <- y - <x, y> * x.
///
/// Returns the projection coefficient. `x` is expected to be (approximately)
/// unit-length; the coefficient is computed internally with the parallel dot
/// product.
pub fn project_out<R: Real>(y: &mut [R], x: &[R]) -> R {
    let a = dot(x, y);
    axpy(y, x, -a);
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| (i % 13) as f64 - 6.0).collect()
    }

    #[test]
    fn dot_seq_matches_naive() {
        for n in [1, 3, 15, 16, 17, 100, 1023] {
            let x = ramp(n);
            let y: Vec<f64> = x.iter().map(|v| 0.5 * v + 1.0).collect();
            let naive: f64 = x.iter().zip(&y).map(|(a, b)| a * b).sum();
            assert!((dot_seq(&x, &y) - naive).abs() <= 1e-10 * naive.abs().max(1.0));
        }
    }

    #[test]
    fn parallel_dot_agrees_with_sequential() {
        let n = 3 * PAR_BLOCK + 77;
        let x = ramp(n);
        let y: Vec<f64> = x.iter().map(|v| v * 0.25 - 2.0).collect();
        let seq = dot_seq(&x, &y);
        let par = dot(&x, &y);
        assert!((seq - par).abs() <= 1e-8 * seq.abs().max(1.0));
    }

    #[test]
    fn normalize_produces_unit_vector() {
        let mut x = ramp(257);
        x[0] = 3.0;
        let before = norm(&x);
        let returned = normalize(&mut x);
        assert!((returned - before).abs() <= 1e-12 * before);
        assert!((norm(&x) - 1.0).abs() <= 1e-12);
    }

    #[test]
    fn normalize_leaves_zero_vector_untouched() {
        let mut x = vec![0.0_f64; 64];
        let s = normalize(&mut x);
        assert!(s < f64::TOL);
        assert!(x.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn project_out_orthogonalizes() {
        let n = 500;
        let mut u: Vec<f64> = (0..n).map(|i| ((i * 7 + 3) % 11) as f64 - 5.0).collect();
        normalize(&mut u);
        let mut y = ramp(n);
        project_out(&mut y, &u);
        assert!(dot_seq(&u, &y).abs() <= 1e-10);
    }

    #[test]
    fn axpy_small_and_large_paths_agree() {
        let n = PAR_BLOCK + 5;
        let x = ramp(n);
        let mut y_par = ramp(n);
        let mut y_seq = y_par.clone();
        axpy(&mut y_par, &x, 0.75);
        axpy_seq(&mut y_seq, &x, 0.75);
        assert_eq!(y_par, y_seq);
    }
}
