//! High-level sketched GMRES drivers.
//!
//! This module exposes the user-facing API for solving `A x = b` with the
//! sketched, truncated GMRES method. One call to [`sgmres`] performs one
//! pass: build the embedding, run the truncated Arnoldi recurrence, solve
//! the sketched least-squares problem through a pivoted QR, and update the
//! solution in place. Restart loops, if wanted, belong to the caller.
//!
//! Two execution modes produce numerically equivalent output:
//!
//! - [`Mode::Standard`] materializes the basis V (n x k) and the
//!   least-squares block W = A V (n x k), then sketches W in one block
//!   product.
//! - [`Mode::MemoryPriority`] keeps only a rolling window of t + 1 basis
//!   columns, sketches each product column the moment it is formed, and
//!   regenerates the basis a second time to accumulate the solution
//!   update. Peak dense memory drops from O(n k) to O(n t).

use std::time::Instant;

use crate::algorithms::arnoldi::{truncated_arnoldi_full, ArnoldiOutcome, RollingWindow};
use crate::error::{SolverError, SolverErrorKind};
use crate::kernels::dense::ColMat;
use crate::kernels::vector::{axpy, copy, norm, norm_seq, scale};
use crate::operator::LinearOperator;
use crate::qr::{solve_upper, unpermute, PivotedQr};
use crate::scalar::Real;
use crate::sketch::{embedding_rows, seeded_rng, Sketch, SketchKind};

/// Memory discipline of one solve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// Materialize the basis and the least-squares block.
    #[default]
    Standard,
    /// Rolling basis window; the basis is regenerated for the solution
    /// update instead of stored.
    MemoryPriority,
}

/// Parameters of one [`sgmres`] call.
#[derive(Clone, Copy, Debug)]
pub struct SgmresParams {
    /// Krylov subspace dimension, `1 <= k < n - 1`.
    pub k: usize,
    /// Arnoldi truncation: orthogonalize against the last `t` basis
    /// vectors, `1 <= t <= k`.
    pub t: usize,
    /// Memory discipline.
    pub mode: Mode,
    /// Embedding variant.
    pub sketch: SketchKind,
    /// RNG seed for the embedding. `None` seeds from the system clock and
    /// makes the run non-reproducible.
    pub seed: Option<u64>,
}

impl SgmresParams {
    /// Parameters with the default mode (standard) and sketch (sparse).
    pub fn new(k: usize, t: usize) -> Self {
        Self {
            k,
            t,
            mode: Mode::default(),
            sketch: SketchKind::default(),
            seed: None,
        }
    }
}

/// The outcome of a successful solve.
#[derive(Clone, Copy, Debug)]
pub struct SgmresReport<R> {
    /// Norm of the sketched residual after the update, `||S b - S A x||`.
    /// By the embedding property this tracks the true residual up to a
    /// small factor without spending another `nnz * k` on `A x`.
    pub residual_estimate: R,
    /// `max_j |R[j,j]| / min_j |R[j,j]|` of the pivoted triangular factor:
    /// a rough two-sided bound on the conditioning of the sketched
    /// least-squares matrix.
    pub condition_estimate: R,
    /// Basis vectors actually used (equals `k` unless trimmed).
    pub steps: usize,
    /// Set when the Arnoldi recurrence hit a lucky breakdown at this
    /// column; the subspace dimension was trimmed accordingly and the
    /// returned solution is exact up to round-off.
    pub lucky_breakdown: Option<usize>,
}

/// Solves `A x = b` by one sketched GMRES pass, updating `x` in place.
///
/// `x` carries the initial guess in and the solution out. On a
/// rank-deficient sketch the error carries the sketched residual and `x`
/// is left exactly as passed.
pub fn sgmres<R, O>(
    op: &O,
    b: &[R],
    x: &mut [R],
    params: &SgmresParams,
) -> Result<SgmresReport<R>, SolverError>
where
    R: Real,
    O: LinearOperator<R> + ?Sized,
{
    let n = op.dim();
    let (k, t) = (params.k, params.t);
    if k == 0 || k + 1 >= n {
        return Err(SolverErrorKind::SubspaceDimension { k, n }.into());
    }
    if t == 0 || t > k {
        return Err(SolverErrorKind::Truncation { t, k }.into());
    }
    if b.len() != n {
        return Err(SolverErrorKind::DimensionMismatch {
            operator_dim: n,
            vector_len: b.len(),
        }
        .into());
    }
    if x.len() != n {
        return Err(SolverErrorKind::DimensionMismatch {
            operator_dim: n,
            vector_len: x.len(),
        }
        .into());
    }

    let m = embedding_rows(k);
    let mut rng = seeded_rng(params.seed);

    let stage = Instant::now();
    let sketch = Sketch::build(params.sketch, k, n, &mut rng);
    log::debug!("sketch generation: {:.3?}", stage.elapsed());

    // Initial residual r = b - A x and its sketch.
    let mut r = vec![R::zero(); n];
    op.residual(x, b, &mut r);
    let r_norm = norm(&r);
    if r_norm < R::TOL {
        // Already solved; not an error.
        return Ok(SgmresReport {
            residual_estimate: r_norm,
            condition_estimate: R::one(),
            steps: 0,
            lucky_breakdown: None,
        });
    }

    let mut r_sketch = vec![R::zero(); m];
    sketch.apply_vec(&r, &mut r_sketch);
    // Saved copy: the residual estimate subtracts from it at the end, and
    // the rank-deficient path reports its norm.
    let r_sketch_saved = r_sketch.clone();

    // First basis vector v0 = r / ||r||.
    let mut v0 = r;
    scale(&mut v0, r_norm.recip());

    match params.mode {
        Mode::Standard => solve_standard(op, x, &sketch, &v0, k, t, m, r_sketch, r_sketch_saved),
        Mode::MemoryPriority => {
            solve_memory_priority(op, x, &sketch, &v0, k, t, m, r_sketch, r_sketch_saved)
        }
    }
}

/// Standard mode: V and W = A V are materialized, W is sketched in one
/// block product.
#[allow(clippy::too_many_arguments)]
fn solve_standard<R, O>(
    op: &O,
    x: &mut [R],
    sketch: &Sketch<R>,
    v0: &[R],
    k: usize,
    t: usize,
    m: usize,
    mut r_sketch: Vec<R>,
    r_sketch_saved: Vec<R>,
) -> Result<SgmresReport<R>, SolverError>
where
    R: Real,
    O: LinearOperator<R> + ?Sized,
{
    let n = v0.len();
    let mut basis = ColMat::zeros(n, k);
    copy(basis.col_mut(0), v0);
    let mut ls = ColMat::zeros(n, k);

    let stage = Instant::now();
    let outcome = truncated_arnoldi_full(op, &mut basis, t, |j, w| copy(ls.col_mut(j), w));
    let steps = outcome.steps();
    log::debug!("arnoldi ({steps} steps): {:.3?}", stage.elapsed());

    let stage = Instant::now();
    let mut sketched_ls = ColMat::zeros(m, steps);
    sketch.apply_mat(&ls, &mut sketched_ls, steps);
    log::debug!("sketch application: {:.3?}", stage.elapsed());

    let stage = Instant::now();
    let (coeffs, condition_estimate, residual_estimate) =
        solve_sketched_ls(&mut sketched_ls, &mut r_sketch, &r_sketch_saved)?;
    log::debug!("least-squares problem: {:.3?}", stage.elapsed());

    let stage = Instant::now();
    for j in 0..steps {
        axpy(x, basis.col(j), coeffs[j]);
    }
    log::debug!("solution update: {:.3?}", stage.elapsed());

    Ok(SgmresReport {
        residual_estimate,
        condition_estimate,
        steps,
        lucky_breakdown: breakdown_of(&outcome),
    })
}

/// Memory-priority mode: each product column is sketched the moment it is
/// formed — before orthogonalization, which decouples the sketched block
/// from the basis' loss of orthogonality — and the basis is regenerated for
/// the update.
#[allow(clippy::too_many_arguments)]
fn solve_memory_priority<R, O>(
    op: &O,
    x: &mut [R],
    sketch: &Sketch<R>,
    v0: &[R],
    k: usize,
    t: usize,
    m: usize,
    mut r_sketch: Vec<R>,
    r_sketch_saved: Vec<R>,
) -> Result<SgmresReport<R>, SolverError>
where
    R: Real,
    O: LinearOperator<R> + ?Sized,
{
    let n = v0.len();
    let mut sketched_ls = ColMat::zeros(m, k);

    let stage = Instant::now();
    let mut window = RollingWindow::new(n, t, v0);
    let outcome = window.run(
        op,
        k,
        true,
        |j, w| sketch.apply_vec(w, sketched_ls.col_mut(j)),
        |_, _| {},
    );
    let steps = outcome.steps();
    log::debug!(
        "arnoldi pass one + sketch application ({steps} steps): {:.3?}",
        stage.elapsed()
    );

    // A lucky breakdown leaves trailing zero columns behind; the QR works
    // on the populated block only.
    let mut sketched_ls = if steps == k {
        sketched_ls
    } else {
        let mut trimmed = ColMat::zeros(m, steps);
        for j in 0..steps {
            copy(trimmed.col_mut(j), sketched_ls.col(j));
        }
        trimmed
    };

    let stage = Instant::now();
    let (coeffs, condition_estimate, residual_estimate) =
        solve_sketched_ls(&mut sketched_ls, &mut r_sketch, &r_sketch_saved)?;
    log::debug!("least-squares problem: {:.3?}", stage.elapsed());

    // Second pass: regenerate the basis and fold each column into x as it
    // appears.
    let stage = Instant::now();
    let mut window = RollingWindow::new(n, t, v0);
    window.run(op, steps, false, |_, _| {}, |j, v| axpy(x, v, coeffs[j]));
    log::debug!("arnoldi pass two + solution update: {:.3?}", stage.elapsed());

    Ok(SgmresReport {
        residual_estimate,
        condition_estimate,
        steps,
        lucky_breakdown: breakdown_of(&outcome),
    })
}

fn breakdown_of(outcome: &ArnoldiOutcome) -> Option<usize> {
    match *outcome {
        ArnoldiOutcome::Completed { .. } => None,
        ArnoldiOutcome::LuckyBreakdown { steps } => Some(steps),
    }
}

/// Shared tail of both modes: factorize the sketched block, estimate its
/// conditioning, back-substitute, un-pivot, and compute the residual
/// estimate in the embedded space.
fn solve_sketched_ls<R: Real>(
    sketched_ls: &mut ColMat<R>,
    r_sketch: &mut [R],
    r_sketch_saved: &[R],
) -> Result<(Vec<R>, R, R), SolverError> {
    let steps = sketched_ls.ncols();
    let m = r_sketch.len();

    // Pivoted QR; the reflectors fold Q^T into the sketched residual.
    let qr = PivotedQr::factorize_with_side(sketched_ls, r_sketch)
        .map_err(|rd| rank_deficient(rd.step, r_sketch_saved))?;

    // Condition estimate from the pivoted diagonal.
    let mut dmin = sketched_ls.col(0)[0].abs();
    let mut dmax = dmin;
    for j in 1..steps {
        let d = sketched_ls.col(j)[j].abs();
        dmin = dmin.min(d);
        dmax = dmax.max(d);
    }
    let condition_estimate = dmax / dmin;

    // Back-substitution R y = (Q^T r_sketch)[0..steps], then un-pivot.
    let mut y = vec![R::zero(); steps];
    solve_upper(sketched_ls, &r_sketch[..steps], &mut y)
        .map_err(|rd| rank_deficient(rd.step, r_sketch_saved))?;
    let mut coeffs = vec![R::zero(); steps];
    unpermute(qr.perm(), &y, &mut coeffs);

    // Residual estimate: the fitted part of the sketched residual is
    // Q * (leading `steps` entries of Q^T r_sketch); what survives the
    // subtraction from the saved sketch is the least-squares defect.
    let mut fitted = vec![R::zero(); m];
    fitted[..steps].copy_from_slice(&r_sketch[..steps]);
    qr.apply_q(&mut fitted);
    let mut defect = r_sketch_saved.to_vec();
    for (d, f) in defect.iter_mut().zip(&fitted) {
        *d -= *f;
    }
    let residual_estimate = norm_seq(&defect);

    Ok((coeffs, condition_estimate, residual_estimate))
}

fn rank_deficient<R: Real>(step: usize, r_sketch_saved: &[R]) -> SolverError {
    SolverErrorKind::RankDeficientSketch {
        step,
        sketched_residual: norm_seq(r_sketch_saved).to_f64(),
    }
    .into()
}
