//! High-level entry point for maximizing a `LogLikelihood`.
//!
//! This selects an L-BFGS solver with either Hager–Zhang or More–Thuente line
//! search, wraps the model in an `ArgMinAdapter` (which *minimizes* `-ℓ(θ)`),
//! and delegates the run to `run_lbfgs`.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        OptimOutcome, Theta,
        adapter::ArgMinAdapter,
        builders::{build_optimizer_hager_zhang, build_optimizer_more_thuente},
        run::run_lbfgs,
        traits::{LineSearcher, LogLikelihood, MLEOptions},
    },
};

/// Maximize a log-likelihood `ℓ(θ)` using L-BFGS with the chosen line search.
///
/// # Behavior
/// - Validates the initial guess via `f.check(theta0, data)`.
/// - Wraps `(f, data)` in an `ArgMinAdapter` that exposes a *minimization*
///   problem `c(θ) = -ℓ(θ)` to `argmin`.
/// - Builds an L-BFGS solver with either **Hager–Zhang** or **More–Thuente**
///   line search based on `opts.line_searcher`.
/// - Calls `run_lbfgs`, which configures the executor (initial params,
///   max iters) and returns an `OptimOutcome`.
///
/// # Parameters
/// - `f`: Your model implementing [`LogLikelihood`].
/// - `theta0`: Initial parameter vector (unconstrained space).
/// - `data`: Model data passed through to `value`/`grad`.
/// - `opts`: Optimizer options (tolerances, line search choice, etc.).
///
/// # Errors
/// - Propagates any error from `f.check`.
/// - Propagates builder errors from `build_optimizer_*`.
/// - Propagates runtime errors from `run_lbfgs` (e.g., line search failures).
///
/// # Returns
/// An [`OptimOutcome`] containing `theta_hat`, best value `ℓ(θ̂)`,
/// termination status, iteration counts, function evaluation counts, and
/// optionally the gradient norm.
pub fn maximize<F: LogLikelihood>(
    f: &F, theta0: Theta, data: &F::Data, opts: &MLEOptions,
) -> OptResult<OptimOutcome> {
    f.check(&theta0, data)?;
    let problem = ArgMinAdapter::new(f, data);
    match opts.line_searcher {
        LineSearcher::MoreThuente => {
            let solver = build_optimizer_more_thuente(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
        LineSearcher::HagerZhang => {
            let solver = build_optimizer_hager_zhang(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::{
        errors::OptError,
        loglik_optimizer::{Cost, Tolerances},
    };
    use ndarray::array;

    /// `ℓ(θ) = -(θ - m)·(θ - m)` with a known maximizer `m`.
    struct ShiftedQuadratic;

    impl LogLikelihood for ShiftedQuadratic {
        type Data = Theta;

        fn value(&self, theta: &Theta, m: &Theta) -> crate::optimization::errors::OptResult<Cost> {
            let diff = theta - m;
            Ok(-diff.dot(&diff))
        }

        fn check(
            &self, theta: &Theta, m: &Theta,
        ) -> crate::optimization::errors::OptResult<()> {
            if theta.len() != m.len() {
                return Err(OptError::GradientDimMismatch {
                    expected: m.len(),
                    found: theta.len(),
                });
            }
            Ok(())
        }
    }

    #[test]
    // Purpose
    // -------
    // End-to-end sanity check of `maximize` on a concave quadratic: the
    // solver should recover the known maximizer with both line searches.
    //
    // Given
    // -----
    // - `ℓ(θ) = -(θ - m)·(θ - m)` with m = (1.5, -0.5) and θ0 = 0.
    //
    // Expect
    // ------
    // - `theta_hat ≈ m`, value ≈ 0, for HagerZhang and MoreThuente.
    fn maximize_recovers_quadratic_maximizer() {
        // Arrange
        let f = ShiftedQuadratic;
        let m = array![1.5, -0.5];
        let tols = Tolerances::new(Some(1e-8), None, Some(200)).expect("valid tolerances");

        for ls in [LineSearcher::HagerZhang, LineSearcher::MoreThuente] {
            let opts = MLEOptions::new(tols, ls, false, None).expect("valid options");

            // Act
            let out = maximize(&f, Theta::zeros(2), &m, &opts).expect("maximize should succeed");

            // Assert
            assert!((out.theta_hat[0] - 1.5).abs() < 1e-4, "line search {ls:?}");
            assert!((out.theta_hat[1] + 0.5).abs() < 1e-4, "line search {ls:?}");
            assert!(out.value.abs() < 1e-6);
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify that `maximize` surfaces `check` failures before running the
    // solver.
    //
    // Given
    // -----
    // - A θ0 whose length disagrees with the data vector.
    //
    // Expect
    // ------
    // - The check error is returned unchanged.
    fn maximize_propagates_check_errors() {
        // Arrange
        let f = ShiftedQuadratic;
        let m = array![1.0, 2.0, 3.0];
        let opts = MLEOptions::default();

        // Act
        let res = maximize(&f, Theta::zeros(2), &m, &opts);

        // Assert
        assert!(matches!(res, Err(OptError::GradientDimMismatch { expected: 3, found: 2 })));
    }
}
