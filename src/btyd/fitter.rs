//! fitter — multi-restart maximum-likelihood driver for the model layer.
//!
//! Purpose
//! -------
//! Run the L-BFGS maximizer from several starting points and keep the best
//! result. Likelihood surfaces in this crate are smooth but not always
//! unimodal in θ-space, and individual runs can fail in the line search;
//! restarting from perturbed initials makes the fit robust to both.
//!
//! Key behaviors
//! -------------
//! - `fit_multi_start` performs `1 + extra_starts` runs: the first from the
//!   caller's initial guess mapped into θ-space, the rest from
//!   standard-normal perturbations of it.
//! - Failed runs are tolerated; only if every run fails is
//!   `AllRestartsFailed` surfaced, carrying the attempt count and the last
//!   underlying error.
//! - A `seed` makes the perturbation stream (and hence the fit)
//!   reproducible; `None` seeds from entropy.
//! - With `mle_opts.verbose`, each run reports its log-likelihood and
//!   termination on stderr.
//!
//! Conventions
//! -----------
//! - "Best" means highest log-likelihood `ℓ`; the returned scalar is the
//!   negative log-likelihood, matching the model layer's convention.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::btyd::core::params::ModelParams;
use crate::btyd::errors::{BtydError, BtydResult};
use crate::optimization::errors::OptError;
use crate::optimization::loglik_optimizer::{maximize, LogLikelihood, MLEOptions};

/// Configuration for the multi-restart driver.
///
/// - `mle_opts`: per-run optimizer configuration (tolerances, line search,
///   verbosity).
/// - `extra_starts`: number of perturbed restarts beyond the initial run.
/// - `seed`: seed for the perturbation stream; `None` draws from entropy.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    pub mle_opts: MLEOptions,
    pub extra_starts: usize,
    pub seed: Option<u64>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self { mle_opts: MLEOptions::default(), extra_starts: 2, seed: None }
    }
}

impl FitOptions {
    pub fn new(mle_opts: MLEOptions, extra_starts: usize, seed: Option<u64>) -> Self {
        Self { mle_opts, extra_starts, seed }
    }

    /// Convenience: default options with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed), ..Self::default() }
    }
}

/// Maximize `f` from `1 + extra_starts` starting points and return the
/// best parameters with their penalized negative log-likelihood.
///
/// # Errors
/// - [`BtydError::OptimizationFailed`] wrapping `AllRestartsFailed` when
///   no run produces a usable parameter vector.
pub fn fit_multi_start<F, P>(
    f: &F, data: &F::Data, initial: &P, opts: &FitOptions,
) -> BtydResult<(P, f64)>
where
    F: LogLikelihood,
    P: ModelParams,
{
    let theta0 = initial.to_theta();
    let mut rng = match opts.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let attempts = 1 + opts.extra_starts;
    let mut best: Option<(P, f64)> = None;
    let mut last_error: Option<String> = None;

    for run in 0..attempts {
        let start = if run == 0 {
            theta0.clone()
        } else {
            theta0.mapv(|t| t + rng.sample::<f64, _>(StandardNormal))
        };

        let outcome = match maximize(f, start, data, &opts.mle_opts) {
            Ok(outcome) => outcome,
            Err(err) => {
                if opts.mle_opts.verbose {
                    eprintln!("restart {run}/{attempts}: failed ({err})");
                }
                last_error = Some(err.to_string());
                continue;
            }
        };

        let params = match P::from_theta(&outcome.theta_hat) {
            Ok(params) => params,
            Err(err) => {
                if opts.mle_opts.verbose {
                    eprintln!("restart {run}/{attempts}: unusable optimum ({err})");
                }
                last_error = Some(err.to_string());
                continue;
            }
        };

        if opts.mle_opts.verbose {
            eprintln!(
                "restart {run}/{attempts}: log-likelihood {:.6}, {} iterations, {}",
                outcome.value, outcome.iterations, outcome.status
            );
        }
        if best.as_ref().map_or(true, |(_, v)| outcome.value > *v) {
            best = Some((params, outcome.value));
        }
    }

    match best {
        Some((params, value)) => Ok((params, -value)),
        None => Err(BtydError::from(OptError::AllRestartsFailed {
            attempts,
            last_error: last_error.unwrap_or_else(|| "no runs attempted".to_string()),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btyd::core::params::BgChurnParams;
    use crate::optimization::errors::OptResult;
    use crate::optimization::loglik_optimizer::{Cost, Theta, Tolerances};

    /// Concave toy likelihood `ℓ(θ) = -(θ - m)·(θ - m)` whose maximizer in
    /// parameter space is `exp(m)`.
    struct ThetaQuadratic {
        m: Theta,
    }

    impl LogLikelihood for ThetaQuadratic {
        type Data = ();

        fn value(&self, theta: &Theta, _data: &()) -> OptResult<Cost> {
            let diff = theta - &self.m;
            Ok(-diff.dot(&diff))
        }

        fn check(&self, _theta: &Theta, _data: &()) -> OptResult<()> {
            Ok(())
        }
    }

    /// Likelihood that rejects every evaluation, to exercise the
    /// all-restarts-failed path.
    struct AlwaysFails;

    impl LogLikelihood for AlwaysFails {
        type Data = ();

        fn value(&self, _theta: &Theta, _data: &()) -> OptResult<Cost> {
            Err(OptError::NonFiniteCost { value: f64::NAN })
        }

        fn check(&self, _theta: &Theta, _data: &()) -> OptResult<()> {
            Ok(())
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify the driver recovers the known optimum and that a fixed seed
    // makes repeated fits identical.
    //
    // Given
    // -----
    // - ℓ(θ) = -(θ - m)² with m = (ln 0.32, ln 0.85), two extra starts,
    //   seed 7.
    //
    // Expect
    // ------
    // - Parameters ≈ (0.32, 0.85); a second run with the same seed matches
    //   exactly.
    fn multi_start_recovers_optimum_and_is_reproducible() {
        // Arrange
        let f = ThetaQuadratic { m: ndarray::arr1(&[0.32_f64.ln(), 0.85_f64.ln()]) };
        let initial = BgChurnParams::new(1.0, 1.0).unwrap();
        let mut opts = FitOptions::seeded(7);
        opts.mle_opts.tols = Tolerances::new(Some(1e-10), None, Some(200)).unwrap();

        // Act
        let (params, nll) = fit_multi_start(&f, &(), &initial, &opts).unwrap();
        let (params_again, _) = fit_multi_start(&f, &(), &initial, &opts).unwrap();

        // Assert
        assert!((params.alpha - 0.32).abs() < 1e-4);
        assert!((params.beta - 0.85).abs() < 1e-4);
        assert!(nll.abs() < 1e-6);
        assert_eq!(params, params_again);
    }

    #[test]
    // Purpose
    // -------
    // Verify that when every restart fails the driver reports the attempt
    // count and last cause instead of a partial result.
    //
    // Given
    // -----
    // - A likelihood whose every evaluation errors, one extra start.
    //
    // Expect
    // ------
    // - BtydError::OptimizationFailed mentioning all restarts failing.
    fn multi_start_surfaces_total_failure() {
        // Arrange
        let initial = BgChurnParams::new(1.0, 1.0).unwrap();
        let opts = FitOptions { extra_starts: 1, ..FitOptions::seeded(3) };

        // Act
        let err = fit_multi_start(&AlwaysFails, &(), &initial, &opts).unwrap_err();

        // Assert
        match err {
            BtydError::OptimizationFailed { text } => {
                assert!(text.contains("2"), "attempt count in: {text}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
