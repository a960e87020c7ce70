//! models — the probabilistic customer-behavior families.
//!
//! Purpose
//! -------
//! One module per model family, each exposing the same three layers:
//!
//! 1. A raw penalized negative log-likelihood function over typed
//!    parameters and a [`CohortData`], returning `+inf` on infeasible
//!    parameter values so optimizers and scans can probe freely.
//! 2. A model struct implementing [`LogLikelihood`] in the optimizer's
//!    unconstrained θ-space and [`CohortModel`] for fitting.
//! 3. Derived quantities (expected transactions, alive probabilities,
//!    count distributions) as free functions over parameters, mirrored as
//!    methods on the fitted model, with delta-method standard errors where
//!    a closed-form gradient exists.
//!
//! Families
//! --------
//! - [`pareto_nbd`]: continuous-time Pareto/NBD.
//! - [`beta_geo`]: continuous-time BG/NBD.
//! - [`modified_beta_geo`]: MBG/NBD (dropout possible before any
//!   purchase).
//! - [`bgbb`]: discrete-time BG/BB.
//! - [`conversion`]: BG/BB/BG conversion models, plain and with an
//!   instant-conversion point mass.
//! - [`bg`]: pure Beta-Geometric churn.
//! - [`gamma_gamma`]: Gamma-Gamma average spend.
//!
//! Conventions
//! -----------
//! - Row weights are multiplicities; every likelihood sums
//!   `w_i · ll_row_i`.
//! - The penalizer adds `coef · Σ ln(param)` to the negative
//!   log-likelihood, discouraging runaway parameter growth.
//! - Discrete-time entry points accept `f64` horizons/counts and validate
//!   integrality, so cohort columns can be passed through unchanged.

pub mod bg;
pub mod beta_geo;
pub mod bgbb;
pub mod conversion;
pub mod gamma_gamma;
pub mod modified_beta_geo;
pub mod pareto_nbd;

use ndarray::Array1;

use crate::btyd::core::data::CohortData;
use crate::btyd::core::fitted::Fitted;
use crate::btyd::core::params::ModelParams;
use crate::btyd::errors::{BtydError, BtydResult};
use crate::btyd::fitter::FitOptions;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::beta_geo::BetaGeo;
pub use self::bg::BgChurn;
pub use self::bgbb::Bgbb;
pub use self::conversion::{BgbbBg, BgbbBgExt};
pub use self::gamma_gamma::GammaGamma;
pub use self::modified_beta_geo::ModifiedBetaGeo;
pub use self::pareto_nbd::ParetoNbd;

/// Uniform fitting interface over the model families.
///
/// A model value is a configuration (penalizer coefficient) plus an
/// optional fit result; `fit` replaces the result rather than mutating
/// it. `fresh` clones the configuration without the result, which is what
/// simulation-based validation needs for refits.
pub trait CohortModel: Sized {
    type Params: ModelParams;

    /// New unfitted model with the same configuration.
    fn fresh(&self) -> Self;

    /// Maximum-likelihood fit on `data`, optionally from a caller-chosen
    /// starting point.
    fn fit(
        &mut self, data: &CohortData, initial: Option<Self::Params>, opts: &FitOptions,
    ) -> BtydResult<()>;

    /// The stored fit, or [`BtydError::ModelNotFitted`].
    fn fitted(&self) -> BtydResult<&Fitted<Self::Params>>;

    /// Penalized negative log-likelihood of `params` on `data`, using the
    /// model's penalizer coefficient.
    fn neg_log_likelihood_at(&self, params: &Self::Params, data: &CohortData)
        -> BtydResult<f64>;
}

// ---- Shared likelihood helpers ---------------------------------------------

/// True when every raw parameter is finite and strictly positive.
///
/// The typed constructors already guarantee this, but the raw likelihood
/// functions accept field-initialized structs too, and return `+inf`
/// rather than panicking on a bad region.
pub(crate) fn params_feasible(values: &Array1<f64>) -> bool {
    values.iter().all(|&v| v.is_finite() && v > 0.0)
}

/// Penalizer term `coef · Σ ln(param_i)` added to the negative
/// log-likelihood.
pub(crate) fn log_params_penalty(values: &Array1<f64>, coef: f64) -> f64 {
    if coef == 0.0 {
        return 0.0;
    }
    coef * values.mapv(f64::ln).sum()
}

/// Validate a discrete-time horizon supplied as `f64`.
pub(crate) fn require_integer_time(t: f64) -> BtydResult<u64> {
    if t < 0.0 || !t.is_finite() || t.fract() != 0.0 {
        return Err(BtydError::NonIntegerTime { value: t });
    }
    Ok(t as u64)
}

/// Validate a transaction count supplied as `f64`.
pub(crate) fn require_integer_count(n: f64) -> BtydResult<u64> {
    if n < 0.0 || !n.is_finite() || n.fract() != 0.0 {
        return Err(BtydError::NonIntegerCount { value: n });
    }
    Ok(n as u64)
}

/// Population standard deviation of a quantity evaluated over a list of
/// resampled parameter sets.
pub(crate) fn resampled_std<P, Q>(params_list: &[P], quantity: Q) -> BtydResult<f64>
where
    Q: Fn(&P) -> f64,
{
    if params_list.is_empty() {
        return Err(BtydError::EmptyParamsList);
    }
    let values: Vec<f64> = params_list.iter().map(&quantity).collect();
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Ok(var.sqrt())
}
