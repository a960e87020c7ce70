//! bg — pure Beta-Geometric churn over discrete renewal periods.
//!
//! Purpose
//! -------
//! Each customer carries a churn probability `p ~ Beta(α, β)` tried once
//! per period; `frequency` records the number of periods survived, right-
//! censored at the observation age. A row with `x < T` churned in period
//! `x + 1`; a row with `x = T` was still active when observation ended,
//! which is why the two cases pick up different Beta exponents.
//!
//! Key behaviors
//! -------------
//! - The α shape may fall below one, driving the derived-quantity
//!   formulas through `B(α - 1, ·)`; those evaluations go through the
//!   sign-tracked continuation [`beta_safe`] / [`digamma_ext`].
//! - `expected_active_periods` is the expected number of periods survived
//!   within a horizon, with a closed-form parameter gradient for
//!   delta-method standard errors.
//! - `fit` rejects cohorts whose frequency exceeds the observation age.

use ndarray::{Array1, Array2};

use crate::btyd::core::data::CohortData;
use crate::btyd::core::fitted::Fitted;
use crate::btyd::core::params::{BgChurnParams, ModelParams};
use crate::btyd::errors::{BtydError, BtydResult};
use crate::btyd::fitter::{fit_multi_start, FitOptions};
use crate::btyd::models::{
    log_params_penalty, params_feasible, require_integer_count, require_integer_time,
    CohortModel,
};
use crate::inference::delta::delta_method_stderr;
use crate::optimization::errors::OptResult;
use crate::optimization::loglik_optimizer::{Cost, LogLikelihood, Theta};
use crate::optimization::numerical_stability::{beta_safe, digamma_ext};

/// Penalized negative log-likelihood of the cohort; `+inf` on infeasible
/// parameters.
pub fn neg_log_likelihood(
    params: &BgChurnParams, data: &CohortData, penalizer_coef: f64,
) -> f64 {
    let values = params.values();
    if !params_feasible(&values) {
        return f64::INFINITY;
    }
    let BgChurnParams { alpha: a, beta: b } = *params;
    let mut ll = 0.0;
    for i in 0..data.len() {
        let x = data.frequency[i];
        let churned = if x < data.age[i] { 1.0 } else { 0.0 };
        ll += data.weight(i) * beta_safe(a + churned, b + x).ln();
    }
    -ll + data.total_weight() * beta_safe(a, b).ln() + log_params_penalty(&values, penalizer_coef)
}

// ---- Derived quantities ----------------------------------------------------

/// Expected number of periods survived within a horizon of `t` periods.
pub fn expected_active_periods(params: &BgChurnParams, t: f64) -> BtydResult<f64> {
    let t = require_integer_time(t)? as f64;
    let BgChurnParams { alpha: a, beta: b } = *params;
    if t == 0.0 {
        return Ok(0.0);
    }
    if t == 1.0 {
        return Ok(beta_safe(a, b + 1.0) / beta_safe(a, b));
    }
    let num = t * beta_safe(a, b + t) + beta_safe(a - 1.0, b + 1.0)
        - beta_safe(a - 1.0, b + t)
        - (t - 1.0) * beta_safe(a, b + t);
    Ok(num / beta_safe(a, b))
}

/// `∂B(x, y)/∂x = B(x, y)(ψ(x) - ψ(x + y))`, valid down to `x > -1`.
fn beta_dx(x: f64, y: f64) -> f64 {
    beta_safe(x, y) * (digamma_ext(x) - digamma_ext(x + y))
}

/// `∂B(x, y)/∂y = B(x, y)(ψ(y) - ψ(x + y))`, valid down to `x > -1`.
fn beta_dy(x: f64, y: f64) -> f64 {
    beta_safe(x, y) * (digamma_ext(y) - digamma_ext(x + y))
}

/// Gradient of [`expected_active_periods`] in `(α, β)` order.
fn expected_active_periods_gradient(
    params: &BgChurnParams, t: f64,
) -> BtydResult<Array1<f64>> {
    let t = require_integer_time(t)? as f64;
    let BgChurnParams { alpha: a, beta: b } = *params;
    if t == 0.0 {
        return Ok(ndarray::arr1(&[0.0, 0.0]));
    }
    let denom = beta_safe(a, b);
    let num = if t == 1.0 {
        beta_safe(a, b + 1.0)
    } else {
        t * beta_safe(a, b + t) + beta_safe(a - 1.0, b + 1.0)
            - beta_safe(a - 1.0, b + t)
            - (t - 1.0) * beta_safe(a, b + t)
    };

    let (num_da, num_db) = if t == 1.0 {
        (beta_dx(a, b + 1.0), beta_dy(a, b + 1.0))
    } else {
        (
            t * beta_dx(a, b + t) + beta_dx(a - 1.0, b + 1.0)
                - beta_dx(a - 1.0, b + t)
                - (t - 1.0) * beta_dx(a, b + t),
            t * beta_dy(a, b + t) + beta_dy(a - 1.0, b + 1.0)
                - beta_dy(a - 1.0, b + t)
                - (t - 1.0) * beta_dy(a, b + t),
        )
    };

    let d_alpha = num_da / denom - num / denom.powi(2) * beta_dx(a, b);
    let d_beta = num_db / denom - num / denom.powi(2) * beta_dy(a, b);
    Ok(ndarray::arr1(&[d_alpha, d_beta]))
}

/// Delta-method standard error of [`expected_active_periods`] under a
/// 2×2 parameter covariance.
pub fn expected_active_periods_stderr(
    params: &BgChurnParams, t: f64, covariance: &Array2<f64>,
) -> BtydResult<f64> {
    let grad = expected_active_periods_gradient(params, t)?;
    Ok(delta_method_stderr(&grad, covariance)?)
}

/// `P(X(t) = n)`: probability of surviving exactly `n` of `t` periods.
pub fn probability_of_n_active_periods(
    params: &BgChurnParams, t: f64, n: f64,
) -> BtydResult<f64> {
    let t_int = require_integer_time(t)?;
    let n_int = require_integer_count(n)?;
    if t_int < n_int {
        return Err(BtydError::HorizonBeforeCount { t, n });
    }
    let BgChurnParams { alpha: a, beta: b } = *params;
    let n = n_int as f64;
    let num = if n_int == t_int {
        beta_safe(a, b + n)
    } else {
        beta_safe(a + 1.0, b + n)
    };
    Ok(num / beta_safe(a, b))
}

// ---- Model -----------------------------------------------------------------

/// Beta-Geometric churn model: configuration plus an optional fit.
#[derive(Debug, Clone, PartialEq)]
pub struct BgChurn {
    penalizer_coef: f64,
    fitted: Option<Fitted<BgChurnParams>>,
}

impl BgChurn {
    pub fn new(penalizer_coef: f64) -> Self {
        BgChurn { penalizer_coef, fitted: None }
    }

    pub fn expected_active_periods(&self, t: f64) -> BtydResult<f64> {
        expected_active_periods(self.fitted()?.params(), t)
    }

    pub fn expected_active_periods_stderr(
        &self, t: f64, covariance: &Array2<f64>,
    ) -> BtydResult<f64> {
        expected_active_periods_stderr(self.fitted()?.params(), t, covariance)
    }

    pub fn probability_of_n_active_periods(&self, t: f64, n: f64) -> BtydResult<f64> {
        probability_of_n_active_periods(self.fitted()?.params(), t, n)
    }
}

impl LogLikelihood for BgChurn {
    type Data = CohortData;

    fn value(&self, theta: &Theta, data: &CohortData) -> OptResult<Cost> {
        match BgChurnParams::from_theta(theta) {
            Ok(params) => Ok(-neg_log_likelihood(&params, data, self.penalizer_coef)),
            Err(_) => Ok(f64::NEG_INFINITY),
        }
    }

    fn check(&self, _theta: &Theta, _data: &CohortData) -> OptResult<()> {
        Ok(())
    }
}

impl CohortModel for BgChurn {
    type Params = BgChurnParams;

    fn fresh(&self) -> Self {
        BgChurn::new(self.penalizer_coef)
    }

    fn fit(
        &mut self, data: &CohortData, initial: Option<BgChurnParams>, opts: &FitOptions,
    ) -> BtydResult<()> {
        data.require_frequency_within_age()?;
        let initial = initial.unwrap_or_else(BgChurnParams::default_initial);
        let (params, nll) = fit_multi_start(self, data, &initial, opts)?;
        self.fitted = Some(Fitted::new(params, nll, data.clone()));
        Ok(())
    }

    fn fitted(&self) -> BtydResult<&Fitted<BgChurnParams>> {
        self.fitted.as_ref().ok_or(BtydError::ModelNotFitted)
    }

    fn neg_log_likelihood_at(
        &self, params: &BgChurnParams, data: &CohortData,
    ) -> BtydResult<f64> {
        Ok(neg_log_likelihood(params, data, self.penalizer_coef))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// α below one so the B(α - 1, ·) continuations are exercised.
    fn reference_params() -> BgChurnParams {
        BgChurnParams::new(0.32, 0.85).unwrap()
    }

    #[test]
    // Purpose
    // -------
    // Verify the count distribution telescopes to a proper pmf and its
    // mean reproduces the closed-form expectation, including the
    // negative-argument Beta continuation.
    //
    // Given
    // -----
    // - α = 0.32 (< 1), β = 0.85, horizon t = 5.
    //
    // Expect
    // ------
    // - Σ_{n=0}^{5} P(n) = 1 exactly; Σ n·P(n) equals
    //   expected_active_periods(5) to 1e-10.
    fn count_distribution_matches_expected_periods() {
        // Arrange
        let params = reference_params();
        let t = 5.0;

        // Act
        let mut total = 0.0;
        let mut mean = 0.0;
        for n in 0..=5u64 {
            let p = probability_of_n_active_periods(&params, t, n as f64).unwrap();
            total += p;
            mean += n as f64 * p;
        }

        // Assert
        assert!((total - 1.0).abs() < 1e-10, "pmf total {total}");
        let expected = expected_active_periods(&params, t).unwrap();
        assert!((mean - expected).abs() < 1e-10, "{mean} vs {expected}");
    }

    #[test]
    // Purpose
    // -------
    // Verify the analytic expectation gradient against central finite
    // differences through the Beta continuations.
    //
    // Given
    // -----
    // - Reference parameters, t = 6, h = 1e-6.
    //
    // Expect
    // ------
    // - Both partials match finite differences to 1e-5 relative.
    fn expectation_gradient_matches_finite_differences() {
        // Arrange
        let params = reference_params();
        let t = 6.0;
        let h = 1e-6;

        // Act
        let grad = expected_active_periods_gradient(&params, t).unwrap();

        // Assert
        let e =
            |a: f64, b: f64| expected_active_periods(&BgChurnParams::new(a, b).unwrap(), t).unwrap();
        let fd_a = (e(0.32 + h, 0.85) - e(0.32 - h, 0.85)) / (2.0 * h);
        let fd_b = (e(0.32, 0.85 + h) - e(0.32, 0.85 - h)) / (2.0 * h);
        assert!((grad[0] - fd_a).abs() / fd_a.abs().max(1.0) < 1e-5, "{} vs {fd_a}", grad[0]);
        assert!((grad[1] - fd_b).abs() / fd_b.abs().max(1.0) < 1e-5, "{} vs {fd_b}", grad[1]);
    }

    #[test]
    // Purpose
    // -------
    // Verify censoring in the likelihood: a censored row (x = T) and a
    // churned row (x < T) use different Beta exponents.
    //
    // Given
    // -----
    // - Rows (x = 3, T = 3) and (x = 3, T = 5).
    //
    // Expect
    // ------
    // - Row terms B(α, β+3) vs B(α+1, β+3); nll difference matches their
    //   log ratio.
    fn censored_and_churned_rows_differ() {
        // Arrange
        let params = reference_params();
        let censored =
            CohortData::contractual(array![3.0], array![3.0], None).unwrap();
        let churned =
            CohortData::contractual(array![3.0], array![5.0], None).unwrap();

        // Act
        let diff = neg_log_likelihood(&params, &censored, 0.0)
            - neg_log_likelihood(&params, &churned, 0.0);

        // Assert
        let expected =
            -(beta_safe(0.32, 0.85 + 3.0).ln() - beta_safe(1.32, 0.85 + 3.0).ln());
        assert!((diff - expected).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Verify fit preconditions and discrete-entry validation.
    //
    // Given
    // -----
    // - A cohort with frequency above age; a fractional horizon; a count
    //   beyond the horizon.
    //
    // Expect
    // ------
    // - FrequencyExceedsAge from fit; NonIntegerTime; HorizonBeforeCount.
    fn preconditions_and_validation() {
        // Arrange
        let params = reference_params();
        let bad = CohortData::contractual(array![7.0], array![5.0], None).unwrap();
        let mut model = BgChurn::new(0.0);

        // Act & Assert
        let err = model.fit(&bad, None, &FitOptions::seeded(1)).unwrap_err();
        assert_eq!(err, BtydError::FrequencyExceedsAge { index: 0, frequency: 7.0, age: 5.0 });

        assert_eq!(
            expected_active_periods(&params, 2.5).unwrap_err(),
            BtydError::NonIntegerTime { value: 2.5 }
        );
        assert_eq!(
            probability_of_n_active_periods(&params, 2.0, 4.0).unwrap_err(),
            BtydError::HorizonBeforeCount { t: 2.0, n: 4.0 }
        );
    }
}
