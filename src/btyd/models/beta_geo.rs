//! beta_geo — continuous-time BG/NBD transaction model.
//!
//! Purpose
//! -------
//! While alive, a customer transacts as a Poisson process with rate `λ ~
//! Gamma(r, α)`; immediately after each transaction they drop out with
//! probability `p ~ Beta(a, b)`. Dropout can only happen at transaction
//! times, which is what separates this family from Pareto/NBD and gives
//! zero-frequency customers an alive probability of one.
//!
//! Key behaviors
//! -------------
//! - The dying-at-recency branch of the row likelihood exists only for
//!   `x > 0`; zero-frequency rows use the survival branch alone.
//! - Expected-transaction curves go through the Gauss hypergeometric
//!   series; the count distribution `P(N(t) = n)` is evaluated in log
//!   space with an incremental Poisson-tail sum.

use ndarray::{Array1, Array2};
use statrs::function::beta::ln_beta;
use statrs::function::gamma::ln_gamma;

use crate::btyd::core::data::CohortData;
use crate::btyd::core::fitted::Fitted;
use crate::btyd::core::params::{BetaGeoParams, ModelParams};
use crate::btyd::errors::{BtydError, BtydResult};
use crate::btyd::fitter::{fit_multi_start, FitOptions};
use crate::btyd::models::{
    log_params_penalty, params_feasible, require_integer_count, CohortModel,
};
use crate::optimization::errors::OptResult;
use crate::optimization::loglik_optimizer::{Cost, LogLikelihood, Theta};
use crate::optimization::numerical_stability::{hyp2f1, log_add_exp};

fn row_log_likelihood(params: &BetaGeoParams, x: f64, t_x: f64, t: f64) -> f64 {
    let BetaGeoParams { r, alpha, a, b } = *params;
    let a_1 = ln_gamma(r + x) - ln_gamma(r) + r * alpha.ln();
    let a_2 =
        ln_gamma(a + b) + ln_gamma(b + x) - ln_gamma(b) - ln_gamma(a + b + x);
    let a_3 = -(r + x) * (alpha + t).ln();
    let combined = if x > 0.0 {
        let a_4 = a.ln() - (b + x - 1.0).ln() - (r + x) * (t_x + alpha).ln();
        log_add_exp(a_3, a_4)
    } else {
        a_3
    };
    a_1 + a_2 + combined
}

/// Penalized negative log-likelihood of the cohort; `+inf` on infeasible
/// parameters.
pub fn neg_log_likelihood(params: &BetaGeoParams, data: &CohortData, penalizer_coef: f64) -> f64 {
    let values = params.values();
    if !params_feasible(&values) {
        return f64::INFINITY;
    }
    let mut ll = 0.0;
    for i in 0..data.len() {
        ll += data.weight(i)
            * row_log_likelihood(params, data.frequency[i], data.recency[i], data.age[i]);
    }
    -ll + log_params_penalty(&values, penalizer_coef)
}

// ---- Derived quantities ----------------------------------------------------

/// Expected repeat transactions of a new customer in `[0, t]`.
pub fn expected_purchases(params: &BetaGeoParams, t: f64) -> f64 {
    let BetaGeoParams { r, alpha, a, b } = *params;
    let hyp = hyp2f1(r, b, a + b - 1.0, t / (alpha + t));
    (a + b - 1.0) / (a - 1.0) * (1.0 - hyp * (alpha / (alpha + t)).powf(r))
}

/// Expected transactions in `(T, T + t]` for a customer observed as
/// `(x, t_x, T)`.
pub fn conditional_expected_purchases(
    params: &BetaGeoParams, t: f64, x: f64, t_x: f64, t_age: f64,
) -> f64 {
    let BetaGeoParams { r, alpha, a, b } = *params;
    let hyp = hyp2f1(r + x, b + x, a + b + x - 1.0, t / (alpha + t_age + t));
    let first = (a + b + x - 1.0) / (a - 1.0);
    let numerator =
        first * (1.0 - hyp * ((alpha + t_age) / (alpha + t_age + t)).powf(r + x));
    numerator / alive_denominator(params, x, t_x, t_age)
}

fn alive_denominator(params: &BetaGeoParams, x: f64, t_x: f64, t_age: f64) -> f64 {
    let BetaGeoParams { r, alpha, a, b } = *params;
    if x > 0.0 {
        1.0 + a / (b + x - 1.0) * ((alpha + t_age) / (alpha + t_x)).powf(r + x)
    } else {
        1.0
    }
}

/// `P(alive | x, t_x, T)`; exactly one for zero-frequency customers.
pub fn conditional_probability_alive(
    params: &BetaGeoParams, x: f64, t_x: f64, t_age: f64,
) -> f64 {
    1.0 / alive_denominator(params, x, t_x, t_age)
}

/// Alive probabilities on the `(recency, frequency)` grid up to
/// `(max_recency, max_frequency)`, with the horizon fixed at
/// `max_recency`.
pub fn probability_alive_matrix(
    params: &BetaGeoParams, max_frequency: u64, max_recency: u64,
) -> Array2<f64> {
    let rows = (max_recency + 1) as usize;
    let cols = (max_frequency + 1) as usize;
    Array2::from_shape_fn((rows, cols), |(i, j)| {
        conditional_probability_alive(params, j as f64, i as f64, max_recency as f64)
    })
}

/// `P(N(t) = n)` for a brand-new customer. `n` is validated as a whole
/// number so cohort columns can be passed through unchanged.
pub fn probability_of_n_purchases_up_to_time(
    params: &BetaGeoParams, t: f64, n: f64,
) -> BtydResult<f64> {
    let n = require_integer_count(n)? as f64;
    let BetaGeoParams { r, alpha, a, b } = *params;
    let ln_denom = ln_beta(a, b);
    let zt = t / (alpha + t);

    let first = (ln_beta(a, b + n) - ln_denom + ln_gamma(r + n) - ln_gamma(r)
        - ln_gamma(n + 1.0)
        + r * (alpha / (alpha + t)).ln()
        + n * zt.ln())
    .exp();

    if n == 0.0 {
        return Ok(first);
    }

    // Σ_{j=0}^{n-1} Γ(r+j) / (Γ(r) j!) · z^j, built incrementally.
    let mut term = 1.0;
    let mut tail = 1.0;
    for j in 0..(n as usize - 1) {
        let jf = j as f64;
        term *= (r + jf) / (jf + 1.0) * zt;
        tail += term;
    }
    let second = (ln_beta(a + 1.0, b + n - 1.0) - ln_denom).exp()
        * (1.0 - (alpha / (alpha + t)).powf(r) * tail);
    Ok(first + second)
}

// ---- Model -----------------------------------------------------------------

/// BG/NBD model: configuration plus an optional fit.
#[derive(Debug, Clone, PartialEq)]
pub struct BetaGeo {
    penalizer_coef: f64,
    fitted: Option<Fitted<BetaGeoParams>>,
}

impl BetaGeo {
    pub fn new(penalizer_coef: f64) -> Self {
        BetaGeo { penalizer_coef, fitted: None }
    }

    pub fn expected_purchases(&self, t: f64) -> BtydResult<f64> {
        Ok(expected_purchases(self.fitted()?.params(), t))
    }

    pub fn conditional_expected_purchases(
        &self, t: f64, x: f64, t_x: f64, t_age: f64,
    ) -> BtydResult<f64> {
        Ok(conditional_expected_purchases(self.fitted()?.params(), t, x, t_x, t_age))
    }

    pub fn conditional_probability_alive(
        &self, x: f64, t_x: f64, t_age: f64,
    ) -> BtydResult<f64> {
        Ok(conditional_probability_alive(self.fitted()?.params(), x, t_x, t_age))
    }

    pub fn probability_of_n_purchases_up_to_time(&self, t: f64, n: f64) -> BtydResult<f64> {
        probability_of_n_purchases_up_to_time(self.fitted()?.params(), t, n)
    }

    /// Per-row alive probabilities over the training cohort.
    pub fn probability_alive(&self) -> BtydResult<Array1<f64>> {
        let fitted = self.fitted()?;
        let data = fitted.data();
        Ok(Array1::from_shape_fn(data.len(), |i| {
            conditional_probability_alive(
                fitted.params(),
                data.frequency[i],
                data.recency[i],
                data.age[i],
            )
        }))
    }

    /// Alive-probability grid spanning the training cohort's observed
    /// frequency and recency ranges.
    pub fn probability_alive_matrix(&self) -> BtydResult<Array2<f64>> {
        let fitted = self.fitted()?;
        let max_frequency = fitted.data().max_frequency() as u64;
        let max_recency = fitted.data().max_age() as u64;
        Ok(probability_alive_matrix(fitted.params(), max_frequency, max_recency))
    }
}

impl LogLikelihood for BetaGeo {
    type Data = CohortData;

    fn value(&self, theta: &Theta, data: &CohortData) -> OptResult<Cost> {
        match BetaGeoParams::from_theta(theta) {
            Ok(params) => Ok(-neg_log_likelihood(&params, data, self.penalizer_coef)),
            Err(_) => Ok(f64::NEG_INFINITY),
        }
    }

    fn check(&self, _theta: &Theta, _data: &CohortData) -> OptResult<()> {
        Ok(())
    }
}

impl CohortModel for BetaGeo {
    type Params = BetaGeoParams;

    fn fresh(&self) -> Self {
        BetaGeo::new(self.penalizer_coef)
    }

    fn fit(
        &mut self, data: &CohortData, initial: Option<BetaGeoParams>, opts: &FitOptions,
    ) -> BtydResult<()> {
        let initial = initial.unwrap_or_else(BetaGeoParams::default_initial);
        let (params, nll) = fit_multi_start(self, data, &initial, opts)?;
        self.fitted = Some(Fitted::new(params, nll, data.clone()));
        Ok(())
    }

    fn fitted(&self) -> BtydResult<&Fitted<BetaGeoParams>> {
        self.fitted.as_ref().ok_or(BtydError::ModelNotFitted)
    }

    fn neg_log_likelihood_at(
        &self, params: &BetaGeoParams, data: &CohortData,
    ) -> BtydResult<f64> {
        Ok(neg_log_likelihood(params, data, self.penalizer_coef))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Published CDNOW estimates from the original BG/NBD paper.
    fn reference_params() -> BetaGeoParams {
        BetaGeoParams::new(0.243, 4.414, 0.793, 2.426).unwrap()
    }

    #[test]
    // Purpose
    // -------
    // Verify the count distribution is a proper pmf and consistent with
    // the expected-value curve.
    //
    // Given
    // -----
    // - Reference parameters, t = 10, counts 0..400.
    //
    // Expect
    // ------
    // - Probabilities sum to 1; Σ n·P(n) matches E[N(t)] from the
    //   hypergeometric formula.
    fn count_distribution_is_consistent_with_mean() {
        // Arrange
        let params = reference_params();
        let t = 10.0;

        // Act
        let mut total = 0.0;
        let mut mean = 0.0;
        for n in 0..400u64 {
            let p = probability_of_n_purchases_up_to_time(&params, t, n as f64).unwrap();
            total += p;
            mean += n as f64 * p;
        }

        // Assert
        assert!((total - 1.0).abs() < 1e-8, "pmf total {total}");
        let expected = expected_purchases(&params, t);
        assert!((mean - expected).abs() < 1e-6, "{mean} vs {expected}");
    }

    #[test]
    // Purpose
    // -------
    // Verify the zero-frequency conventions: alive probability one and a
    // survival-only likelihood branch.
    //
    // Given
    // -----
    // - x = 0 rows with differing recency (recency must be irrelevant).
    //
    // Expect
    // ------
    // - P(alive) = 1; identical row likelihood regardless of recency.
    fn zero_frequency_customers_are_alive() {
        // Arrange
        let params = reference_params();

        // Act & Assert
        assert_eq!(conditional_probability_alive(&params, 0.0, 0.0, 30.0), 1.0);
        let ll_a = row_log_likelihood(&params, 0.0, 0.0, 30.0);
        let ll_b = row_log_likelihood(&params, 0.0, 11.0, 30.0);
        assert_eq!(ll_a, ll_b);
    }

    #[test]
    // Purpose
    // -------
    // Verify feasibility and weighting conventions of the evaluator.
    //
    // Given
    // -----
    // - A negative dropout shape, then a weight-3 row vs three copies.
    //
    // Expect
    // ------
    // - +inf for the bad parameters; weighted and expanded likelihoods
    //   agree.
    fn nll_conventions_hold() {
        // Arrange
        let data = CohortData::new(
            array![2.0, 0.0],
            array![20.0, 0.0],
            array![38.0, 38.0],
            None,
            None,
            None,
        )
        .unwrap();
        let bad = BetaGeoParams { r: 0.2, alpha: 4.4, a: -0.8, b: 2.4 };
        assert_eq!(neg_log_likelihood(&bad, &data, 0.0), f64::INFINITY);

        let weighted = CohortData::new(
            array![1.0],
            array![14.0],
            array![38.0],
            None,
            None,
            Some(array![3]),
        )
        .unwrap();
        let expanded = CohortData::new(
            array![1.0, 1.0, 1.0],
            array![14.0, 14.0, 14.0],
            array![38.0, 38.0, 38.0],
            None,
            None,
            None,
        )
        .unwrap();

        // Act & Assert
        let params = reference_params();
        let a = neg_log_likelihood(&params, &weighted, 0.01);
        let b = neg_log_likelihood(&params, &expanded, 0.01);
        assert!((a - b).abs() < 1e-10);
    }

    #[test]
    // Purpose
    // -------
    // Verify the alive-probability matrix layout and its zero-frequency
    // column.
    //
    // Given
    // -----
    // - max_frequency 3, max_recency 5.
    //
    // Expect
    // ------
    // - Shape (6, 4); entries match the scalar function; the
    //   zero-frequency column is exactly one everywhere.
    fn alive_matrix_matches_scalar_function() {
        // Arrange
        let params = reference_params();

        // Act
        let z = probability_alive_matrix(&params, 3, 5);

        // Assert
        assert_eq!(z.dim(), (6, 4));
        let direct = conditional_probability_alive(&params, 2.0, 4.0, 5.0);
        assert!((z[(4, 2)] - direct).abs() < 1e-12);
        for i in 0..6 {
            assert_eq!(z[(i, 0)], 1.0);
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify ordering of conditional expectations: more past purchases
    // and fresher recency both raise the forecast.
    //
    // Given
    // -----
    // - Customers (5, 35, 38) and (1, 10, 38); horizon 39.
    //
    // Expect
    // ------
    // - Both forecasts positive, heavy-recent customer strictly higher;
    //   non-integer counts rejected by the pmf entry point.
    fn conditional_forecast_orders_customers() {
        // Arrange
        let params = reference_params();

        // Act
        let heavy = conditional_expected_purchases(&params, 39.0, 5.0, 35.0, 38.0);
        let light = conditional_expected_purchases(&params, 39.0, 1.0, 10.0, 38.0);

        // Assert
        assert!(light > 0.0);
        assert!(heavy > light);
        let err = probability_of_n_purchases_up_to_time(&params, 10.0, 1.5).unwrap_err();
        assert_eq!(err, BtydError::NonIntegerCount { value: 1.5 });
    }
}
