//! bgbb — discrete-time BG/BB transaction model.
//!
//! Purpose
//! -------
//! Customers live on a discrete clock of opportunities. While alive, a
//! customer transacts at each opportunity with probability `p ~
//! Beta(α, β)` and drops out between opportunities with probability `θ ~
//! Beta(γ, δ)`. A `(x, t_x, T)` row (active periods, last active period,
//! opportunities observed) has a closed-form likelihood as a sum of
//! `T - t_x + 1` Beta-function products.
//!
//! Key behaviors
//! -------------
//! - Row likelihoods are accumulated in log space; the death-period sum
//!   runs over `i = 0 .. T - t_x - 1`.
//! - The analytic gradient normalizes each digamma-weighted term by the
//!   row's log numerator (`u_j = exp(term_j - ln num)`), so the weights
//!   stay in `[0, 1]` regardless of scale, and includes the penalizer
//!   contribution `coef / param`.
//! - Rows must satisfy `x ≤ t_x ≤ T`; `fit` rejects cohorts violating
//!   `x ≤ T` up front.
//! - Discrete horizons and counts arrive as `f64` and are validated as
//!   whole numbers.

use ndarray::{Array1, Array2};
use statrs::function::beta::ln_beta;
use statrs::function::gamma::{digamma, ln_gamma};

use crate::btyd::core::data::CohortData;
use crate::btyd::core::fitted::Fitted;
use crate::btyd::core::params::{BgbbParams, ModelParams};
use crate::btyd::errors::{BtydError, BtydResult};
use crate::btyd::fitter::{fit_multi_start, FitOptions};
use crate::btyd::models::{
    log_params_penalty, params_feasible, require_integer_count, require_integer_time,
    CohortModel,
};
use crate::inference::delta::delta_method_stderr;
use crate::optimization::errors::{OptError, OptResult};
use crate::optimization::loglik_optimizer::{Cost, Grad, LogLikelihood, Theta};
use crate::optimization::numerical_stability::{ln_binom, log_add_exp};

/// Log magnitudes of the numerator terms for one `(x, t_x, T)` row.
///
/// Index 0 is the survived-to-`T` term; the rest cover death in period
/// `t_x + i + 1`.
fn row_log_terms(params: &BgbbParams, x: f64, t_x: f64, t: f64) -> Vec<f64> {
    let BgbbParams { alpha: a, beta: b, gamma: g, delta: d } = *params;
    let steps = (t - t_x) as usize;
    let mut terms = Vec::with_capacity(steps + 1);
    terms.push(ln_beta(a + x, b + t - x) + ln_beta(g, d + t));
    for i in 0..steps {
        let fi = i as f64;
        terms.push(ln_beta(a + x, b + t_x - x + fi) + ln_beta(g + 1.0, d + t_x + fi));
    }
    terms
}

fn row_log_numerator(params: &BgbbParams, x: f64, t_x: f64, t: f64) -> f64 {
    row_log_terms(params, x, t_x, t)
        .into_iter()
        .fold(f64::NEG_INFINITY, log_add_exp)
}

/// Penalized negative log-likelihood of the cohort; `+inf` on infeasible
/// parameters.
pub fn neg_log_likelihood(params: &BgbbParams, data: &CohortData, penalizer_coef: f64) -> f64 {
    let values = params.values();
    if !params_feasible(&values) {
        return f64::INFINITY;
    }
    let BgbbParams { alpha: a, beta: b, gamma: g, delta: d } = *params;
    let ln_denom = ln_beta(a, b) + ln_beta(g, d);
    let mut ll = 0.0;
    for i in 0..data.len() {
        ll += data.weight(i)
            * (row_log_numerator(params, data.frequency[i], data.recency[i], data.age[i])
                - ln_denom);
    }
    -ll + log_params_penalty(&values, penalizer_coef)
}

/// Gradient of [`neg_log_likelihood`] with respect to `(α, β, γ, δ)`.
pub fn neg_log_likelihood_gradient(
    params: &BgbbParams, data: &CohortData, penalizer_coef: f64,
) -> Array1<f64> {
    let BgbbParams { alpha: a, beta: b, gamma: g, delta: d } = *params;
    let denom_terms = [
        digamma(a + b) - digamma(a),
        digamma(a + b) - digamma(b),
        digamma(g + d) - digamma(g),
        digamma(g + d) - digamma(d),
    ];

    let mut grad = [0.0; 4];
    for i in 0..data.len() {
        let (x, t_x, t) = (data.frequency[i], data.recency[i], data.age[i]);
        let w = data.weight(i);
        let terms = row_log_terms(params, x, t_x, t);
        let log_num = terms.iter().cloned().fold(f64::NEG_INFINITY, log_add_exp);

        // Σ_j u_j · ∂ ln term_j / ∂ param, with u_j = term_j / numerator.
        let mut sums = [0.0; 4];
        for (j, &term) in terms.iter().enumerate() {
            let u = (term - log_num).exp();
            let factors = if j == 0 {
                [
                    digamma(a + x) - digamma(a + b + t),
                    digamma(b + t - x) - digamma(a + b + t),
                    digamma(g) - digamma(g + d + t),
                    digamma(d + t) - digamma(g + d + t),
                ]
            } else {
                let fi = (j - 1) as f64;
                [
                    digamma(a + x) - digamma(a + b + t_x + fi),
                    digamma(b + t_x - x + fi) - digamma(a + b + t_x + fi),
                    digamma(g + 1.0) - digamma(g + d + t_x + fi + 1.0),
                    digamma(d + t_x + fi) - digamma(g + d + t_x + fi + 1.0),
                ]
            };
            for k in 0..4 {
                sums[k] += u * factors[k];
            }
        }
        for k in 0..4 {
            grad[k] -= w * (denom_terms[k] + sums[k]);
        }
    }

    let values = params.values();
    if penalizer_coef != 0.0 {
        for k in 0..4 {
            grad[k] += penalizer_coef / values[k];
        }
    }
    ndarray::arr1(&grad)
}

// ---- Derived quantities ----------------------------------------------------

/// Expected transactions of a new customer over `t` opportunities.
pub fn expected_transactions(params: &BgbbParams, t: f64) -> BtydResult<f64> {
    let t = require_integer_time(t)? as f64;
    let BgbbParams { alpha: a, beta: b, gamma: g, delta: d } = *params;
    let factor = (ln_gamma(g + d) - ln_gamma(1.0 + d) - ln_gamma(g + d + t)
        + ln_gamma(1.0 + d + t))
    .exp();
    Ok(a / (a + b) * d / (g - 1.0) * (1.0 - factor))
}

/// Limit of [`expected_transactions`] as the horizon grows without
/// bound; infinite when `γ ≤ 1`.
pub fn expected_transactions_limit(params: &BgbbParams) -> f64 {
    let BgbbParams { alpha: a, beta: b, gamma: g, delta: d } = *params;
    if g <= 1.0 {
        return f64::INFINITY;
    }
    a / (a + b) * d / (g - 1.0)
}

/// Gradient of [`expected_transactions`] in `(α, β, γ, δ)` order.
fn expected_transactions_gradient(params: &BgbbParams, t: f64) -> BtydResult<Array1<f64>> {
    let e = expected_transactions(params, t)?;
    let BgbbParams { alpha: a, beta: b, gamma: g, delta: d } = *params;
    let factor = (ln_gamma(g + d) - ln_gamma(1.0 + d) - ln_gamma(g + d + t)
        + ln_gamma(1.0 + d + t))
    .exp();
    let r = a / (a + b) * d / (g - 1.0) * (-factor);

    let d_alpha = e * b / (a * (a + b));
    let d_beta = -e / (a + b);
    let d_gamma = -e / (g - 1.0) + r * (digamma(g + d) - digamma(g + d + t));
    let d_delta = e / d
        + r * (digamma(g + d) - digamma(g + d + t) - digamma(1.0 + d)
            + digamma(1.0 + d + t));
    Ok(ndarray::arr1(&[d_alpha, d_beta, d_gamma, d_delta]))
}

/// Delta-method standard error of [`expected_transactions`] under a 4×4
/// parameter covariance.
pub fn expected_transactions_stderr(
    params: &BgbbParams, t: f64, covariance: &Array2<f64>,
) -> BtydResult<f64> {
    let grad = expected_transactions_gradient(params, t)?;
    Ok(delta_method_stderr(&grad, covariance)?)
}

/// `P(N(t) = n)` for a brand-new customer over `t` opportunities.
pub fn probability_of_n_transactions(params: &BgbbParams, t: f64, n: f64) -> BtydResult<f64> {
    let t_int = require_integer_time(t)?;
    let n_int = require_integer_count(n)?;
    if t_int < n_int {
        return Err(BtydError::HorizonBeforeCount { t, n });
    }
    let (t, n) = (t_int as f64, n_int as f64);
    let BgbbParams { alpha: a, beta: b, gamma: g, delta: d } = *params;
    let ln_denom = ln_beta(a, b) + ln_beta(g, d);

    let mut log_sum = ln_binom(t, n) + ln_beta(a + n, b + t - n) + ln_beta(g, d + t);
    for i in n_int..t_int {
        let fi = i as f64;
        log_sum = log_add_exp(
            log_sum,
            ln_binom(fi, n) + ln_beta(a + n, b + fi - n) + ln_beta(g + 1.0, d + fi),
        );
    }
    Ok((log_sum - ln_denom).exp())
}

/// `P(alive after period n | x, t_x)` for a customer observed over `n`
/// opportunities.
pub fn conditional_probability_alive(
    params: &BgbbParams, x: f64, t_x: f64, n: f64,
) -> BtydResult<f64> {
    let n = require_integer_time(n)? as f64;
    let BgbbParams { alpha: a, beta: b, gamma: g, delta: d } = *params;
    let ll_row = row_log_numerator(params, x, t_x, n) - ln_beta(a, b) - ln_beta(g, d);
    Ok((ln_beta(a + x, b + n - x) - ln_beta(a, b) + ln_beta(g, d + n + 1.0)
        - ln_beta(g, d)
        - ll_row)
        .exp())
}

// ---- Model -----------------------------------------------------------------

/// BG/BB model: configuration plus an optional fit.
#[derive(Debug, Clone, PartialEq)]
pub struct Bgbb {
    penalizer_coef: f64,
    fitted: Option<Fitted<BgbbParams>>,
}

impl Bgbb {
    pub fn new(penalizer_coef: f64) -> Self {
        Bgbb { penalizer_coef, fitted: None }
    }

    pub fn expected_transactions(&self, t: f64) -> BtydResult<f64> {
        expected_transactions(self.fitted()?.params(), t)
    }

    pub fn expected_transactions_stderr(
        &self, t: f64, covariance: &Array2<f64>,
    ) -> BtydResult<f64> {
        expected_transactions_stderr(self.fitted()?.params(), t, covariance)
    }

    pub fn expected_transactions_limit(&self) -> BtydResult<f64> {
        Ok(expected_transactions_limit(self.fitted()?.params()))
    }

    pub fn probability_of_n_transactions(&self, t: f64, n: f64) -> BtydResult<f64> {
        probability_of_n_transactions(self.fitted()?.params(), t, n)
    }

    pub fn conditional_probability_alive(&self, x: f64, t_x: f64, n: f64) -> BtydResult<f64> {
        conditional_probability_alive(self.fitted()?.params(), x, t_x, n)
    }
}

impl LogLikelihood for Bgbb {
    type Data = CohortData;

    fn value(&self, theta: &Theta, data: &CohortData) -> OptResult<Cost> {
        match BgbbParams::from_theta(theta) {
            Ok(params) => Ok(-neg_log_likelihood(&params, data, self.penalizer_coef)),
            Err(_) => Ok(f64::NEG_INFINITY),
        }
    }

    fn check(&self, _theta: &Theta, _data: &CohortData) -> OptResult<()> {
        Ok(())
    }

    // ∇ℓ(θ) = -∂nll/∂p · p through the exp bridge.
    fn grad(&self, theta: &Theta, data: &CohortData) -> OptResult<Grad> {
        let params = match BgbbParams::from_theta(theta) {
            Ok(params) => params,
            Err(_) => return Err(OptError::GradientNotImplemented),
        };
        let d_nll = neg_log_likelihood_gradient(&params, data, self.penalizer_coef);
        Ok(-d_nll * &params.values())
    }
}

impl CohortModel for Bgbb {
    type Params = BgbbParams;

    fn fresh(&self) -> Self {
        Bgbb::new(self.penalizer_coef)
    }

    fn fit(
        &mut self, data: &CohortData, initial: Option<BgbbParams>, opts: &FitOptions,
    ) -> BtydResult<()> {
        data.require_frequency_within_age()?;
        let initial = initial.unwrap_or_else(BgbbParams::default_initial);
        let (params, nll) = fit_multi_start(self, data, &initial, opts)?;
        self.fitted = Some(Fitted::new(params, nll, data.clone()));
        Ok(())
    }

    fn fitted(&self) -> BtydResult<&Fitted<BgbbParams>> {
        self.fitted.as_ref().ok_or(BtydError::ModelNotFitted)
    }

    fn neg_log_likelihood_at(&self, params: &BgbbParams, data: &CohortData) -> BtydResult<f64> {
        Ok(neg_log_likelihood(params, data, self.penalizer_coef))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Published donation-data estimates from the original BG/BB paper.
    fn reference_params() -> BgbbParams {
        BgbbParams::new(1.204, 0.750, 0.657, 2.783).unwrap()
    }

    fn sample_cohort() -> CohortData {
        CohortData::new(
            array![0.0, 2.0, 5.0, 6.0],
            array![0.0, 4.0, 5.0, 6.0],
            array![6.0, 6.0, 6.0, 6.0],
            None,
            None,
            Some(array![5, 2, 1, 3]),
        )
        .unwrap()
    }

    #[test]
    // Purpose
    // -------
    // Verify the analytic likelihood gradient against central finite
    // differences, with and without the penalizer.
    //
    // Given
    // -----
    // - Reference parameters and a small weighted cohort; h = 1e-6.
    //
    // Expect
    // ------
    // - All four partials agree with finite differences to 1e-5 relative.
    fn gradient_matches_finite_differences() {
        // Arrange
        let params = reference_params();
        let data = sample_cohort();
        let h = 1e-6;

        for coef in [0.0, 0.1] {
            // Act
            let grad = neg_log_likelihood_gradient(&params, &data, coef);

            // Assert
            let values = params.values();
            for k in 0..4 {
                let mut up = values.clone();
                let mut down = values.clone();
                up[k] += h;
                down[k] -= h;
                let fd = (neg_log_likelihood(&BgbbParams::from_values(&up).unwrap(), &data, coef)
                    - neg_log_likelihood(&BgbbParams::from_values(&down).unwrap(), &data, coef))
                    / (2.0 * h);
                let scale = fd.abs().max(1.0);
                assert!(
                    (grad[k] - fd).abs() / scale < 1e-5,
                    "coef {coef}, param {k}: analytic {} vs fd {fd}",
                    grad[k]
                );
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify the count distribution has support exactly {0, .., t} and is
    // consistent with the expected-transactions curve.
    //
    // Given
    // -----
    // - Reference parameters, t = 7.
    //
    // Expect
    // ------
    // - Σ P(n) = 1 and Σ n·P(n) = E[X(7)] to 1e-10.
    fn count_distribution_is_consistent_with_mean() {
        // Arrange
        let params = reference_params();
        let t = 7.0;

        // Act
        let mut total = 0.0;
        let mut mean = 0.0;
        for n in 0..=7u64 {
            let p = probability_of_n_transactions(&params, t, n as f64).unwrap();
            total += p;
            mean += n as f64 * p;
        }

        // Assert
        assert!((total - 1.0).abs() < 1e-10, "pmf total {total}");
        let expected = expected_transactions(&params, t).unwrap();
        assert!((mean - expected).abs() < 1e-10, "{mean} vs {expected}");
    }

    #[test]
    // Purpose
    // -------
    // Verify the long-run transaction limit: the expected-transactions
    // curve approaches the closed form from below, and a dropout shape
    // at or below one makes the limit infinite.
    //
    // Given
    // -----
    // - Parameters with γ = 3 evaluated at t = 10000, and the reference
    //   parameters (γ < 1).
    //
    // Expect
    // ------
    // - Limit equals α/(α+β) · δ/(γ-1); E(10000) sits below it within
    //   1e-6 relative; the reference limit is +inf.
    fn expected_transactions_approach_their_limit() {
        // Arrange
        let params = BgbbParams::new(1.2, 0.75, 3.0, 2.783).unwrap();

        // Act
        let limit = expected_transactions_limit(&params);
        let e_far = expected_transactions(&params, 10_000.0).unwrap();

        // Assert
        assert!((limit - 1.2 / 1.95 * 2.783 / 2.0).abs() < 1e-12);
        assert!(e_far < limit);
        assert!((limit - e_far) / limit < 1e-6, "gap {}", limit - e_far);
        assert_eq!(expected_transactions_limit(&reference_params()), f64::INFINITY);
    }

    #[test]
    // Purpose
    // -------
    // Verify discrete-entry validation: fractional horizons, fractional
    // counts, and counts beyond the horizon are each rejected.
    //
    // Given
    // -----
    // - t = 6.5, n = 2.5, and (t, n) = (3, 5).
    //
    // Expect
    // ------
    // - NonIntegerTime, NonIntegerCount, HorizonBeforeCount.
    fn discrete_inputs_are_validated() {
        // Arrange
        let params = reference_params();

        // Act & Assert
        assert_eq!(
            expected_transactions(&params, 6.5).unwrap_err(),
            BtydError::NonIntegerTime { value: 6.5 }
        );
        assert_eq!(
            probability_of_n_transactions(&params, 6.0, 2.5).unwrap_err(),
            BtydError::NonIntegerCount { value: 2.5 }
        );
        assert_eq!(
            probability_of_n_transactions(&params, 3.0, 5.0).unwrap_err(),
            BtydError::HorizonBeforeCount { t: 3.0, n: 5.0 }
        );
    }

    #[test]
    // Purpose
    // -------
    // Verify alive probabilities are proper and ordered by recency.
    //
    // Given
    // -----
    // - Two customers with 3 active periods out of 10, last active in
    //   periods 3 and 10.
    //
    // Expect
    // ------
    // - Both in (0, 1]; the recently active customer is likelier alive.
    fn alive_probability_is_ordered_by_recency() {
        // Arrange
        let params = reference_params();

        // Act
        let stale = conditional_probability_alive(&params, 3.0, 3.0, 10.0).unwrap();
        let fresh = conditional_probability_alive(&params, 3.0, 10.0, 10.0).unwrap();

        // Assert
        assert!(stale > 0.0 && stale <= 1.0);
        assert!(fresh > 0.0 && fresh <= 1.0);
        assert!(fresh > stale);
    }

    #[test]
    // Purpose
    // -------
    // Verify evaluator conventions: infeasible region and weight
    // equivalence.
    //
    // Given
    // -----
    // - A zero delta; the weighted sample cohort vs its expansion.
    //
    // Expect
    // ------
    // - +inf for the bad parameters; weighted nll equals expanded nll.
    fn nll_conventions_hold() {
        // Arrange
        let params = reference_params();
        let bad = BgbbParams { alpha: 1.2, beta: 0.75, gamma: 0.66, delta: 0.0 };
        let data = sample_cohort();
        assert_eq!(neg_log_likelihood(&bad, &data, 0.0), f64::INFINITY);

        let expanded = CohortData::new(
            array![0.0, 0.0, 0.0, 0.0, 0.0, 2.0, 2.0, 5.0, 6.0, 6.0, 6.0],
            array![0.0, 0.0, 0.0, 0.0, 0.0, 4.0, 4.0, 5.0, 6.0, 6.0, 6.0],
            Array1::from_elem(11, 6.0),
            None,
            None,
            None,
        )
        .unwrap();

        // Act & Assert
        let a = neg_log_likelihood(&params, &data, 0.0);
        let b = neg_log_likelihood(&params, &expanded, 0.0);
        assert!((a - b).abs() < 1e-10);
    }
}
