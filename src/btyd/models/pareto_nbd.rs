//! pareto_nbd — continuous-time Pareto/NBD transaction model.
//!
//! Purpose
//! -------
//! While alive, a customer transacts as a Poisson process with rate `λ ~
//! Gamma(r, α)`; their unobserved lifetime is exponential with rate `μ ~
//! Gamma(s, β)`. The likelihood of a `(x, t_x, T)` row integrates both
//! mixtures in closed form, up to a Gauss hypergeometric factor evaluated
//! through [`hyp2f1`].
//!
//! Key behaviors
//! -------------
//! - The recursion argument for `2F1` is built from the smaller of `α` and
//!   `β`, keeping the series argument inside `[0, 1)`.
//! - All row terms are combined in log space; the `A_0` factor is a signed
//!   two-term log-sum-exp that cancels exactly when `t_x = T` and
//!   `α = β`.
//! - Derived quantities: unconditional and conditional expected
//!   transactions, `P(alive | x, t_x, T)`, an alive-probability matrix
//!   over the observed `(recency, frequency)` grid, and a delta-method
//!   standard error for the expected-transactions curve.

use ndarray::{Array1, Array2};
use statrs::function::gamma::ln_gamma;

use crate::btyd::core::data::CohortData;
use crate::btyd::core::fitted::Fitted;
use crate::btyd::core::params::{ModelParams, ParetoNbdParams};
use crate::btyd::errors::{BtydError, BtydResult};
use crate::btyd::fitter::{fit_multi_start, FitOptions};
use crate::btyd::models::{log_params_penalty, params_feasible, CohortModel};
use crate::inference::delta::delta_method_stderr;
use crate::optimization::errors::OptResult;
use crate::optimization::loglik_optimizer::{Cost, LogLikelihood, Theta};
use crate::optimization::numerical_stability::{
    hyp2f1, log_add_exp, logistic, signed_log_sum_exp,
};

/// `ln A_0(x, t_x, T)`, the hypergeometric tail factor of the row
/// likelihood.
fn log_a_0(params: &ParetoNbdParams, x: f64, t_x: f64, t: f64) -> f64 {
    let ParetoNbdParams { r, alpha, s, beta } = *params;
    // Route the series through the smaller scale so its argument stays in
    // [0, 1).
    let (min_of, max_of, third) =
        if alpha < beta { (alpha, beta, r + x) } else { (beta, alpha, s + 1.0) };
    let abs_diff = max_of - min_of;
    let rsf = r + s + x;

    let p_1 = hyp2f1(rsf, third, rsf + 1.0, abs_diff / (max_of + t_x));
    let q_1 = max_of + t_x;
    let p_2 = hyp2f1(rsf, third, rsf + 1.0, abs_diff / (max_of + t));
    let q_2 = max_of + t;

    let (log_mag, _sign) = signed_log_sum_exp(
        &[p_1.ln() + rsf * q_2.ln(), p_2.ln() + rsf * q_1.ln()],
        &[1.0, -1.0],
    );
    log_mag - rsf * (q_1 * q_2).ln()
}

/// Log-likelihood of a single `(x, t_x, T)` row, before weighting and
/// penalization.
fn row_log_likelihood(params: &ParetoNbdParams, x: f64, t_x: f64, t: f64) -> f64 {
    let ParetoNbdParams { r, alpha, s, beta } = *params;
    let a_1 = ln_gamma(r + x) - ln_gamma(r) + r * alpha.ln() + s * beta.ln();
    let a_2 = log_add_exp(
        -(r + x) * (alpha + t).ln() - s * (beta + t).ln(),
        s.ln() + log_a_0(params, x, t_x, t) - (r + s + x).ln(),
    );
    a_1 + a_2
}

/// Penalized negative log-likelihood of the cohort.
///
/// Returns `+inf` when any parameter is non-positive or non-finite, so
/// optimizers can probe the boundary without special-casing.
pub fn neg_log_likelihood(
    params: &ParetoNbdParams, data: &CohortData, penalizer_coef: f64,
) -> f64 {
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

/// Expected number of repeat transactions of a brand-new customer in
/// `[0, t]`.
pub fn expected_purchases(params: &ParetoNbdParams, t: f64) -> f64 {
    let ParetoNbdParams { r, alpha, s, beta } = *params;
    r * beta / (alpha * (s - 1.0)) * (1.0 - (beta / (beta + t)).powf(s - 1.0))
}

/// Gradient of [`expected_purchases`] in `(r, α, s, β)` order.
fn expected_purchases_gradient(params: &ParetoNbdParams, t: f64) -> Array1<f64> {
    let ParetoNbdParams { r, alpha, s, beta } = *params;
    let scale = r * beta / (alpha * (s - 1.0));
    let ratio = beta / (beta + t);
    let e = expected_purchases(params, t);

    let d_r = e / r;
    let d_alpha = -e / alpha;
    let d_s = -e / (s - 1.0) - scale * ratio.ln() * ratio.powf(s - 1.0);
    let d_beta = e / beta + scale * (1.0 - s) * ratio.powf(s - 2.0) * t / (beta + t).powi(2);
    ndarray::arr1(&[d_r, d_alpha, d_s, d_beta])
}

/// Delta-method standard error of [`expected_purchases`] under a 4×4
/// parameter covariance.
pub fn expected_purchases_stderr(
    params: &ParetoNbdParams, t: f64, covariance: &Array2<f64>,
) -> BtydResult<f64> {
    let grad = expected_purchases_gradient(params, t);
    Ok(delta_method_stderr(&grad, covariance)?)
}

/// Expected transactions in `(T, T + t]` for a customer observed as
/// `(x, t_x, T)`, discounted by their alive probability.
pub fn conditional_expected_purchases(
    params: &ParetoNbdParams, t: f64, x: f64, t_x: f64, t_age: f64,
) -> f64 {
    let ParetoNbdParams { r, alpha, s, beta } = *params;
    let ll_row = row_log_likelihood(params, x, t_x, t_age);
    let ln_first = ln_gamma(r + x) - ln_gamma(r) + r * alpha.ln() + s * beta.ln()
        - (r + x) * (alpha + t_age).ln()
        - s * (beta + t_age).ln();
    let second = (r + x) * (beta + t_age) / ((alpha + t_age) * (s - 1.0));
    let third = 1.0 - ((beta + t_age) / (beta + t_age + t)).powf(s - 1.0);
    (ln_first - ll_row).exp() * second * third
}

/// `P(alive | x, t_x, T)`.
pub fn conditional_probability_alive(
    params: &ParetoNbdParams, x: f64, t_x: f64, t_age: f64,
) -> f64 {
    let ParetoNbdParams { r, alpha, s, beta } = *params;
    let log_odds = s.ln() - (r + s + x).ln()
        + (r + x) * (alpha + t_age).ln()
        + s * (beta + t_age).ln()
        + log_a_0(params, x, t_x, t_age);
    logistic(-log_odds)
}

/// Alive probabilities on the `(recency, frequency)` grid up to
/// `(max_recency, max_frequency)`, with the horizon fixed at
/// `max_recency`.
pub fn probability_alive_matrix(
    params: &ParetoNbdParams, max_frequency: u64, max_recency: u64,
) -> Array2<f64> {
    let rows = (max_recency + 1) as usize;
    let cols = (max_frequency + 1) as usize;
    Array2::from_shape_fn((rows, cols), |(i, j)| {
        conditional_probability_alive(params, j as f64, i as f64, max_recency as f64)
    })
}

// ---- Model -----------------------------------------------------------------

/// Pareto/NBD model: configuration plus an optional fit.
#[derive(Debug, Clone, PartialEq)]
pub struct ParetoNbd {
    penalizer_coef: f64,
    fitted: Option<Fitted<ParetoNbdParams>>,
}

impl ParetoNbd {
    pub fn new(penalizer_coef: f64) -> Self {
        ParetoNbd { penalizer_coef, fitted: None }
    }

    /// Expected transactions in `[0, t]` under the fitted parameters.
    pub fn expected_purchases(&self, t: f64) -> BtydResult<f64> {
        Ok(expected_purchases(self.fitted()?.params(), t))
    }

    /// Standard error of [`Self::expected_purchases`] given a parameter
    /// covariance.
    pub fn expected_purchases_stderr(
        &self, t: f64, covariance: &Array2<f64>,
    ) -> BtydResult<f64> {
        expected_purchases_stderr(self.fitted()?.params(), t, covariance)
    }

    /// Expected future transactions for one observed customer.
    pub fn conditional_expected_purchases(
        &self, t: f64, x: f64, t_x: f64, t_age: f64,
    ) -> BtydResult<f64> {
        Ok(conditional_expected_purchases(self.fitted()?.params(), t, x, t_x, t_age))
    }

    /// Alive probability for one observed customer.
    pub fn conditional_probability_alive(
        &self, x: f64, t_x: f64, t_age: f64,
    ) -> BtydResult<f64> {
        Ok(conditional_probability_alive(self.fitted()?.params(), x, t_x, t_age))
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

impl LogLikelihood for ParetoNbd {
    type Data = CohortData;

    fn value(&self, theta: &Theta, data: &CohortData) -> OptResult<Cost> {
        match ParetoNbdParams::from_theta(theta) {
            Ok(params) => Ok(-neg_log_likelihood(&params, data, self.penalizer_coef)),
            Err(_) => Ok(f64::NEG_INFINITY),
        }
    }

    fn check(&self, _theta: &Theta, _data: &CohortData) -> OptResult<()> {
        Ok(())
    }
}

impl CohortModel for ParetoNbd {
    type Params = ParetoNbdParams;

    fn fresh(&self) -> Self {
        ParetoNbd::new(self.penalizer_coef)
    }

    fn fit(
        &mut self, data: &CohortData, initial: Option<ParetoNbdParams>, opts: &FitOptions,
    ) -> BtydResult<()> {
        let initial = initial.unwrap_or_else(ParetoNbdParams::default_initial);
        let (params, nll) = fit_multi_start(self, data, &initial, opts)?;
        self.fitted = Some(Fitted::new(params, nll, data.clone()));
        Ok(())
    }

    fn fitted(&self) -> BtydResult<&Fitted<ParetoNbdParams>> {
        self.fitted.as_ref().ok_or(BtydError::ModelNotFitted)
    }

    fn neg_log_likelihood_at(
        &self, params: &ParetoNbdParams, data: &CohortData,
    ) -> BtydResult<f64> {
        Ok(neg_log_likelihood(params, data, self.penalizer_coef))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn reference_params() -> ParetoNbdParams {
        ParetoNbdParams::new(0.55, 10.58, 0.61, 11.67).unwrap()
    }

    #[test]
    // Purpose
    // -------
    // Verify the infeasible-region convention of the raw evaluator.
    //
    // Given
    // -----
    // - A field-initialized parameter struct with a negative shape.
    //
    // Expect
    // ------
    // - Negative log-likelihood is +inf.
    fn nll_is_infinite_outside_the_domain() {
        // Arrange
        let data = CohortData::new(array![1.0], array![5.0], array![10.0], None, None, None)
            .unwrap();
        let bad = ParetoNbdParams { r: -0.5, alpha: 10.0, s: 0.6, beta: 11.0 };

        // Act & Assert
        assert_eq!(neg_log_likelihood(&bad, &data, 0.0), f64::INFINITY);
    }

    #[test]
    // Purpose
    // -------
    // Verify that integer row weights reproduce row duplication exactly.
    //
    // Given
    // -----
    // - One weighted row (weight 3) vs the same row repeated three times.
    //
    // Expect
    // ------
    // - Identical negative log-likelihoods, with and without penalizer.
    fn weights_match_row_duplication() {
        // Arrange
        let params = reference_params();
        let weighted = CohortData::new(
            array![2.0],
            array![18.0],
            array![30.0],
            None,
            None,
            Some(array![3]),
        )
        .unwrap();
        let expanded = CohortData::new(
            array![2.0, 2.0, 2.0],
            array![18.0, 18.0, 18.0],
            array![30.0, 30.0, 30.0],
            None,
            None,
            None,
        )
        .unwrap();

        // Act & Assert
        for coef in [0.0, 0.05] {
            let a = neg_log_likelihood(&params, &weighted, coef);
            let b = neg_log_likelihood(&params, &expanded, coef);
            assert!((a - b).abs() < 1e-10, "coef {coef}: {a} vs {b}");
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify alive-probability boundary behavior.
    //
    // Given
    // -----
    // - A zero-frequency customer observed for no time, and a heavy buyer
    //   who went quiet long ago.
    //
    // Expect
    // ------
    // - P(alive) = 1 at the origin; P(alive) in (0, 1) and lower for the
    //   lapsed heavy buyer than for a recent one.
    fn alive_probability_is_bounded_and_ordered() {
        // Arrange
        let params = reference_params();

        // Act
        let fresh = conditional_probability_alive(&params, 0.0, 0.0, 0.0);
        let lapsed = conditional_probability_alive(&params, 12.0, 5.0, 40.0);
        let recent = conditional_probability_alive(&params, 12.0, 39.0, 40.0);

        // Assert
        assert!((fresh - 1.0).abs() < 1e-12);
        assert!(lapsed > 0.0 && lapsed < 1.0);
        assert!(recent > lapsed);
    }

    #[test]
    // Purpose
    // -------
    // Verify shape and monotonicity of the expected-transactions curve
    // and its conditional counterpart.
    //
    // Given
    // -----
    // - Horizons 0 < 10 < 40 and a mid-cohort customer.
    //
    // Expect
    // ------
    // - E(0) = 0, E strictly increasing; conditional expectation is
    //   non-negative and increasing in the horizon.
    fn expected_purchases_is_monotone() {
        // Arrange
        let params = reference_params();

        // Act & Assert
        assert_eq!(expected_purchases(&params, 0.0), 0.0);
        let e_10 = expected_purchases(&params, 10.0);
        let e_40 = expected_purchases(&params, 40.0);
        assert!(e_10 > 0.0 && e_40 > e_10);

        let c_10 = conditional_expected_purchases(&params, 10.0, 3.0, 20.0, 30.0);
        let c_40 = conditional_expected_purchases(&params, 40.0, 3.0, 20.0, 30.0);
        assert!(c_10 >= 0.0 && c_40 > c_10);
    }

    #[test]
    // Purpose
    // -------
    // Verify the delta-method entry point: identity covariance yields the
    // gradient norm, and a wrong covariance shape is rejected.
    //
    // Given
    // -----
    // - 4×4 identity and a 3×3 matrix.
    //
    // Expect
    // ------
    // - stderr equals ‖∇E‖₂; CovarianceShapeMismatch otherwise.
    fn expected_purchases_stderr_checks_covariance() {
        // Arrange
        let params = reference_params();
        let eye = Array2::eye(4);

        // Act
        let got = expected_purchases_stderr(&params, 20.0, &eye).unwrap();

        // Assert
        let grad = expected_purchases_gradient(&params, 20.0);
        let norm = grad.dot(&grad).sqrt();
        assert!((got - norm).abs() < 1e-12);

        let err = expected_purchases_stderr(&params, 20.0, &Array2::eye(3)).unwrap_err();
        assert_eq!(err, BtydError::CovarianceShapeMismatch { expected: 4, found: (3, 3) });
    }

    #[test]
    // Purpose
    // -------
    // Verify the alive-probability matrix layout.
    //
    // Given
    // -----
    // - max_frequency 3, max_recency 5.
    //
    // Expect
    // ------
    // - Shape (6, 4); the zero-frequency column at full recency matches
    //   the scalar function.
    fn alive_matrix_matches_scalar_function() {
        // Arrange
        let params = reference_params();

        // Act
        let z = probability_alive_matrix(&params, 3, 5);

        // Assert
        assert_eq!(z.dim(), (6, 4));
        let direct = conditional_probability_alive(&params, 2.0, 4.0, 5.0);
        assert!((z[(4, 2)] - direct).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Verify the model wrapper: unfitted access errors, and the θ-space
    // likelihood agrees with the raw evaluator.
    //
    // Given
    // -----
    // - An unfitted model and the reference parameters.
    //
    // Expect
    // ------
    // - ModelNotFitted; value(θ) == -nll(params).
    fn model_wrapper_bridges_theta_space() {
        // Arrange
        let model = ParetoNbd::new(0.0);
        let params = reference_params();
        let data = CohortData::new(
            array![1.0, 0.0],
            array![8.0, 0.0],
            array![20.0, 20.0],
            None,
            None,
            None,
        )
        .unwrap();

        // Act & Assert
        assert_eq!(model.fitted().unwrap_err(), BtydError::ModelNotFitted);

        let ell = model.value(&params.to_theta(), &data).unwrap();
        let nll = neg_log_likelihood(&params, &data, 0.0);
        assert!((ell + nll).abs() < 1e-10);
    }
}
