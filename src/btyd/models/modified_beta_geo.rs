//! modified_beta_geo — MBG/NBD transaction model.
//!
//! Purpose
//! -------
//! The modified BG/NBD gives every customer a dropout opportunity at time
//! zero as well as after each transaction, so zero-frequency customers
//! are no longer alive with certainty. The likelihood keeps the BG/NBD
//! structure with shifted Beta exponents, and the dying branch applies to
//! every row.
//!
//! Key behaviors
//! -------------
//! - The two likelihood branches are combined as `A_3 + ln(1 + exp(A_4))`
//!   via [`safe_softplus`], the stable form of
//!   `ln(exp(A_3) + exp(A_3 + A_4))`.
//! - `P(N(t) = n)` carries an explicit dead-at-zero mass, so the `n = 0`
//!   case needs no special gate.

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
use crate::optimization::numerical_stability::{hyp2f1, safe_softplus};

fn row_log_likelihood(params: &BetaGeoParams, x: f64, t_x: f64, t: f64) -> f64 {
    let BetaGeoParams { r, alpha, a, b } = *params;
    let a_1 = ln_gamma(r + x) - ln_gamma(r) + r * alpha.ln();
    let a_2 = ln_gamma(a + b) + ln_gamma(b + x + 1.0)
        - ln_gamma(b)
        - ln_gamma(a + b + x + 1.0);
    let a_3 = -(r + x) * (alpha + t).ln();
    let a_4 = a.ln() - (b + x).ln() + (r + x) * ((alpha + t).ln() - (alpha + t_x).ln());
    a_1 + a_2 + a_3 + safe_softplus(a_4)
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
    let hyp = hyp2f1(r, b + 1.0, a + b, t / (alpha + t));
    b / (a - 1.0) * (1.0 - hyp * (alpha / (alpha + t)).powf(r))
}

fn alive_denominator(params: &BetaGeoParams, x: f64, t_x: f64, t_age: f64) -> f64 {
    let BetaGeoParams { r, alpha, a, b } = *params;
    1.0 + a / (b + x) * ((alpha + t_age) / (alpha + t_x)).powf(r + x)
}

/// Expected transactions in `(T, T + t]` for a customer observed as
/// `(x, t_x, T)`.
pub fn conditional_expected_purchases(
    params: &BetaGeoParams, t: f64, x: f64, t_x: f64, t_age: f64,
) -> f64 {
    let BetaGeoParams { r, alpha, a, b } = *params;
    let hyp = hyp2f1(r + x, b + x + 1.0, a + b + x, t / (alpha + t_age + t));
    let first = (a + b + x) / (a - 1.0);
    let numerator =
        first * (1.0 - hyp * ((alpha + t_age) / (alpha + t_age + t)).powf(r + x));
    numerator / alive_denominator(params, x, t_x, t_age)
}

/// `P(alive | x, t_x, T)`; below one even at `x = 0` because dropout can
/// precede the first purchase.
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

/// `P(N(t) = n)` for a brand-new customer.
pub fn probability_of_n_purchases_up_to_time(
    params: &BetaGeoParams, t: f64, n: f64,
) -> BtydResult<f64> {
    let n = require_integer_count(n)? as f64;
    let BetaGeoParams { r, alpha, a, b } = *params;
    let ln_denom = ln_beta(a, b);
    let zt = t / (alpha + t);

    let first = (ln_beta(a, b + n + 1.0) - ln_denom + ln_gamma(r + n) - ln_gamma(r)
        - ln_gamma(n + 1.0)
        + r * (alpha / (alpha + t)).ln()
        + n * zt.ln())
    .exp();

    // Σ_{j=0}^{n-1} Γ(r+j) / (Γ(r) j!) · z^j; empty for n = 0, which
    // leaves the dead-at-zero mass B(a+1, b) / B(a, b) intact.
    let mut tail = 0.0;
    let mut term = 1.0;
    for j in 0..(n as usize) {
        if j == 0 {
            tail = 1.0;
        } else {
            let jf = (j - 1) as f64;
            term *= (r + jf) / (jf + 1.0) * zt;
            tail += term;
        }
    }
    let second = (ln_beta(a + 1.0, b + n) - ln_denom).exp()
        * (1.0 - (alpha / (alpha + t)).powf(r) * tail);
    Ok(first + second)
}

// ---- Model -----------------------------------------------------------------

/// MBG/NBD model: configuration plus an optional fit.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifiedBetaGeo {
    penalizer_coef: f64,
    fitted: Option<Fitted<BetaGeoParams>>,
}

impl ModifiedBetaGeo {
    pub fn new(penalizer_coef: f64) -> Self {
        ModifiedBetaGeo { penalizer_coef, fitted: None }
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

impl LogLikelihood for ModifiedBetaGeo {
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

impl CohortModel for ModifiedBetaGeo {
    type Params = BetaGeoParams;

    fn fresh(&self) -> Self {
        ModifiedBetaGeo::new(self.penalizer_coef)
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
