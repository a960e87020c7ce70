//! gamma_gamma — Gamma-Gamma model of monetary value.
//!
//! Purpose
//! -------
//! Spend per transaction is Gamma(p, ν) with a customer-level rate
//! `ν ~ Gamma(q, γ)`; the observed average `m` over `x` transactions is
//! then Gamma(p·x, ν·x). Fitting needs only the per-customer pair
//! `(x, m)` with `x ≥ 1` and `m > 0`, which [`CohortData::monetary`]
//! carries alongside optional row weights.
//!
//! Key behaviors
//! -------------
//! - The conditional expected average profit is the Bayesian shrinkage of
//!   the observed mean toward the population mean, weighted by `x`.
//! - `fit` rejects cohorts with a missing monetary column, zero
//!   frequencies, or non-positive spend.

use ndarray::Array1;
use statrs::function::gamma::ln_gamma;

use crate::btyd::core::data::CohortData;
use crate::btyd::core::fitted::Fitted;
use crate::btyd::core::params::{GammaGammaParams, ModelParams};
use crate::btyd::errors::{BtydError, BtydResult};
use crate::btyd::fitter::{fit_multi_start, FitOptions};
use crate::btyd::models::{log_params_penalty, params_feasible, CohortModel};
use crate::optimization::errors::{OptError, OptResult};
use crate::optimization::loglik_optimizer::{Cost, LogLikelihood, Theta};

fn row_log_likelihood(params: &GammaGammaParams, x: f64, m: f64) -> f64 {
    let GammaGammaParams { p, q, v } = *params;
    let px = p * x;
    ln_gamma(px + q) - ln_gamma(px) - ln_gamma(q) + q * v.ln() + (px - 1.0) * m.ln()
        + px * x.ln()
        - (px + q) * (x * m + v).ln()
}

/// Penalized negative log-likelihood of the cohort; `+inf` on infeasible
/// parameters.
pub fn neg_log_likelihood(
    params: &GammaGammaParams, data: &CohortData, penalizer_coef: f64,
) -> BtydResult<f64> {
    let values = params.values();
    if !params_feasible(&values) {
        return Ok(f64::INFINITY);
    }
    let monetary = data.monetary_values()?;
    let mut ll = 0.0;
    for i in 0..data.len() {
        ll += data.weight(i) * row_log_likelihood(params, data.frequency[i], monetary[i]);
    }
    Ok(-ll + log_params_penalty(&values, penalizer_coef))
}

// ---- Derived quantities ----------------------------------------------------

/// Population mean transaction value, `E[m] = p·ν / (q - 1)`.
pub fn expected_average_profit(params: &GammaGammaParams) -> f64 {
    let GammaGammaParams { p, q, v } = *params;
    p * v / (q - 1.0)
}

/// Posterior mean spend for a customer with `x` transactions averaging
/// `m`: a convex combination of the population mean and the observed
/// mean, leaning on the observation as `x` grows.
pub fn conditional_expected_average_profit(params: &GammaGammaParams, x: f64, m: f64) -> f64 {
    let GammaGammaParams { p, q, v } = *params;
    let px = p * x;
    (q - 1.0) / (px + q - 1.0) * (v * p / (q - 1.0)) + px / (px + q - 1.0) * m
}

// ---- Model -----------------------------------------------------------------

fn missing_monetary_column() -> OptError {
    OptError::InvalidParameter {
        text: "Gamma-Gamma requires a cohort with a monetary value column".into(),
    }
}

/// Gamma-Gamma model: configuration plus an optional fit.
#[derive(Debug, Clone, PartialEq)]
pub struct GammaGamma {
    penalizer_coef: f64,
    fitted: Option<Fitted<GammaGammaParams>>,
}

impl GammaGamma {
    pub fn new(penalizer_coef: f64) -> Self {
        GammaGamma { penalizer_coef, fitted: None }
    }

    pub fn expected_average_profit(&self) -> BtydResult<f64> {
        Ok(expected_average_profit(self.fitted()?.params()))
    }

    pub fn conditional_expected_average_profit_for(&self, x: f64, m: f64) -> BtydResult<f64> {
        Ok(conditional_expected_average_profit(self.fitted()?.params(), x, m))
    }

    /// Posterior mean spend for every row of the training cohort.
    pub fn conditional_expected_average_profit(&self) -> BtydResult<Array1<f64>> {
        let fitted = self.fitted()?;
        let data = fitted.data();
        let monetary = data.monetary_values()?;
        Ok(Array1::from_shape_fn(data.len(), |i| {
            conditional_expected_average_profit(fitted.params(), data.frequency[i], monetary[i])
        }))
    }
}

impl LogLikelihood for GammaGamma {
    type Data = CohortData;

    fn value(&self, theta: &Theta, data: &CohortData) -> OptResult<Cost> {
        match GammaGammaParams::from_theta(theta) {
            Ok(params) => neg_log_likelihood(&params, data, self.penalizer_coef)
                .map(|nll| -nll)
                .map_err(|_| missing_monetary_column()),
            Err(_) => Ok(f64::NEG_INFINITY),
        }
    }

    fn check(&self, _theta: &Theta, data: &CohortData) -> OptResult<()> {
        if data.monetary_value.is_none() {
            return Err(missing_monetary_column());
        }
        Ok(())
    }
}

impl CohortModel for GammaGamma {
    type Params = GammaGammaParams;

    fn fresh(&self) -> Self {
        GammaGamma::new(self.penalizer_coef)
    }

    fn fit(
        &mut self, data: &CohortData, initial: Option<GammaGammaParams>, opts: &FitOptions,
    ) -> BtydResult<()> {
        data.require_positive_monetary()?;
        let initial = initial.unwrap_or_else(GammaGammaParams::default_initial);
        let (params, nll) = fit_multi_start(self, data, &initial, opts)?;
        self.fitted = Some(Fitted::new(params, nll, data.clone()));
        Ok(())
    }

    fn fitted(&self) -> BtydResult<&Fitted<GammaGammaParams>> {
        self.fitted.as_ref().ok_or(BtydError::ModelNotFitted)
    }

    fn neg_log_likelihood_at(
        &self, params: &GammaGammaParams, data: &CohortData,
    ) -> BtydResult<f64> {
        neg_log_likelihood(params, data, self.penalizer_coef)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn reference_params() -> GammaGammaParams {
        GammaGammaParams::new(6.25, 3.74, 15.44).unwrap()
    }

    #[test]
    // Purpose
    // -------
    // Verify the posterior mean interpolates between the population mean
    // and the observed mean as evidence accumulates.
    //
    // Given
    // -----
    // - Reference parameters; an observed mean of 50 with x = 1 then
    //   x = 100.
    //
    // Expect
    // ------
    // - Both posteriors lie strictly between the two means; more
    //   transactions pull the posterior toward the observation.
    fn posterior_mean_shrinks_with_evidence() {
        // Arrange
        let params = reference_params();
        let population = expected_average_profit(&params);
        let observed = 50.0;

        // Act
        let sparse = conditional_expected_average_profit(&params, 1.0, observed);
        let dense = conditional_expected_average_profit(&params, 100.0, observed);

        // Assert
        assert!(population < sparse && sparse < observed);
        assert!(sparse < dense && dense < observed);
        assert!((dense - observed).abs() < (sparse - observed).abs());
    }

    #[test]
    // Purpose
    // -------
    // Verify likelihood conventions: infeasible parameters, weight
    // semantics, and the missing-column error.
    //
    // Given
    // -----
    // - A non-positive shape; a weight-3 row vs three copies; a cohort
    //   without monetary values.
    //
    // Expect
    // ------
    // - +inf; identical nll; MissingMonetaryValue.
    fn nll_conventions_hold() {
        // Arrange
        let params = reference_params();
        let bad = GammaGammaParams { p: -1.0, q: 3.7, v: 15.0 };
        let weighted =
            CohortData::monetary(array![4.0], array![38.5], Some(array![3])).unwrap();
        let expanded =
            CohortData::monetary(array![4.0, 4.0, 4.0], array![38.5, 38.5, 38.5], None).unwrap();
        let no_monetary =
            CohortData::contractual(array![4.0], array![10.0], None).unwrap();

        // Act & Assert
        assert_eq!(neg_log_likelihood(&bad, &weighted, 0.0).unwrap(), f64::INFINITY);
        let a = neg_log_likelihood(&params, &weighted, 0.05).unwrap();
        let b = neg_log_likelihood(&params, &expanded, 0.05).unwrap();
        assert!((a - b).abs() < 1e-10);
        assert_eq!(
            neg_log_likelihood(&params, &no_monetary, 0.0).unwrap_err(),
            BtydError::MissingMonetaryValue
        );
    }

    #[test]
    // Purpose
    // -------
    // Verify fit preconditions on the monetary cohort.
    //
    // Given
    // -----
    // - A cohort with a zero frequency row, and one with a zero spend.
    //
    // Expect
    // ------
    // - ZeroFrequency, then NonPositiveMonetaryValue, each naming the
    //   offending row.
    fn fit_rejects_degenerate_monetary_rows() {
        // Arrange
        let mut model = GammaGamma::new(0.0);
        let zero_freq =
            CohortData::monetary(array![2.0, 0.0], array![30.0, 25.0], None).unwrap();
        let zero_spend =
            CohortData::monetary(array![2.0, 3.0], array![30.0, 0.0], None).unwrap();

        // Act & Assert
        assert_eq!(
            model.fit(&zero_freq, None, &FitOptions::seeded(3)).unwrap_err(),
            BtydError::ZeroFrequency { index: 1 }
        );
        assert_eq!(
            model.fit(&zero_spend, None, &FitOptions::seeded(3)).unwrap_err(),
            BtydError::NonPositiveMonetaryValue { index: 1, value: 0.0 }
        );
    }
}
