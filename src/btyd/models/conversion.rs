//! conversion — BG/BB/BG conversion models over discrete sessions.
//!
//! Purpose
//! -------
//! Extend the BG/BB session model with a third Beta-Geometric process for
//! conversion: each customer carries a conversion probability `c ~
//! Beta(ε, ζ)` tried once per session until it fires. A row adds a
//! conversion-session count `x_c` to the usual `(x, t_x, T)` triple, and
//! the likelihood factorizes into the BG/BB session part and a conversion
//! part.
//!
//! The extended family ([`BgbbBgExt`]) adds a point mass `c0` of
//! customers who convert in their very first session (`x_c = 0`); the
//! Beta-Geometric part then only explains conversions from the second
//! session on.
//!
//! Key behaviors
//! -------------
//! - The penalizer applies to the four session parameters only, matching
//!   the session-model fit it regularizes.
//! - Per-period conversion rates are alternating Beta-product sums,
//!   evaluated with sign-tracked log-sum-exp.
//! - The extended family's per-period rate is regularized for `t > 1`: a
//!   raw rate outside `(1e-6, min(raw(t - 1), 1)]` reports as zero for
//!   that period, with the comparison always against the raw previous
//!   rate. The cumulative curve and the resampled errors use the
//!   regularized rate.
//! - Uncertainty for conversion curves comes from resampled parameter
//!   sets (population standard deviation across the list) rather than the
//!   delta method; the alternating sums make closed-form gradients
//!   unprofitable.

use statrs::function::beta::ln_beta;

use crate::btyd::core::data::CohortData;
use crate::btyd::core::fitted::Fitted;
use crate::btyd::core::params::{BgbbBgExtParams, BgbbBgParams, ModelParams};
use crate::btyd::errors::{BtydError, BtydResult};
use crate::btyd::fitter::{fit_multi_start, FitOptions};
use crate::btyd::models::{bgbb, require_integer_time, resampled_std, CohortModel};
use crate::optimization::errors::{OptError, OptResult};
use crate::optimization::loglik_optimizer::{Cost, LogLikelihood, Theta};
use crate::optimization::numerical_stability::{ln_binom, signed_log_sum_exp};

fn missing_conversion_column() -> OptError {
    OptError::InvalidParameter {
        text: "conversion model requires a conversion_frequency column".to_string(),
    }
}

// ---- BG/BB/BG --------------------------------------------------------------

/// Penalized negative log-likelihood of the six-parameter conversion
/// model. The penalizer covers the session quadruple only.
pub fn neg_log_likelihood(
    params: &BgbbBgParams, data: &CohortData, penalizer_coef: f64,
) -> BtydResult<f64> {
    let conversions = data.conversion_frequencies()?;
    let BgbbBgParams { epsilon: e, zeta: z, .. } = *params;
    if !(e.is_finite() && e > 0.0 && z.is_finite() && z > 0.0) {
        return Ok(f64::INFINITY);
    }

    let ln_ez = ln_beta(e, z);
    let mut ll_conversion = 0.0;
    for i in 0..data.len() {
        let x_c = conversions[i];
        let converted = if data.frequency[i] >= x_c { 1.0 } else { 0.0 };
        ll_conversion += data.weight(i) * (ln_beta(e + converted, z + x_c) - ln_ez);
    }
    Ok(-ll_conversion + bgbb::neg_log_likelihood(&params.session_params(), data, penalizer_coef))
}

/// Probability of converting exactly in period `t` (new customer).
pub fn conversion_rate(params: &BgbbBgParams, t: f64) -> BtydResult<f64> {
    let t = require_integer_time(t)?;
    let BgbbBgParams { alpha: a, beta: b, gamma: g, delta: d, epsilon: e, zeta: z } = *params;
    if t == 0 {
        return Ok((ln_beta(e + 1.0, z) - ln_beta(e, z)).exp());
    }
    let tf = t as f64;
    let ln_alive = ln_beta(g, d + tf) - ln_beta(a, b) - ln_beta(g, d) - ln_beta(e, z);

    let mut log_mags = Vec::with_capacity(t as usize);
    let mut signs = Vec::with_capacity(t as usize);
    for k in 0..t {
        let kf = k as f64;
        log_mags.push(
            ln_binom(tf - 1.0, kf)
                + ln_beta(a + kf + 1.0, b)
                + ln_beta(e + kf + 1.0, z + 1.0),
        );
        signs.push(if k % 2 == 0 { 1.0 } else { -1.0 });
    }
    let (log_mag, sign) = signed_log_sum_exp(&log_mags, &signs);
    Ok(sign * (ln_alive + log_mag).exp())
}

/// Probability of converting within the first `t + 1` periods.
pub fn conversion_rate_within_time(params: &BgbbBgParams, t: f64) -> BtydResult<f64> {
    let t = require_integer_time(t)?;
    let mut total = 0.0;
    for ti in 0..=t {
        total += conversion_rate(params, ti as f64)?;
    }
    Ok(total)
}

/// Spread of [`conversion_rate`] across resampled parameter sets.
pub fn conversion_rate_stderr(params_list: &[BgbbBgParams], t: f64) -> BtydResult<f64> {
    require_integer_time(t)?;
    resampled_std(params_list, |p| conversion_rate(p, t).unwrap_or(f64::NAN))
}

/// Spread of [`conversion_rate_within_time`] across resampled parameter
/// sets.
pub fn conversion_rate_within_time_stderr(
    params_list: &[BgbbBgParams], t: f64,
) -> BtydResult<f64> {
    require_integer_time(t)?;
    resampled_std(params_list, |p| conversion_rate_within_time(p, t).unwrap_or(f64::NAN))
}

/// BG/BB/BG model: configuration plus an optional fit.
#[derive(Debug, Clone, PartialEq)]
pub struct BgbbBg {
    penalizer_coef: f64,
    fitted: Option<Fitted<BgbbBgParams>>,
}

impl BgbbBg {
    pub fn new(penalizer_coef: f64) -> Self {
        BgbbBg { penalizer_coef, fitted: None }
    }

    pub fn conversion_rate(&self, t: f64) -> BtydResult<f64> {
        conversion_rate(self.fitted()?.params(), t)
    }

    pub fn conversion_rate_within_time(&self, t: f64) -> BtydResult<f64> {
        conversion_rate_within_time(self.fitted()?.params(), t)
    }

    /// Session-level expected transactions, delegated to the embedded
    /// BG/BB quadruple.
    pub fn expected_sessions(&self, t: f64) -> BtydResult<f64> {
        bgbb::expected_transactions(&self.fitted()?.params().session_params(), t)
    }
}

impl LogLikelihood for BgbbBg {
    type Data = CohortData;

    fn value(&self, theta: &Theta, data: &CohortData) -> OptResult<Cost> {
        let params = match BgbbBgParams::from_theta(theta) {
            Ok(params) => params,
            Err(_) => return Ok(f64::NEG_INFINITY),
        };
        match neg_log_likelihood(&params, data, self.penalizer_coef) {
            Ok(nll) => Ok(-nll),
            Err(_) => Err(missing_conversion_column()),
        }
    }

    fn check(&self, _theta: &Theta, data: &CohortData) -> OptResult<()> {
        if data.conversion_frequency.is_none() {
            return Err(missing_conversion_column());
        }
        Ok(())
    }
}

impl CohortModel for BgbbBg {
    type Params = BgbbBgParams;

    fn fresh(&self) -> Self {
        BgbbBg::new(self.penalizer_coef)
    }

    fn fit(
        &mut self, data: &CohortData, initial: Option<BgbbBgParams>, opts: &FitOptions,
    ) -> BtydResult<()> {
        data.conversion_frequencies()?;
        data.require_frequency_within_age()?;
        let initial = initial.unwrap_or_else(BgbbBgParams::default_initial);
        let (params, nll) = fit_multi_start(self, data, &initial, opts)?;
        self.fitted = Some(Fitted::new(params, nll, data.clone()));
        Ok(())
    }

    fn fitted(&self) -> BtydResult<&Fitted<BgbbBgParams>> {
        self.fitted.as_ref().ok_or(BtydError::ModelNotFitted)
    }

    fn neg_log_likelihood_at(
        &self, params: &BgbbBgParams, data: &CohortData,
    ) -> BtydResult<f64> {
        neg_log_likelihood(params, data, self.penalizer_coef)
    }
}

// ---- BG/BB/BG with instant-conversion point mass ---------------------------

/// Penalized negative log-likelihood of the extended family. `x_c = 0`
/// rows are explained by the point mass `c0`; later conversions by the
/// scaled Beta-Geometric part.
pub fn neg_log_likelihood_ext(
    params: &BgbbBgExtParams, data: &CohortData, penalizer_coef: f64,
) -> BtydResult<f64> {
    let conversions = data.conversion_frequencies()?;
    let BgbbBgExtParams { epsilon: e, zeta: z, c0, .. } = *params;
    if !(e.is_finite() && e > 0.0 && z.is_finite() && z > 0.0) || c0 <= 0.0 || c0 >= 1.0 {
        return Ok(f64::INFINITY);
    }

    let ln_ez = ln_beta(e, z);
    let mut ll_conversion = 0.0;
    for i in 0..data.len() {
        let x_c = conversions[i];
        let ln_term = if x_c == 0.0 {
            c0.ln()
        } else {
            let converted = if data.frequency[i] >= x_c { 1.0 } else { 0.0 };
            (1.0 - c0).ln() + ln_beta(e + converted, z + x_c - 1.0) - ln_ez
        };
        ll_conversion += data.weight(i) * ln_term;
    }
    Ok(-ll_conversion + bgbb::neg_log_likelihood(&params.session_params(), data, penalizer_coef))
}

/// Probability of converting exactly in period `t` (new customer);
/// `t = 0` is the point mass.
pub fn conversion_rate_ext(params: &BgbbBgExtParams, t: f64) -> BtydResult<f64> {
    let t = require_integer_time(t)?;
    let BgbbBgExtParams { alpha: a, beta: b, gamma: g, delta: d, epsilon: e, zeta: z, c0 } =
        *params;
    if t == 0 {
        return Ok(c0);
    }
    let tf = t as f64;
    let ln_alive = ln_beta(g, d + tf) - ln_beta(a, b) - ln_beta(g, d) - ln_beta(e, z);

    let mut log_mags = Vec::with_capacity(t as usize);
    let mut signs = Vec::with_capacity(t as usize);
    for k in 0..t {
        let kf = k as f64;
        log_mags
            .push(ln_binom(tf - 1.0, kf) + ln_beta(a + kf + 1.0, b) + ln_beta(e + kf + 1.0, z));
        signs.push(if k % 2 == 0 { 1.0 } else { -1.0 });
    }
    let (log_mag, sign) = signed_log_sum_exp(&log_mags, &signs);
    Ok((1.0 - c0) * sign * (ln_alive + log_mag).exp())
}

/// Regularized per-period rate: for `t > 1` a raw rate outside
/// `(1e-6, min(raw(t - 1), 1)]` reports as zero. The comparison uses the
/// raw rate of the previous period, so one zeroed period does not drag
/// later ones down with it.
pub fn conversion_rate_regularized_ext(
    params: &BgbbBgExtParams, t: f64,
) -> BtydResult<f64> {
    let t = require_integer_time(t)?;
    let raw = conversion_rate_ext(params, t as f64)?;
    if t > 1 {
        let prev = conversion_rate_ext(params, (t - 1) as f64)?;
        if raw < 1e-6 || raw > prev || raw > 1.0 {
            return Ok(0.0);
        }
    }
    Ok(raw)
}

/// Probability of converting within the first `t + 1` periods, summing
/// the regularized per-period rates.
pub fn conversion_rate_within_time_ext(params: &BgbbBgExtParams, t: f64) -> BtydResult<f64> {
    let t = require_integer_time(t)?;
    let mut total = 0.0;
    for ti in 0..=t {
        total += conversion_rate_regularized_ext(params, ti as f64)?;
    }
    Ok(total)
}

/// Spread of [`conversion_rate_regularized_ext`] across resampled
/// parameter sets; unusable spreads clamp to one.
pub fn conversion_rate_stderr_ext(params_list: &[BgbbBgExtParams], t: f64) -> BtydResult<f64> {
    require_integer_time(t)?;
    let std = resampled_std(params_list, |p| {
        conversion_rate_regularized_ext(p, t).unwrap_or(f64::NAN)
    })?;
    Ok(if std.is_nan() || std > 1.0 { 1.0 } else { std })
}

/// Spread of [`conversion_rate_within_time_ext`] across resampled
/// parameter sets; unusable spreads clamp to one.
pub fn conversion_rate_within_time_stderr_ext(
    params_list: &[BgbbBgExtParams], t: f64,
) -> BtydResult<f64> {
    require_integer_time(t)?;
    let std =
        resampled_std(params_list, |p| conversion_rate_within_time_ext(p, t).unwrap_or(f64::NAN))?;
    Ok(if std.is_nan() || std > 1.0 { 1.0 } else { std })
}

/// Extended BG/BB/BG model: configuration plus an optional fit.
#[derive(Debug, Clone, PartialEq)]
pub struct BgbbBgExt {
    penalizer_coef: f64,
    fitted: Option<Fitted<BgbbBgExtParams>>,
}

impl BgbbBgExt {
    pub fn new(penalizer_coef: f64) -> Self {
        BgbbBgExt { penalizer_coef, fitted: None }
    }

    pub fn conversion_rate(&self, t: f64) -> BtydResult<f64> {
        conversion_rate_regularized_ext(self.fitted()?.params(), t)
    }

    pub fn conversion_rate_within_time(&self, t: f64) -> BtydResult<f64> {
        conversion_rate_within_time_ext(self.fitted()?.params(), t)
    }

    /// Session-level expected transactions, delegated to the embedded
    /// BG/BB quadruple.
    pub fn expected_sessions(&self, t: f64) -> BtydResult<f64> {
        bgbb::expected_transactions(&self.fitted()?.params().session_params(), t)
    }
}

impl LogLikelihood for BgbbBgExt {
    type Data = CohortData;

    fn value(&self, theta: &Theta, data: &CohortData) -> OptResult<Cost> {
        let params = match BgbbBgExtParams::from_theta(theta) {
            Ok(params) => params,
            Err(_) => return Ok(f64::NEG_INFINITY),
        };
        match neg_log_likelihood_ext(&params, data, self.penalizer_coef) {
            Ok(nll) => Ok(-nll),
            Err(_) => Err(missing_conversion_column()),
        }
    }

    fn check(&self, _theta: &Theta, data: &CohortData) -> OptResult<()> {
        if data.conversion_frequency.is_none() {
            return Err(missing_conversion_column());
        }
        Ok(())
    }
}

impl CohortModel for BgbbBgExt {
    type Params = BgbbBgExtParams;

    fn fresh(&self) -> Self {
        BgbbBgExt::new(self.penalizer_coef)
    }

    fn fit(
        &mut self, data: &CohortData, initial: Option<BgbbBgExtParams>, opts: &FitOptions,
    ) -> BtydResult<()> {
        data.conversion_frequencies()?;
        data.require_frequency_within_age()?;
        let initial = initial.unwrap_or_else(BgbbBgExtParams::default_initial);
        let (params, nll) = fit_multi_start(self, data, &initial, opts)?;
        self.fitted = Some(Fitted::new(params, nll, data.clone()));
        Ok(())
    }

    fn fitted(&self) -> BtydResult<&Fitted<BgbbBgExtParams>> {
        self.fitted.as_ref().ok_or(BtydError::ModelNotFitted)
    }

    fn neg_log_likelihood_at(
        &self, params: &BgbbBgExtParams, data: &CohortData,
    ) -> BtydResult<f64> {
        neg_log_likelihood_ext(params, data, self.penalizer_coef)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn reference_params() -> BgbbBgParams {
        BgbbBgParams::new(1.204, 0.750, 0.657, 2.783, 0.5, 1.5).unwrap()
    }

    fn reference_ext() -> BgbbBgExtParams {
        BgbbBgExtParams::new(1.204, 0.750, 0.657, 2.783, 0.5, 1.5, 0.2).unwrap()
    }

    fn conversion_cohort() -> CohortData {
        CohortData::new(
            array![3.0, 5.0, 1.0],
            array![4.0, 6.0, 1.0],
            array![6.0, 6.0, 6.0],
            None,
            Some(array![2.0, 0.0, 4.0]),
            Some(array![2, 1, 1]),
        )
        .unwrap()
    }

    #[test]
    // Purpose
    // -------
    // Verify the likelihood factorization: total minus the session part
    // must equal the hand-computed conversion part.
    //
    // Given
    // -----
    // - The three-row conversion cohort and reference parameters.
    //
    // Expect
    // ------
    // - nll_total - nll_sessions == -Σ w ln(B(ε+conv, ζ+x_c)/B(ε, ζ)).
    fn likelihood_factorizes_into_session_and_conversion_parts() {
        // Arrange
        let params = reference_params();
        let data = conversion_cohort();

        // Act
        let total = neg_log_likelihood(&params, &data, 0.05).unwrap();
        let sessions = bgbb::neg_log_likelihood(&params.session_params(), &data, 0.05);

        // Assert
        let ln_ez = ln_beta(0.5, 1.5);
        // Rows: (x=3, x_c=2, w=2) converted; (x=5, x_c=0, w=1) converted;
        // (x=1, x_c=4, w=1) not converted.
        let by_hand = -(2.0 * (ln_beta(1.5, 3.5) - ln_ez)
            + (ln_beta(1.5, 1.5) - ln_ez)
            + (ln_beta(0.5, 5.5) - ln_ez));
        assert!((total - sessions - by_hand).abs() < 1e-10);
    }

    #[test]
    // Purpose
    // -------
    // Verify the closed forms at t = 0: mean of the conversion Beta for
    // the plain family, the point mass for the extended one.
    //
    // Given
    // -----
    // - ε = 0.5, ζ = 1.5, c0 = 0.2.
    //
    // Expect
    // ------
    // - rate(0) = ε / (ε + ζ) = 0.25 and rate_ext(0) = 0.2.
    fn first_period_rates_match_closed_forms() {
        // Act & Assert
        let rate = conversion_rate(&reference_params(), 0.0).unwrap();
        assert!((rate - 0.25).abs() < 1e-12);
        assert_eq!(conversion_rate_ext(&reference_ext(), 0.0).unwrap(), 0.2);
    }

    #[test]
    // Purpose
    // -------
    // Verify the regularized cumulative curve stays a proper probability
    // and is monotone in the horizon.
    //
    // Given
    // -----
    // - Extended reference parameters, horizons 0..12.
    //
    // Expect
    // ------
    // - Values non-decreasing and within [c0, 1].
    fn ext_cumulative_curve_is_monotone_and_bounded() {
        // Arrange
        let params = reference_ext();

        // Act & Assert
        let mut prev = 0.0;
        for t in 0..=12u64 {
            let within = conversion_rate_within_time_ext(&params, t as f64).unwrap();
            assert!(within >= prev - 1e-12, "t = {t}: {within} < {prev}");
            assert!(within >= 0.2 - 1e-12 && within <= 1.0 + 1e-9, "t = {t}: {within}");
            prev = within;
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify the regularization rule of the extended family: the first
    // two periods pass through untouched, a decaying raw rate above the
    // 1e-6 floor passes through, anything below the floor reports as
    // zero, and the cumulative curve goes flat from there on.
    //
    // Given
    // -----
    // - A steep dropout shape (γ = 8) so the raw per-period rate falls
    //   below the floor within the first 40 periods.
    //
    // Expect
    // ------
    // - Regularized == raw before the floor crossing, zero after it;
    //   within-time at horizon 40 equals within-time at the crossing.
    fn ext_regularization_floors_vanishing_rates() {
        // Arrange
        let params = BgbbBgExtParams::new(1.2, 0.75, 8.0, 1.0, 0.5, 1.5, 0.2).unwrap();

        // Act & Assert
        let mut first_floored = None;
        for t in 0..=40u64 {
            let tf = t as f64;
            let raw = conversion_rate_ext(&params, tf).unwrap();
            let reg = conversion_rate_regularized_ext(&params, tf).unwrap();
            if t > 1 && raw < 1e-6 && first_floored.is_none() {
                first_floored = Some(tf);
            }
            if first_floored.is_some() {
                assert_eq!(reg, 0.0, "t = {t}");
            } else {
                assert_eq!(reg, raw, "t = {t}");
            }
        }

        let t0 = first_floored.expect("raw rate never fell below the floor");
        let at_floor = conversion_rate_within_time_ext(&params, t0).unwrap();
        let later = conversion_rate_within_time_ext(&params, 40.0).unwrap();
        assert_eq!(later, at_floor);
    }

    #[test]
    // Purpose
    // -------
    // Verify error surfaces: missing conversion column and resampled
    // spreads.
    //
    // Given
    // -----
    // - A cohort without conversions; two jittered parameter sets.
    //
    // Expect
    // ------
    // - MissingConversionFrequency from the likelihood; a positive finite
    //   spread from the resampled error.
    fn error_paths_and_resampled_spread() {
        // Arrange
        let bare =
            CohortData::contractual(array![1.0], array![5.0], None).unwrap();
        let err = neg_log_likelihood(&reference_params(), &bare, 0.0).unwrap_err();
        assert_eq!(err, BtydError::MissingConversionFrequency);

        let jittered = BgbbBgParams::new(1.3, 0.8, 0.7, 2.6, 0.55, 1.4).unwrap();

        // Act
        let spread = conversion_rate_stderr(&[reference_params(), jittered], 2.0).unwrap();

        // Assert
        assert!(spread.is_finite() && spread > 0.0);
        let err = conversion_rate_stderr(&[], 2.0).unwrap_err();
        assert_eq!(err, BtydError::EmptyParamsList);
    }
}
