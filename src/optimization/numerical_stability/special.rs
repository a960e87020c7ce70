//! Log-space special-function helpers.
//!
//! The model likelihoods in this crate are products of Gamma and Beta
//! function ratios whose factors overflow `f64` long before the ratios do.
//! Everything here therefore works on logarithms, with explicit sign
//! tracking where alternating sums can cancel:
//!
//! - [`log_add_exp`] / [`signed_log_sum_exp`]: stable combiners for
//!   `ln(e^a + e^b)` and `ln|Σ s_i e^{l_i}|`.
//! - [`ln_binom`], [`ln_gamma_ratio`]: log binomial coefficients and
//!   `ln(Γ(x + d) / Γ(x))` without forming either Gamma value.
//! - [`hyp2f1`]: Gauss hypergeometric series for arguments in `[0, 1)`;
//!   callers arrange their arguments so the series converges.
//! - [`beta_ext`] / [`beta_safe`] / [`digamma_ext`]: Beta function and
//!   digamma extended to first arguments in `(-1, 0)` via one step of the
//!   standard recurrences, which is as far as the model formulas reach.
use statrs::function::beta::ln_beta;
use statrs::function::gamma::{digamma, ln_gamma};

/// Stable `ln(exp(a) + exp(b))`.
///
/// Handles `-inf` inputs exactly: if one side is `-inf` the other is
/// returned, and `log_add_exp(-inf, -inf) = -inf`.
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let m = a.max(b);
    m + ((a - m).exp() + (b - m).exp()).ln()
}

/// Stable signed log-sum-exp: `Σ_i sign_i · exp(log_mag_i)` in log space.
///
/// Returns `(ln|sum|, sign(sum))`. Terms with `log_mag = -inf` contribute
/// nothing; exact cancellation yields `(-inf, 0.0)`.
///
/// # Panics
/// Debug-asserts that the two slices have equal length; the callers all
/// build them together.
pub fn signed_log_sum_exp(log_mags: &[f64], signs: &[f64]) -> (f64, f64) {
    debug_assert_eq!(log_mags.len(), signs.len());
    let m = log_mags.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if m == f64::NEG_INFINITY {
        return (f64::NEG_INFINITY, 0.0);
    }
    let mut acc = 0.0;
    for (&l, &s) in log_mags.iter().zip(signs.iter()) {
        acc += s * (l - m).exp();
    }
    if acc == 0.0 {
        return (f64::NEG_INFINITY, 0.0);
    }
    (m + acc.abs().ln(), acc.signum())
}

/// `ln C(n, k)` through log-Gamma, valid for real `n ≥ k ≥ 0`.
pub fn ln_binom(n: f64, k: f64) -> f64 {
    ln_gamma(n + 1.0) - ln_gamma(k + 1.0) - ln_gamma(n - k + 1.0)
}

/// `ln(Γ(x + d) / Γ(x))` for `x > 0`, `x + d > 0`.
///
/// Neither Gamma value is formed, so the ratio stays representable even
/// when both factors overflow.
pub fn ln_gamma_ratio(x: f64, d: f64) -> f64 {
    ln_gamma(x + d) - ln_gamma(x)
}

/// Maximum number of series terms for [`hyp2f1`].
const HYP2F1_MAX_TERMS: usize = 1_000;

/// Gauss hypergeometric function `2F1(a, b; c; z)` by power series.
///
/// Valid for `0 <= z < 1` with `c` not a non-positive integer; the model
/// formulas construct their arguments so `z` falls in this range (the
/// Pareto/NBD recursion picks the smaller of its two shape scales for
/// exactly this reason). The series is truncated once the next term drops
/// below `1e-15` of the accumulated sum.
pub fn hyp2f1(a: f64, b: f64, c: f64, z: f64) -> f64 {
    let mut term = 1.0;
    let mut sum = 1.0;
    for j in 0..HYP2F1_MAX_TERMS {
        let jf = j as f64;
        term *= (a + jf) * (b + jf) / ((c + jf) * (1.0 + jf)) * z;
        sum += term;
        if term.abs() <= 1e-15 * sum.abs() {
            break;
        }
    }
    sum
}

/// Beta function extended to `a > -1`, returned as `(ln|B(a, b)|, sign)`.
///
/// For `a > 0` this is the ordinary (positive) Beta function. For
/// `a ∈ (-1, 0)` the reflection `B(a, b) = B(a + 1, b) · (a + b) / a`
/// continues it with the correct (negative) sign while only ever
/// evaluating `ln_beta` at positive arguments. `a = 0` is a pole and maps
/// to `(+inf, 1.0)`.
pub fn beta_ext(a: f64, b: f64) -> (f64, f64) {
    if a > 0.0 {
        return (ln_beta(a, b), 1.0);
    }
    if a == 0.0 {
        return (f64::INFINITY, 1.0);
    }
    let factor = (a + b) / a;
    (ln_beta(a + 1.0, b) + factor.abs().ln(), factor.signum())
}

/// Real-valued Beta function for `a > -1`, `b > 0`.
///
/// Convenience wrapper over [`beta_ext`] for the derived-quantity
/// formulas, whose Beta values are small enough to exponentiate.
pub fn beta_safe(a: f64, b: f64) -> f64 {
    let (log_abs, sign) = beta_ext(a, b);
    sign * log_abs.exp()
}

/// Digamma extended to `x > -1` via `ψ(x) = ψ(x + 1) - 1/x`.
pub fn digamma_ext(x: f64) -> f64 {
    if x > 0.0 {
        return digamma(x);
    }
    digamma(x + 1.0) - 1.0 / x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // Check `log_add_exp` against direct evaluation and its -inf
    // identities.
    //
    // Given
    // -----
    // - a = ln 2, b = ln 3, plus -inf edge cases.
    //
    // Expect
    // ------
    // - log_add_exp(ln 2, ln 3) = ln 5; -inf acts as the identity.
    fn log_add_exp_matches_direct_sum() {
        // Act & Assert
        let got = log_add_exp(2.0_f64.ln(), 3.0_f64.ln());
        assert!((got - 5.0_f64.ln()).abs() < 1e-12);
        assert_eq!(log_add_exp(f64::NEG_INFINITY, 1.5), 1.5);
        assert_eq!(log_add_exp(f64::NEG_INFINITY, f64::NEG_INFINITY), f64::NEG_INFINITY);
    }

    #[test]
    // Purpose
    // -------
    // Check the signed combiner on a difference of exponentials and on
    // exact cancellation.
    //
    // Given
    // -----
    // - ln 5 with sign +1 and ln 3 with sign -1, then two equal terms with
    //   opposite signs.
    //
    // Expect
    // ------
    // - (ln 2, +1) for the difference; (-inf, 0) for the cancellation.
    fn signed_log_sum_exp_handles_differences_and_cancellation() {
        // Act
        let (log_mag, sign) = signed_log_sum_exp(&[5.0_f64.ln(), 3.0_f64.ln()], &[1.0, -1.0]);

        // Assert
        assert!((log_mag - 2.0_f64.ln()).abs() < 1e-12);
        assert_eq!(sign, 1.0);

        let (log_mag, sign) = signed_log_sum_exp(&[1.0, 1.0], &[1.0, -1.0]);
        assert_eq!(log_mag, f64::NEG_INFINITY);
        assert_eq!(sign, 0.0);
    }

    #[test]
    // Purpose
    // -------
    // Validate the hypergeometric series against the closed form
    // 2F1(1, 1; 2; z) = -ln(1 - z) / z.
    //
    // Given
    // -----
    // - z in {0.1, 0.5, 0.9}.
    //
    // Expect
    // ------
    // - Series agrees with the closed form to 1e-10.
    fn hyp2f1_matches_logarithm_identity() {
        // Act & Assert
        for z in [0.1, 0.5, 0.9] {
            let expected = -(1.0 - z as f64).ln() / z;
            assert!((hyp2f1(1.0, 1.0, 2.0, z) - expected).abs() < 1e-10, "z = {z}");
        }
    }

    #[test]
    // Purpose
    // -------
    // Check the Beta continuation: the recurrence value at a negative
    // first argument must be consistent with the positive-argument value
    // it is derived from, and carry a negative sign when (a + b) > 0.
    //
    // Given
    // -----
    // - a = -0.4, b = 2.5.
    //
    // Expect
    // ------
    // - beta_safe(-0.4, 2.5) == B(0.6, 2.5) * (2.1 / -0.4), which is
    //   negative.
    fn beta_ext_continues_to_negative_first_argument() {
        // Arrange
        let reference = beta_safe(0.6, 2.5) * (2.1 / -0.4);

        // Act
        let got = beta_safe(-0.4, 2.5);

        // Assert
        assert!(got < 0.0);
        assert!((got - reference).abs() < 1e-12 * reference.abs());
    }

    #[test]
    // Purpose
    // -------
    // Check the digamma continuation against the defining recurrence.
    //
    // Given
    // -----
    // - x = -0.3.
    //
    // Expect
    // ------
    // - digamma_ext(-0.3) == digamma(0.7) - 1 / (-0.3).
    fn digamma_ext_satisfies_recurrence() {
        // Act
        let got = digamma_ext(-0.3);

        // Assert
        let expected = statrs::function::gamma::digamma(0.7) + 1.0 / 0.3;
        assert!((got - expected).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Spot-check `ln_binom` and `ln_gamma_ratio` against small integer
    // cases computable by hand.
    //
    // Given
    // -----
    // - C(5, 2) = 10 and Γ(7)/Γ(4) = 6!/3! = 120.
    //
    // Expect
    // ------
    // - Log-space results match ln 10 and ln 120.
    fn ln_binom_and_gamma_ratio_match_integer_cases() {
        // Act & Assert
        assert!((ln_binom(5.0, 2.0) - 10.0_f64.ln()).abs() < 1e-12);
        assert!((ln_gamma_ratio(4.0, 3.0) - 120.0_f64.ln()).abs() < 1e-12);
    }
}
