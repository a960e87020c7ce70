//! Numerical stability utilities.
//!
//! Provides safe implementations of common nonlinear transforms
//! that are prone to overflow/underflow in naïve form.
//! The functions here follow guarded strategies similar to those
//! in major ML libraries (e.g. PyTorch, TensorFlow), using explicit
//! cutoffs (`x > 20.0`) to keep `f64` arithmetic in a well-conditioned regime.
//!
//! # Provided items
//! - [`safe_softplus(x)`]: stable version of `ln(1 + exp(x))`,
//!   mapping ℝ → (0, ∞) without overflow.
//! - [`logistic(x)`]: stable `1 / (1 + exp(-x))`, mapping ℝ → (0, 1).
//! - [`logit(p)`]: inverse of [`logistic`], mapping (0, 1) → ℝ.
//!
//! # Rationale
//! These transforms are building blocks in optimization and
//! probabilistic modeling whenever parameters must be kept
//! strictly positive or inside the unit interval: the optimizer works in
//! unconstrained space, and these maps carry values back and forth.

/// Numerically stable softplus: `softplus(x) = ln(1 + exp(x))`.
///
/// Computes softplus without overflow for large positive `x` and
/// with good precision for large negative `x`. This implementation
/// uses a simple piecewise guard:
///
/// - For sufficiently large `x`, `softplus(x) ≈ x + ln1p(exp(-x)) ≈ x`.
/// - Otherwise, it falls back to `ln1p(exp(x))`.
///
/// The cutoff used here (`x > 20.0`) is a practical threshold that
/// keeps the calculation in a well-conditioned regime for `f64`.
///
/// # Parameters
/// - `x`: real input
///
/// # Returns
/// - `softplus(x)` as `f64`.
pub fn safe_softplus(x: f64) -> f64 {
    if x > 20.0 { x } else { x.exp().ln_1p() }
}

/// Numerically stable logistic function: `1 / (1 + exp(-x))`.
///
/// Evaluated through the branch that keeps the exponential argument
/// non-positive, so neither branch can overflow.
///
/// # Parameters
/// - `x`: real input
///
/// # Returns
/// - `logistic(x)` in `(0, 1)`.
pub fn logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Inverse of [`logistic`] on `(0, 1)`: `logit(p) = ln(p / (1 - p))`.
///
/// # Parameters
/// - `p`: a probability strictly inside `(0, 1)`.
///
/// # Returns
/// - `t` such that `logistic(t) = p`. Values at the boundary map to
///   `±inf`, mirroring the mathematical limit.
pub fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}
