//! Delta-method variance propagation for derived quantities.
//!
//! A fitted model reports parameter estimates; the quantities of interest
//! (expected purchases, conversion rates) are smooth functions `q(params)`
//! of those estimates. Given a parameter covariance matrix `C` and the
//! gradient `g = ∇q` at the estimates, the first-order (delta-method)
//! variance of the quantity is `gᵀ C g` and its standard error the square
//! root.
//!
//! The covariance matrix is supplied by the caller in raw parameter space;
//! shape and finiteness are validated here so every derived-quantity
//! error entry point shares the same failure modes.

use ndarray::{Array1, Array2};

use crate::inference::errors::{InferenceError, InferenceResult};

/// First-order standard error of a scalar quantity via the delta method.
///
/// `grad` is the gradient of the quantity with respect to the model's raw
/// parameters, in declaration order; `covariance` is the matching `p × p`
/// parameter covariance.
///
/// # Errors
/// - [`InferenceError::CovarianceShapeMismatch`] when `covariance` is not
///   `p × p` for `p = grad.len()`.
/// - [`InferenceError::NonFiniteGradient`] on the first non-finite
///   gradient entry.
/// - [`InferenceError::NegativeVariance`] when `gᵀ C g < 0`.
pub fn delta_method_stderr(
    grad: &Array1<f64>, covariance: &Array2<f64>,
) -> InferenceResult<f64> {
    let p = grad.len();
    let shape = covariance.dim();
    if shape != (p, p) {
        return Err(InferenceError::CovarianceShapeMismatch { expected: p, found: shape });
    }
    for (index, &value) in grad.iter().enumerate() {
        if !value.is_finite() {
            return Err(InferenceError::NonFiniteGradient { index, value });
        }
    }

    let variance = grad.dot(&covariance.dot(grad));
    if variance < 0.0 {
        return Err(InferenceError::NegativeVariance { variance });
    }
    Ok(variance.sqrt())
}
