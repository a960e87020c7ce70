//! Unified error handling for inference routines.
//!
//! This module defines `InferenceError`, the error type used by the
//! delta-method variance propagation utilities, together with the
//! `InferenceResult<T>` alias standardizing return types across inference
//! code.

/// Unified error type for inference routines.
///
/// Covers malformed covariance inputs and numerically unusable quantity
/// gradients. Readable diagnostics are provided through `Display`.
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceError {
    // ---- Delta method ----
    /// Covariance matrix must be square with one row per parameter.
    CovarianceShapeMismatch {
        expected: usize,
        found: (usize, usize),
    },

    /// Quantity gradients must be finite to propagate variance.
    NonFiniteGradient {
        index: usize,
        value: f64,
    },

    /// Propagated variance came out negative, so the covariance input is
    /// not positive semi-definite.
    NegativeVariance {
        variance: f64,
    },
}

pub type InferenceResult<T> = Result<T, InferenceError>;

impl std::error::Error for InferenceError {}

impl std::fmt::Display for InferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Delta method ----
            InferenceError::CovarianceShapeMismatch { expected, found } => {
                write!(
                    f,
                    "Inference Error: Covariance shape mismatch, expected ({expected}, {expected}), found {found:?}"
                )
            }
            InferenceError::NonFiniteGradient { index, value } => {
                write!(
                    f,
                    "Inference Error: Quantity gradient has non-finite value {value} at index {index}"
                )
            }
            InferenceError::NegativeVariance { variance } => {
                write!(
                    f,
                    "Inference Error: Propagated variance {variance} is negative; covariance is not PSD"
                )
            }
        }
    }
}
