//! errors — the model layer's unified error surface.
//!
//! Purpose
//! -------
//! One enum for everything the cohort models can reject: malformed
//! cohort columns, out-of-domain parameters, unfitted-model access,
//! invalid discrete horizons, inference-input problems, and optimizer
//! failures. Lower-level errors are flattened into this enum via `From`,
//! so model-layer signatures need only [`BtydResult`].
//!
//! Conventions
//! -----------
//! - Data validation reports the first offender with its column, row,
//!   and value.
//! - Optimizer failures carry the rendered cause rather than the inner
//!   enum; callers who need structure should call the optimizer layer
//!   directly.

use crate::inference::errors::InferenceError;
use crate::optimization::errors::OptError;

/// Crate-wide result alias for model-layer operations.
pub type BtydResult<T> = Result<T, BtydError>;

#[derive(Debug, Clone, PartialEq)]
pub enum BtydError {
    // ---- Cohort data ----
    /// Cohort must contain at least one row.
    EmptyCohort,

    /// A column's length does not match the frequency column.
    FieldLengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Column entries need to be finite.
    NonFiniteField {
        field: &'static str,
        index: usize,
        value: f64,
    },

    /// Column entries need to be non-negative.
    NegativeField {
        field: &'static str,
        index: usize,
        value: f64,
    },

    /// A customer cannot have been seen after their observation window.
    RecencyExceedsAge {
        index: usize,
        recency: f64,
        age: f64,
    },

    /// Discrete-churn rows cannot record more active periods than their age.
    FrequencyExceedsAge {
        index: usize,
        frequency: f64,
        age: f64,
    },

    /// Row weights are multiplicities and must be at least one.
    ZeroWeight {
        index: usize,
    },

    /// Monetary column required but absent.
    MissingMonetaryValue,

    /// Conversion-count column required but absent.
    MissingConversionFrequency,

    /// Monetary model rows need strictly positive spend.
    NonPositiveMonetaryValue {
        index: usize,
        value: f64,
    },

    /// Monetary model rows need at least one observed transaction.
    ZeroFrequency {
        index: usize,
    },

    // ---- Parameters ----
    /// Parameter vector length does not match the family.
    ParamLengthMismatch {
        expected: usize,
        actual: usize,
    },

    /// Shape/scale parameters must be strictly positive.
    NonPositiveParam {
        name: &'static str,
        value: f64,
    },

    /// Parameters must be finite.
    NonFiniteParam {
        name: &'static str,
        value: f64,
    },

    /// Mixture weight must lie strictly inside (0, 1).
    MixtureWeightOutOfRange {
        value: f64,
    },

    /// Resampled-parameter error estimates need at least one parameter set.
    EmptyParamsList,

    // ---- Model state & derived quantities ----
    /// Derived quantities require a successful fit first.
    ModelNotFitted,

    /// Discrete-time horizons must be whole numbers.
    NonIntegerTime {
        value: f64,
    },

    /// Discrete transaction counts must be whole numbers.
    NonIntegerCount {
        value: f64,
    },

    /// A count cannot exceed the horizon it is observed over.
    HorizonBeforeCount {
        t: f64,
        n: f64,
    },

    // ---- Inference ----
    /// Covariance matrix must be square with one row per parameter.
    CovarianceShapeMismatch {
        expected: usize,
        found: (usize, usize),
    },

    /// Quantity gradients must be finite for the delta method.
    NonFiniteGradient {
        index: usize,
        value: f64,
    },

    /// Delta-method variance came out negative; the supplied covariance is
    /// not positive semi-definite.
    NegativeVariance {
        variance: f64,
    },

    // ---- Optimization ----
    /// The optimizer driver failed; carries the rendered cause.
    OptimizationFailed {
        text: String,
    },
}

impl std::error::Error for BtydError {}

impl std::fmt::Display for BtydError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Cohort data ----
            BtydError::EmptyCohort => {
                write!(f, "Cohort data must contain at least one row")
            }
            BtydError::FieldLengthMismatch { field, expected, actual } => {
                write!(f, "Column '{field}' length mismatch: expected {expected}, actual {actual}")
            }
            BtydError::NonFiniteField { field, index, value } => {
                write!(f, "Column '{field}' has non-finite value {value} at row {index}")
            }
            BtydError::NegativeField { field, index, value } => {
                write!(f, "Column '{field}' has negative value {value} at row {index}")
            }
            BtydError::RecencyExceedsAge { index, recency, age } => {
                write!(f, "Row {index}: recency {recency} exceeds age {age}")
            }
            BtydError::FrequencyExceedsAge { index, frequency, age } => {
                write!(f, "Row {index}: frequency {frequency} exceeds age {age}")
            }
            BtydError::ZeroWeight { index } => {
                write!(f, "Row {index}: weight must be at least one")
            }
            BtydError::MissingMonetaryValue => {
                write!(f, "Monetary value column is required for this model")
            }
            BtydError::MissingConversionFrequency => {
                write!(f, "Conversion frequency column is required for this model")
            }
            BtydError::NonPositiveMonetaryValue { index, value } => {
                write!(f, "Row {index}: monetary value {value} must be strictly positive")
            }
            BtydError::ZeroFrequency { index } => {
                write!(f, "Row {index}: frequency must be strictly positive for this model")
            }

            // ---- Parameters ----
            BtydError::ParamLengthMismatch { expected, actual } => {
                write!(f, "Parameter length mismatch: expected {expected}, actual {actual}")
            }
            BtydError::NonPositiveParam { name, value } => {
                write!(f, "Parameter '{name}' must be strictly positive, got {value}")
            }
            BtydError::NonFiniteParam { name, value } => {
                write!(f, "Parameter '{name}' must be finite, got {value}")
            }
            BtydError::MixtureWeightOutOfRange { value } => {
                write!(f, "Mixture weight must lie strictly inside (0, 1), got {value}")
            }
            BtydError::EmptyParamsList => {
                write!(f, "Parameter list for resampled errors must be non-empty")
            }

            // ---- Model state & derived quantities ----
            BtydError::ModelNotFitted => {
                write!(f, "Model has not been fitted yet; call fit first")
            }
            BtydError::NonIntegerTime { value } => {
                write!(f, "Discrete-time horizon must be a whole number, got {value}")
            }
            BtydError::NonIntegerCount { value } => {
                write!(f, "Transaction count must be a whole number, got {value}")
            }
            BtydError::HorizonBeforeCount { t, n } => {
                write!(f, "Horizon t = {t} must be at least the count n = {n}")
            }

            // ---- Inference ----
            BtydError::CovarianceShapeMismatch { expected, found } => {
                write!(
                    f,
                    "Covariance matrix shape mismatch: expected ({expected}, {expected}), found {found:?}"
                )
            }
            BtydError::NonFiniteGradient { index, value } => {
                write!(f, "Quantity gradient has non-finite value {value} at index {index}")
            }
            BtydError::NegativeVariance { variance } => {
                write!(f, "Delta-method variance {variance} is negative; covariance is not PSD")
            }

            // ---- Optimization ----
            BtydError::OptimizationFailed { text } => {
                write!(f, "Optimization failed: {text}")
            }
        }
    }
}

impl From<OptError> for BtydError {
    fn from(err: OptError) -> Self {
        BtydError::OptimizationFailed { text: err.to_string() }
    }
}

impl From<InferenceError> for BtydError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::CovarianceShapeMismatch { expected, found } => {
                BtydError::CovarianceShapeMismatch { expected, found }
            }
            InferenceError::NonFiniteGradient { index, value } => {
                BtydError::NonFiniteGradient { index, value }
            }
            InferenceError::NegativeVariance { variance } => {
                BtydError::NegativeVariance { variance }
            }
        }
    }
}
