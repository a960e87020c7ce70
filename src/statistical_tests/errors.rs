//! errors — error and result types for simulation-based validation.
//!
//! Purpose
//! -------
//! Define the dedicated error enum for the goodness-of-fit machinery:
//! configuration guards for the simulation itself, plus a wrapper for
//! model-layer failures surfaced while fitting or evaluating simulated
//! cohorts.
//!
//! Conventions
//! -----------
//! - Messages are phrased as the violated domain constraint.
//! - Model-layer errors pass through unchanged inside [`GofError::Model`]
//!   so callers can still match on the underlying cause.

use std::error::Error;
use std::fmt;

use crate::btyd::errors::BtydError;

/// Result alias for goodness-of-fit routines.
pub type GofResult<T> = Result<T, GofError>;

/// Errors produced by simulation-based validation.
#[derive(Debug, Clone, PartialEq)]
pub enum GofError {
    /// Confidence level outside the open interval (0, 1).
    InvalidConfidenceLevel { value: f64 },

    /// A simulation needs at least one replicate.
    InvalidSimulationSize,

    /// Train/test split ratio outside the open interval (0, 1).
    InvalidTestRatio { value: f64 },

    /// A model-layer failure while fitting or evaluating a cohort.
    Model(BtydError),
}

impl fmt::Display for GofError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GofError::InvalidConfidenceLevel { value } => {
                write!(f, "confidence level must lie strictly between 0 and 1, got {value}")
            }
            GofError::InvalidSimulationSize => {
                write!(f, "simulation size must be at least 1")
            }
            GofError::InvalidTestRatio { value } => {
                write!(f, "test ratio must lie strictly between 0 and 1, got {value}")
            }
            GofError::Model(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GofError {}

impl From<BtydError> for GofError {
    fn from(err: BtydError) -> Self {
        GofError::Model(err)
    }
}
