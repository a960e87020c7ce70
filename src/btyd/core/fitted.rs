//! core::fitted — immutable record of a completed fit.

use crate::btyd::core::data::CohortData;
use crate::btyd::core::params::ModelParams;

/// Outcome of a successful maximum-likelihood fit.
///
/// Immutable by construction: refitting a model produces a fresh value
/// rather than mutating this one. Carries the training cohort so derived
/// quantities and goodness-of-fit checks can be computed later without
/// re-supplying the data.
#[derive(Debug, Clone, PartialEq)]
pub struct Fitted<P: ModelParams> {
    params: P,
    neg_log_likelihood: f64,
    data: CohortData,
}

impl<P: ModelParams> Fitted<P> {
    pub fn new(params: P, neg_log_likelihood: f64, data: CohortData) -> Self {
        Fitted { params, neg_log_likelihood, data }
    }

    /// Maximum-likelihood parameter estimates.
    pub fn params(&self) -> &P {
        &self.params
    }

    /// Penalized negative log-likelihood at the estimates.
    pub fn neg_log_likelihood(&self) -> f64 {
        self.neg_log_likelihood
    }

    /// The cohort the model was trained on.
    pub fn data(&self) -> &CohortData {
        &self.data
    }
}
