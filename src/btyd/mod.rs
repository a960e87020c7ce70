//! btyd — buy-till-you-die customer-behavior models.
//!
//! Purpose
//! -------
//! Model repeat purchasing and churn from per-customer summary data:
//! transaction counts, recency, observation age, and optionally average
//! spend or conversion counts. Each model family couples a penalized
//! likelihood with derived managerial quantities such as expected future
//! transactions and alive probabilities.
//!
//! Layout
//! ------
//! - [`core`]: cohort containers, typed parameter vectors, and the
//!   immutable fit result.
//! - [`models`]: the likelihoods and derived quantities, one module per
//!   family, unified by the [`CohortModel`](models::CohortModel) trait.
//! - [`fitter`]: the multi-restart maximum-likelihood driver over the
//!   unconstrained θ-space.
//! - [`generate`]: synthetic cohort simulators for validation.
//! - [`errors`]: the domain error enum shared across the subtree.
//!
//! Conventions
//! -----------
//! - All cohort columns are `f64` arrays indexed per row group; row
//!   weights are integer multiplicities.
//! - Fitting happens in log-parameter space so positivity never
//!   constrains the optimizer; models map infeasible points to a
//!   `-inf` log-likelihood instead of erroring.
//! - Fit results are immutable: refitting replaces the whole
//!   [`Fitted`](core::Fitted) value.

pub mod core;
pub mod errors;
pub mod fitter;
pub mod generate;
pub mod models;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::core::{
    BetaGeoParams, BgChurnParams, BgbbBgExtParams, BgbbBgParams, BgbbParams, CohortData,
    Fitted, GammaGammaParams, ModelParams, ParetoNbdParams,
};
pub use self::errors::{BtydError, BtydResult};
pub use self::fitter::FitOptions;
pub use self::generate::{BetaGeoGenerator, BgGenerator, BgbbGenerator, CohortGenerator};
pub use self::models::{
    BetaGeo, BgChurn, Bgbb, BgbbBg, BgbbBgExt, CohortModel, GammaGamma, ModifiedBetaGeo,
    ParetoNbd,
};

// ---- Optional convenience prelude for downstream crates -------------------

pub mod prelude {
    pub use super::core::{CohortData, Fitted, ModelParams};
    pub use super::errors::{BtydError, BtydResult};
    pub use super::fitter::FitOptions;
    pub use super::generate::CohortGenerator;
    pub use super::models::CohortModel;
}
