//! core — shared data, parameter, and fit-outcome types for the model layer.
//!
//! Purpose
//! -------
//! Collect the types every model family builds on: the validated cohort
//! container (`data`), the typed parameter vectors with their
//! unconstrained-space bridge (`params`), and the immutable fit record
//! (`fitted`).

pub mod data;
pub mod fitted;
pub mod params;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::data::CohortData;
pub use self::fitted::Fitted;
pub use self::params::{
    BetaGeoParams, BgChurnParams, BgbbBgExtParams, BgbbBgParams, BgbbParams, GammaGammaParams,
    ModelParams, ParetoNbdParams,
};
