//! btyd — buy-till-you-die customer-behavior models in Rust.
//!
//! Purpose
//! -------
//! Fit probabilistic models of repeat purchasing, churn, conversion, and
//! spend to per-customer summary data, then interrogate the fits:
//! expected future transactions, alive probabilities, count
//! distributions, delta-method standard errors, and simulation-based
//! goodness-of-fit verdicts.
//!
//! Layout
//! ------
//! - [`btyd`]: cohort containers, model families, fitting, and cohort
//!   simulation.
//! - [`optimization`]: the Argmin-backed log-likelihood maximizer and the
//!   numerically stable primitives the likelihoods are built from.
//! - [`inference`]: delta-method uncertainty propagation.
//! - [`statistical_tests`]: simulation-based validation of fitted models.
//!
//! Downstream usage
//! ----------------
//! ```rust,ignore
//! use btyd::btyd::{BetaGeo, CohortData, CohortModel, FitOptions};
//!
//! let data = CohortData::new(frequency, recency, age, None, None, weights)?;
//! let mut model = BetaGeo::new(0.0);
//! model.fit(&data, None, &FitOptions::default())?;
//! let forecast = model.expected_purchases(39.0)?;
//! ```

pub mod btyd;
pub mod inference;
pub mod optimization;
pub mod statistical_tests;
