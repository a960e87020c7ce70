//! statistical_tests — simulation-based model validation.
//!
//! Purpose
//! -------
//! Collect the statistical machinery for judging fitted cohort models:
//! the goodness-of-fit acceptance band built from cohorts simulated at
//! the fitted parameters, and the Bernoulli train/test splitter used to
//! hold out evaluation data.
//!
//! Key behaviors
//! -------------
//! - [`goodness_of_fit`] compares the observed negative log-likelihood
//!   against symmetric percentiles of the simulated distribution, either
//!   scoring fixed parameters on held-out data or refitting every
//!   simulated cohort.
//! - [`split_dataset`] splits weighted cohorts per underlying customer,
//!   so a single weighted row can contribute to both sides.
//! - Failures surface through [`GofError`]/[`GofResult`]; model-layer
//!   errors are wrapped, configuration errors are reported directly.
//!
//! Downstream usage
//! ----------------
//! - Typical code imports the main surface as:
//!
//!   ```rust,ignore
//!   use btyd::statistical_tests::{goodness_of_fit, GofOptions};
//!
//!   let outcome = goodness_of_fit(&model, &generator, Some(&test), &opts)?;
//!   assert!(outcome.accepted);
//!   ```

pub mod errors;
pub mod goodness_of_fit;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::errors::{GofError, GofResult};
pub use self::goodness_of_fit::{goodness_of_fit, split_dataset, GofOptions, GofOutcome};

// ---- Optional convenience prelude for downstream crates -------------------

pub mod prelude {
    pub use super::errors::{GofError, GofResult};
    pub use super::goodness_of_fit::{goodness_of_fit, split_dataset, GofOptions, GofOutcome};
}
