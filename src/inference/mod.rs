//! inference — uncertainty quantification for derived model quantities.
//!
//! Purpose
//! -------
//! Provide post-estimation uncertainty tools on top of a fitted model. The
//! model layer exposes point estimates and derived quantities; this module
//! turns a parameter covariance matrix into standard errors for those
//! quantities via first-order (delta-method) variance propagation.
//!
//! Key behaviors
//! -------------
//! - Define a unified error and result type, [`InferenceError`] and
//!   [`InferenceResult`], for inference-specific failures (covariance
//!   shape, non-finite gradients, non-PSD inputs).
//! - Propagate parameter covariance through quantity gradients via
//!   [`delta_method_stderr`].
//!
//! Conventions
//! -----------
//! - Gradients and covariance matrices are expressed in **raw parameter
//!   space**, in each family's declaration order; any mapping from the
//!   optimizer's unconstrained space is handled upstream.
//! - Covariance matrices are `p × p` with `p` the family's parameter
//!   count; shape is validated at every entry point.
//! - All routines are pure: no I/O, no global state. Failures are
//!   reported via [`InferenceResult`] only.

pub mod delta;
pub mod errors;

// ---- Re-exports (primary surface) -----------------------------------------

pub use self::delta::delta_method_stderr;
pub use self::errors::{InferenceError, InferenceResult};

// ---- Optional convenience prelude for downstream crates ------------------

pub mod prelude {
    pub use super::delta::delta_method_stderr;
    pub use super::errors::{InferenceError, InferenceResult};
}
