//! loglik_optimizer — MLE-friendly, argmin-powered log-likelihood optimizer.
//!
//! Purpose
//! -------
//! Provide a high-level, Argmin-backed optimization layer for **maximizing
//! log-likelihoods** `ℓ(θ)`. Model families implement a single trait,
//! [`LogLikelihood`], and invoke [`maximize`] to run L-BFGS with a
//! configurable line search, tolerances, and finite-difference fallbacks.
//!
//! Key behaviors
//! -------------
//! - Convert model log-likelihoods `ℓ(θ)` into Argmin-compatible
//!   cost functions `c(θ) = -ℓ(θ)` via [`adapter::ArgMinAdapter`].
//! - Expose a single entrypoint [`maximize`] that:
//!   - validates the initial guess with [`LogLikelihood::check`],
//!   - selects an L-BFGS solver via [`builders`] based on [`traits::LineSearcher`],
//!   - executes the solver via [`run::run_lbfgs`], and
//!   - normalizes results into an [`OptimOutcome`].
//! - Centralize optimizer configuration ([`Tolerances`], [`MLEOptions`]) and
//!   validation logic ([`validation`]) so downstream code can assume sane,
//!   finite inputs.
//!
//! Invariants & assumptions
//! ------------------------
//! - The optimizer **always maximizes** a log-likelihood `ℓ(θ)` by minimizing
//!   a cost `c(θ) = -ℓ(θ)`; model code implements `ℓ(θ)` and `∇ℓ(θ)`
//!   (when available), **never** the cost directly.
//! - Parameters live in an unconstrained optimizer space as [`Theta`]
//!   (`Array1<f64>`). Any mapping from constrained → unconstrained space
//!   happens in the model layer (log transforms for positive parameters,
//!   logistic for unit-interval ones).
//! - `ℓ = -inf` marks an infeasible point and becomes a `+inf` cost; only
//!   `NaN` is a hard evaluation error.
//! - Errors bubble up as [`OptResult<T>`](crate::optimization::errors::OptResult);
//!   this module and its children never intentionally panic or use `unsafe`.

pub mod adapter;
pub mod api;
pub mod builders;
pub mod run;
pub mod traits;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::api::maximize;
pub use self::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
pub use self::types::{Cost, DEFAULT_LBFGS_MEM, FnEvalMap, Grad, Theta};

// ---- Optional convenience prelude for downstream code ----------------------
//
// Downstream code can write
//
//     use btyd::optimization::loglik_optimizer::prelude::*;
//
// to import the main optimizer surface in a single line.

pub mod prelude {
    pub use super::api::maximize;
    pub use super::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
    pub use super::types::{Cost, Grad, Theta};
}
