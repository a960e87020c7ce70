//! optimization — MLE stack, numerical helpers, and unified error surface.
//!
//! Purpose
//! -------
//! Provide a cohesive optimization layer for model fitting, combining an
//! Argmin-backed log-likelihood optimizer, numerically stable transforms and
//! special functions, and a single error/result surface. Model families
//! implement a log-likelihood, choose tolerances, and obtain fitted
//! parameters and diagnostics without touching backend solver details.
//!
//! Key behaviors
//! -------------
//! - Expose a high-level API for **maximizing log-likelihoods** `ℓ(θ)`
//!   (`loglik_optimizer`), including configuration of solvers and stopping
//!   criteria.
//! - Supply shared numerical primitives (`numerical_stability`) for
//!   log-space likelihood arithmetic and for mapping unconstrained
//!   parameters into model space.
//! - Normalize configuration issues, numerical failures, and backend solver
//!   errors into a single enum (`errors::OptError`) with a common result
//!   alias (`OptResult<T>`).
//!
//! Conventions
//! -----------
//! - All solvers conceptually maximize a log-likelihood `ℓ(θ)` by minimizing
//!   an internal cost `c(θ) = -ℓ(θ)`; user-facing APIs and outcomes are
//!   expressed in terms of `ℓ`.
//! - Parameters and gradients are represented using `ndarray`-based aliases
//!   (`Theta`, `Grad`); any mapping between unconstrained θ-space and
//!   structured model parameters is handled in the model layer with the
//!   numerical-stability transforms.
//! - Public optimization entrypoints that can fail return `OptResult<T>`;
//!   callers never see raw Argmin errors.
//! - This module and its submodules avoid I/O; the restart driver in the
//!   model layer is responsible for reporting progress when asked.

pub mod errors;
pub mod loglik_optimizer;
pub mod numerical_stability;

// ---- Optional convenience prelude for downstream code ----------------------
//
// Downstream code can write
//
//     use btyd::optimization::prelude::*;
//
// to import the main optimization surface in a single line.

pub mod prelude {
    pub use super::errors::{OptError, OptResult};
    pub use super::loglik_optimizer::prelude::*;
    pub use super::numerical_stability::prelude::*;
}
