//! numerical_stability — numerically robust transforms and log-space special functions.
//!
//! Purpose
//! -------
//! Collect the scalar transforms and log-space special-function helpers the
//! model likelihoods are built from. The likelihood formulas in this crate
//! are products of Gamma/Beta ratios and alternating finite sums; this
//! module centralizes the guarded arithmetic (log-sum-exp with signs,
//! log-Gamma ratios, series 2F1, Beta/digamma continuations) so the model
//! layer can stay close to the published formulas.
//!
//! Key behaviors
//! -------------
//! - Provide stable scalar transforms (`safe_softplus`, `logistic`,
//!   `logit`) for mapping unconstrained reals into strictly positive or
//!   (0, 1) parameters without overflow/underflow.
//! - Provide log-space combiners (`log_add_exp`, `signed_log_sum_exp`)
//!   that tolerate `-inf` magnitudes and exact cancellation.
//! - Provide `ln_binom`, `ln_gamma_ratio`, the Gauss hypergeometric series
//!   `hyp2f1`, and Beta/digamma continuations (`beta_ext`, `beta_safe`,
//!   `digamma_ext`) for first arguments down to `-1`.
//!
//! Conventions
//! -----------
//! - All routines are pure scalar helpers; no I/O, no logging, no global
//!   state. Domain validation happens in the model layer, not here.
//! - Signed results are reported as `(ln|value|, sign)` pairs with
//!   `(-inf, 0.0)` standing for exact zero.

pub mod special;
pub mod transformations;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::special::{
    beta_ext, beta_safe, digamma_ext, hyp2f1, ln_binom, ln_gamma_ratio, log_add_exp,
    signed_log_sum_exp,
};
pub use self::transformations::{logistic, logit, safe_softplus};

// ---- Optional convenience prelude for downstream code ----------------------
//
// Downstream code can write
//
//     use btyd::optimization::numerical_stability::prelude::*;
//
// to import the main numerical-stability surface in a single line.

pub mod prelude {
    pub use super::special::{
        beta_ext, beta_safe, digamma_ext, hyp2f1, ln_binom, ln_gamma_ratio, log_add_exp,
        signed_log_sum_exp,
    };
    pub use super::transformations::{logistic, logit, safe_softplus};
}
