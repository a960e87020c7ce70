//! core::params — typed parameter vectors and the unconstrained bridge.
//!
//! Purpose
//! -------
//! Give every model family a named, validated parameter struct plus a
//! uniform bridge to the optimizer's unconstrained θ-space. Shape and rate
//! parameters live on `(0, ∞)` and travel through `exp`/`ln`; the one
//! mixture weight in the crate (`c0`) lives on `(0, 1)` and travels through
//! the logistic map.
//!
//! Key behaviors
//! -------------
//! - `ModelParams::from_values` validates length, finiteness, and domain,
//!   naming the offending parameter in the error.
//! - `to_theta` / `from_theta` default to elementwise `ln` / `exp`;
//!   families with a unit-interval coordinate override both ends.
//! - `values` round-trips with `from_values`, so generic code (restart
//!   perturbations, delta-method gradients) can treat any family as an
//!   `Array1<f64>`.
//!
//! Conventions
//! -----------
//! - Parameter field names follow the published model notation: `(r, α, s,
//!   β)` for Pareto/NBD, `(r, α, a, b)` for the BG/NBD pair, `(α, β, γ, δ)`
//!   plus optional `(ε, ζ, c0)` for the discrete families, `(α, β)` for the
//!   pure churn model, and `(p, q, v)` for Gamma-Gamma.

use ndarray::Array1;

use crate::btyd::errors::{BtydError, BtydResult};
use crate::optimization::loglik_optimizer::Theta;
use crate::optimization::numerical_stability::{logistic, logit};

/// Named, validated parameter vector for one model family.
///
/// Implementors are plain structs of `f64` fields; this trait supplies the
/// flat-vector view the optimizer and the inference layer work with.
pub trait ModelParams: Sized + Clone + std::fmt::Debug + PartialEq {
    /// Number of free parameters in the family.
    const COUNT: usize;

    /// Parameter names in `values` order.
    fn names() -> &'static [&'static str];

    /// Flat view of the parameters, in `names` order.
    fn values(&self) -> Array1<f64>;

    /// Rebuild from a flat vector, validating length and domain.
    fn from_values(values: &Array1<f64>) -> BtydResult<Self>;

    /// Neutral starting point for optimization when the caller supplies
    /// none: all parameters at one, unit-interval coordinates at one half.
    fn default_initial() -> Self;

    /// Map into the optimizer's unconstrained space (elementwise `ln` by
    /// default).
    fn to_theta(&self) -> Theta {
        self.values().mapv(f64::ln)
    }

    /// Map back from unconstrained space (elementwise `exp` by default).
    ///
    /// # Errors
    /// Propagates `from_values` validation, which fires only for overflow
    /// to infinity under the default map.
    fn from_theta(theta: &Theta) -> BtydResult<Self> {
        Self::from_values(&theta.mapv(f64::exp))
    }
}

fn check_len<P: ModelParams>(values: &Array1<f64>) -> BtydResult<()> {
    if values.len() != P::COUNT {
        return Err(BtydError::ParamLengthMismatch {
            expected: P::COUNT,
            actual: values.len(),
        });
    }
    Ok(())
}

fn check_positive(name: &'static str, value: f64) -> BtydResult<f64> {
    if !value.is_finite() {
        return Err(BtydError::NonFiniteParam { name, value });
    }
    if value <= 0.0 {
        return Err(BtydError::NonPositiveParam { name, value });
    }
    Ok(value)
}

fn check_unit_interval(value: f64) -> BtydResult<f64> {
    if !value.is_finite() {
        return Err(BtydError::NonFiniteParam { name: "c0", value });
    }
    if value <= 0.0 || value >= 1.0 {
        return Err(BtydError::MixtureWeightOutOfRange { value });
    }
    Ok(value)
}

// ---- Pareto/NBD ------------------------------------------------------------

/// Pareto/NBD parameters: Gamma purchase mixture `(r, α)` and Gamma
/// dropout mixture `(s, β)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParetoNbdParams {
    pub r: f64,
    pub alpha: f64,
    pub s: f64,
    pub beta: f64,
}

impl ParetoNbdParams {
    pub fn new(r: f64, alpha: f64, s: f64, beta: f64) -> BtydResult<Self> {
        Self::from_values(&ndarray::arr1(&[r, alpha, s, beta]))
    }
}

impl ModelParams for ParetoNbdParams {
    const COUNT: usize = 4;

    fn names() -> &'static [&'static str] {
        &["r", "alpha", "s", "beta"]
    }

    fn values(&self) -> Array1<f64> {
        ndarray::arr1(&[self.r, self.alpha, self.s, self.beta])
    }

    fn from_values(values: &Array1<f64>) -> BtydResult<Self> {
        check_len::<Self>(values)?;
        Ok(ParetoNbdParams {
            r: check_positive("r", values[0])?,
            alpha: check_positive("alpha", values[1])?,
            s: check_positive("s", values[2])?,
            beta: check_positive("beta", values[3])?,
        })
    }

    fn default_initial() -> Self {
        ParetoNbdParams { r: 1.0, alpha: 1.0, s: 1.0, beta: 1.0 }
    }
}

// ---- BG/NBD and MBG/NBD ----------------------------------------------------

/// BG/NBD (and modified BG/NBD) parameters: Gamma purchase mixture
/// `(r, α)` and Beta dropout mixture `(a, b)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaGeoParams {
    pub r: f64,
    pub alpha: f64,
    pub a: f64,
    pub b: f64,
}

impl BetaGeoParams {
    pub fn new(r: f64, alpha: f64, a: f64, b: f64) -> BtydResult<Self> {
        Self::from_values(&ndarray::arr1(&[r, alpha, a, b]))
    }
}

impl ModelParams for BetaGeoParams {
    const COUNT: usize = 4;

    fn names() -> &'static [&'static str] {
        &["r", "alpha", "a", "b"]
    }

    fn values(&self) -> Array1<f64> {
        ndarray::arr1(&[self.r, self.alpha, self.a, self.b])
    }

    fn from_values(values: &Array1<f64>) -> BtydResult<Self> {
        check_len::<Self>(values)?;
        Ok(BetaGeoParams {
            r: check_positive("r", values[0])?,
            alpha: check_positive("alpha", values[1])?,
            a: check_positive("a", values[2])?,
            b: check_positive("b", values[3])?,
        })
    }

    fn default_initial() -> Self {
        BetaGeoParams { r: 1.0, alpha: 1.0, a: 1.0, b: 1.0 }
    }
}

// ---- BG/BB -----------------------------------------------------------------

/// BG/BB parameters: Beta transaction mixture `(α, β)` and Beta dropout
/// mixture `(γ, δ)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BgbbParams {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub delta: f64,
}

impl BgbbParams {
    pub fn new(alpha: f64, beta: f64, gamma: f64, delta: f64) -> BtydResult<Self> {
        Self::from_values(&ndarray::arr1(&[alpha, beta, gamma, delta]))
    }
}

impl ModelParams for BgbbParams {
    const COUNT: usize = 4;

    fn names() -> &'static [&'static str] {
        &["alpha", "beta", "gamma", "delta"]
    }

    fn values(&self) -> Array1<f64> {
        ndarray::arr1(&[self.alpha, self.beta, self.gamma, self.delta])
    }

    fn from_values(values: &Array1<f64>) -> BtydResult<Self> {
        check_len::<Self>(values)?;
        Ok(BgbbParams {
            alpha: check_positive("alpha", values[0])?,
            beta: check_positive("beta", values[1])?,
            gamma: check_positive("gamma", values[2])?,
            delta: check_positive("delta", values[3])?,
        })
    }

    fn default_initial() -> Self {
        BgbbParams { alpha: 1.0, beta: 1.0, gamma: 1.0, delta: 1.0 }
    }
}

// ---- BG/BB/BG --------------------------------------------------------------

/// BG/BB/BG parameters: the BG/BB quadruple plus a Beta conversion
/// mixture `(ε, ζ)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BgbbBgParams {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub delta: f64,
    pub epsilon: f64,
    pub zeta: f64,
}

impl BgbbBgParams {
    pub fn new(
        alpha: f64,
        beta: f64,
        gamma: f64,
        delta: f64,
        epsilon: f64,
        zeta: f64,
    ) -> BtydResult<Self> {
        Self::from_values(&ndarray::arr1(&[alpha, beta, gamma, delta, epsilon, zeta]))
    }

    /// Session-level view: the BG/BB quadruple embedded in this family.
    pub fn session_params(&self) -> BgbbParams {
        BgbbParams {
            alpha: self.alpha,
            beta: self.beta,
            gamma: self.gamma,
            delta: self.delta,
        }
    }
}

impl ModelParams for BgbbBgParams {
    const COUNT: usize = 6;

    fn names() -> &'static [&'static str] {
        &["alpha", "beta", "gamma", "delta", "epsilon", "zeta"]
    }

    fn values(&self) -> Array1<f64> {
        ndarray::arr1(&[self.alpha, self.beta, self.gamma, self.delta, self.epsilon, self.zeta])
    }

    fn from_values(values: &Array1<f64>) -> BtydResult<Self> {
        check_len::<Self>(values)?;
        Ok(BgbbBgParams {
            alpha: check_positive("alpha", values[0])?,
            beta: check_positive("beta", values[1])?,
            gamma: check_positive("gamma", values[2])?,
            delta: check_positive("delta", values[3])?,
            epsilon: check_positive("epsilon", values[4])?,
            zeta: check_positive("zeta", values[5])?,
        })
    }

    fn default_initial() -> Self {
        BgbbBgParams { alpha: 1.0, beta: 1.0, gamma: 1.0, delta: 1.0, epsilon: 1.0, zeta: 1.0 }
    }
}

// ---- BG/BB/BG with instant-conversion weight -------------------------------

/// Extended BG/BB/BG parameters: the six-parameter family plus a point
/// mass `c0 ∈ (0, 1)` of customers converting on their first session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BgbbBgExtParams {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub delta: f64,
    pub epsilon: f64,
    pub zeta: f64,
    pub c0: f64,
}

impl BgbbBgExtParams {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        alpha: f64,
        beta: f64,
        gamma: f64,
        delta: f64,
        epsilon: f64,
        zeta: f64,
        c0: f64,
    ) -> BtydResult<Self> {
        Self::from_values(&ndarray::arr1(&[alpha, beta, gamma, delta, epsilon, zeta, c0]))
    }

    /// Session-level view: the BG/BB quadruple embedded in this family.
    pub fn session_params(&self) -> BgbbParams {
        BgbbParams {
            alpha: self.alpha,
            beta: self.beta,
            gamma: self.gamma,
            delta: self.delta,
        }
    }
}

impl ModelParams for BgbbBgExtParams {
    const COUNT: usize = 7;

    fn names() -> &'static [&'static str] {
        &["alpha", "beta", "gamma", "delta", "epsilon", "zeta", "c0"]
    }

    fn values(&self) -> Array1<f64> {
        ndarray::arr1(&[
            self.alpha,
            self.beta,
            self.gamma,
            self.delta,
            self.epsilon,
            self.zeta,
            self.c0,
        ])
    }

    fn from_values(values: &Array1<f64>) -> BtydResult<Self> {
        check_len::<Self>(values)?;
        Ok(BgbbBgExtParams {
            alpha: check_positive("alpha", values[0])?,
            beta: check_positive("beta", values[1])?,
            gamma: check_positive("gamma", values[2])?,
            delta: check_positive("delta", values[3])?,
            epsilon: check_positive("epsilon", values[4])?,
            zeta: check_positive("zeta", values[5])?,
            c0: check_unit_interval(values[6])?,
        })
    }

    // c0 lives on (0, 1); the last coordinate uses the logistic bridge.
    fn to_theta(&self) -> Theta {
        let mut theta = self.values().mapv(f64::ln);
        theta[6] = logit(self.c0);
        theta
    }

    fn from_theta(theta: &Theta) -> BtydResult<Self> {
        let mut values = theta.mapv(f64::exp);
        values[6] = logistic(theta[6]);
        Self::from_values(&values)
    }

    fn default_initial() -> Self {
        BgbbBgExtParams {
            alpha: 1.0,
            beta: 1.0,
            gamma: 1.0,
            delta: 1.0,
            epsilon: 1.0,
            zeta: 1.0,
            c0: 0.5,
        }
    }
}

// ---- Pure Beta-Geometric churn ---------------------------------------------

/// Beta-Geometric churn parameters: Beta dropout mixture `(α, β)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BgChurnParams {
    pub alpha: f64,
    pub beta: f64,
}

impl BgChurnParams {
    pub fn new(alpha: f64, beta: f64) -> BtydResult<Self> {
        Self::from_values(&ndarray::arr1(&[alpha, beta]))
    }
}

impl ModelParams for BgChurnParams {
    const COUNT: usize = 2;

    fn names() -> &'static [&'static str] {
        &["alpha", "beta"]
    }

    fn values(&self) -> Array1<f64> {
        ndarray::arr1(&[self.alpha, self.beta])
    }

    fn from_values(values: &Array1<f64>) -> BtydResult<Self> {
        check_len::<Self>(values)?;
        Ok(BgChurnParams {
            alpha: check_positive("alpha", values[0])?,
            beta: check_positive("beta", values[1])?,
        })
    }

    fn default_initial() -> Self {
        BgChurnParams { alpha: 1.0, beta: 1.0 }
    }
}

// ---- Gamma-Gamma spend -----------------------------------------------------

/// Gamma-Gamma spend parameters `(p, q, v)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GammaGammaParams {
    pub p: f64,
    pub q: f64,
    pub v: f64,
}

impl GammaGammaParams {
    pub fn new(p: f64, q: f64, v: f64) -> BtydResult<Self> {
        Self::from_values(&ndarray::arr1(&[p, q, v]))
    }
}

impl ModelParams for GammaGammaParams {
    const COUNT: usize = 3;

    fn names() -> &'static [&'static str] {
        &["p", "q", "v"]
    }

    fn values(&self) -> Array1<f64> {
        ndarray::arr1(&[self.p, self.q, self.v])
    }

    fn from_values(values: &Array1<f64>) -> BtydResult<Self> {
        check_len::<Self>(values)?;
        Ok(GammaGammaParams {
            p: check_positive("p", values[0])?,
            q: check_positive("q", values[1])?,
            v: check_positive("v", values[2])?,
        })
    }

    fn default_initial() -> Self {
        GammaGammaParams { p: 1.0, q: 1.0, v: 1.0 }
    }
}
