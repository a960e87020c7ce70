//! generate — synthetic cohort simulators for the transaction models.
//!
//! Purpose
//! -------
//! Each generator draws per-customer latent traits from the model's
//! mixing distributions and plays the purchase/churn process forward to
//! the customer's observation age, producing a [`CohortData`] with the
//! same summary columns the likelihoods consume. The goodness-of-fit
//! machinery relies on these to simulate reference cohorts from a fitted
//! parameter vector.
//!
//! Key behaviors
//! -------------
//! - `compressed` aggregates identical `(x, t_x, T)` rows into a single
//!   weighted row, keeping simulated cohorts cheap to evaluate.
//! - Discrete-time generators validate ages as whole periods, matching
//!   the likelihood-side validation.
//! - All randomness flows through a caller-supplied `Rng`, so seeded
//!   simulations reproduce exactly.

use std::collections::BTreeMap;

use ndarray::Array1;
use rand::Rng;
use rand_distr::{Beta, Distribution, Exp, Gamma};

use crate::btyd::core::data::CohortData;
use crate::btyd::core::params::{
    BetaGeoParams, BgChurnParams, BgbbParams, ModelParams,
};
use crate::btyd::errors::{BtydError, BtydResult};
use crate::btyd::models::require_integer_time;

/// Simulates a cohort from one model family's parameters.
pub trait CohortGenerator<P: ModelParams> {
    /// Draw one customer history per entry of `ages`.
    fn generate<R: Rng + ?Sized>(
        &self,
        params: &P,
        ages: &[f64],
        compressed: bool,
        rng: &mut R,
    ) -> BtydResult<CohortData>;
}

fn beta_dist(name: &'static str, shape1: f64, shape2: f64) -> BtydResult<Beta<f64>> {
    Beta::new(shape1, shape2)
        .map_err(|_| BtydError::NonPositiveParam { name, value: shape1.min(shape2) })
}

/// Collapse raw `(x, t_x, T)` rows into a cohort, optionally merging
/// identical rows into weights. Bit-keyed so exact duplicates merge and
/// nothing else does.
fn assemble_rows(rows: Vec<(f64, f64, f64)>, compressed: bool) -> BtydResult<CohortData> {
    if !compressed {
        let frequency = Array1::from_iter(rows.iter().map(|r| r.0));
        let recency = Array1::from_iter(rows.iter().map(|r| r.1));
        let age = Array1::from_iter(rows.iter().map(|r| r.2));
        return CohortData::new(frequency, recency, age, None, None, None);
    }
    let mut counts: BTreeMap<(u64, u64, u64), u64> = BTreeMap::new();
    for (x, t_x, t) in rows {
        *counts
            .entry((x.to_bits(), t_x.to_bits(), t.to_bits()))
            .or_insert(0) += 1;
    }
    let n = counts.len();
    let mut frequency = Array1::zeros(n);
    let mut recency = Array1::zeros(n);
    let mut age = Array1::zeros(n);
    let mut weights = Array1::zeros(n);
    for (i, ((x, t_x, t), w)) in counts.into_iter().enumerate() {
        frequency[i] = f64::from_bits(x);
        recency[i] = f64::from_bits(t_x);
        age[i] = f64::from_bits(t);
        weights[i] = w;
    }
    CohortData::new(frequency, recency, age, None, None, Some(weights))
}

// ---- Beta-Geometric churn --------------------------------------------------

/// Simulator for the discrete Beta-Geometric churn process.
#[derive(Debug, Clone, Copy, Default)]
pub struct BgGenerator;

impl CohortGenerator<BgChurnParams> for BgGenerator {
    fn generate<R: Rng + ?Sized>(
        &self,
        params: &BgChurnParams,
        ages: &[f64],
        compressed: bool,
        rng: &mut R,
    ) -> BtydResult<CohortData> {
        let churn = beta_dist("alpha", params.alpha, params.beta)?;
        let mut rows = Vec::with_capacity(ages.len());
        for &age in ages {
            let periods = require_integer_time(age)?;
            let theta = churn.sample(rng);
            // Survive each period with probability 1 - θ; x = T means the
            // customer was still active at the end of observation.
            let mut x = 0u64;
            while x < periods && rng.gen_bool(1.0 - theta) {
                x += 1;
            }
            rows.push((x as f64, 0.0, periods as f64));
        }
        assemble_rows(rows, compressed)
    }
}

// ---- BG/BB -----------------------------------------------------------------

/// Simulator for the discrete BG/BB transaction process.
#[derive(Debug, Clone, Copy, Default)]
pub struct BgbbGenerator;

impl CohortGenerator<BgbbParams> for BgbbGenerator {
    fn generate<R: Rng + ?Sized>(
        &self,
        params: &BgbbParams,
        ages: &[f64],
        compressed: bool,
        rng: &mut R,
    ) -> BtydResult<CohortData> {
        let purchase = beta_dist("alpha", params.alpha, params.beta)?;
        let churn = beta_dist("gamma", params.gamma, params.delta)?;
        let mut rows = Vec::with_capacity(ages.len());
        for &age in ages {
            let periods = require_integer_time(age)?;
            let p = purchase.sample(rng);
            let theta = churn.sample(rng);
            let mut x = 0u64;
            let mut t_x = 0u64;
            for period in 1..=periods {
                if rng.gen_bool(p) {
                    x += 1;
                    t_x = period;
                }
                // Dropout opportunity between periods.
                if rng.gen_bool(theta) {
                    break;
                }
            }
            rows.push((x as f64, t_x as f64, periods as f64));
        }
        assemble_rows(rows, compressed)
    }
}

// ---- BG/NBD ----------------------------------------------------------------

/// Simulator for the continuous BG/NBD purchase process.
#[derive(Debug, Clone, Copy, Default)]
pub struct BetaGeoGenerator;

impl CohortGenerator<BetaGeoParams> for BetaGeoGenerator {
    fn generate<R: Rng + ?Sized>(
        &self,
        params: &BetaGeoParams,
        ages: &[f64],
        compressed: bool,
        rng: &mut R,
    ) -> BtydResult<CohortData> {
        let rate = Gamma::new(params.r, 1.0 / params.alpha)
            .map_err(|_| BtydError::NonPositiveParam { name: "r", value: params.r })?;
        let dropout = beta_dist("a", params.a, params.b)?;
        let mut rows = Vec::with_capacity(ages.len());
        for &age in ages {
            let lambda = rate.sample(rng);
            let p = dropout.sample(rng);
            let wait = Exp::new(lambda)
                .map_err(|_| BtydError::NonPositiveParam { name: "r", value: lambda })?;
            let mut t = wait.sample(rng);
            let mut x = 0.0;
            let mut t_x = 0.0;
            // Purchase at each exponential arrival inside the window,
            // with a dropout trial after every purchase.
            while t <= age {
                x += 1.0;
                t_x = t;
                if rng.gen_bool(p) {
                    break;
                }
                t += wait.sample(rng);
            }
            rows.push((x, t_x, age));
        }
        assemble_rows(rows, compressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    // Purpose
    // -------
    // Verify compressed and expanded simulation describe the same
    // population: equal customer totals, and compressed rows carry
    // multiplicities.
    //
    // Given
    // -----
    // - 500 customers at age 10, one seed, both modes.
    //
    // Expect
    // ------
    // - Expanded has 500 rows; compressed has fewer rows but the same
    //   total weight, and identical frequency mass per value.
    fn compression_preserves_the_population() {
        // Arrange
        let params = BgChurnParams::new(0.32, 0.85).unwrap();
        let ages = vec![10.0; 500];

        // Act
        let expanded = BgGenerator
            .generate(&params, &ages, false, &mut StdRng::seed_from_u64(7))
            .unwrap();
        let compressed = BgGenerator
            .generate(&params, &ages, true, &mut StdRng::seed_from_u64(7))
            .unwrap();

        // Assert
        assert_eq!(expanded.len(), 500);
        assert!(compressed.len() < expanded.len());
        assert_eq!(compressed.total_weight(), 500.0);
        for value in 0..=10u64 {
            let v = value as f64;
            let raw = expanded.frequency.iter().filter(|&&x| x == v).count() as f64;
            let merged: f64 = (0..compressed.len())
                .filter(|&i| compressed.frequency[i] == v)
                .map(|i| compressed.weight(i))
                .sum();
            assert_eq!(raw, merged, "mass mismatch at frequency {value}");
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify the simulated discrete processes respect their structural
    // invariants and roughly match the mixing means.
    //
    // Given
    // -----
    // - BG/BB draws for 2000 customers over 8 periods.
    //
    // Expect
    // ------
    // - Every row satisfies x ≤ t_x ≤ T (t_x = 0 when x = 0); the mean
    //   frequency lands within a loose band of the one-period purchase
    //   mean α / (α + β) scaled by survival.
    fn simulated_rows_satisfy_process_invariants() {
        // Arrange
        let params = BgbbParams::new(1.204, 0.750, 0.657, 2.783).unwrap();
        let ages = vec![8.0; 2000];
        let mut rng = StdRng::seed_from_u64(11);

        // Act
        let cohort = BgbbGenerator.generate(&params, &ages, false, &mut rng).unwrap();

        // Assert
        let mut mean = 0.0;
        for i in 0..cohort.len() {
            let (x, t_x, t) = (cohort.frequency[i], cohort.recency[i], cohort.age[i]);
            assert!(x <= t_x || (x == 0.0 && t_x == 0.0), "row {i}: x={x} t_x={t_x}");
            assert!(t_x <= t, "row {i}: t_x={t_x} T={t}");
            mean += x;
        }
        mean /= cohort.len() as f64;
        assert!(mean > 0.5 && mean < 5.0, "implausible mean frequency {mean}");
    }

    #[test]
    // Purpose
    // -------
    // Verify continuous simulation: recency never exceeds age, zero
    // frequency forces zero recency, and fractional ages pass through
    // untouched.
    //
    // Given
    // -----
    // - BG/NBD draws for 1000 customers at age 38.86.
    //
    // Expect
    // ------
    // - Structural invariants hold on every row; the cohort constructor
    //   accepted the rows (recency ≤ age by construction).
    fn continuous_simulation_keeps_recency_within_age() {
        // Arrange
        let params = BetaGeoParams::new(0.243, 4.414, 0.793, 2.426).unwrap();
        let ages = vec![38.86; 1000];
        let mut rng = StdRng::seed_from_u64(23);

        // Act
        let cohort = BetaGeoGenerator.generate(&params, &ages, false, &mut rng).unwrap();

        // Assert
        for i in 0..cohort.len() {
            let (x, t_x, t) = (cohort.frequency[i], cohort.recency[i], cohort.age[i]);
            assert!(t_x <= t);
            if x == 0.0 {
                assert_eq!(t_x, 0.0);
            } else {
                assert!(t_x > 0.0);
            }
            assert_eq!(t, 38.86);
        }
    }
}
