//! goodness_of_fit — simulation-based validation of fitted cohort models.
//!
//! Purpose
//! -------
//! Judge a fitted model by where its observed negative log-likelihood
//! falls inside the distribution of likelihoods the model produces on
//! cohorts simulated from its own parameters. A fit whose observed value
//! lands on or outside the central confidence band edges is rejected;
//! acceptance requires the strict interior.
//!
//! Key behaviors
//! -------------
//! - With held-out data the fitted parameters are evaluated as-is on the
//!   test cohort and on each simulated cohort.
//! - Without held-out data every simulated cohort is refit from scratch,
//!   so the band accounts for estimation noise as well.
//! - Percentile bounds are symmetric, `[α/2, 1 - α/2]` for
//!   `α = 1 - confidence_level`, with linear interpolation between order
//!   statistics.
//! - [`split_dataset`] assigns each underlying customer to the test side
//!   with an independent Bernoulli draw, splitting weighted rows
//!   per-customer rather than per-row.

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::btyd::core::data::CohortData;
use crate::btyd::fitter::FitOptions;
use crate::btyd::generate::CohortGenerator;
use crate::btyd::models::CohortModel;
use crate::statistical_tests::errors::{GofError, GofResult};

/// Tuning knobs for the simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct GofOptions {
    /// Number of simulated cohorts.
    pub simulation_size: usize,
    /// Width of the acceptance band.
    pub confidence_level: f64,
    /// Aggregate identical simulated rows into weights.
    pub compressed: bool,
    /// Options for refits in the no-holdout mode.
    pub fit_options: FitOptions,
    /// Seed for the simulation stream; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for GofOptions {
    fn default() -> Self {
        GofOptions {
            simulation_size: 100,
            confidence_level: 0.99,
            compressed: true,
            fit_options: FitOptions::default(),
            seed: None,
        }
    }
}

impl GofOptions {
    /// Convenience: default options with a fixed seed for both the
    /// simulation stream and the refits.
    pub fn seeded(seed: u64) -> Self {
        GofOptions {
            fit_options: FitOptions::seeded(seed),
            seed: Some(seed),
            ..Self::default()
        }
    }

    fn validate(&self) -> GofResult<()> {
        if self.simulation_size == 0 {
            return Err(GofError::InvalidSimulationSize);
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(GofError::InvalidConfidenceLevel { value: self.confidence_level });
        }
        Ok(())
    }
}

/// Verdict and evidence from one goodness-of-fit run.
#[derive(Debug, Clone, PartialEq)]
pub struct GofOutcome {
    /// Observed value strictly between the band edges.
    pub accepted: bool,
    /// Negative log-likelihood of the fitted parameters on the observed
    /// cohort.
    pub observed: f64,
    /// Lower band edge (α/2 percentile of the simulated values).
    pub lower: f64,
    /// Upper band edge (1 - α/2 percentile).
    pub upper: f64,
    /// Simulated negative log-likelihoods, in simulation order.
    pub simulated: Vec<f64>,
}

/// Linear-interpolation percentile of an ascending slice, `q ∈ [0, 1]`.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = q * (n - 1) as f64;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Validate a fitted model against its own simulated likelihood band.
///
/// `test_data` switches the mode: when present the fitted parameters are
/// scored on it directly; when absent each simulated cohort is refit and
/// the observed training likelihood is compared against refit
/// likelihoods.
pub fn goodness_of_fit<M, G>(
    model: &M,
    generator: &G,
    test_data: Option<&CohortData>,
    opts: &GofOptions,
) -> GofResult<GofOutcome>
where
    M: CohortModel,
    G: CohortGenerator<M::Params>,
{
    opts.validate()?;
    let fitted = model.fitted()?;
    let params = fitted.params().clone();

    let (observed, ages) = match test_data {
        Some(test) => (
            model.neg_log_likelihood_at(&params, test)?,
            test.expanded_ages(),
        ),
        None => (fitted.neg_log_likelihood(), fitted.data().expanded_ages()),
    };

    let mut rng: StdRng = match opts.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut simulated = Vec::with_capacity(opts.simulation_size);
    for _ in 0..opts.simulation_size {
        let cohort = generator.generate(&params, &ages, opts.compressed, &mut rng)?;
        let value = match test_data {
            Some(_) => model.neg_log_likelihood_at(&params, &cohort)?,
            None => {
                let mut refit = model.fresh();
                refit.fit(&cohort, Some(params.clone()), &opts.fit_options)?;
                refit.fitted()?.neg_log_likelihood()
            }
        };
        simulated.push(value);
    }

    let mut sorted = simulated.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let alpha = 1.0 - opts.confidence_level;
    let lower = percentile(&sorted, alpha / 2.0);
    let upper = percentile(&sorted, 1.0 - alpha / 2.0);
    Ok(GofOutcome {
        accepted: lower < observed && observed < upper,
        observed,
        lower,
        upper,
        simulated,
    })
}

// ---- Train/test splitting --------------------------------------------------

struct SplitSide {
    frequency: Vec<f64>,
    recency: Vec<f64>,
    age: Vec<f64>,
    monetary: Vec<f64>,
    conversion: Vec<f64>,
    weights: Vec<u64>,
}

impl SplitSide {
    fn new() -> Self {
        SplitSide {
            frequency: Vec::new(),
            recency: Vec::new(),
            age: Vec::new(),
            monetary: Vec::new(),
            conversion: Vec::new(),
            weights: Vec::new(),
        }
    }

    fn push(&mut self, data: &CohortData, i: usize, weight: u64) {
        self.frequency.push(data.frequency[i]);
        self.recency.push(data.recency[i]);
        self.age.push(data.age[i]);
        if let Some(m) = &data.monetary_value {
            self.monetary.push(m[i]);
        }
        if let Some(c) = &data.conversion_frequency {
            self.conversion.push(c[i]);
        }
        self.weights.push(weight);
    }

    fn into_cohort(self, data: &CohortData) -> GofResult<CohortData> {
        let monetary = data
            .monetary_value
            .as_ref()
            .map(|_| Array1::from_vec(self.monetary));
        let conversion = data
            .conversion_frequency
            .as_ref()
            .map(|_| Array1::from_vec(self.conversion));
        Ok(CohortData::new(
            Array1::from_vec(self.frequency),
            Array1::from_vec(self.recency),
            Array1::from_vec(self.age),
            monetary,
            conversion,
            Some(Array1::from_vec(self.weights)),
        )?)
    }
}

/// Split a cohort into train and test sides, assigning each underlying
/// customer independently with probability `test_ratio` of landing in
/// the test side. Rows left empty on one side are dropped there.
pub fn split_dataset(
    data: &CohortData,
    test_ratio: f64,
    seed: Option<u64>,
) -> GofResult<(CohortData, CohortData)> {
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(GofError::InvalidTestRatio { value: test_ratio });
    }
    let mut rng: StdRng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut train = SplitSide::new();
    let mut test = SplitSide::new();
    for i in 0..data.len() {
        let w = data.weight(i) as u64;
        let mut test_w = 0u64;
        for _ in 0..w {
            if rng.gen_bool(test_ratio) {
                test_w += 1;
            }
        }
        let train_w = w - test_w;
        if train_w > 0 {
            train.push(data, i, train_w);
        }
        if test_w > 0 {
            test.push(data, i, test_w);
        }
    }
    Ok((train.into_cohort(data)?, test.into_cohort(data)?))
}
