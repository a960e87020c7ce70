//! core::data — validated cohort input for all model families.
//!
//! Purpose
//! -------
//! Hold the per-customer summary statistics every likelihood in this crate
//! consumes: repeat-transaction counts, recency, observation age, and the
//! optional monetary, conversion, and multiplicity columns. Validation runs
//! once at construction so the likelihood code can index freely.
//!
//! Key behaviors
//! -------------
//! - `new` checks lengths against the frequency column, rejects non-finite
//!   and negative entries, and enforces `recency <= age` row by row,
//!   reporting the first offender with its column, row, and value.
//! - Optional columns (`monetary_value`, `conversion_frequency`,
//!   `weights`) are validated only when present; accessors surface a
//!   dedicated error when a model needs an absent column.
//! - `weights` are integer multiplicities: row `i` stands for `weights[i]`
//!   identical customers. Absent weights mean one customer per row.
//!
//! Conventions
//! -----------
//! - Columns are `ndarray::Array1<f64>` (weights are `u64`), matching the
//!   optimizer aliases downstream.
//! - Model-specific preconditions that not every family shares
//!   (`frequency <= age`, strictly positive spend) live in dedicated
//!   `require_*` methods called by the models that need them.

use ndarray::Array1;

use crate::btyd::errors::{BtydError, BtydResult};

/// Per-customer cohort summary consumed by every likelihood in the crate.
///
/// Rows are customers (or, with `weights`, groups of identical customers).
/// `frequency` counts repeat transactions or active periods, `recency` is
/// the time of the last observed transaction, and `age` is the length of
/// the observation window.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortData {
    pub frequency: Array1<f64>,
    pub recency: Array1<f64>,
    pub age: Array1<f64>,
    pub monetary_value: Option<Array1<f64>>,
    pub conversion_frequency: Option<Array1<f64>>,
    pub weights: Option<Array1<u64>>,
}

impl CohortData {
    /// Build a cohort from its columns, validating everything up front.
    ///
    /// # Errors
    /// - [`BtydError::EmptyCohort`] when `frequency` has no rows.
    /// - [`BtydError::FieldLengthMismatch`] when any column disagrees with
    ///   `frequency` in length.
    /// - [`BtydError::NonFiniteField`] / [`BtydError::NegativeField`] on the
    ///   first bad entry of any `f64` column.
    /// - [`BtydError::RecencyExceedsAge`] when a row was last seen after
    ///   its observation window.
    /// - [`BtydError::ZeroWeight`] when a multiplicity is zero.
    pub fn new(
        frequency: Array1<f64>,
        recency: Array1<f64>,
        age: Array1<f64>,
        monetary_value: Option<Array1<f64>>,
        conversion_frequency: Option<Array1<f64>>,
        weights: Option<Array1<u64>>,
    ) -> BtydResult<Self> {
        let n = frequency.len();
        if n == 0 {
            return Err(BtydError::EmptyCohort);
        }

        verify_len("recency", n, recency.len())?;
        verify_len("age", n, age.len())?;
        if let Some(m) = &monetary_value {
            verify_len("monetary_value", n, m.len())?;
        }
        if let Some(c) = &conversion_frequency {
            verify_len("conversion_frequency", n, c.len())?;
        }
        if let Some(w) = &weights {
            verify_len("weights", n, w.len())?;
        }

        verify_column("frequency", &frequency)?;
        verify_column("recency", &recency)?;
        verify_column("age", &age)?;
        if let Some(m) = &monetary_value {
            verify_column("monetary_value", m)?;
        }
        if let Some(c) = &conversion_frequency {
            verify_column("conversion_frequency", c)?;
        }

        for i in 0..n {
            if recency[i] > age[i] {
                return Err(BtydError::RecencyExceedsAge {
                    index: i,
                    recency: recency[i],
                    age: age[i],
                });
            }
        }
        if let Some(w) = &weights {
            for (i, &wi) in w.iter().enumerate() {
                if wi == 0 {
                    return Err(BtydError::ZeroWeight { index: i });
                }
            }
        }

        Ok(CohortData {
            frequency,
            recency,
            age,
            monetary_value,
            conversion_frequency,
            weights,
        })
    }

    /// Convenience constructor for contractual (discrete-churn) cohorts,
    /// where only active-period counts and ages are observed.
    pub fn contractual(
        frequency: Array1<f64>,
        age: Array1<f64>,
        weights: Option<Array1<u64>>,
    ) -> BtydResult<Self> {
        let recency = Array1::zeros(frequency.len());
        CohortData::new(frequency, recency, age, None, None, weights)
    }

    /// Convenience constructor for monetary-only cohorts as consumed by
    /// the Gamma-Gamma spend model.
    pub fn monetary(
        frequency: Array1<f64>,
        monetary_value: Array1<f64>,
        weights: Option<Array1<u64>>,
    ) -> BtydResult<Self> {
        let n = frequency.len();
        CohortData::new(
            frequency,
            Array1::zeros(n),
            Array1::zeros(n),
            Some(monetary_value),
            None,
            weights,
        )
    }

    /// Number of rows (row groups when weighted).
    pub fn len(&self) -> usize {
        self.frequency.len()
    }

    /// True when the cohort holds no rows. Unreachable after `new`, kept
    /// for API completeness.
    pub fn is_empty(&self) -> bool {
        self.frequency.is_empty()
    }

    /// Multiplicity of row `i` as a likelihood weight.
    pub fn weight(&self, i: usize) -> f64 {
        self.weights.as_ref().map_or(1.0, |w| w[i] as f64)
    }

    /// Total number of customers represented, counting multiplicities.
    pub fn total_weight(&self) -> f64 {
        match &self.weights {
            Some(w) => w.iter().map(|&wi| wi as f64).sum(),
            None => self.len() as f64,
        }
    }

    /// Ages repeated per multiplicity, one entry per underlying customer.
    pub fn expanded_ages(&self) -> Vec<f64> {
        let mut out = Vec::new();
        for i in 0..self.len() {
            let reps = self.weights.as_ref().map_or(1, |w| w[i] as usize);
            out.extend(std::iter::repeat(self.age[i]).take(reps));
        }
        out
    }

    /// Largest observed frequency.
    pub fn max_frequency(&self) -> f64 {
        self.frequency.iter().cloned().fold(0.0, f64::max)
    }

    /// Largest observation age.
    pub fn max_age(&self) -> f64 {
        self.age.iter().cloned().fold(0.0, f64::max)
    }

    /// Monetary column, or the dedicated error when absent.
    pub fn monetary_values(&self) -> BtydResult<&Array1<f64>> {
        self.monetary_value
            .as_ref()
            .ok_or(BtydError::MissingMonetaryValue)
    }

    /// Conversion-count column, or the dedicated error when absent.
    pub fn conversion_frequencies(&self) -> BtydResult<&Array1<f64>> {
        self.conversion_frequency
            .as_ref()
            .ok_or(BtydError::MissingConversionFrequency)
    }

    /// Discrete-churn precondition: active periods cannot exceed the
    /// observation age.
    pub fn require_frequency_within_age(&self) -> BtydResult<()> {
        for i in 0..self.len() {
            if self.frequency[i] > self.age[i] {
                return Err(BtydError::FrequencyExceedsAge {
                    index: i,
                    frequency: self.frequency[i],
                    age: self.age[i],
                });
            }
        }
        Ok(())
    }

    /// Spend-model precondition: every row has at least one transaction
    /// and strictly positive average spend.
    pub fn require_positive_monetary(&self) -> BtydResult<()> {
        let monetary = self.monetary_values()?;
        for i in 0..self.len() {
            if self.frequency[i] <= 0.0 {
                return Err(BtydError::ZeroFrequency { index: i });
            }
            if monetary[i] <= 0.0 {
                return Err(BtydError::NonPositiveMonetaryValue {
                    index: i,
                    value: monetary[i],
                });
            }
        }
        Ok(())
    }
}

fn verify_len(field: &'static str, expected: usize, actual: usize) -> BtydResult<()> {
    if actual != expected {
        return Err(BtydError::FieldLengthMismatch { field, expected, actual });
    }
    Ok(())
}

fn verify_column(field: &'static str, col: &Array1<f64>) -> BtydResult<()> {
    for (i, &v) in col.iter().enumerate() {
        if !v.is_finite() {
            return Err(BtydError::NonFiniteField { field, index: i, value: v });
        }
        if v < 0.0 {
            return Err(BtydError::NegativeField { field, index: i, value: v });
        }
    }
    Ok(())
}
