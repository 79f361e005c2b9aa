//! Labeled training table and per-KPI range summaries.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::{Kpi, KpiValues, LabeledObservation, MaturityLevel, Observation};

/// All labeled observations read from one training CSV, in file order.
///
/// Produced by [`TrainingReader`](crate::TrainingReader).
#[derive(Debug, Clone)]
pub struct TrainingTable {
    rows: Vec<LabeledObservation>,
}

impl TrainingTable {
    /// Wrap already-validated rows.
    #[must_use]
    pub fn new(rows: Vec<LabeledObservation>) -> Self {
        Self { rows }
    }

    /// Return the rows in file order.
    #[must_use]
    pub fn rows(&self) -> &[LabeledObservation] {
        &self.rows
    }

    /// Return the number of rows.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.rows.len()
    }

    /// Return `true` when the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct maturity levels, sorted lexicographically.
    #[must_use]
    pub fn distinct_labels(&self) -> Vec<MaturityLevel> {
        self.rows
            .iter()
            .map(|row| row.maturity_level.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Observed min, max and mean of every KPI, or `None` for an empty table.
    #[must_use]
    pub fn kpi_ranges(&self) -> Option<KpiRanges> {
        KpiRanges::from_observations(self.rows.iter().map(|row| &row.observation))
    }
}

/// Observed span of one KPI column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KpiRange {
    /// Smallest observed value.
    pub min: f64,
    /// Largest observed value.
    pub max: f64,
    /// Arithmetic mean of observed values.
    pub mean: f64,
}

impl KpiRange {
    /// Return `true` when `value` lies in `[min, max]`.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// A KPI value outside the range observed in training.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kpi} = {value} is outside the observed range [{min}, {max}]")]
pub struct KpiOutOfRange {
    /// The offending KPI.
    pub kpi: Kpi,
    /// Submitted value.
    pub value: f64,
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

/// Per-KPI observed ranges, in [`Kpi::ALL`] order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiRanges {
    ranges: Vec<KpiRange>,
}

impl KpiRanges {
    /// Summarize the KPI columns of `observations`; `None` when there are none.
    pub fn from_observations<'a>(
        observations: impl IntoIterator<Item = &'a Observation>,
    ) -> Option<Self> {
        let mut ranges = vec![
            KpiRange {
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
                mean: 0.0,
            };
            Kpi::ALL.len()
        ];
        let mut n = 0usize;
        for obs in observations {
            n += 1;
            for (range, kpi) in ranges.iter_mut().zip(Kpi::ALL) {
                let v = obs.kpis.get(kpi);
                range.min = range.min.min(v);
                range.max = range.max.max(v);
                range.mean += v;
            }
        }
        if n == 0 {
            return None;
        }
        // Rounding in the sum can push the mean of a constant column past its bounds.
        for range in &mut ranges {
            range.mean = (range.mean / n as f64).clamp(range.min, range.max);
        }
        Some(Self { ranges })
    }

    /// Range of one KPI.
    #[must_use]
    pub fn get(&self, kpi: Kpi) -> KpiRange {
        self.ranges[kpi.index()]
    }

    /// Return `true` when `value` lies in the observed range of `kpi`.
    #[must_use]
    pub fn contains(&self, kpi: Kpi, value: f64) -> bool {
        self.get(kpi).contains(value)
    }

    /// Pin `value` into the observed range of `kpi`.
    #[must_use]
    pub fn clamp(&self, kpi: Kpi, value: f64) -> f64 {
        let range = self.get(kpi);
        value.clamp(range.min, range.max)
    }

    /// Column means, the neutral default for an input form.
    #[must_use]
    pub fn means(&self) -> KpiValues {
        KpiValues::from_fn(|kpi| self.get(kpi).mean)
    }

    /// Check every KPI of `values`, reporting the first one out of range.
    ///
    /// # Errors
    ///
    /// Returns [`KpiOutOfRange`] for the first KPI (in [`Kpi::ALL`] order) whose
    /// value is outside its observed range or is not finite.
    pub fn check(&self, values: &KpiValues) -> Result<(), KpiOutOfRange> {
        Kpi::ALL
            .into_iter()
            .try_for_each(|kpi| self.check_one(kpi, values.get(kpi)))
    }

    /// Check a single KPI value against its observed range.
    ///
    /// # Errors
    ///
    /// Returns [`KpiOutOfRange`] when `value` is outside the range or not finite.
    pub fn check_one(&self, kpi: Kpi, value: f64) -> Result<(), KpiOutOfRange> {
        let range = self.get(kpi);
        if range.contains(value) {
            Ok(())
        } else {
            Err(KpiOutOfRange {
                kpi,
                value,
                min: range.min,
                max: range.max,
            })
        }
    }
}
