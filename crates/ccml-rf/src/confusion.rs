//! Confusion matrix and per-class classification metrics.

use std::fmt;

use crate::error::RfError;

/// Counts of `(actual, predicted)` class pairs.
///
/// `rows[actual][predicted]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    rows: Vec<Vec<usize>>,
}

/// Per-class precision, recall, F1 and support.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    /// Class index.
    pub class: usize,
    /// TP / (TP + FP), 0.0 when the class is never predicted.
    pub precision: f64,
    /// TP / (TP + FN), 0.0 when the class never occurs.
    pub recall: f64,
    /// Harmonic mean of precision and recall, 0.0 when both are zero.
    pub f1: f64,
    /// Number of samples whose actual class is this one.
    pub support: usize,
}

impl ConfusionMatrix {
    /// Tally actual against predicted labels.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::EmptyDataset`] | no labels |
    /// | [`RfError::LabelCountMismatch`] | the two slices differ in length |
    /// | [`RfError::ClassOutOfRange`] | a label is `>= n_classes` |
    pub fn from_labels(
        actual: &[usize],
        predicted: &[usize],
        n_classes: usize,
    ) -> Result<Self, RfError> {
        if actual.is_empty() {
            return Err(RfError::EmptyDataset);
        }
        if actual.len() != predicted.len() {
            return Err(RfError::LabelCountMismatch {
                n_samples: actual.len(),
                n_labels: predicted.len(),
            });
        }
        let mut rows = vec![vec![0usize; n_classes]; n_classes];
        for (sample_index, (&a, &p)) in actual.iter().zip(predicted).enumerate() {
            let label = a.max(p);
            if label >= n_classes {
                return Err(RfError::ClassOutOfRange {
                    label,
                    n_classes,
                    sample_index,
                });
            }
            rows[a][p] += 1;
        }
        Ok(Self { rows })
    }

    /// Number of correctly classified samples.
    #[must_use]
    pub fn correct(&self) -> usize {
        (0..self.rows.len()).map(|i| self.rows[i][i]).sum()
    }

    /// Total number of tallied samples.
    #[must_use]
    pub fn total(&self) -> usize {
        self.rows.iter().flatten().sum()
    }

    /// Fraction of correct predictions, in `[0, 1]`.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.correct() as f64 / total as f64,
        }
    }

    /// Per-class metrics in class order.
    #[must_use]
    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        let n = self.rows.len();
        (0..n)
            .map(|c| {
                let tp = self.rows[c][c];
                let predicted: usize = (0..n).map(|a| self.rows[a][c]).sum();
                let support: usize = self.rows[c].iter().sum();
                let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                ClassMetrics {
                    class: c,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect()
    }

    /// Return the underlying rows.
    #[must_use]
    pub fn as_rows(&self) -> &[Vec<usize>] {
        &self.rows
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.rows.len()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>10}", "actual\\pred")?;
        for j in 0..self.rows.len() {
            write!(f, " {j:>6}")?;
        }
        writeln!(f)?;
        for (i, row) in self.rows.iter().enumerate() {
            write!(f, "{i:>11}")?;
            for count in row {
                write!(f, " {count:>6}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
