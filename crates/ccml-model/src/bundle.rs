//! The fitted preprocessor and forest, treated as one immutable unit.

use ccml_io::{KpiRanges, MaturityLevel, Observation};
use ccml_rf::{ClassDistribution, RandomForest};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::preprocess::{FeatureRow, Preprocessor};

/// Probability assigned to one class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassProbability {
    /// Class label.
    pub label: MaturityLevel,
    /// Probability in `[0, 1]`.
    pub probability: f64,
}

/// Result of classifying one row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Most probable class; ties resolve to the earlier class.
    pub label: MaturityLevel,
    /// One entry per class, in the bundle's class order.
    pub probabilities: Vec<ClassProbability>,
}

impl Prediction {
    /// Probability of the predicted label.
    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.probability_of(&self.label).unwrap_or(0.0)
    }

    /// Probability of `label`, or `None` if the bundle does not know it.
    #[must_use]
    pub fn probability_of(&self, label: &MaturityLevel) -> Option<f64> {
        self.probabilities
            .iter()
            .find(|p| &p.label == label)
            .map(|p| p.probability)
    }
}

/// Encoder, classifier, class labels, KPI ranges and holdout accuracy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    preprocessor: Preprocessor,
    forest: RandomForest,
    classes: Vec<MaturityLevel>,
    kpi_ranges: KpiRanges,
    accuracy: f64,
}

impl ModelBundle {
    pub(crate) fn new(
        preprocessor: Preprocessor,
        forest: RandomForest,
        classes: Vec<MaturityLevel>,
        kpi_ranges: KpiRanges,
        accuracy: f64,
    ) -> Self {
        Self {
            preprocessor,
            forest,
            classes,
            kpi_ranges,
            accuracy,
        }
    }

    pub(crate) fn set_accuracy(&mut self, accuracy: f64) {
        self.accuracy = accuracy;
    }

    /// Confirm the parts agree on feature width and class count.
    pub(crate) fn is_consistent(&self) -> bool {
        self.preprocessor.n_outputs() == self.forest.n_features()
            && self.classes.len() == self.forest.n_classes()
    }

    /// Classify one raw feature row.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::SchemaMismatch`] | wrong numeric or categorical count |
    /// | [`ModelError::NonFiniteInput`] | a numeric value is NaN or infinite |
    pub fn predict(&self, row: &FeatureRow) -> Result<Prediction, ModelError> {
        let encoded = self.preprocessor.transform(row)?;
        let distribution = self.forest.predict_proba(&encoded)?;
        Ok(self.to_prediction(&distribution))
    }

    /// Classify a typed observation.
    ///
    /// # Errors
    ///
    /// See [`ModelBundle::predict`].
    pub fn predict_observation(&self, observation: &Observation) -> Result<Prediction, ModelError> {
        self.predict(&FeatureRow::from(observation))
    }

    /// Classify many rows in parallel, preserving order.
    ///
    /// # Errors
    ///
    /// Returns the first failure of [`ModelBundle::predict`].
    pub fn predict_batch(&self, rows: &[FeatureRow]) -> Result<Vec<Prediction>, ModelError> {
        rows.par_iter().map(|row| self.predict(row)).collect()
    }

    fn to_prediction(&self, distribution: &ClassDistribution) -> Prediction {
        let probabilities: Vec<ClassProbability> = self
            .classes
            .iter()
            .zip(distribution.as_slice())
            .map(|(label, &probability)| ClassProbability {
                label: label.clone(),
                probability,
            })
            .collect();
        let label = self.classes[distribution.predicted_class()].clone();
        Prediction {
            label,
            probabilities,
        }
    }

    /// Class labels in classifier order.
    #[must_use]
    pub fn classes(&self) -> &[MaturityLevel] {
        &self.classes
    }

    /// Holdout accuracy in `[0, 1]`.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    /// KPI ranges observed in the training data.
    #[must_use]
    pub fn kpi_ranges(&self) -> &KpiRanges {
        &self.kpi_ranges
    }

    /// The fitted preprocessor.
    #[must_use]
    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    /// The fitted forest.
    #[must_use]
    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }
}
