//! Holdout training: split, encode, fit, evaluate.

use ccml_io::{
    ClassReport, ImportanceReport, Kpi, KpiRanges, MaturityLevel, ModelKey, TrainingReport,
    TrainingTable,
};
use ccml_rf::{
    ConfusionMatrix, MaxFeatures, RandomForestConfig, RankedFeature, SplitCriterion, SplitMethod,
};
use tracing::{debug, info, instrument};

use crate::bundle::ModelBundle;
use crate::error::ModelError;
use crate::holdout::train_test_split;
use crate::preprocess::{FeatureRow, Preprocessor};

/// Configuration for fitting a [`ModelBundle`] from a training table.
///
/// | Parameter       | Default  |
/// |-----------------|----------|
/// | `test_fraction` | 0.2      |
/// | `seed`          | 42       |
/// | `n_trees`       | 100      |
/// | `max_depth`     | `None`   |
/// | `max_features`  | `Sqrt`   |
/// | `criterion`     | `Gini`   |
/// | `split_method`  | `Exact`  |
///
/// The seed drives both the holdout shuffle and the forest.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    test_fraction: f64,
    seed: u64,
    n_trees: usize,
    max_depth: Option<usize>,
    max_features: MaxFeatures,
    criterion: SplitCriterion,
    split_method: SplitMethod,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingConfig {
    /// Holdout fraction used when none is given.
    pub const DEFAULT_TEST_FRACTION: f64 = 0.2;
    /// Seed used when none is given.
    pub const DEFAULT_SEED: u64 = 42;

    /// Create a config with the defaults above.
    #[must_use]
    pub fn new() -> Self {
        Self {
            test_fraction: Self::DEFAULT_TEST_FRACTION,
            seed: Self::DEFAULT_SEED,
            n_trees: RandomForestConfig::DEFAULT_N_TREES,
            max_depth: None,
            max_features: MaxFeatures::Sqrt,
            criterion: SplitCriterion::Gini,
            split_method: SplitMethod::Exact,
        }
    }

    /// Set the held-out fraction.
    #[must_use]
    pub fn with_test_fraction(mut self, test_fraction: f64) -> Self {
        self.test_fraction = test_fraction;
        self
    }

    /// Set the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the number of trees.
    #[must_use]
    pub fn with_n_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    /// Set the maximum tree depth (`None` = unlimited).
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the per-split feature sampling strategy.
    #[must_use]
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the impurity criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the threshold search method.
    #[must_use]
    pub fn with_split_method(mut self, split_method: SplitMethod) -> Self {
        self.split_method = split_method;
        self
    }

    /// Return the held-out fraction.
    #[must_use]
    pub fn test_fraction(&self) -> f64 {
        self.test_fraction
    }

    /// Return the seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Return the number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Split `table`, fit the preprocessor and forest on the train rows,
    /// and score the held-out rows.
    ///
    /// Classes are the sorted distinct labels of the train partition. A test
    /// row whose label never occurs in training counts as misclassified.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::DegenerateLabels`] | fewer than 2 labels in the table or train partition |
    /// | [`ModelError::InvalidTestFraction`] | fraction outside `(0, 1)` |
    /// | [`ModelError::EmptyPartition`] | too few rows to split |
    /// | [`ModelError::Forest`] | forest config or fit rejected |
    #[instrument(skip_all, fields(n_samples = table.n_samples(), seed = self.seed))]
    pub fn fit(&self, table: &TrainingTable) -> Result<TrainingOutcome, ModelError> {
        let n_labels = table.distinct_labels().len();
        if n_labels < 2 {
            return Err(ModelError::DegenerateLabels {
                partition: "dataset",
                n_labels,
            });
        }

        let split = train_test_split(table.n_samples(), self.test_fraction, self.seed)?;
        debug!(n_train = split.train.len(), n_test = split.test.len(), "holdout split");

        let rows = table.rows();
        let train_table =
            TrainingTable::new(split.train.iter().map(|&i| rows[i].clone()).collect());
        let classes = train_table.distinct_labels();
        if classes.len() < 2 {
            return Err(ModelError::DegenerateLabels {
                partition: "train partition",
                n_labels: classes.len(),
            });
        }

        let train_rows: Vec<FeatureRow> = train_table
            .rows()
            .iter()
            .map(|r| FeatureRow::from(&r.observation))
            .collect();
        let preprocessor = Preprocessor::fit(&train_rows)?;
        let x_train = train_rows
            .iter()
            .map(|row| preprocessor.transform(row))
            .collect::<Result<Vec<_>, _>>()?;
        // Every train label is in `classes`, so the partition point is its index.
        let y_train: Vec<usize> = train_table
            .rows()
            .iter()
            .map(|r| classes.partition_point(|c| c < &r.maturity_level))
            .collect();

        let forest = RandomForestConfig::new(self.n_trees)?
            .with_seed(self.seed)
            .with_max_depth(self.max_depth)
            .with_max_features(self.max_features)
            .with_criterion(self.criterion)
            .with_split_method(self.split_method)
            .fit(&x_train, &y_train, &preprocessor.feature_names())?;
        let (forest, importances) = forest.into_parts();

        let kpi_ranges = table.kpi_ranges().ok_or(ModelError::EmptyPartition {
            n_samples: table.n_samples(),
            n_test: split.test.len(),
        })?;
        let mut bundle = ModelBundle::new(preprocessor, forest, classes, kpi_ranges, 0.0);

        let test_rows: Vec<FeatureRow> = split
            .test
            .iter()
            .map(|&i| FeatureRow::from(&rows[i].observation))
            .collect();
        let predictions = bundle.predict_batch(&test_rows)?;
        let actual: Vec<&MaturityLevel> = split
            .test
            .iter()
            .map(|&i| &rows[i].maturity_level)
            .collect();

        let correct = predictions
            .iter()
            .zip(&actual)
            .filter(|&(p, &a)| &p.label == a)
            .count();
        let accuracy = correct as f64 / actual.len() as f64;

        // Rows with a label unknown to the classifier cannot be placed in the matrix.
        let (known_actual, known_predicted): (Vec<usize>, Vec<usize>) = actual
            .iter()
            .zip(&predictions)
            .filter_map(|(a, p)| {
                Some((
                    class_index(bundle.classes(), a)?,
                    class_index(bundle.classes(), &p.label)?,
                ))
            })
            .unzip();
        let n_unseen_labels = actual.len() - known_actual.len();
        let confusion = if known_actual.is_empty() {
            None
        } else {
            Some(ConfusionMatrix::from_labels(
                &known_actual,
                &known_predicted,
                bundle.classes().len(),
            )?)
        };

        bundle.set_accuracy(accuracy);
        info!(
            accuracy,
            n_train = split.train.len(),
            n_test = split.test.len(),
            n_classes = bundle.classes().len(),
            "bundle trained"
        );

        Ok(TrainingOutcome {
            bundle,
            evaluation: HoldoutEvaluation {
                n_train: split.train.len(),
                n_test: split.test.len(),
                accuracy,
                n_unseen_labels,
                confusion,
            },
            importances,
            config: self.clone(),
        })
    }
}

fn class_index(classes: &[MaturityLevel], label: &MaturityLevel) -> Option<usize> {
    classes.binary_search(label).ok()
}

/// Scores on the held-out partition.
#[derive(Debug, Clone)]
pub struct HoldoutEvaluation {
    /// Rows used for fitting.
    pub n_train: usize,
    /// Rows held out.
    pub n_test: usize,
    /// Fraction of held-out rows classified correctly.
    pub accuracy: f64,
    /// Held-out rows whose label never occurs in the train partition.
    pub n_unseen_labels: usize,
    /// Confusion over held-out rows with known labels, `None` if there are none.
    pub confusion: Option<ConfusionMatrix>,
}

/// Everything produced by [`TrainingConfig::fit`].
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// The fitted bundle, ready to persist.
    pub bundle: ModelBundle,
    /// Holdout scores.
    pub evaluation: HoldoutEvaluation,
    /// Encoded features ranked by mean decrease in impurity.
    pub importances: Vec<RankedFeature>,
    /// Configuration the bundle was fitted with.
    pub config: TrainingConfig,
}

impl TrainingOutcome {
    /// Flatten into the JSON report written next to the bundle.
    #[must_use]
    pub fn report(&self, key: &ModelKey) -> TrainingReport {
        let classes = self.bundle.classes();
        let class_metrics = self
            .evaluation
            .confusion
            .as_ref()
            .map(|cm| {
                cm.class_metrics()
                    .into_iter()
                    .map(|m| ClassReport {
                        label: classes[m.class].to_string(),
                        precision: m.precision,
                        recall: m.recall,
                        f1: m.f1,
                        support: m.support,
                    })
                    .collect()
            })
            .unwrap_or_default();
        let ranges: &KpiRanges = self.bundle.kpi_ranges();

        TrainingReport {
            model_key: key.to_string(),
            n_samples: self.evaluation.n_train + self.evaluation.n_test,
            n_train: self.evaluation.n_train,
            n_test: self.evaluation.n_test,
            test_fraction: self.config.test_fraction,
            seed: self.config.seed,
            n_trees: self.bundle.forest().n_trees(),
            classes: classes.iter().map(ToString::to_string).collect(),
            accuracy: self.evaluation.accuracy,
            confusion_matrix: self
                .evaluation
                .confusion
                .as_ref()
                .map(|cm| cm.as_rows().to_vec())
                .unwrap_or_default(),
            class_metrics,
            importances: self
                .importances
                .iter()
                .map(|f| ImportanceReport {
                    name: f.name.clone(),
                    importance: f.importance,
                    rank: f.rank,
                })
                .collect(),
            kpi_ranges: Kpi::ALL
                .iter()
                .map(|&kpi| (kpi.column().to_string(), ranges.get(kpi)))
                .collect(),
        }
    }
}
