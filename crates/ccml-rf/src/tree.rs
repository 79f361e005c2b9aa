use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::{
    RfError,
    node::{Node, NodeIndex},
    predict::argmax,
    split::{SplitContext, SplitCriterion, SplitMethod},
};

/// Configuration for a single CART decision tree.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter           | Default                         |
/// |---------------------|---------------------------------|
/// | `criterion`         | `Gini`                          |
/// | `split_method`      | `Exact`                         |
/// | `max_depth`         | `None` (unlimited)              |
/// | `min_samples_split` | 2                               |
/// | `min_samples_leaf`  | 1                               |
/// | `max_features`      | `None` (all features)           |
/// | `n_classes`         | `None` (largest label + 1)      |
/// | `seed`              | 42                              |
#[derive(Debug, Clone)]
pub struct DecisionTreeConfig {
    pub(crate) criterion: SplitCriterion,
    pub(crate) split_method: SplitMethod,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) max_features: Option<usize>,
    pub(crate) n_classes: Option<usize>,
    pub(crate) seed: u64,
}

impl DecisionTreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            criterion: SplitCriterion::Gini,
            split_method: SplitMethod::Exact,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            n_classes: None,
            seed: 42,
        }
    }

    /// Set the split quality criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the split-finding strategy.
    #[must_use]
    pub fn with_split_method(mut self, split_method: SplitMethod) -> Self {
        self.split_method = split_method;
        self
    }

    /// Set the maximum tree depth (root is depth 0). `None` means unlimited.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum number of samples required to attempt a split.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Set the minimum number of samples required in each child of a split.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set how many randomly chosen features are examined per split.
    #[must_use]
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Fix the width of every leaf distribution.
    ///
    /// A forest sets this so trees grown on bootstrap samples that miss a
    /// class still emit probabilities for the full class set.
    #[must_use]
    pub fn with_n_classes(mut self, n_classes: Option<usize>) -> Self {
        self.n_classes = n_classes;
        self
    }

    /// Set the random seed for feature subsampling and random thresholds.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Validate the hyperparameters against a feature width and return the
    /// resolved `max_features`.
    pub(crate) fn validate(&self, n_features: usize) -> Result<usize, RfError> {
        if let Some(d) = self.max_depth
            && d == 0
        {
            return Err(RfError::InvalidMaxDepth { max_depth: 0 });
        }
        if self.min_samples_split < 2 {
            return Err(RfError::InvalidMinSamplesSplit {
                min_samples_split: self.min_samples_split,
            });
        }
        if self.min_samples_leaf < 1 {
            return Err(RfError::InvalidMinSamplesLeaf {
                min_samples_leaf: self.min_samples_leaf,
            });
        }
        let max_features = self.max_features.unwrap_or(n_features);
        if max_features == 0 || max_features > n_features {
            return Err(RfError::InvalidMaxFeatures {
                max_features,
                n_features,
            });
        }
        Ok(max_features)
    }

    /// Train a decision tree on a row-major dataset.
    ///
    /// `features[sample][feature]`, `labels[sample]` (zero-based classes).
    ///
    /// # Errors
    ///
    /// | Variant                               | When                                   |
    /// |---------------------------------------|----------------------------------------|
    /// | [`RfError::EmptyDataset`]             | `features` is empty                    |
    /// | [`RfError::ZeroFeatures`]             | rows have zero feature columns         |
    /// | [`RfError::LabelCountMismatch`]       | `labels.len() != features.len()`       |
    /// | [`RfError::FeatureCountMismatch`]     | rows have inconsistent lengths         |
    /// | [`RfError::NonFiniteValue`]           | any value is NaN or infinite           |
    /// | [`RfError::ClassOutOfRange`]          | a label is `>= n_classes`              |
    /// | [`RfError::InvalidMaxDepth`] and other hyperparameter variants | config is invalid |
    #[instrument(skip(self, features, labels), fields(n_samples = features.len()))]
    pub fn fit(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<DecisionTree, RfError> {
        let n_features = validate_training_data(features, labels)?;
        let max_features = self.validate(n_features)?;

        let observed = labels.iter().max().map_or(1, |&l| l + 1);
        let n_classes = self.n_classes.unwrap_or(observed);
        if let Some((sample_index, &label)) =
            labels.iter().enumerate().find(|&(_, &l)| l >= n_classes)
        {
            return Err(RfError::ClassOutOfRange {
                label,
                n_classes,
                sample_index,
            });
        }

        // The split search reads one feature at a time.
        let columns: Vec<Vec<f64>> = (0..n_features)
            .map(|f| features.iter().map(|row| row[f]).collect())
            .collect();

        let mut grower = Grower {
            split: SplitContext {
                columns: &columns,
                labels,
                n_classes,
                criterion: self.criterion,
                method: self.split_method,
                max_features,
                min_samples_leaf: self.min_samples_leaf,
            },
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            rng: ChaCha8Rng::seed_from_u64(self.seed),
            nodes: Vec::new(),
        };
        let samples: Vec<usize> = (0..features.len()).collect();
        grower.grow(&samples, 0);

        debug!(n_nodes = grower.nodes.len(), n_classes, "decision tree built");

        Ok(DecisionTree {
            nodes: grower.nodes,
            n_features,
            n_classes,
        })
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Check shape and finiteness of a training set; return its feature width.
pub(crate) fn validate_training_data(
    features: &[Vec<f64>],
    labels: &[usize],
) -> Result<usize, RfError> {
    let first = features.first().ok_or(RfError::EmptyDataset)?;
    let n_features = first.len();
    if n_features == 0 {
        return Err(RfError::ZeroFeatures);
    }
    if labels.len() != features.len() {
        return Err(RfError::LabelCountMismatch {
            n_samples: features.len(),
            n_labels: labels.len(),
        });
    }
    for (sample_index, row) in features.iter().enumerate() {
        if row.len() != n_features {
            return Err(RfError::FeatureCountMismatch {
                expected: n_features,
                got: row.len(),
                sample_index,
            });
        }
        if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
            return Err(RfError::NonFiniteValue {
                sample_index,
                feature_index,
            });
        }
    }
    Ok(n_features)
}

/// Recursive tree builder writing into a flat node arena.
struct Grower<'a> {
    split: SplitContext<'a>,
    max_depth: Option<usize>,
    min_samples_split: usize,
    rng: ChaCha8Rng,
    nodes: Vec<Node>,
}

impl Grower<'_> {
    fn grow(&mut self, samples: &[usize], depth: usize) -> NodeIndex {
        let n = samples.len();
        let mut counts = vec![0usize; self.split.n_classes];
        for &s in samples {
            counts[self.split.labels[s]] += 1;
        }

        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let at_depth_limit = self.max_depth.is_some_and(|d| depth >= d);
        if pure || at_depth_limit || n < self.min_samples_split {
            return self.leaf(&counts, n);
        }

        let Some(candidate) = self.split.find(samples, &mut self.rng) else {
            return self.leaf(&counts, n);
        };

        // Reserve the parent slot so it precedes both subtrees.
        let index = self.nodes.len();
        self.nodes.push(Node::Leaf {
            distribution: Vec::new(),
            n_samples: n,
        });
        let left = self.grow(&candidate.left, depth + 1);
        let right = self.grow(&candidate.right, depth + 1);
        self.nodes[index] = Node::Split {
            feature: candidate.feature,
            threshold: candidate.threshold,
            left,
            right,
            n_samples: n,
            impurity_decrease: candidate.impurity_decrease,
        };
        NodeIndex::new(index)
    }

    fn leaf(&mut self, counts: &[usize], n: usize) -> NodeIndex {
        let total = n.max(1) as f64;
        let distribution = counts.iter().map(|&c| c as f64 / total).collect();
        self.nodes.push(Node::Leaf {
            distribution,
            n_samples: n,
        });
        NodeIndex::new(self.nodes.len() - 1)
    }
}

/// A fitted CART decision tree stored as a node arena rooted at index 0.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
}

impl DecisionTree {
    /// Predict the most probable class for one sample.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict(&self, sample: &[f64]) -> Result<usize, RfError> {
        Ok(argmax(self.predict_proba(sample)?))
    }

    /// Return the class distribution of the leaf this sample lands in.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict_proba(&self, sample: &[f64]) -> Result<&[f64], RfError> {
        if sample.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { distribution, .. } => return Ok(distribution),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if sample[feature.index()] <= *threshold {
                        left.index()
                    } else {
                        right.index()
                    };
                }
            }
        }
    }

    /// Mean Decrease in Impurity per feature, normalized to sum to 1.0.
    ///
    /// All zeros when the tree is a single leaf.
    #[must_use]
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0f64; self.n_features];
        for node in &self.nodes {
            if let Node::Split {
                feature,
                impurity_decrease,
                ..
            } = node
            {
                totals[feature.index()] += impurity_decrease;
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }
        totals
    }

    /// Return the nodes in arena order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Return the number of classes in every leaf distribution.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the depth of the deepest leaf (a lone root leaf has depth 0).
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, d)) = stack.pop() {
            match &self.nodes[idx] {
                Node::Leaf { .. } => deepest = deepest.max(d),
                Node::Split { left, right, .. } => {
                    stack.push((left.index(), d + 1));
                    stack.push((right.index(), d + 1));
                }
            }
        }
        deepest
    }
}
