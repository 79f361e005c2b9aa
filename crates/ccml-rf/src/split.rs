use rand::Rng;
use rand::seq::SliceRandom;

use crate::node::FeatureIndex;

/// Criterion for measuring node impurity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SplitCriterion {
    /// Gini impurity: 1 - Σ(p_i²)
    Gini,
    /// Information entropy: -Σ(p_i · ln(p_i))
    Entropy,
}

impl SplitCriterion {
    /// Compute the impurity of a node from its class counts.
    ///
    /// An empty node is treated as pure.
    #[must_use]
    pub fn impurity(self, class_counts: &[usize], n_samples: usize) -> f64 {
        if n_samples == 0 {
            return 0.0;
        }
        let n = n_samples as f64;
        let proportions = class_counts
            .iter()
            .filter(|&&c| c > 0)
            .map(|&c| c as f64 / n);
        match self {
            SplitCriterion::Gini => 1.0 - proportions.map(|p| p * p).sum::<f64>(),
            SplitCriterion::Entropy => -proportions.map(|p| p * p.ln()).sum::<f64>(),
        }
    }
}

/// How candidate thresholds are chosen for each feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SplitMethod {
    /// Scan every midpoint between consecutive distinct values.
    Exact,
    /// Draw one uniform threshold between the feature's min and max
    /// (Extremely Randomized Trees).
    ExtraTrees,
}

/// The chosen split for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitCandidate {
    pub(crate) feature: FeatureIndex,
    pub(crate) threshold: f64,
    /// `n · I(parent) − n_l · I(left) − n_r · I(right)`
    pub(crate) impurity_decrease: f64,
    pub(crate) left: Vec<usize>,
    pub(crate) right: Vec<usize>,
}

/// Node-local inputs shared by both split strategies.
pub(crate) struct SplitContext<'a> {
    /// Column-major features: `columns[feature][sample]`.
    pub(crate) columns: &'a [Vec<f64>],
    pub(crate) labels: &'a [usize],
    pub(crate) n_classes: usize,
    pub(crate) criterion: SplitCriterion,
    pub(crate) method: SplitMethod,
    pub(crate) max_features: usize,
    pub(crate) min_samples_leaf: usize,
}

impl SplitContext<'_> {
    fn class_counts(&self, samples: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &s in samples {
            counts[self.labels[s]] += 1;
        }
        counts
    }

    fn weighted_decrease(
        &self,
        parent: f64,
        n: usize,
        left: &[usize],
        n_left: usize,
        right: &[usize],
        n_right: usize,
    ) -> f64 {
        n as f64 * parent
            - n_left as f64 * self.criterion.impurity(left, n_left)
            - n_right as f64 * self.criterion.impurity(right, n_right)
    }

    /// Find the best split for `samples` over a random feature subset.
    ///
    /// Returns `None` when every candidate feature is constant on these
    /// samples or every boundary would leave a child below `min_samples_leaf`.
    pub(crate) fn find(&self, samples: &[usize], rng: &mut impl Rng) -> Option<SplitCandidate> {
        let n = samples.len();
        if n < 2 || self.columns.is_empty() {
            return None;
        }
        let parent_counts = self.class_counts(samples);
        let parent = self.criterion.impurity(&parent_counts, n);

        let mut order: Vec<usize> = (0..self.columns.len()).collect();
        let take = self.max_features.min(order.len());
        let (selected, _) = order.partial_shuffle(rng, take);

        let mut best: Option<(usize, f64, f64)> = None;
        for &feature in selected.iter() {
            let found = match self.method {
                SplitMethod::Exact => self.scan_exact(feature, samples, &parent_counts, parent),
                SplitMethod::ExtraTrees => {
                    self.draw_random(feature, samples, &parent_counts, parent, rng)
                }
            };
            if let Some((threshold, decrease)) = found
                && best.is_none_or(|(_, _, d)| decrease > d)
            {
                best = Some((feature, threshold, decrease));
            }
        }

        let (feature, threshold, impurity_decrease) = best?;
        let column = &self.columns[feature];
        let (left, right): (Vec<usize>, Vec<usize>) =
            samples.iter().partition(|&&s| column[s] <= threshold);

        Some(SplitCandidate {
            feature: FeatureIndex::new(feature),
            threshold,
            impurity_decrease,
            left,
            right,
        })
    }

    /// Sort samples by the feature and evaluate every boundary incrementally.
    fn scan_exact(
        &self,
        feature: usize,
        samples: &[usize],
        parent_counts: &[usize],
        parent: f64,
    ) -> Option<(f64, f64)> {
        let column = &self.columns[feature];
        let n = samples.len();
        let mut sorted: Vec<(f64, usize)> = samples.iter().map(|&s| (column[s], s)).collect();
        sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        let mut left = vec![0usize; self.n_classes];
        let mut right = parent_counts.to_vec();
        let mut best: Option<(f64, f64)> = None;

        for i in 0..n - 1 {
            let (value, s) = sorted[i];
            left[self.labels[s]] += 1;
            right[self.labels[s]] -= 1;

            let next = sorted[i + 1].0;
            let n_left = i + 1;
            let n_right = n - n_left;
            if value == next || n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                continue;
            }

            let decrease = self.weighted_decrease(parent, n, &left, n_left, &right, n_right);
            if best.is_none_or(|(_, d)| decrease > d) {
                best = Some(((value + next) / 2.0, decrease));
            }
        }
        best
    }

    /// Evaluate a single threshold drawn uniformly in `[min, max)`.
    fn draw_random(
        &self,
        feature: usize,
        samples: &[usize],
        parent_counts: &[usize],
        parent: f64,
        rng: &mut impl Rng,
    ) -> Option<(f64, f64)> {
        let column = &self.columns[feature];
        let (lo, hi) = samples.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| {
            (lo.min(column[s]), hi.max(column[s]))
        });
        if lo >= hi {
            return None;
        }
        let threshold = rng.gen_range(lo..hi);

        let mut left = vec![0usize; self.n_classes];
        let mut n_left = 0usize;
        for &s in samples {
            if column[s] <= threshold {
                left[self.labels[s]] += 1;
                n_left += 1;
            }
        }
        let n = samples.len();
        let n_right = n - n_left;
        if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
            return None;
        }
        let right: Vec<usize> = parent_counts.iter().zip(&left).map(|(p, l)| p - l).collect();
        Some((threshold, self.weighted_decrease(parent, n, &left, n_left, &right, n_right)))
    }
}
