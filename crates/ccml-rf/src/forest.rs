//! Random Forest training with parallel tree construction.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::config::RandomForestConfig;
use crate::error::RfError;
use crate::importance::aggregate_importances;
use crate::result::{RandomForestResult, TrainingMetadata};
use crate::tree::{DecisionTree, DecisionTreeConfig, validate_training_data};

/// A fitted Random Forest ensemble.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RandomForest {
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
    pub(crate) feature_names: Vec<String>,
}

/// Train the Random Forest ensemble.
///
/// Each tree gets its own seed drawn from a master `ChaCha8Rng`, so the
/// fitted forest does not depend on how rayon schedules the work.
#[instrument(skip_all, fields(n_trees = config.n_trees, n_samples = features.len()))]
pub(crate) fn train(
    config: &RandomForestConfig,
    features: &[Vec<f64>],
    labels: &[usize],
    feature_names: &[String],
) -> Result<RandomForestResult, RfError> {
    let n_features = validate_training_data(features, labels)?;
    if feature_names.len() != n_features {
        return Err(RfError::FeatureNameMismatch {
            n_names: feature_names.len(),
            n_features,
        });
    }
    let max_features = config.max_features.resolve(n_features)?;
    if config.bootstrap_fraction <= 0.0 || config.bootstrap_fraction > 1.0 {
        return Err(RfError::InvalidBootstrapFraction {
            fraction: config.bootstrap_fraction,
        });
    }

    let n_samples = features.len();
    let n_classes = labels.iter().max().map_or(1, |&l| l + 1);
    let draw_count = ((n_samples as f64) * config.bootstrap_fraction).ceil() as usize;

    let tree_template = DecisionTreeConfig::new()
        .with_criterion(config.criterion)
        .with_split_method(config.split_method)
        .with_max_depth(config.max_depth)
        .with_min_samples_split(config.min_samples_split)
        .with_min_samples_leaf(config.min_samples_leaf)
        .with_max_features(Some(max_features))
        .with_n_classes(Some(n_classes));
    // Surface hyperparameter errors once instead of from every worker.
    tree_template.validate(n_features)?;

    info!(
        n_trees = config.n_trees,
        n_samples,
        n_features,
        n_classes,
        max_features,
        draw_count,
        "training random forest"
    );

    let mut master_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let tree_seeds: Vec<u64> = (0..config.n_trees).map(|_| master_rng.r#gen()).collect();

    let trees: Vec<DecisionTree> = tree_seeds
        .into_par_iter()
        .map(|seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let drawn: Vec<usize> = (0..draw_count).map(|_| rng.gen_range(0..n_samples)).collect();
            let boot_features: Vec<Vec<f64>> = drawn.iter().map(|&i| features[i].clone()).collect();
            let boot_labels: Vec<usize> = drawn.iter().map(|&i| labels[i]).collect();
            tree_template
                .clone()
                .with_seed(rng.r#gen())
                .fit(&boot_features, &boot_labels)
        })
        .collect::<Result<Vec<_>, RfError>>()?;

    debug!(n_trees_trained = trees.len(), "tree training complete");

    let per_tree: Vec<Vec<f64>> = trees.iter().map(DecisionTree::feature_importances).collect();
    let importances = aggregate_importances(&per_tree, feature_names);

    let forest = RandomForest {
        trees,
        n_features,
        n_classes,
        feature_names: feature_names.to_vec(),
    };
    let metadata = TrainingMetadata {
        n_trees: config.n_trees,
        n_features,
        n_classes,
        n_samples,
        max_features_resolved: max_features,
    };

    info!(n_classes, "random forest training complete");
    Ok(RandomForestResult::new(forest, importances, metadata))
}

#[cfg(test)]
mod tests {
    use crate::config::{MaxFeatures, RandomForestConfig};
    use crate::split::SplitMethod;
    use crate::RfError;

    /// Three well separated classes along the first feature.
    fn make_separable_data() -> (Vec<Vec<f64>>, Vec<usize>, Vec<String>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for (class, base) in [0.0, 10.0, 20.0].into_iter().enumerate() {
            for i in 0..20 {
                features.push(vec![base + i as f64 * 0.15, 0.5]);
                labels.push(class);
            }
        }
        (features, labels, vec!["x".to_string(), "y".to_string()])
    }

    fn training_accuracy(method: SplitMethod) -> f64 {
        let (features, labels, names) = make_separable_data();
        let result = RandomForestConfig::new(30)
            .unwrap()
            .with_max_features(MaxFeatures::All)
            .with_split_method(method)
            .fit(&features, &labels, &names)
            .unwrap();
        let predictions = result.forest().predict_batch(&features).unwrap();
        let correct = predictions.iter().zip(&labels).filter(|(p, l)| p == l).count();
        correct as f64 / labels.len() as f64
    }

    #[test]
    fn separable_accuracy_for_both_split_methods() {
        assert!(training_accuracy(SplitMethod::Exact) > 0.9);
        assert!(training_accuracy(SplitMethod::ExtraTrees) > 0.85);
    }

    #[test]
    fn importances_sum_to_one() {
        let (features, labels, names) = make_separable_data();
        let result = RandomForestConfig::new(20).unwrap().fit(&features, &labels, &names).unwrap();
        let total: f64 = result.importances().iter().map(|f| f.importance).sum();
        assert!((total - 1.0).abs() < 1e-10, "total = {total}");
        assert_eq!(result.importances()[0].name, "x");
    }

    #[test]
    fn deterministic_with_same_seed() {
        let (features, labels, names) = make_separable_data();
        let fit = || {
            RandomForestConfig::new(10)
                .unwrap()
                .with_seed(99)
                .fit(&features, &labels, &names)
                .unwrap()
                .into_forest()
        };
        assert_eq!(fit(), fit());
    }

    #[test]
    fn every_tree_covers_all_classes() {
        let (features, labels, names) = make_separable_data();
        // Tiny bootstrap draws routinely miss a class.
        let result = RandomForestConfig::new(25)
            .unwrap()
            .with_bootstrap_fraction(0.05)
            .fit(&features, &labels, &names)
            .unwrap();
        let forest = result.forest();
        assert_eq!(forest.n_classes(), 3);
        assert!(forest.trees().iter().all(|t| t.n_classes() == 3));
        let proba = forest.predict_proba(&[5.0, 0.5]).unwrap();
        assert_eq!(proba.as_slice().len(), 3);
    }

    #[test]
    fn validation_errors() {
        let config = RandomForestConfig::new(5).unwrap();
        assert!(matches!(config.fit(&[], &[], &[]), Err(RfError::EmptyDataset)));

        let (features, labels, _) = make_separable_data();
        assert!(matches!(
            config.fit(&features, &labels, &["only".to_string()]),
            Err(RfError::FeatureNameMismatch { n_names: 1, n_features: 2 })
        ));

        let names = vec!["x".to_string(), "y".to_string()];
        assert!(matches!(
            config.clone().with_bootstrap_fraction(0.0).fit(&features, &labels, &names),
            Err(RfError::InvalidBootstrapFraction { .. })
        ));
        assert!(matches!(
            config.clone().with_max_depth(Some(0)).fit(&features, &labels, &names),
            Err(RfError::InvalidMaxDepth { .. })
        ));
    }
}
