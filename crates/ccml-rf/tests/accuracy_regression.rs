//! Accuracy regression tests for ccml-rf.
//!
//! A deterministic mixed dataset shaped like encoded KPI rows: a few
//! informative continuous columns, noise columns, and a block of 0/1
//! indicator columns. Guards against algorithmic changes that quietly
//! degrade the classifier.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use ccml_rf::{ConfusionMatrix, RandomForestConfig, SplitMethod};

const N_CLASSES: usize = 3;

/// 240 rows: 3 informative columns, 6 noise columns, 5 indicator columns.
///
/// Rows are assigned round-robin across classes; the indicator set is
/// random and carries no signal.
fn make_kpi_like(seed: u64) -> (Vec<Vec<f64>>, Vec<usize>, Vec<String>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut features = Vec::new();
    let mut labels = Vec::new();
    for i in 0..240 {
        let class = i % N_CLASSES;
        let mut row: Vec<f64> = (0..9)
            .map(|f| {
                let base = if f < 3 { class as f64 * 4.0 } else { 0.0 };
                base + rng.r#gen::<f64>() * 2.0
            })
            .collect();
        let hot = rng.gen_range(0..5);
        row.extend((0..5).map(|j| if j == hot { 1.0 } else { 0.0 }));
        features.push(row);
        labels.push(class);
    }
    let names = (0..14).map(|f| format!("f{f}")).collect();
    (features, labels, names)
}

fn holdout_accuracy(config: &RandomForestConfig) -> f64 {
    let (features, labels, names) = make_kpi_like(42);
    let (train_x, test_x) = features.split_at(192);
    let (train_y, test_y) = labels.split_at(192);
    let forest = config.fit(train_x, train_y, &names).unwrap().into_forest();
    let predicted = forest.predict_batch(test_x).unwrap();
    ConfusionMatrix::from_labels(test_y, &predicted, N_CLASSES)
        .unwrap()
        .accuracy()
}

#[test]
fn exact_holdout_accuracy_above_threshold() {
    let config = RandomForestConfig::new(100).unwrap().with_seed(42);
    let accuracy = holdout_accuracy(&config);
    assert!(accuracy > 0.9, "holdout accuracy {accuracy} <= 0.9");
}

#[test]
fn extra_trees_holdout_accuracy_above_threshold() {
    let config = RandomForestConfig::new(100)
        .unwrap()
        .with_split_method(SplitMethod::ExtraTrees)
        .with_seed(42);
    let accuracy = holdout_accuracy(&config);
    assert!(accuracy > 0.85, "extra-trees holdout accuracy {accuracy} <= 0.85");
}

/// The top 3 features by importance must include at least 2 of f0, f1, f2.
#[test]
fn informative_columns_rank_first() {
    let (features, labels, names) = make_kpi_like(7);
    let result = RandomForestConfig::new(100)
        .unwrap()
        .fit(&features, &labels, &names)
        .unwrap();
    let top3: Vec<&str> = result
        .importances()
        .iter()
        .take(3)
        .map(|f| f.name.as_str())
        .collect();
    let informative = top3.iter().filter(|n| ["f0", "f1", "f2"].contains(*n)).count();
    assert!(informative >= 2, "top-3 features: {top3:?}");
}

#[test]
fn probabilities_are_a_distribution_everywhere() {
    let (features, labels, names) = make_kpi_like(3);
    let forest = RandomForestConfig::new(50)
        .unwrap()
        .fit(&features, &labels, &names)
        .unwrap()
        .into_forest();

    // Probe well outside the training range as well as inside it.
    let mut probes = features.clone();
    probes.push(vec![-100.0; 14]);
    probes.push(vec![1e6; 14]);
    for dist in forest.predict_proba_batch(&probes).unwrap() {
        let p = dist.as_slice();
        assert_eq!(p.len(), N_CLASSES);
        assert!(p.iter().all(|&v| v >= 0.0));
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-6);
    }
}

#[test]
fn same_seed_same_predictions_across_runs() {
    let (features, labels, names) = make_kpi_like(11);
    let config = RandomForestConfig::new(60).unwrap().with_seed(5);
    let a = config.fit(&features, &labels, &names).unwrap().into_forest();
    let b = config.fit(&features, &labels, &names).unwrap().into_forest();
    assert_eq!(
        a.predict_proba_batch(&features).unwrap(),
        b.predict_proba_batch(&features).unwrap()
    );
}
