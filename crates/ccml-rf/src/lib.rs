//! Random Forest classification over dense tabular features.
//!
//! CART decision trees are grown on bootstrap samples in parallel via rayon.
//! Class probabilities are the average of the leaf distributions reached in
//! every tree, so they always cover the full class set seen during training.

mod config;
mod confusion;
mod error;
mod forest;
mod importance;
mod node;
mod predict;
mod result;
mod split;
mod tree;

pub use config::{MaxFeatures, RandomForestConfig};
pub use confusion::{ClassMetrics, ConfusionMatrix};
pub use error::RfError;
pub use forest::RandomForest;
pub use importance::RankedFeature;
pub use node::{FeatureIndex, Node, NodeIndex};
pub use predict::ClassDistribution;
pub use result::{RandomForestResult, TrainingMetadata};
pub use split::{SplitCriterion, SplitMethod};
pub use tree::{DecisionTree, DecisionTreeConfig};
