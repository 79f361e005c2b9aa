//! Maturity-level model: indicator encoding, seeded holdout training,
//! bundle persistence, and single-row inference.

mod bundle;
mod encoder;
mod error;
pub mod holdout;
mod pipeline;
mod preprocess;
mod store;

pub use bundle::{ClassProbability, ModelBundle, Prediction};
pub use encoder::OneHotEncoder;
pub use error::{ErrorKind, ModelError};
pub use holdout::{HoldoutSplit, train_test_split};
pub use pipeline::{HoldoutEvaluation, TrainingConfig, TrainingOutcome};
pub use preprocess::{CATEGORICAL_COLUMNS, FeatureRow, Preprocessor};
pub use store::BundleStore;
