//! Error types for training, inference, and bundle storage.

use std::path::PathBuf;

use ccml_io::IoError;
use ccml_rf::RfError;

/// Coarse failure category, used by callers to pick a user-facing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing training data.
    Data,
    /// Degenerate label distribution or unfittable configuration.
    Model,
    /// Feature shape disagrees with what the bundle was trained on.
    Schema,
    /// Durable read or write failure.
    Storage,
}

/// Errors from fitting, applying, and persisting a model bundle.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Returned when the training table cannot be read.
    #[error(transparent)]
    Data(#[from] IoError),

    /// Returned when an inference input holds a NaN or infinite value.
    #[error("numeric input {index} ({name}) is not finite")]
    NonFiniteInput {
        /// Zero-based position in the numeric features.
        index: usize,
        /// Feature name.
        name: String,
    },

    /// Returned when a label set has fewer than two distinct values.
    #[error("{partition} has {n_labels} distinct label(s), at least 2 are required")]
    DegenerateLabels {
        /// Which rows were inspected (`"dataset"` or `"train partition"`).
        partition: &'static str,
        /// Number of distinct labels found.
        n_labels: usize,
    },

    /// Returned when the holdout fraction is not strictly between 0 and 1.
    #[error("test fraction must be in (0, 1), got {value}")]
    InvalidTestFraction {
        /// The rejected fraction.
        value: f64,
    },

    /// Returned when a split leaves the train or test partition empty.
    #[error("cannot split {n_samples} row(s) with {n_test} held out: both partitions must be non-empty")]
    EmptyPartition {
        /// Rows available.
        n_samples: usize,
        /// Rows that would be held out.
        n_test: usize,
    },

    /// Returned when the random forest rejects its inputs.
    #[error("random forest error")]
    Forest {
        /// Underlying forest error.
        #[from]
        source: RfError,
    },

    /// Returned when a feature row does not have the shape the bundle was trained on.
    #[error("{what} count mismatch: bundle expects {expected}, got {got}")]
    SchemaMismatch {
        /// Which part of the row disagreed (`"numeric feature"` or `"categorical feature"`).
        what: &'static str,
        /// Count the bundle was trained with.
        expected: usize,
        /// Count supplied.
        got: usize,
    },

    /// Returned when the bundle directory cannot be created.
    #[error("cannot create bundle directory {path}")]
    CreateDir {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a bundle file cannot be written.
    #[error("cannot write bundle {path}")]
    WriteBundle {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a bundle file cannot be opened.
    #[error("cannot read bundle {path}")]
    ReadBundle {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when bincode encoding fails.
    #[error("cannot encode bundle {path}")]
    SerializeBundle {
        /// Destination path.
        path: PathBuf,
        /// Underlying bincode error.
        source: bincode::Error,
    },

    /// Returned when bincode decoding fails.
    #[error("cannot decode bundle {path}")]
    DeserializeBundle {
        /// Source path.
        path: PathBuf,
        /// Underlying bincode error.
        source: bincode::Error,
    },

    /// Returned when the bundle was written by an incompatible format version.
    #[error("bundle {path} has format version {found}, expected {expected}")]
    IncompatibleVersion {
        /// Source path.
        path: PathBuf,
        /// Version this build reads.
        expected: u32,
        /// Version found in the file.
        found: u32,
    },
}

impl ModelError {
    /// Category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelError::Data(IoError::OutputDirCreate { .. } | IoError::WriteFile { .. })
            | ModelError::CreateDir { .. }
            | ModelError::WriteBundle { .. }
            | ModelError::ReadBundle { .. }
            | ModelError::SerializeBundle { .. }
            | ModelError::DeserializeBundle { .. }
            | ModelError::IncompatibleVersion { .. } => ErrorKind::Storage,
            ModelError::Data(_) | ModelError::NonFiniteInput { .. } => ErrorKind::Data,
            ModelError::Forest {
                source: RfError::PredictionFeatureMismatch { .. },
            }
            | ModelError::SchemaMismatch { .. } => ErrorKind::Schema,
            ModelError::DegenerateLabels { .. }
            | ModelError::InvalidTestFraction { .. }
            | ModelError::EmptyPartition { .. }
            | ModelError::Forest { .. } => ErrorKind::Model,
        }
    }
}
