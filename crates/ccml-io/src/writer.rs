//! JSON report writer for training runs.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::ModelKey;
use crate::table::KpiRange;

/// Summary of one training run, written next to the model bundle.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    /// Bundle key the report belongs to.
    pub model_key: String,
    /// Rows in the training table.
    pub n_samples: usize,
    /// Rows used for fitting.
    pub n_train: usize,
    /// Rows held out for evaluation.
    pub n_test: usize,
    /// Holdout fraction.
    pub test_fraction: f64,
    /// Split and forest seed.
    pub seed: u64,
    /// Number of trees in the forest.
    pub n_trees: usize,
    /// Class labels in classifier order.
    pub classes: Vec<String>,
    /// Holdout accuracy in `[0, 1]`.
    pub accuracy: f64,
    /// `confusion_matrix[actual][predicted]`, indexed like `classes`.
    pub confusion_matrix: Vec<Vec<usize>>,
    /// Per-class holdout metrics.
    pub class_metrics: Vec<ClassReport>,
    /// Encoded features ranked by importance.
    pub importances: Vec<ImportanceReport>,
    /// Observed KPI ranges keyed by CSV column name, in feature order.
    pub kpi_ranges: Vec<(String, KpiRange)>,
}

/// Holdout metrics for one class.
#[derive(Debug, Clone, Serialize)]
pub struct ClassReport {
    /// Class label.
    pub label: String,
    /// Precision.
    pub precision: f64,
    /// Recall.
    pub recall: f64,
    /// F1 score.
    pub f1: f64,
    /// Holdout rows of this class.
    pub support: usize,
}

/// One ranked feature importance.
#[derive(Debug, Clone, Serialize)]
pub struct ImportanceReport {
    /// Encoded feature name.
    pub name: String,
    /// Normalized importance.
    pub importance: f64,
    /// 1 = most important.
    pub rank: usize,
}

/// Writes training reports to JSON files.
///
/// Creates the output directory on construction if it does not exist.
/// Reports are named `{key}_report.json`.
pub struct ReportWriter {
    output_dir: PathBuf,
    key: ModelKey,
}

impl ReportWriter {
    /// Create a new writer targeting the given directory and model key.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), key = %key))]
    pub fn new(output_dir: &Path, key: ModelKey) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            key,
        })
    }

    /// Path the report is written to.
    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_report.json", self.key.as_str()))
    }

    /// Write `report` to `{key}_report.json`, replacing any previous report.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::EncodeReport`] | JSON encoding failed |
    /// | [`IoError::WriteFile`] | The file cannot be written |
    #[instrument(skip_all)]
    pub fn write_training_report(&self, report: &TrainingReport) -> Result<PathBuf, IoError> {
        let path = self.report_path();
        let json = serde_json::to_string_pretty(report).map_err(|e| IoError::EncodeReport {
            path: path.clone(),
            source: e,
        })?;
        fs::write(&path, &json).map_err(|e| IoError::WriteFile {
            path: path.clone(),
            source: e,
        })?;

        info!(path = %path.display(), accuracy = report.accuracy, "training report written");
        Ok(path)
    }
}
