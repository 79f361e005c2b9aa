//! Process-wide model context, built once before serving.

use std::path::{Path, PathBuf};

use ccml_io::{ModelKey, ReportWriter, TrainingReader};
use ccml_model::{BundleStore, ModelBundle, ModelError, TrainingConfig, TrainingOutcome};
use tracing::{info, instrument};

/// Where training data lives and where bundles are kept.
#[derive(Debug, Clone)]
pub struct ModelLocation {
    /// Training CSV.
    pub data: PathBuf,
    /// Directory holding `{key}.bundle` and `{key}_report.json`.
    pub model_dir: PathBuf,
    /// Bundle key.
    pub key: ModelKey,
}

/// Read the CSV, fit, write the report and then save the bundle.
///
/// The bundle is written last, so a failed call never leaves a new bundle
/// behind for the next start to reuse.
///
/// # Errors
///
/// Any [`ModelError`]: data errors from reading, model errors from fitting,
/// storage errors from saving the bundle or report.
#[instrument(skip_all, fields(data = %location.data.display(), key = %location.key))]
pub fn train_and_save(
    location: &ModelLocation,
    config: &TrainingConfig,
) -> Result<(TrainingOutcome, PathBuf), ModelError> {
    let table = TrainingReader::new(&location.data).read()?;
    let outcome = config.fit(&table)?;

    ReportWriter::new(&location.model_dir, location.key.clone())?
        .write_training_report(&outcome.report(&location.key))?;
    let bundle_path = BundleStore::new(&location.model_dir).save(&location.key, &outcome.bundle)?;

    Ok((outcome, bundle_path))
}

/// The immutable state shared by every request: one loaded bundle.
#[derive(Debug)]
pub struct AppContext {
    key: ModelKey,
    bundle: ModelBundle,
    bundle_path: PathBuf,
}

impl AppContext {
    /// Load the stored bundle, or train and store one first when it is
    /// missing or `retrain` is set. The returned bundle is always the one
    /// read back from storage.
    ///
    /// # Errors
    ///
    /// See [`train_and_save`] and [`BundleStore::load`].
    #[instrument(skip_all, fields(key = %location.key, retrain = retrain))]
    pub fn initialize(
        location: &ModelLocation,
        config: &TrainingConfig,
        retrain: bool,
    ) -> Result<Self, ModelError> {
        let store = BundleStore::new(&location.model_dir);
        if retrain || !store.exists(&location.key) {
            let (outcome, path) = train_and_save(location, config)?;
            info!(
                path = %path.display(),
                accuracy = outcome.evaluation.accuracy,
                "trained fresh bundle"
            );
        }
        let bundle = store.load(&location.key)?;
        info!(
            classes = bundle.classes().len(),
            accuracy = bundle.accuracy(),
            "bundle ready"
        );
        Ok(Self {
            key: location.key.clone(),
            bundle_path: store.path(&location.key),
            bundle,
        })
    }

    /// Wrap an already-loaded bundle.
    #[cfg(test)]
    pub fn from_bundle(key: ModelKey, bundle: ModelBundle, bundle_path: &Path) -> Self {
        Self {
            key,
            bundle,
            bundle_path: bundle_path.to_path_buf(),
        }
    }

    /// Bundle key.
    #[must_use]
    pub fn key(&self) -> &ModelKey {
        &self.key
    }

    /// The loaded bundle.
    #[must_use]
    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    /// File the bundle was loaded from.
    #[must_use]
    pub fn bundle_path(&self) -> &Path {
        &self.bundle_path
    }
}
