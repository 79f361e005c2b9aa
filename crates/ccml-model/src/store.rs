//! Durable bundle storage via bincode.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use ccml_io::ModelKey;
use tracing::{debug, info, instrument};

use crate::bundle::ModelBundle;
use crate::error::ModelError;

/// Current binary format version.
const FORMAT_VERSION: u32 = 1;

/// Summary written ahead of the bundle body.
#[derive(serde::Serialize, serde::Deserialize)]
struct BundleHeader {
    /// Format version for compatibility checking.
    format_version: u32,
    /// Number of classes.
    n_classes: usize,
    /// Width of the encoded feature vector.
    n_features: usize,
}

/// Reads and writes bundles as `{dir}/{key}.bundle`.
///
/// Each file is a small bincode header followed by the bincode bundle.
/// The header is decoded first so a version mismatch is reported before the
/// body is touched.
#[derive(Debug, Clone)]
pub struct BundleStore {
    dir: PathBuf,
}

impl BundleStore {
    /// Create a store rooted at `dir`. Nothing is touched until the first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the bundle stored under `key`.
    #[must_use]
    pub fn path(&self, key: &ModelKey) -> PathBuf {
        self.dir.join(format!("{}.bundle", key.as_str()))
    }

    /// Return `true` when a bundle file exists under `key`.
    #[must_use]
    pub fn exists(&self, key: &ModelKey) -> bool {
        self.path(key).is_file()
    }

    /// Write `bundle` under `key`, replacing any previous bundle.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::CreateDir`] | directory creation failed |
    /// | [`ModelError::WriteBundle`] | file create or flush failed |
    /// | [`ModelError::SerializeBundle`] | bincode encoding failed |
    #[instrument(skip_all, fields(key = %key))]
    pub fn save(&self, key: &ModelKey, bundle: &ModelBundle) -> Result<PathBuf, ModelError> {
        fs::create_dir_all(&self.dir).map_err(|e| ModelError::CreateDir {
            path: self.dir.clone(),
            source: e,
        })?;
        let path = self.path(key);

        let header = BundleHeader {
            format_version: FORMAT_VERSION,
            n_classes: bundle.classes().len(),
            n_features: bundle.forest().n_features(),
        };
        let file = File::create(&path).map_err(|e| ModelError::WriteBundle {
            path: path.clone(),
            source: e,
        })?;
        let mut writer = BufWriter::new(file);
        let encode = |e: bincode::Error| ModelError::SerializeBundle {
            path: path.clone(),
            source: e,
        };
        bincode::serialize_into(&mut writer, &header).map_err(encode)?;
        bincode::serialize_into(&mut writer, bundle).map_err(encode)?;
        writer.flush().map_err(|e| ModelError::WriteBundle {
            path: path.clone(),
            source: e,
        })?;

        info!(
            path = %path.display(),
            n_classes = header.n_classes,
            n_features = header.n_features,
            "bundle saved"
        );
        Ok(path)
    }

    /// Read the bundle stored under `key`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::ReadBundle`] | file open failed |
    /// | [`ModelError::DeserializeBundle`] | bincode decoding failed or parts disagree |
    /// | [`ModelError::IncompatibleVersion`] | format version mismatch |
    #[instrument(skip_all, fields(key = %key))]
    pub fn load(&self, key: &ModelKey) -> Result<ModelBundle, ModelError> {
        let path = self.path(key);
        let file = File::open(&path).map_err(|e| ModelError::ReadBundle {
            path: path.clone(),
            source: e,
        })?;
        let mut reader = BufReader::new(file);
        let decode = |e: bincode::Error| ModelError::DeserializeBundle {
            path: path.clone(),
            source: e,
        };

        let header: BundleHeader = bincode::deserialize_from(&mut reader).map_err(decode)?;
        if header.format_version != FORMAT_VERSION {
            return Err(ModelError::IncompatibleVersion {
                path: path.clone(),
                expected: FORMAT_VERSION,
                found: header.format_version,
            });
        }

        let bundle: ModelBundle = bincode::deserialize_from(&mut reader).map_err(decode)?;
        if !bundle.is_consistent()
            || bundle.classes().len() != header.n_classes
            || bundle.forest().n_features() != header.n_features
        {
            return Err(decode(Box::new(bincode::ErrorKind::Custom(
                "bundle parts disagree on class count or feature width".to_string(),
            ))));
        }

        debug!(
            n_classes = header.n_classes,
            n_features = header.n_features,
            "bundle loaded"
        );
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::ErrorKind;

    fn key() -> ModelKey {
        ModelKey::default()
    }

    #[test]
    fn path_uses_key_and_extension() {
        let store = BundleStore::new("/models");
        assert_eq!(store.path(&key()), PathBuf::from("/models/maturity_model.bundle"));
    }

    #[test]
    fn missing_bundle_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let store = BundleStore::new(dir.path());
        assert!(!store.exists(&key()));
        let err = store.load(&key()).unwrap_err();
        assert!(matches!(err, ModelError::ReadBundle { .. }));
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn corrupt_bundle_is_deserialize_error() {
        let dir = TempDir::new().unwrap();
        let store = BundleStore::new(dir.path());
        fs::write(store.path(&key()), b"xy").unwrap();
        assert!(matches!(
            store.load(&key()),
            Err(ModelError::DeserializeBundle { .. })
        ));
    }

    #[test]
    fn future_version_rejected_before_body() {
        let dir = TempDir::new().unwrap();
        let store = BundleStore::new(dir.path());
        let header = BundleHeader {
            format_version: FORMAT_VERSION + 1,
            n_classes: 3,
            n_features: 17,
        };
        fs::write(store.path(&key()), bincode::serialize(&header).unwrap()).unwrap();
        match store.load(&key()) {
            Err(ModelError::IncompatibleVersion { expected, found, .. }) => {
                assert_eq!(expected, FORMAT_VERSION);
                assert_eq!(found, FORMAT_VERSION + 1);
            }
            other => panic!("expected IncompatibleVersion, got {other:?}"),
        }
    }
}
