//! Persisted learned models.
//!
//! Blobs live at `<root>/<dataset>/<value_type>/<DetectorName>.blob` as JSON.
//! Writes go to a sibling temporary file first and are renamed into place, so
//! a reader never sees a half-written blob.

use crate::core::{Dialect, ValueType};
use crate::detection::{Detector, DetectorKind, LearnedDetector};
use crate::error::{AnomalyError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory-backed store of fitted learned detectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the blob for `kind`.
    pub fn blob_path(&self, dataset: Dialect, value_type: ValueType, kind: DetectorKind) -> PathBuf {
        self.root
            .join(dataset.name())
            .join(value_type.name())
            .join(format!("{}.blob", kind.name()))
    }

    /// Persist a fitted detector and return where it was written.
    pub fn save(
        &self,
        dataset: Dialect,
        value_type: ValueType,
        detector: &LearnedDetector,
    ) -> Result<PathBuf> {
        if !detector.is_fitted() {
            return Err(AnomalyError::FitRequired);
        }
        let path = self.blob_path(dataset, value_type, detector.kind());
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let blob = serde_json::to_vec(detector).map_err(|e| AnomalyError::Io(e.to_string()))?;
        let tmp = path.with_extension("blob.tmp");
        fs::write(&tmp, blob)?;
        fs::rename(&tmp, &path)?;

        info!(detector = detector.kind().name(), path = %path.display(), "saved model");
        Ok(path)
    }

    /// Load the fitted detector for `kind`.
    ///
    /// Missing, unreadable, corrupt or mismatched blobs are `ModelLoad` errors.
    pub fn load(
        &self,
        dataset: Dialect,
        value_type: ValueType,
        kind: DetectorKind,
    ) -> Result<LearnedDetector> {
        let path = self.blob_path(dataset, value_type, kind);
        let model_load = |reason: String| AnomalyError::ModelLoad {
            name: kind.name().to_string(),
            reason,
        };

        let bytes = fs::read(&path).map_err(|e| model_load(format!("{}: {}", path.display(), e)))?;
        let detector: LearnedDetector =
            serde_json::from_slice(&bytes).map_err(|e| model_load(format!("corrupt blob: {e}")))?;

        if detector.kind() != kind {
            return Err(model_load(format!(
                "blob holds a {} model",
                detector.kind().name()
            )));
        }
        if !detector.is_fitted() {
            return Err(model_load("blob holds an unfitted model".to_string()));
        }

        debug!(detector = kind.name(), path = %path.display(), "loaded model");
        Ok(detector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::learned::KnnDetector;
    use crate::detection::DetectorInput;

    fn fitted_knn() -> LearnedDetector {
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let mut detector = LearnedDetector::from(KnnDetector::new(3, 0.1));
        detector
            .fit(&DetectorInput {
                timestamps: &[],
                values: &[],
                features: &rows,
            })
            .unwrap();
        detector
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let detector = fitted_knn();

        let path = store
            .save(Dialect::Queensland, ValueType::Daily, &detector)
            .unwrap();
        assert!(path.ends_with("queensland/daily/KNN.blob"));
        assert!(!path.with_extension("blob.tmp").exists());

        let loaded = store
            .load(Dialect::Queensland, ValueType::Daily, DetectorKind::Knn)
            .unwrap();
        assert_eq!(loaded, detector);
    }

    #[test]
    fn missing_blob_is_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let err = store
            .load(Dialect::Helios, ValueType::Daily, DetectorKind::Lof)
            .unwrap_err();
        assert!(matches!(err, AnomalyError::ModelLoad { ref name, .. } if name == "LOF"));
    }

    #[test]
    fn corrupt_blob_is_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let path = store.blob_path(Dialect::Helios, ValueType::Total, DetectorKind::IsolationForest);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"{not json").unwrap();

        let err = store
            .load(Dialect::Helios, ValueType::Total, DetectorKind::IsolationForest)
            .unwrap_err();
        assert!(matches!(err, AnomalyError::ModelLoad { .. }));
    }

    #[test]
    fn blob_of_other_kind_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let saved = store
            .save(Dialect::Datamill, ValueType::Daily, &fitted_knn())
            .unwrap();
        let lof_path = store.blob_path(Dialect::Datamill, ValueType::Daily, DetectorKind::Lof);
        fs::copy(saved, &lof_path).unwrap();

        assert!(store
            .load(Dialect::Datamill, ValueType::Daily, DetectorKind::Lof)
            .is_err());
    }

    #[test]
    fn unfitted_models_are_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let detector = LearnedDetector::from(KnnDetector::new(3, 0.1));
        assert_eq!(
            store.save(Dialect::Helios, ValueType::Daily, &detector),
            Err(AnomalyError::FitRequired)
        );
    }
}
