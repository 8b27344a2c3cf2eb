//! Folder-level scoring and training.
//!
//! A run walks every `.csv` file of a folder in name order. Schema, parse and
//! read failures skip the file; any other error stops the run. Configuration
//! errors stop it before the first file is opened.
//!
//! # Example
//!
//! ```no_run
//! use meter_anomaly::batch::BatchRunner;
//! use meter_anomaly::config::PipelineConfig;
//! use meter_anomaly::core::Dialect;
//!
//! let runner = BatchRunner::new(PipelineConfig::for_dataset(Dialect::Queensland)).unwrap();
//! let report = runner.run("data/queensland").unwrap();
//! for file in &report.files {
//!     println!("{}: {} anomalies", file.file_id, file.consensus_count);
//! }
//! ```

use crate::config::PipelineConfig;
use crate::consensus::{ConsensusAggregator, ConsensusResult};
use crate::core::Series;
use crate::detection::{DetectorEnsemble, DetectorFamily, DetectorInput, DetectorKind, DetectorRun};
use crate::error::{AnomalyError, Result};
use crate::features::{FeatureBuilder, FeatureColumn, FeatureFrame};
use crate::loader::SeriesLoader;
use crate::report::{write_flags_csv, BatchReport, FileFailure, FileReport};
use crate::store::ModelStore;
use crate::transform::standardize_columns;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Everything computed for one series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesScore {
    pub series_id: String,
    pub frame: FeatureFrame,
    pub runs: Vec<DetectorRun>,
    pub consensus: ConsensusResult,
}

/// Outcome of [`BatchRunner::train`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrainingSummary {
    pub files_used: usize,
    pub rows: usize,
    pub saved: Vec<(DetectorKind, PathBuf)>,
    /// Detectors that failed to fit or save.
    pub failed: Vec<(DetectorKind, AnomalyError)>,
    pub skipped_files: Vec<FileFailure>,
}

/// Drives loader, features, detectors and consensus over a folder.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    config: PipelineConfig,
    loader: SeriesLoader,
    features: FeatureBuilder,
    columns: Vec<FeatureColumn>,
    aggregator: ConsensusAggregator,
    store: Option<ModelStore>,
}

impl BatchRunner {
    /// Validates the configuration. Fails with `Config` before any I/O.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let features = FeatureBuilder::new(config.effective_window())?;
        Ok(Self {
            loader: config.loader(),
            columns: config.feature_columns(),
            aggregator: config.aggregator(),
            store: config.model_store.clone().map(ModelStore::new),
            features,
            config,
        })
    }

    /// Score learned detectors with models from `store` instead of fitting per file.
    pub fn with_model_store(mut self, store: ModelStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn model_store(&self) -> Option<&ModelStore> {
        self.store.as_ref()
    }

    /// Input files of `folder`, sorted by name.
    pub fn list_inputs<P: AsRef<Path>>(folder: P) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(folder.as_ref())? {
            let path = entry?.path();
            let is_csv = path
                .extension()
                .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
            if path.is_file() && is_csv {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Assemble the detectors for a run.
    ///
    /// With a model store, learned detectors are loaded read-only; any that
    /// cannot be loaded is left out and reported in `diagnostics`.
    pub fn build_ensemble(&self, diagnostics: &mut Vec<AnomalyError>) -> Result<DetectorEnsemble> {
        let params = self.config.detector_params();
        let mut ensemble = DetectorEnsemble::new();

        for kind in self.config.detector_kinds() {
            match (&self.store, kind.family()) {
                (Some(store), DetectorFamily::Learned) => {
                    match store.load(self.config.dataset, self.config.value_type, kind) {
                        Ok(model) => ensemble.push_pretrained(Box::new(model)),
                        Err(err) => {
                            warn!(detector = kind.name(), error = %err, "excluding detector");
                            diagnostics.push(err);
                        }
                    }
                }
                _ => ensemble.push(kind.build(&params)?),
            }
        }
        Ok(ensemble)
    }

    /// Apply differencing if configured.
    pub fn prepare(&self, series: Series) -> Series {
        if self.config.difference {
            series.differenced()
        } else {
            series
        }
    }

    /// Features, detectors and consensus for one series.
    pub fn score_series(&self, series: &Series, ensemble: &mut DetectorEnsemble) -> Result<SeriesScore> {
        let frame = self.features.build(series);
        let (scaled, _) = standardize_columns(&frame.matrix(&self.columns))?;

        let input = DetectorInput {
            timestamps: frame.timestamps(),
            values: frame.values(),
            features: &scaled,
        };
        let runs = ensemble.run(&input);
        let consensus = self.aggregator.combine(&runs, frame.z_scores())?;

        Ok(SeriesScore {
            series_id: series.id().to_string(),
            frame,
            runs,
            consensus,
        })
    }

    /// Load and score one file.
    pub fn score_file(&self, path: &Path, ensemble: &mut DetectorEnsemble) -> Result<SeriesScore> {
        let series = self.prepare(self.loader.load_path(path)?);
        if series.duplicate_timestamps() > 0 {
            debug!(series = series.id(), duplicates = series.duplicate_timestamps(), "duplicate timestamps kept");
        }
        self.score_series(&series, ensemble)
    }

    /// Score every input file of `folder`.
    pub fn run<P: AsRef<Path>>(&self, folder: P) -> Result<BatchReport> {
        let folder = folder.as_ref();
        let files = Self::list_inputs(folder)?;
        info!(folder = %folder.display(), files = files.len(), "scoring folder");
        self.run_files(&files)
    }

    /// Score an explicit list of files.
    pub fn run_files(&self, files: &[PathBuf]) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        let mut ensemble = self.build_ensemble(&mut report.model_diagnostics)?;

        for path in files {
            match self.score_file(path, &mut ensemble) {
                Ok(score) => {
                    let file_report =
                        FileReport::from_consensus(&score.series_id, score.frame.len(), &score.consensus);
                    info!(
                        file = %score.series_id,
                        rows = file_report.total_rows,
                        consensus = file_report.consensus_count,
                        "scored file"
                    );
                    self.export(&score);
                    report.files.push(file_report);
                }
                Err(err) if err.is_file_recoverable() => {
                    warn!(file = %path.display(), error = %err, "skipping file");
                    report.failures.push(FileFailure {
                        path: path.clone(),
                        error: err,
                    });
                }
                Err(err) => return Err(err),
            }
        }
        Ok(report)
    }

    fn export(&self, score: &SeriesScore) {
        let Some(dir) = &self.config.export_dir else {
            return;
        };
        let path = dir.join(format!("{}_flags.csv", score.series_id));
        let written = fs::create_dir_all(dir)
            .map_err(AnomalyError::from)
            .and_then(|_| write_flags_csv(&path, &score.frame, &score.consensus));
        if let Err(err) = written {
            warn!(path = %path.display(), error = %err, "could not export flags");
        }
    }

    /// Fit learned detectors on every file of `folder` and save them to the store.
    ///
    /// Each file is standardized on its own before the matrices are stacked.
    pub fn train<P: AsRef<Path>>(&self, folder: P) -> Result<TrainingSummary> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| AnomalyError::Config("training needs a model store".to_string()))?;
        let folder = folder.as_ref();
        let files = Self::list_inputs(folder)?;
        info!(folder = %folder.display(), files = files.len(), "training on folder");

        let mut summary = TrainingSummary::default();
        let mut combined: Vec<Vec<f64>> = Vec::new();
        for path in &files {
            let matrix = self
                .loader
                .load_path(path)
                .map(|series| self.prepare(series))
                .and_then(|series| {
                    let frame = self.features.build(&series);
                    standardize_columns(&frame.matrix(&self.columns)).map(|(scaled, _)| scaled)
                });
            match matrix {
                Ok(rows) => {
                    debug!(file = %path.display(), rows = rows.len(), "added training rows");
                    summary.files_used += 1;
                    combined.extend(rows);
                }
                Err(err) if err.is_file_recoverable() => {
                    warn!(file = %path.display(), error = %err, "skipping file");
                    summary.skipped_files.push(FileFailure {
                        path: path.clone(),
                        error: err,
                    });
                }
                Err(err) => return Err(err),
            }
        }

        if combined.is_empty() {
            return Err(AnomalyError::InsufficientData { needed: 1, got: 0 });
        }
        summary.rows = combined.len();
        info!(rows = summary.rows, "combined feature matrix");

        let params = self.config.detector_params();
        for kind in self.learned_kinds() {
            let Some(mut detector) = kind.build_learned(&params) else {
                continue;
            };
            let saved = detector
                .fit_rows(&combined)
                .and_then(|_| store.save(self.config.dataset, self.config.value_type, &detector));
            match saved {
                Ok(path) => summary.saved.push((kind, path)),
                Err(err) => {
                    warn!(detector = kind.name(), error = %err, "training failed");
                    summary.failed.push((kind, err));
                }
            }
        }
        Ok(summary)
    }

    /// Learned detectors to train: the configured ones, or the learned preset.
    fn learned_kinds(&self) -> Vec<DetectorKind> {
        let configured: Vec<DetectorKind> = self
            .config
            .detector_kinds()
            .into_iter()
            .filter(|k| k.family() == DetectorFamily::Learned)
            .collect();
        if configured.is_empty() {
            DetectorKind::LEARNED_PRESET.to_vec()
        } else {
            configured
        }
    }
}
