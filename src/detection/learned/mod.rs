//! Learned detectors over a standardized feature matrix.
//!
//! Every detector follows the same calibration: after fitting, the decision
//! threshold is the `(1 - contamination)` quantile of the training scores and
//! a row is anomalous when its score is strictly above it.
//!
//! # Example
//!
//! ```
//! use meter_anomaly::detection::learned::KnnDetector;
//! use meter_anomaly::detection::{Detector, DetectorInput, LearnedDetector};
//!
//! let mut rows: Vec<Vec<f64>> = (0..50)
//!     .map(|i| vec![(i % 5) as f64 * 0.1, (i % 3) as f64 * 0.1])
//!     .collect();
//! rows.push(vec![8.0, 8.0]);
//!
//! let input = DetectorInput { timestamps: &[], values: &[], features: &rows };
//! let mut detector = LearnedDetector::from(KnnDetector::new(5, 0.02));
//! detector.fit(&input).unwrap();
//!
//! let flags = detector.predict(&input).unwrap();
//! assert!(flags[50]);
//! ```

mod autoencoder;
mod iforest;
mod knn;
mod lof;

pub use autoencoder::AutoEncoder;
pub use iforest::IsolationForest;
pub use knn::KnnDetector;
pub use lof::LofDetector;

use super::{Detector, DetectorFamily, DetectorInput, DetectorKind};
use crate::error::{AnomalyError, Result};
use crate::utils::quantile;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// A fitted (or fittable) learned detector. Serializable for the model store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LearnedDetector {
    IsolationForest(IsolationForest),
    Knn(KnnDetector),
    Lof(LofDetector),
    AutoEncoder(AutoEncoder),
}

impl LearnedDetector {
    pub fn kind(&self) -> DetectorKind {
        match self {
            LearnedDetector::IsolationForest(_) => DetectorKind::IsolationForest,
            LearnedDetector::Knn(_) => DetectorKind::Knn,
            LearnedDetector::Lof(_) => DetectorKind::Lof,
            LearnedDetector::AutoEncoder(_) => DetectorKind::AutoEncoder,
        }
    }

    /// Decision threshold, once fitted.
    pub fn threshold(&self) -> Option<f64> {
        match self {
            LearnedDetector::IsolationForest(d) => d.threshold(),
            LearnedDetector::Knn(d) => d.threshold(),
            LearnedDetector::Lof(d) => d.threshold(),
            LearnedDetector::AutoEncoder(d) => d.threshold(),
        }
    }

    /// Number of feature columns the detector was fit on.
    pub fn width(&self) -> Option<usize> {
        match self {
            LearnedDetector::IsolationForest(d) => d.width(),
            LearnedDetector::Knn(d) => d.width(),
            LearnedDetector::Lof(d) => d.width(),
            LearnedDetector::AutoEncoder(d) => d.width(),
        }
    }

    pub fn fit_rows(&mut self, rows: &[Vec<f64>]) -> Result<()> {
        match self {
            LearnedDetector::IsolationForest(d) => d.fit(rows),
            LearnedDetector::Knn(d) => d.fit(rows),
            LearnedDetector::Lof(d) => d.fit(rows),
            LearnedDetector::AutoEncoder(d) => d.fit(rows),
        }
    }

    pub fn score_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        match self {
            LearnedDetector::IsolationForest(d) => d.score(rows),
            LearnedDetector::Knn(d) => d.score(rows),
            LearnedDetector::Lof(d) => d.score(rows),
            LearnedDetector::AutoEncoder(d) => d.score(rows),
        }
    }
}

impl Detector for LearnedDetector {
    fn name(&self) -> &str {
        self.kind().name()
    }

    fn family(&self) -> DetectorFamily {
        DetectorFamily::Learned
    }

    fn fit(&mut self, input: &DetectorInput<'_>) -> Result<()> {
        self.fit_rows(input.features)
    }

    fn score(&self, input: &DetectorInput<'_>) -> Result<Vec<f64>> {
        self.score_rows(input.features)
    }

    fn predict(&self, input: &DetectorInput<'_>) -> Result<Vec<bool>> {
        let threshold = self.threshold().ok_or(AnomalyError::FitRequired)?;
        Ok(self
            .score(input)?
            .iter()
            .map(|&s| s > threshold)
            .collect())
    }

    fn is_fitted(&self) -> bool {
        self.threshold().is_some()
    }
}

impl From<IsolationForest> for LearnedDetector {
    fn from(d: IsolationForest) -> Self {
        LearnedDetector::IsolationForest(d)
    }
}

impl From<KnnDetector> for LearnedDetector {
    fn from(d: KnnDetector) -> Self {
        LearnedDetector::Knn(d)
    }
}

impl From<LofDetector> for LearnedDetector {
    fn from(d: LofDetector) -> Self {
        LearnedDetector::Lof(d)
    }
}

impl From<AutoEncoder> for LearnedDetector {
    fn from(d: AutoEncoder) -> Self {
        LearnedDetector::AutoEncoder(d)
    }
}

/// Validate a feature matrix and return its width.
pub(crate) fn matrix_width(rows: &[Vec<f64>], min_rows: usize) -> Result<usize> {
    if rows.len() < min_rows.max(1) {
        return Err(AnomalyError::InsufficientData {
            needed: min_rows.max(1),
            got: rows.len(),
        });
    }
    let width = rows[0].len();
    if let Some(row) = rows.iter().find(|r| r.len() != width) {
        return Err(AnomalyError::DimensionMismatch {
            expected: width,
            got: row.len(),
        });
    }
    Ok(width)
}

/// Check scoring rows against the fitted width.
pub(crate) fn check_width(rows: &[Vec<f64>], width: Option<usize>) -> Result<()> {
    let width = width.ok_or(AnomalyError::FitRequired)?;
    match rows.iter().find(|r| r.len() != width) {
        Some(row) => Err(AnomalyError::DimensionMismatch {
            expected: width,
            got: row.len(),
        }),
        None => Ok(()),
    }
}

/// Score above which the top `contamination` share of training rows lies.
pub(crate) fn decision_threshold(training_scores: &[f64], contamination: f64) -> f64 {
    quantile(training_scores, 1.0 - contamination)
}

pub(crate) fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Sorted indices of a seeded subsample of at most `max` out of `n` rows.
pub(crate) fn reference_indices(n: usize, max: usize, rng: &mut StdRng) -> Vec<usize> {
    if n <= max {
        return (0..n).collect();
    }
    let mut indices = rand::seq::index::sample(rng, n, max).into_vec();
    indices.sort_unstable();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn threshold_is_upper_quantile() {
        let scores: Vec<f64> = (0..101).map(|i| i as f64).collect();
        assert!((decision_threshold(&scores, 0.1) - 90.0).abs() < 1e-10);
    }

    #[test]
    fn matrix_width_rejects_ragged_rows() {
        assert!(matrix_width(&[vec![1.0, 2.0], vec![1.0]], 1).is_err());
        assert!(matches!(
            matrix_width(&[], 1),
            Err(AnomalyError::InsufficientData { needed: 1, got: 0 })
        ));
        assert_eq!(matrix_width(&[vec![1.0, 2.0]], 1).unwrap(), 2);
    }

    #[test]
    fn reference_subsample_is_seeded() {
        let a = reference_indices(1000, 50, &mut StdRng::seed_from_u64(7));
        let b = reference_indices(1000, 50, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert_eq!(a.len(), 50);
        assert!(a.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(reference_indices(10, 50, &mut StdRng::seed_from_u64(7)).len(), 10);
    }

    #[test]
    fn unfitted_detector_refuses_to_predict() {
        let detector = LearnedDetector::from(KnnDetector::new(5, 0.1));
        let rows = vec![vec![0.0]];
        let input = DetectorInput {
            timestamps: &[],
            values: &[],
            features: &rows,
        };
        assert!(!detector.is_fitted());
        assert_eq!(detector.predict(&input), Err(AnomalyError::FitRequired));
    }

    #[test]
    fn serde_tags_by_kind() {
        let detector = LearnedDetector::from(KnnDetector::new(3, 0.05));
        let json = serde_json::to_string(&detector).unwrap();
        assert!(json.contains("\"kind\":\"knn\""));
        let back: LearnedDetector = serde_json::from_str(&json).unwrap();
        assert_eq!(back, detector);
    }
}
