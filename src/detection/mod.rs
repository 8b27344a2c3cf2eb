//! Anomaly detectors and the ensemble that runs them.
//!
//! Two families share one [`Detector`] contract:
//! - rule-based detectors ([`RuleDetector`]) are stateless and read global
//!   statistics of the raw value column on every call;
//! - learned detectors ([`LearnedDetector`]) are fit on a standardized feature
//!   matrix and can be persisted and reloaded.

mod ensemble;
mod kind;
pub mod learned;
mod params;
pub mod rules;

pub use ensemble::{DetectorEnsemble, DetectorOutcome, DetectorRun};
pub use kind::DetectorKind;
pub use learned::LearnedDetector;
pub use params::{DetectorParams, LearnedParams, RuleParams};
pub use rules::{RuleDetector, Side};

use crate::error::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Detector family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorFamily {
    RuleBased,
    Learned,
}

/// Everything a detector may look at for one series.
#[derive(Debug, Clone, Copy)]
pub struct DetectorInput<'a> {
    /// Reading timestamps, ascending.
    pub timestamps: &'a [NaiveDateTime],
    /// Raw measurement values.
    pub values: &'a [f64],
    /// Standardized feature matrix, one row per reading.
    pub features: &'a [Vec<f64>],
}

impl<'a> DetectorInput<'a> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Per-row output of one detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorResult {
    /// Boolean mask indicating anomalies.
    pub flags: Vec<bool>,
    /// Anomaly scores for each row (higher = more anomalous).
    pub scores: Vec<f64>,
}

impl DetectorResult {
    pub fn new(flags: Vec<bool>, scores: Vec<f64>) -> Self {
        Self { flags, scores }
    }

    /// All rows normal.
    pub fn quiet(len: usize) -> Self {
        Self {
            flags: vec![false; len],
            scores: vec![0.0; len],
        }
    }

    /// Indices of detected anomalies.
    pub fn anomaly_indices(&self) -> Vec<usize> {
        self.flags
            .iter()
            .enumerate()
            .filter_map(|(i, &flag)| flag.then_some(i))
            .collect()
    }

    /// Count of detected anomalies.
    pub fn anomaly_count(&self) -> usize {
        self.flags.iter().filter(|&&x| x).count()
    }
}

/// Common interface for all detectors.
///
/// This trait is object-safe and can be used with `Box<dyn Detector>`.
pub trait Detector {
    /// Display name, also used as the model store key.
    fn name(&self) -> &str;

    fn family(&self) -> DetectorFamily;

    /// Fit on a reference batch. A no-op for rule-based detectors.
    fn fit(&mut self, input: &DetectorInput<'_>) -> Result<()>;

    /// Outlier score per row.
    fn score(&self, input: &DetectorInput<'_>) -> Result<Vec<f64>>;

    /// Anomaly flag per row.
    fn predict(&self, input: &DetectorInput<'_>) -> Result<Vec<bool>>;

    fn is_fitted(&self) -> bool;

    /// Scores and flags together.
    fn detect(&self, input: &DetectorInput<'_>) -> Result<DetectorResult> {
        Ok(DetectorResult::new(self.predict(input)?, self.score(input)?))
    }
}

/// Type alias for boxed detector trait objects.
pub type BoxedDetector = Box<dyn Detector>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_counts_and_indices() {
        let result = DetectorResult::new(vec![false, true, false, true], vec![0.0; 4]);
        assert_eq!(result.anomaly_count(), 2);
        assert_eq!(result.anomaly_indices(), vec![1, 3]);
        assert_eq!(DetectorResult::quiet(3).anomaly_count(), 0);
    }
}
