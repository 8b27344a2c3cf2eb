//! Tunable parameters for the detector batteries.

use serde::{Deserialize, Serialize};

/// Rule-based detector parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleParams {
    /// Sigma multiplier for the threshold rule. `None` uses the z threshold.
    pub threshold_sigma: Option<f64>,
    /// Fixed lower bound in measurement units. Either fixed bound replaces the sigma band.
    pub threshold_low: Option<f64>,
    pub threshold_high: Option<f64>,
    pub quantile_low: Option<f64>,
    pub quantile_high: Option<f64>,
    pub iqr_c: f64,
    pub persist_window: usize,
    pub persist_c: f64,
    pub level_shift_window: usize,
    pub level_shift_c: f64,
    pub volatility_window: usize,
    pub volatility_c: f64,
    /// Seasonal period in rows. `None` uses the dialect default.
    pub seasonal_period: Option<usize>,
    /// Search for the period with the autocorrelation peak finder.
    pub seasonal_auto: bool,
    pub seasonal_c: f64,
    pub ar_steps: usize,
    pub ar_step_size: usize,
    pub ar_c: f64,
}

impl Default for RuleParams {
    fn default() -> Self {
        Self {
            threshold_sigma: None,
            threshold_low: None,
            threshold_high: None,
            quantile_low: Some(0.01),
            quantile_high: Some(0.99),
            iqr_c: 1.5,
            persist_window: 1,
            persist_c: 3.0,
            level_shift_window: 5,
            level_shift_c: 2.0,
            volatility_window: 30,
            volatility_c: 1.5,
            seasonal_period: None,
            seasonal_auto: false,
            seasonal_c: 3.0,
            ar_steps: 1,
            ar_step_size: 1,
            ar_c: 3.0,
        }
    }
}

/// Learned detector parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnedParams {
    pub iforest_trees: usize,
    pub iforest_sample_size: usize,
    pub knn_neighbors: usize,
    pub lof_neighbors: usize,
    /// Reference rows kept by the neighbour-based detectors.
    pub max_reference: usize,
    pub autoencoder_hidden: Vec<usize>,
    pub autoencoder_epochs: usize,
    pub autoencoder_learning_rate: f64,
}

impl Default for LearnedParams {
    fn default() -> Self {
        Self {
            iforest_trees: 100,
            iforest_sample_size: 256,
            knn_neighbors: 5,
            lof_neighbors: 20,
            max_reference: 2000,
            autoencoder_hidden: vec![25, 2, 25],
            autoencoder_epochs: 10,
            autoencoder_learning_rate: 0.01,
        }
    }
}

/// Resolved parameters handed to [`DetectorKind::build`](super::DetectorKind::build).
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorParams {
    pub rules: RuleParams,
    pub learned: LearnedParams,
    /// Effective z threshold (also the default sigma multiplier).
    pub z_threshold: f64,
    /// Default seasonal period for the dataset.
    pub period: usize,
    pub contamination: f64,
    pub seed: u64,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            rules: RuleParams::default(),
            learned: LearnedParams::default(),
            z_threshold: 3.0,
            period: 24,
            contamination: 0.01,
            seed: 42,
        }
    }
}
