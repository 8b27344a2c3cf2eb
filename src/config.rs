//! Pipeline configuration.
//!
//! Loaded from TOML; every field has a default so a config file only needs
//! the keys it changes.
//!
//! ```toml
//! dataset = "queensland"
//! value_type = "daily"
//! contamination = 0.05
//! combination = "any_flag"
//! validate = true
//! strategy = "learned"
//!
//! [rules]
//! iqr_c = 2.0
//! ```

use crate::consensus::{CombinationRule, ConsensusAggregator, UnavailablePolicy};
use crate::core::{Dialect, ValueType};
use crate::detection::{DetectorKind, DetectorParams, LearnedParams, RuleParams};
use crate::error::{AnomalyError, Result};
use crate::features::FeatureColumn;
use crate::loader::SeriesLoader;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Which detector battery runs when no explicit list is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    RuleBased,
    Learned,
}

impl Strategy {
    pub fn preset(&self) -> &'static [DetectorKind] {
        match self {
            Strategy::RuleBased => &DetectorKind::RULE_PRESET,
            Strategy::Learned => &DetectorKind::LEARNED_PRESET,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::RuleBased => f.write_str("rule_based"),
            Strategy::Learned => f.write_str("learned"),
        }
    }
}

impl FromStr for Strategy {
    type Err = AnomalyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "rule_based" | "rules" | "rule" => Ok(Strategy::RuleBased),
            "learned" | "ml" => Ok(Strategy::Learned),
            other => Err(AnomalyError::Config(format!("unknown strategy '{other}'"))),
        }
    }
}

/// Everything that shapes a scoring or training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub dataset: Dialect,
    pub value_type: ValueType,
    /// Expected anomaly fraction for learned detectors.
    pub contamination: f64,
    /// Validation gate and default sigma multiplier. `None` uses the dialect default.
    pub z_score_threshold: Option<f64>,
    /// Rolling window in rows. `None` uses the dialect default.
    pub window_size: Option<usize>,
    pub combination: CombinationRule,
    /// Gate learned detectors with the z-score.
    pub validate: bool,
    pub strategy: Strategy,
    /// Explicit detector list overriding the strategy preset.
    pub detectors: Option<Vec<DetectorKind>>,
    pub seed: u64,
    /// Score the first difference of the selected column.
    pub difference: bool,
    pub unavailable: UnavailablePolicy,
    /// Root of the persisted model store.
    pub model_store: Option<PathBuf>,
    /// Directory for per-file flag tables.
    pub export_dir: Option<PathBuf>,
    pub rules: RuleParams,
    pub learned: LearnedParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset: Dialect::default(),
            value_type: ValueType::default(),
            contamination: 0.01,
            z_score_threshold: None,
            window_size: None,
            combination: CombinationRule::AllAgree,
            validate: false,
            strategy: Strategy::RuleBased,
            detectors: None,
            seed: 42,
            difference: false,
            unavailable: UnavailablePolicy::NoAnomaly,
            model_store: None,
            export_dir: None,
            rules: RuleParams::default(),
            learned: LearnedParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults for a dataset.
    pub fn for_dataset(dataset: Dialect) -> Self {
        Self {
            dataset,
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AnomalyError::Config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AnomalyError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AnomalyError::Config(e.to_string()))
    }

    /// Reject settings that would make every file fail.
    pub fn validate(&self) -> Result<()> {
        if self.window_size == Some(0) {
            return Err(AnomalyError::Config("window_size must be at least 1".into()));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(AnomalyError::Config(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        if let Some(z) = self.z_score_threshold {
            if !z.is_finite() || z < 0.0 {
                return Err(AnomalyError::Config(format!(
                    "z_score_threshold must be a finite non-negative number, got {z}"
                )));
            }
        }
        if matches!(&self.detectors, Some(list) if list.is_empty()) {
            return Err(AnomalyError::Config("detector list is empty".into()));
        }
        self.validate_rules()?;
        self.validate_learned()
    }

    fn validate_rules(&self) -> Result<()> {
        let rules = &self.rules;
        let windows = [
            ("persist_window", rules.persist_window, 1),
            ("level_shift_window", rules.level_shift_window, 1),
            ("volatility_window", rules.volatility_window, 2),
            ("ar_steps", rules.ar_steps, 1),
            ("ar_step_size", rules.ar_step_size, 1),
        ];
        for (name, value, min) in windows {
            if value < min {
                return Err(AnomalyError::Config(format!("rules.{name} must be at least {min}")));
            }
        }
        if rules.seasonal_period.is_some_and(|p| p < 2) {
            return Err(AnomalyError::Config("rules.seasonal_period must be at least 2".into()));
        }
        for (name, q) in [("quantile_low", rules.quantile_low), ("quantile_high", rules.quantile_high)] {
            if q.is_some_and(|q| !(0.0..=1.0).contains(&q)) {
                return Err(AnomalyError::Config(format!("rules.{name} must be in [0, 1]")));
            }
        }
        if let (Some(low), Some(high)) = (rules.quantile_low, rules.quantile_high) {
            if low > high {
                return Err(AnomalyError::Config(format!(
                    "rules.quantile_low ({low}) exceeds rules.quantile_high ({high})"
                )));
            }
        }
        if rules.threshold_sigma.is_some_and(|k| !k.is_finite() || k < 0.0) {
            return Err(AnomalyError::Config(
                "rules.threshold_sigma must be finite and non-negative".into(),
            ));
        }
        if rules.threshold_low.is_some_and(f64::is_nan) || rules.threshold_high.is_some_and(f64::is_nan) {
            return Err(AnomalyError::Config("rules.threshold bounds must be numbers".into()));
        }
        if let (Some(low), Some(high)) = (rules.threshold_low, rules.threshold_high) {
            if low > high {
                return Err(AnomalyError::Config(format!(
                    "rules.threshold_low ({low}) exceeds rules.threshold_high ({high})"
                )));
            }
        }
        let multipliers = [
            rules.iqr_c,
            rules.persist_c,
            rules.level_shift_c,
            rules.volatility_c,
            rules.seasonal_c,
            rules.ar_c,
        ];
        if multipliers.iter().any(|c| !c.is_finite() || *c < 0.0) {
            return Err(AnomalyError::Config("rule multipliers must be finite and non-negative".into()));
        }
        Ok(())
    }

    fn validate_learned(&self) -> Result<()> {
        let learned = &self.learned;
        if learned.iforest_trees == 0 || learned.iforest_sample_size < 2 {
            return Err(AnomalyError::Config(
                "learned.iforest_trees must be positive and iforest_sample_size at least 2".into(),
            ));
        }
        if learned.knn_neighbors == 0 || learned.lof_neighbors == 0 {
            return Err(AnomalyError::Config("neighbour counts must be positive".into()));
        }
        if learned.max_reference < 2 {
            return Err(AnomalyError::Config("learned.max_reference must be at least 2".into()));
        }
        if !(learned.autoencoder_learning_rate > 0.0 && learned.autoencoder_learning_rate.is_finite()) {
            return Err(AnomalyError::Config("learned.autoencoder_learning_rate must be positive".into()));
        }
        Ok(())
    }

    pub fn effective_window(&self) -> usize {
        self.window_size.unwrap_or_else(|| self.dataset.default_window())
    }

    pub fn effective_z_threshold(&self) -> f64 {
        self.z_score_threshold
            .unwrap_or_else(|| self.dataset.default_z_threshold())
    }

    /// Detectors to run, in order.
    pub fn detector_kinds(&self) -> Vec<DetectorKind> {
        match &self.detectors {
            Some(list) => list.clone(),
            None => self.strategy.preset().to_vec(),
        }
    }

    pub fn detector_params(&self) -> DetectorParams {
        DetectorParams {
            rules: self.rules.clone(),
            learned: self.learned.clone(),
            z_threshold: self.effective_z_threshold(),
            period: self.dataset.default_period(),
            contamination: self.contamination,
            seed: self.seed,
        }
    }

    pub fn feature_columns(&self) -> Vec<FeatureColumn> {
        FeatureColumn::defaults_for(self.dataset)
    }

    pub fn loader(&self) -> SeriesLoader {
        SeriesLoader::new(self.dataset, self.value_type)
    }

    pub fn aggregator(&self) -> ConsensusAggregator {
        let aggregator =
            ConsensusAggregator::new(self.combination).with_unavailable_policy(self.unavailable);
        if self.validate {
            aggregator.with_validation(self.effective_z_threshold())
        } else {
            aggregator
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_follow_dataset() {
        let helios = PipelineConfig::for_dataset(Dialect::Helios);
        assert_eq!(helios.effective_window(), 24);
        assert_eq!(helios.effective_z_threshold(), 3.0);

        let datamill = PipelineConfig::for_dataset(Dialect::Datamill);
        assert_eq!(datamill.effective_window(), 7);
        assert_eq!(datamill.effective_z_threshold(), 1.0);
        assert_eq!(datamill.detector_kinds(), DetectorKind::RULE_PRESET.to_vec());
    }

    #[test]
    fn parse_toml() {
        let config = PipelineConfig::from_toml_str(
            r#"
            dataset = "queensland"
            value_type = "total"
            contamination = 0.1
            window_size = 12
            combination = "any_flag"
            validate = true
            strategy = "learned"
            detectors = ["iforest", "knn"]

            [rules]
            iqr_c = 2.5
            "#,
        )
        .unwrap();

        assert_eq!(config.dataset, Dialect::Queensland);
        assert_eq!(config.value_type, ValueType::Total);
        assert_eq!(config.effective_window(), 12);
        assert_eq!(config.combination, CombinationRule::AnyFlag);
        assert_eq!(
            config.detector_kinds(),
            vec![DetectorKind::IsolationForest, DetectorKind::Knn]
        );
        assert_eq!(config.rules.iqr_c, 2.5);
        assert_eq!(config.rules.persist_c, 3.0);
        assert_eq!(config.aggregator().z_gate(), Some(1.0));
        config.validate().unwrap();
    }

    #[test]
    fn unknown_detector_is_rejected_at_parse_time() {
        let result = PipelineConfig::from_toml_str(r#"detectors = ["prophet"]"#);
        assert!(matches!(result, Err(AnomalyError::Config(_))));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let cases = [
            PipelineConfig {
                window_size: Some(0),
                ..Default::default()
            },
            PipelineConfig {
                contamination: 0.0,
                ..Default::default()
            },
            PipelineConfig {
                contamination: 0.7,
                ..Default::default()
            },
            PipelineConfig {
                z_score_threshold: Some(f64::NAN),
                ..Default::default()
            },
            PipelineConfig {
                z_score_threshold: Some(-1.0),
                ..Default::default()
            },
            PipelineConfig {
                detectors: Some(Vec::new()),
                ..Default::default()
            },
            PipelineConfig {
                rules: RuleParams {
                    threshold_sigma: Some(-1.0),
                    ..Default::default()
                },
                ..Default::default()
            },
            PipelineConfig {
                rules: RuleParams {
                    quantile_low: Some(0.9),
                    quantile_high: Some(0.1),
                    ..Default::default()
                },
                ..Default::default()
            },
            PipelineConfig {
                rules: RuleParams {
                    threshold_low: Some(50.0),
                    threshold_high: Some(10.0),
                    ..Default::default()
                },
                ..Default::default()
            },
        ];
        for config in cases {
            assert!(matches!(config.validate(), Err(AnomalyError::Config(_))), "{config:?}");
        }
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn toml_round_trip_through_file() {
        let config = PipelineConfig {
            dataset: Dialect::Datamill,
            z_score_threshold: Some(2.0),
            ..Default::default()
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml_string().unwrap().as_bytes())
            .unwrap();

        let loaded = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        assert!(matches!(
            PipelineConfig::from_file("/definitely/not/here.toml"),
            Err(AnomalyError::Config(_))
        ));
    }
}
