//! Detector catalogue and factory.

use super::learned::{AutoEncoder, IsolationForest, KnnDetector, LofDetector};
use super::rules::{
    AutoregressionRule, InterQuartileRule, LevelShiftRule, PersistRule, QuantileRule,
    RuleDetector, SeasonalPeriod, SeasonalRule, ThresholdRule, VolatilityShiftRule,
};
use super::{BoxedDetector, DetectorFamily, DetectorParams, LearnedDetector};
use crate::error::AnomalyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every detector the pipeline knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Threshold,
    Quantile,
    Iqr,
    Persist,
    LevelShift,
    VolatilityShift,
    Seasonal,
    Autoregression,
    #[serde(rename = "iforest", alias = "isolation_forest")]
    IsolationForest,
    Knn,
    Lof,
    #[serde(rename = "autoencoder", alias = "auto_encoder")]
    AutoEncoder,
}

impl DetectorKind {
    pub const ALL: [DetectorKind; 12] = [
        DetectorKind::Threshold,
        DetectorKind::Quantile,
        DetectorKind::Iqr,
        DetectorKind::Persist,
        DetectorKind::LevelShift,
        DetectorKind::VolatilityShift,
        DetectorKind::Seasonal,
        DetectorKind::Autoregression,
        DetectorKind::IsolationForest,
        DetectorKind::Knn,
        DetectorKind::Lof,
        DetectorKind::AutoEncoder,
    ];

    /// Default rule-based battery.
    pub const RULE_PRESET: [DetectorKind; 5] = [
        DetectorKind::Threshold,
        DetectorKind::Iqr,
        DetectorKind::Persist,
        DetectorKind::LevelShift,
        DetectorKind::VolatilityShift,
    ];

    /// Default learned battery.
    pub const LEARNED_PRESET: [DetectorKind; 4] = [
        DetectorKind::IsolationForest,
        DetectorKind::Knn,
        DetectorKind::Lof,
        DetectorKind::AutoEncoder,
    ];

    /// Display name, also the model store file stem.
    pub fn name(&self) -> &'static str {
        match self {
            DetectorKind::Threshold => "Threshold",
            DetectorKind::Quantile => "Quantile",
            DetectorKind::Iqr => "IQR",
            DetectorKind::Persist => "Persist",
            DetectorKind::LevelShift => "LevelShift",
            DetectorKind::VolatilityShift => "VolatilityShift",
            DetectorKind::Seasonal => "Seasonal",
            DetectorKind::Autoregression => "Autoregression",
            DetectorKind::IsolationForest => "IForest",
            DetectorKind::Knn => "KNN",
            DetectorKind::Lof => "LOF",
            DetectorKind::AutoEncoder => "AutoEncoder",
        }
    }

    pub fn family(&self) -> DetectorFamily {
        match self {
            DetectorKind::IsolationForest
            | DetectorKind::Knn
            | DetectorKind::Lof
            | DetectorKind::AutoEncoder => DetectorFamily::Learned,
            _ => DetectorFamily::RuleBased,
        }
    }

    /// Build a rule-based detector, `None` for learned kinds.
    pub fn build_rule(&self, params: &DetectorParams) -> Option<RuleDetector> {
        let rules = &params.rules;
        let detector = match self {
            DetectorKind::Threshold => {
                if rules.threshold_low.is_some() || rules.threshold_high.is_some() {
                    ThresholdRule::fixed(rules.threshold_low, rules.threshold_high).into()
                } else {
                    ThresholdRule::sigma(rules.threshold_sigma.unwrap_or(params.z_threshold)).into()
                }
            }
            DetectorKind::Quantile => QuantileRule::new(rules.quantile_low, rules.quantile_high).into(),
            DetectorKind::Iqr => InterQuartileRule::new(rules.iqr_c).into(),
            DetectorKind::Persist => PersistRule {
                window: rules.persist_window,
                c: rules.persist_c,
                ..Default::default()
            }
            .into(),
            DetectorKind::LevelShift => LevelShiftRule {
                window: rules.level_shift_window,
                c: rules.level_shift_c,
                ..Default::default()
            }
            .into(),
            DetectorKind::VolatilityShift => VolatilityShiftRule {
                window: rules.volatility_window,
                c: rules.volatility_c,
                ..Default::default()
            }
            .into(),
            DetectorKind::Seasonal => {
                let period = if rules.seasonal_auto {
                    SeasonalPeriod::Auto
                } else {
                    SeasonalPeriod::Fixed(rules.seasonal_period.unwrap_or(params.period))
                };
                SeasonalRule {
                    period,
                    c: rules.seasonal_c,
                    ..Default::default()
                }
                .into()
            }
            DetectorKind::Autoregression => AutoregressionRule {
                n_steps: rules.ar_steps,
                step_size: rules.ar_step_size,
                c: rules.ar_c,
                ..Default::default()
            }
            .into(),
            _ => return None,
        };
        Some(detector)
    }

    /// Build an unfitted learned detector, `None` for rule-based kinds.
    pub fn build_learned(&self, params: &DetectorParams) -> Option<LearnedDetector> {
        let learned = &params.learned;
        let c = params.contamination;
        let detector = match self {
            DetectorKind::IsolationForest => {
                IsolationForest::new(learned.iforest_trees, learned.iforest_sample_size, c)
                    .with_seed(params.seed)
                    .into()
            }
            DetectorKind::Knn => KnnDetector::new(learned.knn_neighbors, c)
                .with_max_reference(learned.max_reference)
                .with_seed(params.seed)
                .into(),
            DetectorKind::Lof => LofDetector::new(learned.lof_neighbors, c)
                .with_max_reference(learned.max_reference)
                .with_seed(params.seed)
                .into(),
            DetectorKind::AutoEncoder => AutoEncoder::new(learned.autoencoder_hidden.clone(), c)
                .with_epochs(learned.autoencoder_epochs)
                .with_learning_rate(learned.autoencoder_learning_rate)
                .with_seed(params.seed)
                .into(),
            _ => return None,
        };
        Some(detector)
    }

    /// Build any detector behind the common trait.
    pub fn build(&self, params: &DetectorParams) -> Result<BoxedDetector, AnomalyError> {
        match (self.build_rule(params), self.build_learned(params)) {
            (Some(rule), _) => Ok(Box::new(rule)),
            (None, Some(learned)) => Ok(Box::new(learned)),
            (None, None) => Err(AnomalyError::Config(format!("detector {self} has no builder"))),
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DetectorKind {
    type Err = AnomalyError;

    /// Accepts display names and config keys, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        let kind = match key.as_str() {
            "threshold" => DetectorKind::Threshold,
            "quantile" => DetectorKind::Quantile,
            "iqr" | "interquartile" => DetectorKind::Iqr,
            "persist" => DetectorKind::Persist,
            "levelshift" => DetectorKind::LevelShift,
            "volatilityshift" => DetectorKind::VolatilityShift,
            "seasonal" => DetectorKind::Seasonal,
            "autoregression" | "ar" => DetectorKind::Autoregression,
            "iforest" | "isolationforest" => DetectorKind::IsolationForest,
            "knn" => DetectorKind::Knn,
            "lof" => DetectorKind::Lof,
            "autoencoder" | "ae" => DetectorKind::AutoEncoder,
            _ => {
                return Err(AnomalyError::Config(format!(
                    "unknown detector '{}'",
                    s.trim()
                )))
            }
        };
        Ok(kind)
    }
}
