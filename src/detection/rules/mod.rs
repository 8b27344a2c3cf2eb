//! Rule-based detectors.
//!
//! Each rule turns the raw value column into an intermediate signal and flags
//! rows where that signal leaves a pair of fences. Rows whose signal is
//! undefined (`NaN`) are never flagged. Scores are the distance beyond the
//! violated fence, so `score > 0` exactly when a row is flagged.
//!
//! # Example
//!
//! ```
//! use meter_anomaly::detection::rules::{InterQuartileRule, RuleDetector};
//! use meter_anomaly::detection::{Detector, DetectorInput};
//!
//! let values = vec![10.0, 11.0, 10.5, 10.8, 90.0, 10.2, 10.9];
//! let input = DetectorInput { timestamps: &[], values: &values, features: &[] };
//!
//! let rule = RuleDetector::from(InterQuartileRule::default());
//! let flags = rule.predict(&input).unwrap();
//! assert!(flags[4]);
//! ```

mod autoregression;
mod iqr;
mod level_shift;
mod persist;
mod seasonal;
mod threshold;
mod volatility_shift;

pub use autoregression::AutoregressionRule;
pub use iqr::InterQuartileRule;
pub use level_shift::LevelShiftRule;
pub use persist::PersistRule;
pub use seasonal::{detect_period, SeasonalPeriod, SeasonalRule};
pub use threshold::{QuantileRule, ThresholdBounds, ThresholdRule};
pub use volatility_shift::VolatilityShiftRule;

use super::{Detector, DetectorFamily, DetectorInput, DetectorResult};
use crate::error::Result;
use crate::utils::iqr_bounds;
use serde::{Deserialize, Serialize};

/// Which side of the fences counts as anomalous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Only values above the upper fence.
    Positive,
    /// Only values below the lower fence.
    Negative,
    #[default]
    Both,
}

/// Lower and upper bounds for a signal. A missing bound never triggers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fences {
    pub low: Option<f64>,
    pub high: Option<f64>,
}

impl Fences {
    pub fn new(low: Option<f64>, high: Option<f64>) -> Self {
        Self { low, high }
    }

    /// Tukey fences over the defined part of `signal`, restricted to `side`.
    pub fn inter_quartile(signal: &[f64], c: f64, side: Side) -> Self {
        match iqr_bounds(signal, c) {
            Some((low, high)) => Self::new(Some(low), Some(high)).restrict(side),
            None => Self::new(None, None),
        }
    }

    fn restrict(self, side: Side) -> Self {
        match side {
            Side::Positive => Self::new(None, self.high),
            Side::Negative => Self::new(self.low, None),
            Side::Both => self,
        }
    }

    /// Distance beyond the violated fence, `0.0` inside or where undefined.
    pub fn scores(&self, signal: &[f64]) -> Vec<f64> {
        signal
            .iter()
            .map(|&x| {
                if !x.is_finite() {
                    return 0.0;
                }
                match (self.low, self.high) {
                    (_, Some(high)) if x > high => x - high,
                    (Some(low), _) if x < low => low - x,
                    _ => 0.0,
                }
            })
            .collect()
    }
}

/// A stateless rule-based detector.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleDetector {
    Threshold(ThresholdRule),
    Quantile(QuantileRule),
    InterQuartile(InterQuartileRule),
    Persist(PersistRule),
    LevelShift(LevelShiftRule),
    VolatilityShift(VolatilityShiftRule),
    Seasonal(SeasonalRule),
    Autoregression(AutoregressionRule),
}

impl RuleDetector {
    /// Per-row scores on the raw values.
    pub fn evaluate(&self, values: &[f64]) -> Result<Vec<f64>> {
        match self {
            RuleDetector::Threshold(rule) => rule.scores(values),
            RuleDetector::Quantile(rule) => rule.scores(values),
            RuleDetector::InterQuartile(rule) => rule.scores(values),
            RuleDetector::Persist(rule) => rule.scores(values),
            RuleDetector::LevelShift(rule) => rule.scores(values),
            RuleDetector::VolatilityShift(rule) => rule.scores(values),
            RuleDetector::Seasonal(rule) => rule.scores(values),
            RuleDetector::Autoregression(rule) => rule.scores(values),
        }
    }
}

impl Detector for RuleDetector {
    fn name(&self) -> &str {
        match self {
            RuleDetector::Threshold(_) => "Threshold",
            RuleDetector::Quantile(_) => "Quantile",
            RuleDetector::InterQuartile(_) => "IQR",
            RuleDetector::Persist(_) => "Persist",
            RuleDetector::LevelShift(_) => "LevelShift",
            RuleDetector::VolatilityShift(_) => "VolatilityShift",
            RuleDetector::Seasonal(_) => "Seasonal",
            RuleDetector::Autoregression(_) => "Autoregression",
        }
    }

    fn family(&self) -> DetectorFamily {
        DetectorFamily::RuleBased
    }

    fn fit(&mut self, _input: &DetectorInput<'_>) -> Result<()> {
        Ok(())
    }

    fn score(&self, input: &DetectorInput<'_>) -> Result<Vec<f64>> {
        self.evaluate(input.values)
    }

    fn predict(&self, input: &DetectorInput<'_>) -> Result<Vec<bool>> {
        Ok(self.score(input)?.iter().map(|&s| s > 0.0).collect())
    }

    fn is_fitted(&self) -> bool {
        true
    }

    fn detect(&self, input: &DetectorInput<'_>) -> Result<DetectorResult> {
        let scores = self.score(input)?;
        let flags = scores.iter().map(|&s| s > 0.0).collect();
        Ok(DetectorResult::new(flags, scores))
    }
}

macro_rules! impl_from_rule {
    ($($rule:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$rule> for RuleDetector {
                fn from(rule: $rule) -> Self {
                    RuleDetector::$variant(rule)
                }
            }
        )*
    };
}

impl_from_rule! {
    ThresholdRule => Threshold,
    QuantileRule => Quantile,
    InterQuartileRule => InterQuartile,
    PersistRule => Persist,
    LevelShiftRule => LevelShift,
    VolatilityShiftRule => VolatilityShift,
    SeasonalRule => Seasonal,
    AutoregressionRule => Autoregression,
}

/// Median of a window, `NaN` if it holds any undefined value.
pub(crate) fn window_median(window: &[f64]) -> f64 {
    if window.iter().any(|v| !v.is_finite()) {
        return f64::NAN;
    }
    crate::utils::median(window)
}
