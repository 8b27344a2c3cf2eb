//! Global threshold and quantile rules on the raw values.

use super::Fences;
use crate::error::{AnomalyError, Result};
use crate::utils::{mean, quantile, std_dev};

/// How the threshold rule places its bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdBounds {
    /// `mean ± k·σ` of the series being scored.
    Sigma(f64),
    /// Fixed bounds in measurement units.
    Fixed { low: Option<f64>, high: Option<f64> },
}

/// Flags values outside global bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRule {
    pub bounds: ThresholdBounds,
}

impl ThresholdRule {
    pub fn sigma(k: f64) -> Self {
        Self {
            bounds: ThresholdBounds::Sigma(k),
        }
    }

    pub fn fixed(low: Option<f64>, high: Option<f64>) -> Self {
        Self {
            bounds: ThresholdBounds::Fixed { low, high },
        }
    }

    pub fn fences(&self, values: &[f64]) -> Result<Fences> {
        match self.bounds {
            ThresholdBounds::Fixed { low, high } => Ok(Fences::new(low, high)),
            ThresholdBounds::Sigma(k) => {
                if values.len() < 2 {
                    return Err(AnomalyError::InsufficientData {
                        needed: 2,
                        got: values.len(),
                    });
                }
                let m = mean(values);
                let s = std_dev(values);
                Ok(Fences::new(Some(m - k * s), Some(m + k * s)))
            }
        }
    }

    pub fn scores(&self, values: &[f64]) -> Result<Vec<f64>> {
        Ok(self.fences(values)?.scores(values))
    }
}

impl Default for ThresholdRule {
    fn default() -> Self {
        Self::sigma(3.0)
    }
}

/// Flags values above the `high` or below the `low` empirical quantile.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantileRule {
    pub low: Option<f64>,
    pub high: Option<f64>,
}

impl Default for QuantileRule {
    fn default() -> Self {
        Self {
            low: Some(0.01),
            high: Some(0.99),
        }
    }
}

impl QuantileRule {
    pub fn new(low: Option<f64>, high: Option<f64>) -> Self {
        Self { low, high }
    }

    pub fn scores(&self, values: &[f64]) -> Result<Vec<f64>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let fences = Fences::new(
            self.low.map(|q| quantile(values, q)),
            self.high.map(|q| quantile(values, q)),
        );
        Ok(fences.scores(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sigma_rule_flags_spike() {
        let values = [100.0, 102.0, 101.0, 500.0, 103.0];
        let scores = ThresholdRule::sigma(1.0).scores(&values).unwrap();
        let flagged: Vec<usize> = (0..5).filter(|&i| scores[i] > 0.0).collect();
        assert_eq!(flagged, vec![3]);
    }

    #[test]
    fn wide_sigma_flags_nothing() {
        let values = [100.0, 102.0, 101.0, 500.0, 103.0];
        let scores = ThresholdRule::sigma(3.0).scores(&values).unwrap();
        assert!(scores.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn sigma_rule_needs_two_values() {
        assert!(matches!(
            ThresholdRule::sigma(2.0).scores(&[1.0]),
            Err(AnomalyError::InsufficientData { needed: 2, got: 1 })
        ));
    }

    #[test]
    fn fixed_bounds() {
        let scores = ThresholdRule::fixed(Some(0.0), None)
            .scores(&[-1.5, 3.0, 1e9])
            .unwrap();
        assert_relative_eq!(scores[0], 1.5);
        assert_relative_eq!(scores[1], 0.0);
        assert_relative_eq!(scores[2], 0.0);
    }

    #[test]
    fn quantile_rule_flags_extremes() {
        let values: Vec<f64> = (0..101).map(|i| i as f64).collect();
        let scores = QuantileRule::new(Some(0.05), Some(0.95)).scores(&values).unwrap();
        let flagged = scores.iter().filter(|&&s| s > 0.0).count();
        // 0..=4 below, 96..=100 above
        assert_eq!(flagged, 10);
    }
}
