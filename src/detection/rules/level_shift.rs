//! Level shift rule: the median right of `t` differs from the median left of it.

use super::{window_median, Fences, Side};
use crate::error::{AnomalyError, Result};

/// Signal is `median(x[t..t+w]) - median(x[t-w..t])`.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelShiftRule {
    pub window: usize,
    pub c: f64,
    pub side: Side,
}

impl Default for LevelShiftRule {
    fn default() -> Self {
        Self {
            window: 5,
            c: 2.0,
            side: Side::Both,
        }
    }
}

impl LevelShiftRule {
    pub fn signal(&self, values: &[f64]) -> Result<Vec<f64>> {
        let w = self.window.max(1);
        let n = values.len();
        if n < 2 * w {
            return Err(AnomalyError::InsufficientData {
                needed: 2 * w,
                got: n,
            });
        }
        let mut signal = vec![f64::NAN; n];
        for t in w..=n - w {
            signal[t] = window_median(&values[t..t + w]) - window_median(&values[t - w..t]);
        }
        Ok(signal)
    }

    pub fn scores(&self, values: &[f64]) -> Result<Vec<f64>> {
        let signal = self.signal(values)?;
        Ok(Fences::inter_quartile(&signal, self.c, self.side).scores(&signal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_step_change() {
        let values: Vec<f64> = (0..60)
            .map(|i| if i < 30 { 10.0 } else { 25.0 } + (i % 2) as f64 * 0.2)
            .collect();
        let scores = LevelShiftRule::default().scores(&values).unwrap();

        assert!(scores[30] > 0.0);
        assert_eq!(scores[10], 0.0);
        assert_eq!(scores[50], 0.0);
    }

    #[test]
    fn needs_two_windows() {
        assert!(matches!(
            LevelShiftRule::default().scores(&[1.0; 9]),
            Err(AnomalyError::InsufficientData { needed: 10, got: 9 })
        ));
    }
}
