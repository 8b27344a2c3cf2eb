//! Spike rule: a reading that jumps away from its recent past.

use super::{window_median, Fences, Side};
use crate::error::{AnomalyError, Result};

/// Signal is `x[t] - median(x[t-w..t])`.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistRule {
    pub window: usize,
    pub c: f64,
    pub side: Side,
}

impl Default for PersistRule {
    fn default() -> Self {
        Self {
            window: 1,
            c: 3.0,
            side: Side::Positive,
        }
    }
}

impl PersistRule {
    pub fn signal(&self, values: &[f64]) -> Result<Vec<f64>> {
        let w = self.window.max(1);
        if values.len() <= w {
            return Err(AnomalyError::InsufficientData {
                needed: w + 1,
                got: values.len(),
            });
        }
        let mut signal = vec![f64::NAN; values.len()];
        for t in w..values.len() {
            signal[t] = values[t] - window_median(&values[t - w..t]);
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
    fn flags_upward_jump_only() {
        let mut values: Vec<f64> = (0..40).map(|i| 10.0 + (i % 3) as f64 * 0.1).collect();
        values[20] = 60.0;
        values[30] = -60.0;
        let scores = PersistRule::default().scores(&values).unwrap();

        assert!(scores[20] > 0.0);
        assert_eq!(scores[30], 0.0);
        assert_eq!(scores[0], 0.0);
    }

    #[test]
    fn too_short() {
        assert!(PersistRule::default().scores(&[1.0]).is_err());
    }
}
