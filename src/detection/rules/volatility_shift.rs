//! Volatility shift rule: dispersion right of `t` grows compared to the left.

use super::{Fences, Side};
use crate::error::{AnomalyError, Result};
use crate::utils::std_dev;

/// Signal is `std(x[t..t+w]) - std(x[t-w..t])`.
#[derive(Debug, Clone, PartialEq)]
pub struct VolatilityShiftRule {
    pub window: usize,
    pub c: f64,
    pub side: Side,
}

impl Default for VolatilityShiftRule {
    fn default() -> Self {
        Self {
            window: 30,
            c: 1.5,
            side: Side::Positive,
        }
    }
}

impl VolatilityShiftRule {
    pub fn signal(&self, values: &[f64]) -> Result<Vec<f64>> {
        let w = self.window.max(2);
        let n = values.len();
        if n < 2 * w {
            return Err(AnomalyError::InsufficientData {
                needed: 2 * w,
                got: n,
            });
        }
        let mut signal = vec![f64::NAN; n];
        for t in w..=n - w {
            signal[t] = std_dev(&values[t..t + w]) - std_dev(&values[t - w..t]);
        }
        Ok(signal)
    }

    pub fn scores(&self, values: &[f64]) -> Result<Vec<f64>> {
        let signal = self.signal(values)?;
        Ok(Fences::inter_quartile(&signal, self.c, self.side).scores(&signal))
    }
}
