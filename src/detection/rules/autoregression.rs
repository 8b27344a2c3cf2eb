//! Autoregressive residual rule.

use super::{Fences, Side};
use crate::error::{AnomalyError, Result};
use crate::utils::ols_fit;

/// Fits `x[t] ~ x[t - step_size], ..., x[t - n_steps·step_size]` by OLS and
/// thresholds the residuals.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoregressionRule {
    pub n_steps: usize,
    pub step_size: usize,
    pub c: f64,
    pub side: Side,
}

impl Default for AutoregressionRule {
    fn default() -> Self {
        Self {
            n_steps: 1,
            step_size: 1,
            c: 3.0,
            side: Side::Both,
        }
    }
}

impl AutoregressionRule {
    fn max_lag(&self) -> usize {
        self.n_steps.max(1) * self.step_size.max(1)
    }

    pub fn signal(&self, values: &[f64]) -> Result<Vec<f64>> {
        let n_steps = self.n_steps.max(1);
        let step = self.step_size.max(1);
        let lag = self.max_lag();
        let n = values.len();
        let needed = lag + n_steps + 2;
        if n < needed {
            return Err(AnomalyError::InsufficientData { needed, got: n });
        }

        let y = &values[lag..];
        let columns: Vec<Vec<f64>> = (1..=n_steps)
            .map(|j| (lag..n).map(|t| values[t - j * step]).collect())
            .collect();

        let fit = ols_fit(y, &columns)?;
        let residuals = fit.residuals(y, &columns)?;

        let mut signal = vec![f64::NAN; lag];
        signal.extend(residuals);
        Ok(signal)
    }

    pub fn scores(&self, values: &[f64]) -> Result<Vec<f64>> {
        let signal = self.signal(values)?;
        Ok(Fences::inter_quartile(&signal, self.c, self.side).scores(&signal))
    }
}
