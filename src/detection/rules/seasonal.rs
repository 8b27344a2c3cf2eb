//! Seasonal rule: residual after removing the mean profile of each phase.

use super::{Fences, Side};
use crate::error::{AnomalyError, Result};

/// Where the seasonal period comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeasonalPeriod {
    /// Period in rows.
    Fixed(usize),
    /// Strongest autocorrelation peak of the series being scored.
    Auto,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalRule {
    pub period: SeasonalPeriod,
    pub c: f64,
    pub side: Side,
}

impl Default for SeasonalRule {
    fn default() -> Self {
        Self {
            period: SeasonalPeriod::Auto,
            c: 3.0,
            side: Side::Both,
        }
    }
}

impl SeasonalRule {
    pub fn with_period(period: usize) -> Self {
        Self {
            period: SeasonalPeriod::Fixed(period),
            ..Self::default()
        }
    }

    /// Period used for `values`.
    pub fn resolve_period(&self, values: &[f64]) -> Result<usize> {
        match self.period {
            SeasonalPeriod::Fixed(p) => Ok(p.max(2)),
            SeasonalPeriod::Auto => detect_period(values, values.len() / 2).ok_or_else(|| {
                AnomalyError::unavailable("Seasonal", "no seasonal pattern found")
            }),
        }
    }

    pub fn signal(&self, values: &[f64]) -> Result<Vec<f64>> {
        let period = self.resolve_period(values)?;
        if values.len() < 2 * period {
            return Err(AnomalyError::InsufficientData {
                needed: 2 * period,
                got: values.len(),
            });
        }

        let mut sums = vec![0.0; period];
        let mut counts = vec![0usize; period];
        for (i, &x) in values.iter().enumerate() {
            sums[i % period] += x;
            counts[i % period] += 1;
        }
        let profile: Vec<f64> = sums
            .iter()
            .zip(&counts)
            .map(|(s, &c)| s / c as f64)
            .collect();

        Ok(values
            .iter()
            .enumerate()
            .map(|(i, &x)| x - profile[i % period])
            .collect())
    }

    pub fn scores(&self, values: &[f64]) -> Result<Vec<f64>> {
        let signal = self.signal(values)?;
        Ok(Fences::inter_quartile(&signal, self.c, self.side).scores(&signal))
    }
}

/// Strongest local maximum of the autocorrelation function above 0.3.
///
/// Searches lags `2..=max_period.min(n / 2)`. Returns `None` for constant or
/// short series.
pub fn detect_period(values: &[f64], max_period: usize) -> Option<usize> {
    const MIN_PERIOD: usize = 2;
    const THRESHOLD: f64 = 0.3;

    let n = values.len();
    if n < MIN_PERIOD * 2 {
        return None;
    }
    let max_lag = max_period.min(n / 2);
    if max_lag < MIN_PERIOD + 2 {
        return None;
    }

    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
    if variance < 1e-10 {
        return None;
    }

    let acf: Vec<(usize, f64)> = (MIN_PERIOD..=max_lag)
        .map(|lag| (lag, autocorrelation(values, lag, mean, variance)))
        .collect();

    acf.windows(3)
        .filter(|w| w[1].1 > w[0].1 && w[1].1 > w[2].1 && w[1].1 > THRESHOLD)
        .map(|w| w[1])
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(lag, _)| lag)
}

fn autocorrelation(values: &[f64], lag: usize, mean: f64, variance: f64) -> f64 {
    let n = values.len();
    let cov: f64 = (lag..n)
        .map(|i| (values[i] - mean) * (values[i - lag] - mean))
        .sum::<f64>()
        / n as f64;
    cov / variance
}
