//! Feature construction for meter series.
//!
//! Derives calendar features and trailing rolling statistics for every
//! reading, and assembles them into a feature matrix for the learned detectors.
//!
//! # Example
//!
//! ```
//! use meter_anomaly::core::Series;
//! use meter_anomaly::features::{FeatureBuilder, FeatureColumn};
//! use chrono::NaiveDate;
//!
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
//! let timestamps = (0..5).map(|i| start + chrono::Duration::hours(i)).collect();
//! let series = Series::new("m1", timestamps, vec![100.0, 102.0, 101.0, 500.0, 103.0]).unwrap();
//!
//! let frame = FeatureBuilder::new(2).unwrap().build(&series);
//! assert_eq!(frame.rolling_mean()[3], 300.5);
//! assert!(frame.z_scores()[0].is_none());
//!
//! let matrix = frame.matrix(&[FeatureColumn::Value, FeatureColumn::RollingMean]);
//! assert_eq!(matrix[0].len(), 2);
//! ```

use crate::core::{Dialect, Series};
use crate::error::{AnomalyError, Result};
use crate::transform::{rolling_mean, rolling_std};
use crate::utils::nan_mean;
use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// A column of the feature matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureColumn {
    Value,
    Hour,
    DayOfWeek,
    RollingMean,
    RollingStd,
}

impl FeatureColumn {
    pub fn name(&self) -> &'static str {
        match self {
            FeatureColumn::Value => "value",
            FeatureColumn::Hour => "hour",
            FeatureColumn::DayOfWeek => "day_of_week",
            FeatureColumn::RollingMean => "rolling_mean",
            FeatureColumn::RollingStd => "rolling_std",
        }
    }

    /// Feature set for a dialect. Daily sources carry no hour-of-day signal.
    pub fn defaults_for(dialect: Dialect) -> Vec<FeatureColumn> {
        if dialect.is_sub_daily() {
            vec![
                FeatureColumn::Value,
                FeatureColumn::Hour,
                FeatureColumn::DayOfWeek,
                FeatureColumn::RollingMean,
                FeatureColumn::RollingStd,
            ]
        } else {
            vec![
                FeatureColumn::Value,
                FeatureColumn::DayOfWeek,
                FeatureColumn::RollingMean,
                FeatureColumn::RollingStd,
            ]
        }
    }
}

impl fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FeatureColumn {
    type Err = AnomalyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "value" => Ok(FeatureColumn::Value),
            "hour" => Ok(FeatureColumn::Hour),
            "day_of_week" => Ok(FeatureColumn::DayOfWeek),
            "rolling_mean" => Ok(FeatureColumn::RollingMean),
            "rolling_std" => Ok(FeatureColumn::RollingStd),
            other => Err(AnomalyError::Config(format!("unknown feature column '{}'", other))),
        }
    }
}

/// Derived features for one reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRow {
    /// Hour of day, 0..=23.
    pub hour: u32,
    /// Day of week, Monday = 0.
    pub day_of_week: u32,
    /// Trailing mean, imputed while the window is incomplete.
    pub rolling_mean: f64,
    /// Trailing sample standard deviation, imputed while the window is incomplete.
    pub rolling_std: f64,
    /// `(value - rolling_mean) / rolling_std`; `None` when undefined.
    pub z_score: Option<f64>,
    /// Whether the rolling statistics were imputed.
    pub imputed: bool,
}

/// Builds [`FeatureFrame`]s with a fixed trailing window.
#[derive(Debug, Clone, Copy)]
pub struct FeatureBuilder {
    window: usize,
}

impl FeatureBuilder {
    /// Fails with `Config` for a zero window.
    pub fn new(window: usize) -> Result<Self> {
        if window == 0 {
            return Err(AnomalyError::Config(
                "window size must be positive".to_string(),
            ));
        }
        Ok(Self { window })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Derive features for every reading of `series`.
    pub fn build(&self, series: &Series) -> FeatureFrame {
        let values = series.values();
        let raw_mean = rolling_mean(values, self.window);
        let raw_std = rolling_std(values, self.window);

        let z_scores = values
            .iter()
            .zip(raw_mean.iter().zip(&raw_std))
            .map(|(&x, (&m, &s))| z_score(x, m, s))
            .collect();

        let imputed = raw_mean
            .iter()
            .zip(&raw_std)
            .map(|(m, s)| !m.is_finite() || !s.is_finite())
            .collect();

        let rolling_mean = impute_with_mean(series.id(), "rolling_mean", raw_mean);
        let rolling_std = impute_with_mean(series.id(), "rolling_std", raw_std);

        FeatureFrame {
            window: self.window,
            timestamps: series.timestamps().to_vec(),
            values: values.to_vec(),
            hours: series.timestamps().iter().map(|t| t.hour()).collect(),
            days_of_week: series
                .timestamps()
                .iter()
                .map(|t| t.weekday().num_days_from_monday())
                .collect(),
            rolling_mean,
            rolling_std,
            z_scores,
            imputed,
        }
    }
}

fn z_score(value: f64, mean: f64, std: f64) -> Option<f64> {
    if !mean.is_finite() || !std.is_finite() || std == 0.0 {
        return None;
    }
    let z = (value - mean) / std;
    z.is_finite().then_some(z)
}

/// Replace non-finite entries with the mean of the finite ones, or 0.0 if none.
fn impute_with_mean(series_id: &str, column: &str, mut values: Vec<f64>) -> Vec<f64> {
    let missing = values.iter().filter(|v| !v.is_finite()).count();
    if missing == 0 {
        return values;
    }

    let fill = nan_mean(&values);
    let fill = if fill.is_finite() {
        fill
    } else {
        debug!(series = series_id, column, "no complete window, imputing zeros");
        0.0
    };

    for v in values.iter_mut().filter(|v| !v.is_finite()) {
        *v = fill;
    }
    values
}

/// Per-reading features for one series, column-major.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    window: usize,
    timestamps: Vec<NaiveDateTime>,
    values: Vec<f64>,
    hours: Vec<u32>,
    days_of_week: Vec<u32>,
    rolling_mean: Vec<f64>,
    rolling_std: Vec<f64>,
    z_scores: Vec<Option<f64>>,
    imputed: Vec<bool>,
}

impl FeatureFrame {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn rolling_mean(&self) -> &[f64] {
        &self.rolling_mean
    }

    pub fn rolling_std(&self) -> &[f64] {
        &self.rolling_std
    }

    pub fn z_scores(&self) -> &[Option<f64>] {
        &self.z_scores
    }

    pub fn row(&self, index: usize) -> Option<FeatureRow> {
        if index >= self.len() {
            return None;
        }
        Some(FeatureRow {
            hour: self.hours[index],
            day_of_week: self.days_of_week[index],
            rolling_mean: self.rolling_mean[index],
            rolling_std: self.rolling_std[index],
            z_score: self.z_scores[index],
            imputed: self.imputed[index],
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = FeatureRow> + '_ {
        (0..self.len()).filter_map(move |i| self.row(i))
    }

    /// One column as floats.
    pub fn column(&self, column: FeatureColumn) -> Vec<f64> {
        match column {
            FeatureColumn::Value => self.values.clone(),
            FeatureColumn::Hour => self.hours.iter().map(|&h| h as f64).collect(),
            FeatureColumn::DayOfWeek => self.days_of_week.iter().map(|&d| d as f64).collect(),
            FeatureColumn::RollingMean => self.rolling_mean.clone(),
            FeatureColumn::RollingStd => self.rolling_std.clone(),
        }
    }

    /// Row-major matrix of the selected columns.
    pub fn matrix(&self, columns: &[FeatureColumn]) -> Vec<Vec<f64>> {
        let cols: Vec<Vec<f64>> = columns.iter().map(|&c| self.column(c)).collect();
        (0..self.len())
            .map(|i| cols.iter().map(|c| c[i]).collect())
            .collect()
    }
}
