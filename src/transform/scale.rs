//! Column standardization for feature matrices.

use crate::error::{AnomalyError, Result};
use serde::{Deserialize, Serialize};

/// Per-column center and scale fit on one batch of rows.
///
/// Uses the population standard deviation, so a standardized column has
/// exactly zero mean and unit variance over the batch it was fit on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnScaler {
    /// Column means.
    pub centers: Vec<f64>,
    /// Column standard deviations (1.0 for constant columns).
    pub scales: Vec<f64>,
}

impl ColumnScaler {
    /// Fit centers and scales on row-major data.
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let width = rows.first().map_or(0, |r| r.len());
        if rows.iter().any(|r| r.len() != width) {
            return Err(AnomalyError::DimensionMismatch {
                expected: width,
                got: rows.iter().map(|r| r.len()).find(|&l| l != width).unwrap_or(0),
            });
        }

        let n = rows.len() as f64;
        let mut centers = vec![0.0; width];
        let mut scales = vec![1.0; width];
        if rows.is_empty() {
            return Ok(Self { centers, scales });
        }

        for row in rows {
            for (c, x) in centers.iter_mut().zip(row) {
                *c += x;
            }
        }
        for c in centers.iter_mut() {
            *c /= n;
        }

        for (j, scale) in scales.iter_mut().enumerate() {
            let var = rows.iter().map(|r| (r[j] - centers[j]).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            *scale = if std < 1e-10 { 1.0 } else { std };
        }

        Ok(Self { centers, scales })
    }

    /// Number of columns the scaler was fit on.
    pub fn width(&self) -> usize {
        self.centers.len()
    }

    /// Apply `(x - center) / scale` to every row.
    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter()
            .map(|row| {
                if row.len() != self.width() {
                    return Err(AnomalyError::DimensionMismatch {
                        expected: self.width(),
                        got: row.len(),
                    });
                }
                Ok(row
                    .iter()
                    .zip(self.centers.iter().zip(&self.scales))
                    .map(|(x, (c, s))| (x - c) / s)
                    .collect())
            })
            .collect()
    }
}

/// Fit a scaler on `rows` and return the standardized copy.
pub fn standardize_columns(rows: &[Vec<f64>]) -> Result<(Vec<Vec<f64>>, ColumnScaler)> {
    let scaler = ColumnScaler::fit(rows)?;
    let scaled = scaler.transform(rows)?;
    Ok((scaled, scaler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn column(rows: &[Vec<f64>], j: usize) -> Vec<f64> {
        rows.iter().map(|r| r[j]).collect()
    }

    #[test]
    fn standardize_basic() {
        let rows = vec![
            vec![1.0, 10.0],
            vec![2.0, 20.0],
            vec![3.0, 30.0],
            vec![4.0, 40.0],
        ];
        let (scaled, scaler) = standardize_columns(&rows).unwrap();

        assert_relative_eq!(scaler.centers[0], 2.5, epsilon = 1e-10);
        assert_relative_eq!(scaler.scales[0], 1.25_f64.sqrt(), epsilon = 1e-10);

        for j in 0..2 {
            let col = column(&scaled, j);
            let mean = col.iter().sum::<f64>() / col.len() as f64;
            let var = col.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / col.len() as f64;
            assert_relative_eq!(mean, 0.0, epsilon = 1e-10);
            assert_relative_eq!(var, 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn standardize_constant_column() {
        let rows = vec![vec![5.0, 1.0], vec![5.0, 2.0], vec![5.0, 3.0]];
        let (scaled, scaler) = standardize_columns(&rows).unwrap();

        assert_relative_eq!(scaler.scales[0], 1.0, epsilon = 1e-10);
        assert!(column(&scaled, 0).iter().all(|x| x.abs() < 1e-12));
    }

    #[test]
    fn standardize_empty() {
        let (scaled, scaler) = standardize_columns(&[]).unwrap();
        assert!(scaled.is_empty());
        assert_eq!(scaler.width(), 0);
    }

    #[test]
    fn transform_checks_width() {
        let scaler = ColumnScaler::fit(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert!(matches!(
            scaler.transform(&[vec![1.0]]),
            Err(AnomalyError::DimensionMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let result = ColumnScaler::fit(&[vec![1.0, 2.0], vec![3.0]]);
        assert!(result.is_err());
    }
}
