//! Ordinary Least Squares (OLS) regression used by the autoregressive detector.

use crate::error::{AnomalyError, Result};

/// OLS regression coefficients and intercept.
#[derive(Debug, Clone)]
pub struct OlsFit {
    /// Regression coefficients (one per regressor column).
    pub coefficients: Vec<f64>,
    /// Intercept term.
    pub intercept: f64,
}

impl OlsFit {
    /// Predict values for regressor columns of equal length.
    pub fn predict(&self, columns: &[Vec<f64>]) -> Result<Vec<f64>> {
        if columns.len() != self.coefficients.len() {
            return Err(AnomalyError::DimensionMismatch {
                expected: self.coefficients.len(),
                got: columns.len(),
            });
        }
        let n = columns.first().map_or(0, |c| c.len());

        let mut predictions = vec![self.intercept; n];
        for (coef, column) in self.coefficients.iter().zip(columns) {
            if column.len() != n {
                return Err(AnomalyError::DimensionMismatch {
                    expected: n,
                    got: column.len(),
                });
            }
            for (pred, x) in predictions.iter_mut().zip(column) {
                *pred += coef * x;
            }
        }
        Ok(predictions)
    }

    /// Residuals `y - y_hat`.
    pub fn residuals(&self, y: &[f64], columns: &[Vec<f64>]) -> Result<Vec<f64>> {
        let predictions = self.predict(columns)?;
        if predictions.len() != y.len() {
            return Err(AnomalyError::DimensionMismatch {
                expected: y.len(),
                got: predictions.len(),
            });
        }
        Ok(y.iter().zip(&predictions).map(|(a, p)| a - p).collect())
    }
}

/// Fit `y = intercept + sum(coef_j * column_j)`.
///
/// Uses Cholesky decomposition to solve the normal equations.
pub fn ols_fit(y: &[f64], columns: &[Vec<f64>]) -> Result<OlsFit> {
    let n = y.len();
    if n == 0 {
        return Err(AnomalyError::InsufficientData { needed: 1, got: 0 });
    }

    let k = columns.len();
    for column in columns {
        if column.len() != n {
            return Err(AnomalyError::DimensionMismatch {
                expected: n,
                got: column.len(),
            });
        }
    }

    // Design matrix columns: [1, x1, x2, ...]
    let num_params = k + 1;
    let mut xtx = vec![vec![0.0; num_params]; num_params];
    let mut xty = vec![0.0; num_params];

    for obs in 0..n {
        let y_obs = y[obs];
        xtx[0][0] += 1.0;
        for j in 0..k {
            let xj = columns[j][obs];
            xtx[0][j + 1] += xj;
            xtx[j + 1][0] += xj;
        }
        for i in 0..k {
            let xi = columns[i][obs];
            for j in 0..k {
                xtx[i + 1][j + 1] += xi * columns[j][obs];
            }
        }

        xty[0] += y_obs;
        for i in 0..k {
            xty[i + 1] += columns[i][obs] * y_obs;
        }
    }

    // Ridge term keeps constant regressors solvable.
    for (i, row) in xtx.iter_mut().enumerate() {
        row[i] += 1e-8;
    }

    let beta = solve_symmetric(&xtx, &xty).ok_or_else(|| {
        AnomalyError::InsufficientData {
            needed: num_params + 1,
            got: n,
        }
    })?;

    Ok(OlsFit {
        intercept: beta[0],
        coefficients: beta[1..].to_vec(),
    })
}

/// Solve symmetric positive definite system `A @ x = b` by Cholesky decomposition.
fn solve_symmetric(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    if n == 0 || a.len() != n {
        return None;
    }

    let mut l = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }

            if i == j {
                if sum <= 0.0 {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    // Forward substitution: L @ y = b
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i][j] * y[j];
        }
        y[i] = sum / l[i][i];
    }

    // Backward substitution: L' @ x = y
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[j][i] * x[j];
        }
        x[i] = sum / l[i][i];
    }

    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ols_fit_simple_linear() {
        // y = 2 + 3*x
        let y = vec![5.0, 8.0, 11.0, 14.0, 17.0];
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];

        let fit = ols_fit(&y, &[x.clone()]).unwrap();

        assert_relative_eq!(fit.intercept, 2.0, epsilon = 1e-6);
        assert_relative_eq!(fit.coefficients[0], 3.0, epsilon = 1e-6);

        let residuals = fit.residuals(&y, &[x]).unwrap();
        assert!(residuals.iter().all(|r| r.abs() < 1e-6));
    }

    #[test]
    fn ols_fit_two_regressors() {
        // y = 1 + 2*x1 + 3*x2
        let x1 = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let x2 = vec![2.0, 1.0, 4.0, 3.0, 6.0, 5.0];
        let y: Vec<f64> = x1
            .iter()
            .zip(&x2)
            .map(|(a, b)| 1.0 + 2.0 * a + 3.0 * b)
            .collect();

        let fit = ols_fit(&y, &[x1, x2]).unwrap();
        assert_relative_eq!(fit.intercept, 1.0, epsilon = 1e-5);
        assert_relative_eq!(fit.coefficients[0], 2.0, epsilon = 1e-5);
        assert_relative_eq!(fit.coefficients[1], 3.0, epsilon = 1e-5);
    }

    #[test]
    fn ols_without_regressors_is_mean() {
        let fit = ols_fit(&[1.0, 2.0, 3.0], &[]).unwrap();
        assert_relative_eq!(fit.intercept, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn ols_rejects_empty_and_ragged_input() {
        assert!(ols_fit(&[], &[]).is_err());
        assert!(matches!(
            ols_fit(&[1.0, 2.0], &[vec![1.0]]),
            Err(AnomalyError::DimensionMismatch { .. })
        ));
    }
}
