//! Trailing rolling-window statistics.
//!
//! Every function returns a vector aligned with its input. Position `i`
//! summarises `series[i + 1 - window..=i]` and is `NaN` while that window is
//! incomplete.

/// Compute rolling mean (moving average).
pub fn rolling_mean(series: &[f64], window: usize) -> Vec<f64> {
    rolling_apply(series, window, |s| s.iter().sum::<f64>() / s.len() as f64)
}

/// Compute rolling standard deviation (sample, n-1 denominator).
pub fn rolling_std(series: &[f64], window: usize) -> Vec<f64> {
    rolling_var(series, window)
        .iter()
        .map(|v| v.sqrt())
        .collect()
}

/// Compute rolling variance (sample, n-1 denominator).
///
/// A window of one observation has no sample variance, so `window < 2`
/// yields all `NaN`.
pub fn rolling_var(series: &[f64], window: usize) -> Vec<f64> {
    if window < 2 {
        return vec![f64::NAN; series.len()];
    }

    rolling_apply(series, window, |segment| {
        let mean = segment.iter().sum::<f64>() / segment.len() as f64;
        segment.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (segment.len() - 1) as f64
    })
}

/// Generic trailing window application.
pub fn rolling_apply<F>(series: &[f64], window: usize, f: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    if series.is_empty() || window == 0 {
        return vec![f64::NAN; series.len()];
    }

    let n = series.len();
    let mut result = vec![f64::NAN; n];

    for i in (window - 1)..n {
        result[i] = f(&series[i + 1 - window..=i]);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rolling_mean_basic() {
        let series = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = rolling_mean(&series, 3);

        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_relative_eq!(result[2], 2.0, epsilon = 1e-10); // (1+2+3)/3
        assert_relative_eq!(result[3], 3.0, epsilon = 1e-10); // (2+3+4)/3
        assert_relative_eq!(result[4], 4.0, epsilon = 1e-10); // (3+4+5)/3
    }

    #[test]
    fn rolling_mean_window_1() {
        let series = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = rolling_mean(&series, 1);

        for (i, &x) in series.iter().enumerate() {
            assert_relative_eq!(result[i], x, epsilon = 1e-10);
        }
    }

    #[test]
    fn rolling_mean_empty_and_oversized() {
        assert!(rolling_mean(&[], 3).is_empty());
        assert!(rolling_mean(&[1.0, 2.0], 5).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn rolling_std_basic() {
        let series = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = rolling_std(&series, 3);

        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        // std of [1,2,3] = 1.0
        assert_relative_eq!(result[2], 1.0, epsilon = 1e-10);
    }

    #[test]
    fn rolling_std_constant() {
        let series = vec![5.0; 10];
        let result = rolling_std(&series, 3);

        for value in result.iter().skip(2) {
            assert_relative_eq!(*value, 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn rolling_std_window_1_is_undefined() {
        assert!(rolling_std(&[1.0, 2.0, 3.0], 1).iter().all(|v| v.is_nan()));
    }
}
