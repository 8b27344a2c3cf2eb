//! Numerical helpers shared by the feature builder and detectors.

pub mod ols;
pub mod stats;

pub use ols::{ols_fit, OlsFit};
pub use stats::{iqr_bounds, mean, median, nan_mean, quantile, std_dev, variance};
