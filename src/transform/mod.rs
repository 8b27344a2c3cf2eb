//! Data transformations for meter series.
//!
//! Provides trailing rolling statistics and column standardization.
//!
//! # Example
//!
//! ```
//! use meter_anomaly::transform::{rolling_mean, standardize_columns};
//!
//! let series = vec![1.0, 2.0, 3.0, 4.0, 5.0];
//!
//! // Rolling mean with window 3
//! let rm = rolling_mean(&series, 3);
//! assert!(rm[1].is_nan());
//!
//! // Standardize each column to zero mean, unit variance
//! let rows = vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]];
//! let (scaled, _scaler) = standardize_columns(&rows).unwrap();
//! assert_eq!(scaled.len(), 3);
//! ```

pub mod scale;
pub mod window;

pub use scale::{standardize_columns, ColumnScaler};
pub use window::{rolling_apply, rolling_mean, rolling_std, rolling_var};
