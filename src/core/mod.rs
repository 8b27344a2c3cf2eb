//! Core data structures for meter series.

mod dialect;
mod series;

pub use dialect::{Dialect, ValueType};
pub use series::{Series, SeriesBuilder};
