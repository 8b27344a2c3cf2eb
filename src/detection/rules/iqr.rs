//! Inter-quartile range rule on the raw values.

use super::{Fences, Side};
use crate::error::Result;

/// Flags values outside `Q1 - c·IQR`, `Q3 + c·IQR`.
#[derive(Debug, Clone, PartialEq)]
pub struct InterQuartileRule {
    pub c: f64,
    pub side: Side,
}

impl Default for InterQuartileRule {
    fn default() -> Self {
        Self {
            c: 1.5,
            side: Side::Both,
        }
    }
}

impl InterQuartileRule {
    pub fn new(c: f64) -> Self {
        Self { c, ..Self::default() }
    }

    pub fn scores(&self, values: &[f64]) -> Result<Vec<f64>> {
        Ok(Fences::inter_quartile(values, self.c, self.side).scores(values))
    }
}
