//! Series data structure for a single meter's readings.

use crate::error::{AnomalyError, Result};
use chrono::NaiveDateTime;

/// Ordered `(timestamp, value)` readings for one entity (meter, user, postcode).
///
/// Timestamps are kept in ascending order. Equal timestamps are allowed and keep
/// the order in which they were read.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    id: String,
    timestamps: Vec<NaiveDateTime>,
    values: Vec<f64>,
}

/// Builder for constructing a [`Series`] from unsorted rows.
#[derive(Debug, Clone, Default)]
pub struct SeriesBuilder {
    id: String,
    timestamps: Vec<NaiveDateTime>,
    values: Vec<f64>,
}

impl SeriesBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Append one reading.
    pub fn push(&mut self, timestamp: NaiveDateTime, value: f64) {
        self.timestamps.push(timestamp);
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Sort by timestamp (stable) and produce the series.
    pub fn build(self) -> Series {
        let mut order: Vec<usize> = (0..self.timestamps.len()).collect();
        order.sort_by_key(|&i| self.timestamps[i]);

        Series {
            id: self.id,
            timestamps: order.iter().map(|&i| self.timestamps[i]).collect(),
            values: order.iter().map(|&i| self.values[i]).collect(),
        }
    }
}

impl Series {
    /// Create a series from parallel vectors, sorting by timestamp.
    pub fn new(
        id: impl Into<String>,
        timestamps: Vec<NaiveDateTime>,
        values: Vec<f64>,
    ) -> Result<Self> {
        if timestamps.len() != values.len() {
            return Err(AnomalyError::DimensionMismatch {
                expected: timestamps.len(),
                got: values.len(),
            });
        }
        Ok(SeriesBuilder {
            id: id.into(),
            timestamps,
            values,
        }
        .build())
    }

    /// Identifier of the series (usually the input file stem).
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Iterate `(timestamp, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDateTime, f64)> + '_ {
        self.timestamps
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }

    /// First difference of the values; the first reading is dropped.
    ///
    /// Turns cumulative meter readings into per-interval consumption.
    pub fn differenced(&self) -> Series {
        if self.len() < 2 {
            return Series {
                id: self.id.clone(),
                timestamps: Vec::new(),
                values: Vec::new(),
            };
        }

        Series {
            id: self.id.clone(),
            timestamps: self.timestamps[1..].to_vec(),
            values: self.values.windows(2).map(|w| w[1] - w[0]).collect(),
        }
    }

    /// Number of timestamps that repeat an earlier one.
    pub fn duplicate_timestamps(&self) -> usize {
        self.timestamps.windows(2).filter(|w| w[0] == w[1]).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn series_sorts_by_timestamp() {
        let series = Series::new(
            "meter",
            vec![at(3, 0), at(1, 0), at(2, 0)],
            vec![3.0, 1.0, 2.0],
        )
        .unwrap();

        assert_eq!(series.values(), &[1.0, 2.0, 3.0]);
        assert_eq!(series.timestamps()[0], at(1, 0));
        assert_eq!(series.id(), "meter");
    }

    #[test]
    fn equal_timestamps_keep_row_order() {
        let mut builder = SeriesBuilder::new("dup");
        builder.push(at(2, 0), 20.0);
        builder.push(at(1, 0), 10.0);
        builder.push(at(1, 0), 11.0);
        builder.push(at(1, 0), 12.0);
        let series = builder.build();

        assert_eq!(series.values(), &[10.0, 11.0, 12.0, 20.0]);
        assert_eq!(series.duplicate_timestamps(), 2);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let result = Series::new("bad", vec![at(1, 0)], vec![1.0, 2.0]);
        assert!(matches!(
            result,
            Err(AnomalyError::DimensionMismatch { expected: 1, got: 2 })
        ));
    }

    #[test]
    fn differenced_drops_first_reading() {
        let series = Series::new(
            "cumulative",
            vec![at(1, 0), at(1, 1), at(1, 2)],
            vec![100.0, 103.0, 110.0],
        )
        .unwrap();

        let diff = series.differenced();
        assert_eq!(diff.values(), &[3.0, 7.0]);
        assert_eq!(diff.timestamps(), &[at(1, 1), at(1, 2)]);
        assert!(Series::new("one", vec![at(1, 0)], vec![1.0])
            .unwrap()
            .differenced()
            .is_empty());
    }
}
