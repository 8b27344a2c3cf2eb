//! Dataset dialects: per-source column names and timestamp formats.

use crate::error::AnomalyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Source format of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// Daily postcode aggregates with `READING_START_DATE`.
    Datamill,
    /// Hourly per-user readings, semicolon separated.
    #[default]
    Helios,
    /// Per-meter pulse counts.
    Queensland,
}

/// Which logical column is treated as the measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Per-interval consumption (delta).
    #[default]
    Daily,
    /// Cumulative meter reading.
    Total,
}

impl Dialect {
    pub const ALL: [Dialect; 3] = [Dialect::Datamill, Dialect::Helios, Dialect::Queensland];

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Datamill => "datamill",
            Dialect::Helios => "helios",
            Dialect::Queensland => "queensland",
        }
    }

    /// Preferred field delimiter.
    pub fn delimiter(&self) -> u8 {
        match self {
            Dialect::Helios => b';',
            Dialect::Datamill | Dialect::Queensland => b',',
        }
    }

    pub fn timestamp_column(&self) -> &'static str {
        match self {
            Dialect::Datamill => "READING_START_DATE",
            Dialect::Helios | Dialect::Queensland => "datetime",
        }
    }

    /// `chrono` format string for the timestamp column.
    pub fn timestamp_format(&self) -> &'static str {
        match self {
            Dialect::Datamill => "%d/%m/%Y %H:%M",
            Dialect::Helios | Dialect::Queensland => "%d/%m/%Y %H:%M:%S",
        }
    }

    pub fn value_column(&self, value_type: ValueType) -> &'static str {
        match (self, value_type) {
            (Dialect::Datamill, ValueType::Daily) => "DAILY_AVERAGE_CONSUMPTION",
            (Dialect::Datamill, ValueType::Total) => "GROSS_CONSUMPTION",
            (Dialect::Helios, ValueType::Daily) => "diff",
            (Dialect::Helios, ValueType::Total) => "meter reading",
            (Dialect::Queensland, ValueType::Daily) => "Pulse1",
            (Dialect::Queensland, ValueType::Total) => "Pulse1_Total",
        }
    }

    /// Whether readings arrive more often than once per day.
    pub fn is_sub_daily(&self) -> bool {
        matches!(self, Dialect::Helios)
    }

    /// Rolling window length: one day of hourly data, or one week of daily data.
    pub fn default_window(&self) -> usize {
        if self.is_sub_daily() {
            24
        } else {
            7
        }
    }

    /// Z-score gate used to validate learned-detector flags.
    pub fn default_z_threshold(&self) -> f64 {
        if self.is_sub_daily() {
            3.0
        } else {
            1.0
        }
    }

    /// Seasonal period matching the sampling rate.
    pub fn default_period(&self) -> usize {
        self.default_window()
    }
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Daily => "daily",
            ValueType::Total => "total",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = AnomalyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "datamill" => Ok(Dialect::Datamill),
            "helios" => Ok(Dialect::Helios),
            "queensland" => Ok(Dialect::Queensland),
            other => Err(AnomalyError::Config(format!(
                "unknown dataset dialect '{}' (expected datamill, helios or queensland)",
                other
            ))),
        }
    }
}

impl FromStr for ValueType {
    type Err = AnomalyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "delta" | "pulse1" => Ok(ValueType::Daily),
            "total" | "cumulative" | "pulse1_total" => Ok(ValueType::Total),
            other => Err(AnomalyError::Config(format!(
                "unknown value type '{}' (expected daily or total)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_columns() {
        assert_eq!(Dialect::Helios.value_column(ValueType::Total), "meter reading");
        assert_eq!(Dialect::Queensland.value_column(ValueType::Daily), "Pulse1");
        assert_eq!(
            Dialect::Datamill.value_column(ValueType::Daily),
            "DAILY_AVERAGE_CONSUMPTION"
        );
        assert_eq!(Dialect::Datamill.timestamp_column(), "READING_START_DATE");
        assert_eq!(Dialect::Helios.delimiter(), b';');
    }

    #[test]
    fn defaults_follow_sampling_rate() {
        assert_eq!(Dialect::Helios.default_window(), 24);
        assert_eq!(Dialect::Queensland.default_window(), 7);
        assert_eq!(Dialect::Helios.default_z_threshold(), 3.0);
        assert_eq!(Dialect::Datamill.default_z_threshold(), 1.0);
    }

    #[test]
    fn parse_names_and_aliases() {
        assert_eq!("Helios".parse::<Dialect>().unwrap(), Dialect::Helios);
        assert_eq!("pulse1_total".parse::<ValueType>().unwrap(), ValueType::Total);
        assert_eq!("delta".parse::<ValueType>().unwrap(), ValueType::Daily);
        assert!(matches!(
            "london".parse::<Dialect>(),
            Err(AnomalyError::Config(_))
        ));
    }

    #[test]
    fn display_round_trips_through_parse() {
        for dialect in Dialect::ALL {
            assert_eq!(dialect.to_string().parse::<Dialect>().unwrap(), dialect);
        }
    }
}
