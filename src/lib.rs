//! # meter-anomaly
//!
//! Anomaly scoring for water and energy meter time series.
//!
//! Each input file is loaded into a [`core::Series`], enriched with calendar
//! and rolling features, scored by a set of rule-based and learned detectors,
//! and reduced to one consensus flag per reading. Learned detectors can be
//! trained once per dataset and reloaded from a [`store::ModelStore`].
//!
//! ```no_run
//! use meter_anomaly::prelude::*;
//!
//! let config = PipelineConfig::for_dataset(Dialect::Helios);
//! let report = BatchRunner::new(config)?.run("data/helios")?;
//! print!("{}", render_batch_report(&report));
//! # Ok::<(), AnomalyError>(())
//! ```

#![allow(clippy::needless_range_loop)]
#![allow(clippy::upper_case_acronyms)]

pub mod batch;
pub mod config;
pub mod consensus;
pub mod core;
pub mod detection;
pub mod error;
pub mod features;
pub mod loader;
pub mod report;
pub mod store;
pub mod transform;
pub mod utils;

pub use error::{AnomalyError, Result};

pub mod prelude {
    pub use crate::batch::{BatchRunner, SeriesScore, TrainingSummary};
    pub use crate::config::{PipelineConfig, Strategy};
    pub use crate::consensus::{CombinationRule, ConsensusAggregator, ConsensusResult, UnavailablePolicy};
    pub use crate::core::{Dialect, Series, ValueType};
    pub use crate::detection::{Detector, DetectorEnsemble, DetectorKind, DetectorResult};
    pub use crate::error::{AnomalyError, Result};
    pub use crate::features::{FeatureBuilder, FeatureFrame};
    pub use crate::report::{render_batch_report, render_file_report, BatchReport, FileReport};
    pub use crate::store::ModelStore;
}
