//! Per-file summaries and flag exports.

use crate::consensus::ConsensusResult;
use crate::detection::DetectorFamily;
use crate::error::{AnomalyError, Result};
use crate::features::FeatureFrame;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Anomaly count of one detector on one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorCount {
    pub name: String,
    pub family: DetectorFamily,
    pub available: bool,
    /// Validated count for gated detectors, raw count otherwise.
    pub count: usize,
    pub raw_count: usize,
}

/// Summary record for one scored file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    pub file_id: String,
    pub total_rows: usize,
    pub per_detector_counts: Vec<DetectorCount>,
    pub consensus_count: usize,
}

impl FileReport {
    pub fn from_consensus(file_id: impl Into<String>, total_rows: usize, consensus: &ConsensusResult) -> Self {
        Self {
            file_id: file_id.into(),
            total_rows,
            per_detector_counts: consensus
                .detectors
                .iter()
                .map(|d| DetectorCount {
                    name: d.name.clone(),
                    family: d.family,
                    available: d.available,
                    count: d.effective_count(),
                    raw_count: d.raw_count,
                })
                .collect(),
            consensus_count: consensus.count(),
        }
    }

    pub fn count_for(&self, detector: &str) -> Option<usize> {
        self.per_detector_counts
            .iter()
            .find(|d| d.name == detector)
            .map(|d| d.count)
    }

    /// Names of detectors that could not run on this file.
    pub fn unavailable(&self) -> Vec<&str> {
        self.per_detector_counts
            .iter()
            .filter(|d| !d.available)
            .map(|d| d.name.as_str())
            .collect()
    }
}

/// A file skipped by the batch, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: AnomalyError,
}

/// Everything a batch run produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
    pub failures: Vec<FileFailure>,
    /// Models that could not be loaded and were left out of the run.
    pub model_diagnostics: Vec<AnomalyError>,
}

impl BatchReport {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.failures.is_empty()
    }

    pub fn total_rows(&self) -> usize {
        self.files.iter().map(|f| f.total_rows).sum()
    }

    pub fn total_consensus(&self) -> usize {
        self.files.iter().map(|f| f.consensus_count).sum()
    }
}

/// Text summary of one file.
pub fn render_file_report(report: &FileReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "File: {}", report.file_id);
    let _ = writeln!(out, "  rows: {}", report.total_rows);
    for detector in &report.per_detector_counts {
        if detector.available {
            if detector.count != detector.raw_count {
                let _ = writeln!(
                    out,
                    "  {}: {} anomalies ({} before validation)",
                    detector.name, detector.count, detector.raw_count
                );
            } else {
                let _ = writeln!(out, "  {}: {} anomalies", detector.name, detector.count);
            }
        } else {
            let _ = writeln!(out, "  {}: unavailable", detector.name);
        }
    }
    let _ = writeln!(out, "  consensus: {} anomalies", report.consensus_count);
    out
}

/// Text summary of a whole batch.
pub fn render_batch_report(report: &BatchReport) -> String {
    let mut out = String::new();
    for file in &report.files {
        out.push_str(&render_file_report(file));
    }
    for failure in &report.failures {
        let _ = writeln!(out, "Skipped {}: {}", failure.path.display(), failure.error);
    }
    for diagnostic in &report.model_diagnostics {
        let _ = writeln!(out, "Model excluded: {diagnostic}");
    }
    let _ = writeln!(
        out,
        "{} files scored, {} skipped, {} rows, {} consensus anomalies",
        report.files.len(),
        report.failures.len(),
        report.total_rows(),
        report.total_consensus()
    );
    out
}

/// Write `timestamp,value,z_score,<detector...>,consensus` for every row.
///
/// Detector columns hold the flags each detector voted with, so an
/// unavailable detector is all `false`.
pub fn write_flags_csv(path: &Path, frame: &FeatureFrame, consensus: &ConsensusResult) -> Result<()> {
    if consensus.flags.len() != frame.len() {
        return Err(AnomalyError::DimensionMismatch {
            expected: frame.len(),
            got: consensus.flags.len(),
        });
    }

    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec!["timestamp".to_string(), "value".to_string(), "z_score".to_string()];
    header.extend(consensus.detectors.iter().map(|d| d.name.clone()));
    header.push("consensus".to_string());
    writer.write_record(&header)?;

    for i in 0..frame.len() {
        let mut record = vec![
            frame.timestamps()[i].format(TIMESTAMP_FORMAT).to_string(),
            frame.values()[i].to_string(),
            frame.z_scores()[i].map(|z| z.to_string()).unwrap_or_default(),
        ];
        record.extend(consensus.detectors.iter().map(|d| d.flags[i].to_string()));
        record.push(consensus.flags[i].to_string());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::DetectorTally;
    use crate::consensus::CombinationRule;
    use crate::core::SeriesBuilder;
    use crate::features::FeatureBuilder;
    use chrono::NaiveDate;

    fn tally(name: &str, available: bool, flags: Vec<bool>, validated: Option<usize>) -> DetectorTally {
        DetectorTally {
            name: name.to_string(),
            family: DetectorFamily::RuleBased,
            available,
            raw_count: flags.iter().filter(|&&f| f).count(),
            validated_count: validated,
            contributed: true,
            flags,
        }
    }

    fn consensus() -> ConsensusResult {
        ConsensusResult {
            rule: CombinationRule::AnyFlag,
            flags: vec![false, true, false],
            detectors: vec![
                tally("IQR", true, vec![false, true, false], None),
                tally("KNN", true, vec![true, true, false], Some(1)),
                tally("VolatilityShift", false, vec![false; 3], None),
            ],
        }
    }

    #[test]
    fn file_report_counts() {
        let report = FileReport::from_consensus("meter_7", 3, &consensus());
        assert_eq!(report.count_for("IQR"), Some(1));
        assert_eq!(report.count_for("KNN"), Some(1));
        assert_eq!(report.consensus_count, 1);
        assert_eq!(report.unavailable(), vec!["VolatilityShift"]);

        let text = render_file_report(&report);
        assert!(text.starts_with("File: meter_7\n"));
        assert!(text.contains("  rows: 3\n"));
        assert!(text.contains("  KNN: 1 anomalies (2 before validation)\n"));
        assert!(text.contains("  VolatilityShift: unavailable\n"));
        assert!(text.contains("  consensus: 1 anomalies\n"));
    }

    #[test]
    fn batch_summary_line() {
        let report = BatchReport {
            files: vec![FileReport::from_consensus("a", 3, &consensus())],
            failures: vec![FileFailure {
                path: PathBuf::from("bad.csv"),
                error: AnomalyError::Parse("line 2".into()),
            }],
            model_diagnostics: Vec::new(),
        };
        let text = render_batch_report(&report);
        assert!(text.contains("Skipped bad.csv: parse error: line 2"));
        assert!(text.ends_with("1 files scored, 1 skipped, 3 rows, 1 consensus anomalies\n"));
    }

    #[test]
    fn flags_csv_layout() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut builder = SeriesBuilder::new("m");
        for (i, v) in [1.0, 9.0, 2.0].into_iter().enumerate() {
            builder.push(start + chrono::Duration::hours(i as i64), v);
        }
        let frame = FeatureBuilder::new(2).unwrap().build(&builder.build());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.csv");
        write_flags_csv(&path, &frame, &consensus()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "timestamp,value,z_score,IQR,KNN,VolatilityShift,consensus");
        assert_eq!(lines[1], "2024-01-01 00:00:00,1,,false,true,false,false");
        assert!(lines[2].starts_with("2024-01-01 01:00:00,9,"));
        assert!(lines[2].ends_with(",true,true,false,true"));
        assert_eq!(lines.len(), 4);
    }
}
