//! Consensus voting over per-detector flags.
//!
//! # Example
//!
//! ```
//! use meter_anomaly::consensus::{CombinationRule, ConsensusAggregator};
//! use meter_anomaly::detection::{DetectorFamily, DetectorOutcome, DetectorResult, DetectorRun};
//!
//! let run = |name: &str, flags: Vec<bool>| DetectorRun {
//!     name: name.to_string(),
//!     family: DetectorFamily::RuleBased,
//!     outcome: DetectorOutcome::Flags(DetectorResult::new(flags, vec![0.0; 3])),
//! };
//! let runs = vec![run("IQR", vec![true, true, false]), run("Persist", vec![false, true, false])];
//! let z = vec![None; 3];
//!
//! let all = ConsensusAggregator::new(CombinationRule::AllAgree).combine(&runs, &z).unwrap();
//! let any = ConsensusAggregator::new(CombinationRule::AnyFlag).combine(&runs, &z).unwrap();
//! assert_eq!(all.flags, vec![false, true, false]);
//! assert_eq!(any.count(), 2);
//! ```

use crate::detection::{DetectorFamily, DetectorOutcome, DetectorRun};
use crate::error::{AnomalyError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How per-detector flags reduce to one flag per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinationRule {
    /// Anomalous iff every contributing detector flags the row.
    #[default]
    AllAgree,
    /// Anomalous iff at least one contributing detector flags the row.
    AnyFlag,
}

impl CombinationRule {
    pub fn name(&self) -> &'static str {
        match self {
            CombinationRule::AllAgree => "all_agree",
            CombinationRule::AnyFlag => "any_flag",
        }
    }
}

impl fmt::Display for CombinationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CombinationRule {
    type Err = AnomalyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "all_agree" | "all" | "consensus" | "and" => Ok(CombinationRule::AllAgree),
            "any_flag" | "any" | "union" | "or" => Ok(CombinationRule::AnyFlag),
            other => Err(AnomalyError::Config(format!("unknown combination rule '{other}'"))),
        }
    }
}

/// What an unavailable detector contributes to the vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailablePolicy {
    /// Votes "no anomaly" on every row, which vetoes every all-agree flag.
    #[default]
    NoAnomaly,
    /// Left out of the vote.
    Exclude,
}

/// Keep a raw flag only where `|z| > threshold`. Undefined z-scores never pass.
pub fn validate_flags(raw: &[bool], z_scores: &[Option<f64>], threshold: f64) -> Vec<bool> {
    raw.iter()
        .zip(z_scores)
        .map(|(&flag, z)| flag && z.map_or(false, |z| z.abs() > threshold))
        .collect()
}

/// Per-detector line of a consensus result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorTally {
    pub name: String,
    pub family: DetectorFamily,
    pub available: bool,
    /// Flags produced by the detector.
    pub raw_count: usize,
    /// Flags surviving the z-score gate, for gated detectors.
    pub validated_count: Option<usize>,
    /// Whether the detector took part in the vote.
    pub contributed: bool,
    /// Flags the detector voted with.
    pub flags: Vec<bool>,
}

impl DetectorTally {
    /// Count reported for the detector: validated when gated, raw otherwise.
    pub fn effective_count(&self) -> usize {
        self.validated_count.unwrap_or(self.raw_count)
    }
}

/// Consensus flags for one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub rule: CombinationRule,
    pub flags: Vec<bool>,
    pub detectors: Vec<DetectorTally>,
}

impl ConsensusResult {
    /// Number of rows flagged by the consensus.
    pub fn count(&self) -> usize {
        self.flags.iter().filter(|&&f| f).count()
    }

    pub fn detector(&self, name: &str) -> Option<&DetectorTally> {
        self.detectors.iter().find(|d| d.name == name)
    }

    /// Detectors that took part in the vote.
    pub fn contributing(&self) -> usize {
        self.detectors.iter().filter(|d| d.contributed).count()
    }
}

/// Reduces detector runs to a [`ConsensusResult`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusAggregator {
    rule: CombinationRule,
    z_gate: Option<f64>,
    unavailable: UnavailablePolicy,
}

impl ConsensusAggregator {
    pub fn new(rule: CombinationRule) -> Self {
        Self {
            rule,
            z_gate: None,
            unavailable: UnavailablePolicy::NoAnomaly,
        }
    }

    /// Gate learned-family flags with `|z| > threshold`.
    pub fn with_validation(mut self, threshold: f64) -> Self {
        self.z_gate = Some(threshold);
        self
    }

    pub fn with_unavailable_policy(mut self, policy: UnavailablePolicy) -> Self {
        self.unavailable = policy;
        self
    }

    pub fn rule(&self) -> CombinationRule {
        self.rule
    }

    pub fn z_gate(&self) -> Option<f64> {
        self.z_gate
    }

    /// Combine `runs` for a series whose per-row z-scores are `z_scores`.
    ///
    /// With no contributing detector every row is normal.
    pub fn combine(&self, runs: &[DetectorRun], z_scores: &[Option<f64>]) -> Result<ConsensusResult> {
        let n = z_scores.len();
        let mut detectors = Vec::with_capacity(runs.len());

        for run in runs {
            let tally = match &run.outcome {
                DetectorOutcome::Flags(result) => {
                    if result.flags.len() != n {
                        return Err(AnomalyError::DimensionMismatch {
                            expected: n,
                            got: result.flags.len(),
                        });
                    }
                    let raw_count = result.anomaly_count();
                    let gate = self.z_gate.filter(|_| run.family == DetectorFamily::Learned);
                    let (flags, validated_count) = match gate {
                        Some(threshold) => {
                            let validated = validate_flags(&result.flags, z_scores, threshold);
                            let count = validated.iter().filter(|&&f| f).count();
                            (validated, Some(count))
                        }
                        None => (result.flags.clone(), None),
                    };
                    DetectorTally {
                        name: run.name.clone(),
                        family: run.family,
                        available: true,
                        raw_count,
                        validated_count,
                        contributed: true,
                        flags,
                    }
                }
                DetectorOutcome::Unavailable { .. } => DetectorTally {
                    name: run.name.clone(),
                    family: run.family,
                    available: false,
                    raw_count: 0,
                    validated_count: None,
                    contributed: self.unavailable == UnavailablePolicy::NoAnomaly,
                    flags: vec![false; n],
                },
            };
            detectors.push(tally);
        }

        let voters: Vec<&[bool]> = detectors
            .iter()
            .filter(|d| d.contributed)
            .map(|d| d.flags.as_slice())
            .collect();

        let flags = (0..n)
            .map(|i| {
                !voters.is_empty()
                    && match self.rule {
                        CombinationRule::AllAgree => voters.iter().all(|v| v[i]),
                        CombinationRule::AnyFlag => voters.iter().any(|v| v[i]),
                    }
            })
            .collect();

        Ok(ConsensusResult {
            rule: self.rule,
            flags,
            detectors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::DetectorResult;

    fn run(name: &str, family: DetectorFamily, flags: &[bool]) -> DetectorRun {
        DetectorRun {
            name: name.to_string(),
            family,
            outcome: DetectorOutcome::Flags(DetectorResult::new(flags.to_vec(), vec![0.0; flags.len()])),
        }
    }

    fn unavailable(name: &str) -> DetectorRun {
        DetectorRun {
            name: name.to_string(),
            family: DetectorFamily::RuleBased,
            outcome: DetectorOutcome::Unavailable {
                reason: "too short".to_string(),
            },
        }
    }

    #[test]
    fn unavailable_vetoes_all_agree_by_default() {
        let runs = vec![
            run("IQR", DetectorFamily::RuleBased, &[true, false]),
            unavailable("VolatilityShift"),
        ];
        let z = [None, None];
        let result = ConsensusAggregator::new(CombinationRule::AllAgree)
            .combine(&runs, &z)
            .unwrap();
        assert_eq!(result.flags, vec![false, false]);
        assert_eq!(result.contributing(), 2);

        let excluded = ConsensusAggregator::new(CombinationRule::AllAgree)
            .with_unavailable_policy(UnavailablePolicy::Exclude)
            .combine(&runs, &z)
            .unwrap();
        assert_eq!(excluded.flags, vec![true, false]);
        assert_eq!(excluded.contributing(), 1);
    }

    #[test]
    fn no_voters_means_no_anomalies() {
        let runs = vec![unavailable("Seasonal")];
        let result = ConsensusAggregator::new(CombinationRule::AnyFlag)
            .with_unavailable_policy(UnavailablePolicy::Exclude)
            .combine(&runs, &[Some(9.0)])
            .unwrap();
        assert_eq!(result.flags, vec![false]);

        let empty = ConsensusAggregator::new(CombinationRule::AllAgree)
            .combine(&[], &[None, None])
            .unwrap();
        assert_eq!(empty.count(), 0);
    }

    #[test]
    fn validation_gates_learned_detectors_only() {
        let runs = vec![
            run("KNN", DetectorFamily::Learned, &[true, true, true]),
            run("IQR", DetectorFamily::RuleBased, &[true, true, false]),
        ];
        let z = [Some(5.0), Some(0.5), None];
        let result = ConsensusAggregator::new(CombinationRule::AnyFlag)
            .with_validation(3.0)
            .combine(&runs, &z)
            .unwrap();

        let knn = result.detector("KNN").unwrap();
        assert_eq!(knn.raw_count, 3);
        assert_eq!(knn.validated_count, Some(1));
        assert_eq!(knn.effective_count(), 1);

        let iqr = result.detector("IQR").unwrap();
        assert_eq!(iqr.validated_count, None);
        assert_eq!(result.flags, vec![true, true, false]);
    }

    #[test]
    fn validate_flags_respects_sign_and_missing() {
        let flags = validate_flags(&[true, true, true, false], &[Some(-4.0), Some(3.0), None, Some(9.0)], 3.0);
        assert_eq!(flags, vec![true, false, false, false]);
    }

    #[test]
    fn length_mismatch_is_an_error() {
        let runs = vec![run("IQR", DetectorFamily::RuleBased, &[true])];
        let err = ConsensusAggregator::new(CombinationRule::AllAgree)
            .combine(&runs, &[None, None])
            .unwrap_err();
        assert_eq!(err, AnomalyError::DimensionMismatch { expected: 2, got: 1 });
    }

    #[test]
    fn parse_combination_rule() {
        assert_eq!("consensus".parse::<CombinationRule>().unwrap(), CombinationRule::AllAgree);
        assert_eq!("any-flag".parse::<CombinationRule>().unwrap(), CombinationRule::AnyFlag);
        assert!("majority".parse::<CombinationRule>().is_err());
    }
}
