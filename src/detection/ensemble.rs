//! Runs a set of detectors over one series and collects their outcomes.

use super::{BoxedDetector, DetectorFamily, DetectorInput, DetectorKind, DetectorParams, DetectorResult};
use crate::error::{AnomalyError, Result};
use tracing::{debug, warn};

/// What one detector produced for one series.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorOutcome {
    Flags(DetectorResult),
    /// The detector could not run on this series. It never aborts the batch.
    Unavailable { reason: String },
}

/// Outcome of a named detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorRun {
    pub name: String,
    pub family: DetectorFamily,
    pub outcome: DetectorOutcome,
}

impl DetectorRun {
    pub fn flags(&self) -> Option<&[bool]> {
        match &self.outcome {
            DetectorOutcome::Flags(result) => Some(&result.flags),
            DetectorOutcome::Unavailable { .. } => None,
        }
    }

    pub fn scores(&self) -> Option<&[f64]> {
        match &self.outcome {
            DetectorOutcome::Flags(result) => Some(&result.scores),
            DetectorOutcome::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.outcome, DetectorOutcome::Flags(_))
    }

    /// Raw flag count, zero when unavailable.
    pub fn anomaly_count(&self) -> usize {
        match &self.outcome {
            DetectorOutcome::Flags(result) => result.anomaly_count(),
            DetectorOutcome::Unavailable { .. } => 0,
        }
    }
}

struct Member {
    detector: BoxedDetector,
    /// Fit on every scored series instead of keeping a preloaded state.
    refit: bool,
}

/// Ordered collection of detectors applied to the same input.
#[derive(Default)]
pub struct DetectorEnsemble {
    members: Vec<Member>,
}

impl DetectorEnsemble {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build fresh detectors for `kinds`, in order.
    pub fn from_kinds(kinds: &[DetectorKind], params: &DetectorParams) -> Result<Self> {
        let mut ensemble = Self::new();
        for kind in kinds {
            ensemble.push(kind.build(params)?);
        }
        Ok(ensemble)
    }

    /// Add a detector that is fit on every series it scores.
    pub fn with_detector(mut self, detector: BoxedDetector) -> Self {
        self.push(detector);
        self
    }

    /// Add an already fitted detector that is used read-only.
    pub fn with_pretrained(mut self, detector: BoxedDetector) -> Self {
        self.push_pretrained(detector);
        self
    }

    pub fn push(&mut self, detector: BoxedDetector) {
        self.members.push(Member {
            detector,
            refit: true,
        });
    }

    /// The detector is never fit here; if it is unfitted it reports `FitRequired`.
    pub fn push_pretrained(&mut self, detector: BoxedDetector) {
        self.members.push(Member {
            detector,
            refit: false,
        });
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Detector names in run order.
    pub fn names(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.detector.name()).collect()
    }

    /// Run every detector on `input`.
    ///
    /// Failures are logged and reported as [`DetectorOutcome::Unavailable`].
    pub fn run(&mut self, input: &DetectorInput<'_>) -> Vec<DetectorRun> {
        self.members
            .iter_mut()
            .map(|member| {
                let name = member.detector.name().to_string();
                let family = member.detector.family();
                let outcome = match run_member(member, input) {
                    Ok(result) => {
                        debug!(detector = %name, anomalies = result.anomaly_count(), "detector finished");
                        DetectorOutcome::Flags(result)
                    }
                    Err(err) => {
                        warn!(detector = %name, error = %err, "detector unavailable");
                        DetectorOutcome::Unavailable {
                            reason: err.to_string(),
                        }
                    }
                };
                DetectorRun {
                    name,
                    family,
                    outcome,
                }
            })
            .collect()
    }
}

fn run_member(member: &mut Member, input: &DetectorInput<'_>) -> Result<DetectorResult> {
    if member.refit {
        member.detector.fit(input)?;
    } else if !member.detector.is_fitted() {
        return Err(AnomalyError::FitRequired);
    }
    let result = member.detector.detect(input)?;
    if result.flags.len() != input.len() {
        return Err(AnomalyError::DimensionMismatch {
            expected: input.len(),
            got: result.flags.len(),
        });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::learned::KnnDetector;
    use crate::detection::rules::{InterQuartileRule, RuleDetector, VolatilityShiftRule};
    use crate::detection::{Detector, LearnedDetector};

    fn input_parts(n: usize) -> (Vec<f64>, Vec<Vec<f64>>) {
        let mut values: Vec<f64> = (0..n).map(|i| 10.0 + (i % 4) as f64).collect();
        values[n / 2] = 80.0;
        let features = values.iter().map(|v| vec![(v - 11.5) / 2.0]).collect();
        (values, features)
    }

    #[test]
    fn short_series_marks_detector_unavailable() {
        let (values, features) = input_parts(20);
        let input = DetectorInput {
            timestamps: &[],
            values: &values,
            features: &features,
        };
        let mut ensemble = DetectorEnsemble::new()
            .with_detector(Box::new(RuleDetector::from(InterQuartileRule::default())))
            .with_detector(Box::new(RuleDetector::from(VolatilityShiftRule::default())));

        let runs = ensemble.run(&input);
        assert_eq!(runs.len(), 2);
        assert!(runs[0].is_available());
        assert!(runs[0].flags().unwrap()[10]);
        assert!(!runs[1].is_available());
        assert_eq!(runs[1].name, "VolatilityShift");
        assert_eq!(runs[1].anomaly_count(), 0);
    }

    #[test]
    fn learned_members_refit_per_series() {
        let (values, features) = input_parts(40);
        let input = DetectorInput {
            timestamps: &[],
            values: &values,
            features: &features,
        };
        let mut ensemble =
            DetectorEnsemble::new().with_detector(Box::new(LearnedDetector::from(KnnDetector::new(3, 0.05))));

        let runs = ensemble.run(&input);
        assert!(runs[0].is_available());
        assert_eq!(runs[0].family, DetectorFamily::Learned);
        assert!(runs[0].flags().unwrap()[20]);
    }

    #[test]
    fn unfitted_pretrained_member_is_never_fit() {
        let (values, features) = input_parts(40);
        let input = DetectorInput {
            timestamps: &[],
            values: &values,
            features: &features,
        };
        let mut ensemble =
            DetectorEnsemble::new().with_pretrained(Box::new(LearnedDetector::from(KnnDetector::new(3, 0.05))));

        for _ in 0..2 {
            let runs = ensemble.run(&input);
            assert_eq!(
                runs[0].outcome,
                DetectorOutcome::Unavailable {
                    reason: AnomalyError::FitRequired.to_string()
                }
            );
        }
    }

    #[test]
    fn pretrained_width_mismatch_is_unavailable() {
        let rows = vec![vec![0.0, 1.0]; 10];
        let mut knn = LearnedDetector::from(KnnDetector::new(3, 0.1));
        knn.fit(&DetectorInput {
            timestamps: &[],
            values: &[],
            features: &rows,
        })
        .unwrap();

        let (values, features) = input_parts(12);
        let input = DetectorInput {
            timestamps: &[],
            values: &values,
            features: &features,
        };
        let mut ensemble = DetectorEnsemble::new().with_pretrained(Box::new(knn));
        let runs = ensemble.run(&input);
        assert!(matches!(runs[0].outcome, DetectorOutcome::Unavailable { .. }));
    }

    #[test]
    fn from_kinds_preserves_order() {
        let ensemble =
            DetectorEnsemble::from_kinds(&DetectorKind::RULE_PRESET, &DetectorParams::default()).unwrap();
        assert_eq!(
            ensemble.names(),
            vec!["Threshold", "IQR", "Persist", "LevelShift", "VolatilityShift"]
        );
    }
}
