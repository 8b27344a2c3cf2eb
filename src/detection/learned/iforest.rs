//! Isolation forest.

use super::{check_width, decision_threshold, matrix_width};
use crate::error::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum IsolationNode {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        value: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
}

impl IsolationNode {
    fn path_length(&self, row: &[f64], depth: usize) -> f64 {
        match self {
            IsolationNode::Leaf { size } => depth as f64 + average_path_length(*size),
            IsolationNode::Split {
                feature,
                value,
                left,
                right,
            } => {
                if row[*feature] < *value {
                    left.path_length(row, depth + 1)
                } else {
                    right.path_length(row, depth + 1)
                }
            }
        }
    }
}

/// Ensemble of random isolation trees. Anomalies isolate in fewer splits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    pub n_trees: usize,
    pub sample_size: usize,
    pub contamination: f64,
    pub seed: u64,
    trees: Vec<IsolationNode>,
    subsample: usize,
    width: Option<usize>,
    threshold: Option<f64>,
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new(100, 256, 0.01)
    }
}

impl IsolationForest {
    pub fn new(n_trees: usize, sample_size: usize, contamination: f64) -> Self {
        Self {
            n_trees: n_trees.max(1),
            sample_size: sample_size.max(2),
            contamination,
            seed: 42,
            trees: Vec::new(),
            subsample: 0,
            width: None,
            threshold: None,
        }
    }

    /// Set random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    pub fn width(&self) -> Option<usize> {
        self.width
    }

    pub fn fit(&mut self, rows: &[Vec<f64>]) -> Result<()> {
        let width = matrix_width(rows, 2)?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let psi = self.sample_size.min(rows.len());
        let height_limit = (psi as f64).log2().ceil() as usize;

        self.trees = (0..self.n_trees)
            .map(|_| {
                let sample = rand::seq::index::sample(&mut rng, rows.len(), psi).into_vec();
                grow(rows, sample, 0, height_limit, &mut rng)
            })
            .collect();
        self.subsample = psi;
        self.width = Some(width);

        let training = self.path_scores(rows);
        self.threshold = Some(decision_threshold(&training, self.contamination));
        Ok(())
    }

    pub fn score(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        check_width(rows, self.width)?;
        Ok(self.path_scores(rows))
    }

    /// `2^(-E[h(x)] / c(psi))`, in `(0, 1]`.
    fn path_scores(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        let norm = average_path_length(self.subsample).max(f64::EPSILON);
        rows.iter()
            .map(|row| {
                let mean_path = self
                    .trees
                    .iter()
                    .map(|tree| tree.path_length(row, 0))
                    .sum::<f64>()
                    / self.trees.len() as f64;
                2f64.powf(-mean_path / norm)
            })
            .collect()
    }
}

fn grow(
    rows: &[Vec<f64>],
    indices: Vec<usize>,
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> IsolationNode {
    if depth >= height_limit || indices.len() <= 1 {
        return IsolationNode::Leaf {
            size: indices.len(),
        };
    }

    let width = rows[indices[0]].len();
    let splittable: Vec<(usize, f64, f64)> = (0..width)
        .filter_map(|j| {
            let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                (lo.min(rows[i][j]), hi.max(rows[i][j]))
            });
            (hi > lo).then_some((j, lo, hi))
        })
        .collect();

    if splittable.is_empty() {
        return IsolationNode::Leaf {
            size: indices.len(),
        };
    }

    let (feature, lo, hi) = splittable[rng.gen_range(0..splittable.len())];
    let value = rng.gen_range(lo..hi);
    let (left, right): (Vec<usize>, Vec<usize>) =
        indices.into_iter().partition(|&i| rows[i][feature] < value);

    IsolationNode::Split {
        feature,
        value,
        left: Box::new(grow(rows, left, depth + 1, height_limit, rng)),
        right: Box::new(grow(rows, right, depth + 1, height_limit, rng)),
    }
}

/// Average path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}
