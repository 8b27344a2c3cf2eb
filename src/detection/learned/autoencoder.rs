//! Dense autoencoder scored by reconstruction error.

use super::{check_width, decision_threshold, matrix_width};
use crate::error::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const GRADIENT_CLIP: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DenseLayer {
    /// `weights[out][in]`.
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
    relu: bool,
}

impl DenseLayer {
    fn new(inputs: usize, outputs: usize, relu: bool, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (inputs + outputs) as f64).sqrt();
        let weights = (0..outputs)
            .map(|_| (0..inputs).map(|_| rng.gen_range(-limit..limit)).collect())
            .collect();
        Self {
            weights,
            bias: vec![0.0; outputs],
            relu,
        }
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(w, b)| {
                let z = w.iter().zip(input).map(|(a, x)| a * x).sum::<f64>() + b;
                if self.relu {
                    z.max(0.0)
                } else {
                    z
                }
            })
            .collect()
    }
}

/// Feed-forward autoencoder with ReLU hidden layers and a linear output.
///
/// Trained with plain per-row SGD on the mean squared reconstruction error.
/// The score of a row is that error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoEncoder {
    pub hidden: Vec<usize>,
    pub epochs: usize,
    pub learning_rate: f64,
    pub contamination: f64,
    pub seed: u64,
    layers: Vec<DenseLayer>,
    width: Option<usize>,
    threshold: Option<f64>,
}

impl Default for AutoEncoder {
    fn default() -> Self {
        Self::new(vec![25, 2, 25], 0.01)
    }
}

impl AutoEncoder {
    pub fn new(hidden: Vec<usize>, contamination: f64) -> Self {
        Self {
            hidden: hidden.into_iter().filter(|&h| h > 0).collect(),
            epochs: 10,
            learning_rate: 0.01,
            contamination,
            seed: 42,
            layers: Vec::new(),
            width: None,
            threshold: None,
        }
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
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
        let width = matrix_width(rows, 1)?;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut sizes = vec![width];
        sizes.extend(&self.hidden);
        sizes.push(width);
        let last = sizes.len() - 2;
        self.layers = sizes
            .windows(2)
            .enumerate()
            .map(|(l, pair)| DenseLayer::new(pair[0], pair[1], l < last, &mut rng))
            .collect();

        let mut order: Vec<usize> = (0..rows.len()).collect();
        for _ in 0..self.epochs {
            order.shuffle(&mut rng);
            for &i in &order {
                self.step(&rows[i]);
            }
        }

        self.width = Some(width);
        let training: Vec<f64> = rows.iter().map(|r| self.reconstruction_error(r)).collect();
        self.threshold = Some(decision_threshold(&training, self.contamination));
        Ok(())
    }

    pub fn score(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        check_width(rows, self.width)?;
        Ok(rows.iter().map(|r| self.reconstruction_error(r)).collect())
    }

    fn activations(&self, row: &[f64]) -> Vec<Vec<f64>> {
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(row.to_vec());
        for layer in &self.layers {
            let next = match activations.last() {
                Some(input) => layer.forward(input),
                None => break,
            };
            activations.push(next);
        }
        activations
    }

    fn reconstruction_error(&self, row: &[f64]) -> f64 {
        let activations = self.activations(row);
        match activations.last() {
            Some(output) if !row.is_empty() => {
                output
                    .iter()
                    .zip(row)
                    .map(|(o, x)| (o - x).powi(2))
                    .sum::<f64>()
                    / row.len() as f64
            }
            _ => 0.0,
        }
    }

    /// One SGD update on a single row.
    fn step(&mut self, row: &[f64]) {
        let activations = self.activations(row);
        let Some(output) = activations.last() else {
            return;
        };
        let d = row.len() as f64;
        let mut delta: Vec<f64> = output
            .iter()
            .zip(row)
            .map(|(o, x)| 2.0 * (o - x) / d)
            .collect();

        for l in (0..self.layers.len()).rev() {
            let input = &activations[l];
            let layer = &self.layers[l];

            // gradient w.r.t. the previous activation, through its ReLU
            let previous = (l > 0).then(|| {
                let relu = self.layers[l - 1].relu;
                (0..input.len())
                    .map(|i| {
                        if relu && input[i] <= 0.0 {
                            return 0.0;
                        }
                        layer
                            .weights
                            .iter()
                            .zip(&delta)
                            .map(|(w, g)| w[i] * g)
                            .sum::<f64>()
                    })
                    .collect::<Vec<f64>>()
            });

            let lr = self.learning_rate;
            let layer = &mut self.layers[l];
            for ((weights, bias), g) in layer.weights.iter_mut().zip(layer.bias.iter_mut()).zip(&delta) {
                for (w, x) in weights.iter_mut().zip(input) {
                    *w -= lr * (g * x).clamp(-GRADIENT_CLIP, GRADIENT_CLIP);
                }
                *bias -= lr * g.clamp(-GRADIENT_CLIP, GRADIENT_CLIP);
            }

            match previous {
                Some(p) => delta = p,
                None => break,
            }
        }
    }
}
