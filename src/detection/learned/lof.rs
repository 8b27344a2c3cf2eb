//! Local outlier factor.

use super::{check_width, decision_threshold, euclidean, matrix_width, reference_indices};
use crate::error::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

const DENSITY_EPS: f64 = 1e-10;

/// Ratio of the neighbours' local density to the row's own density.
/// Scores near 1 are inliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LofDetector {
    pub k: usize,
    pub contamination: f64,
    pub max_reference: usize,
    pub seed: u64,
    reference: Vec<Vec<f64>>,
    k_distances: Vec<f64>,
    densities: Vec<f64>,
    neighbours: usize,
    threshold: Option<f64>,
}

impl LofDetector {
    pub fn new(k: usize, contamination: f64) -> Self {
        Self {
            k: k.max(1),
            contamination,
            max_reference: 2000,
            seed: 42,
            reference: Vec::new(),
            k_distances: Vec::new(),
            densities: Vec::new(),
            neighbours: 0,
            threshold: None,
        }
    }

    pub fn with_max_reference(mut self, max_reference: usize) -> Self {
        self.max_reference = max_reference.max(2);
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
        self.threshold.and(self.reference.first().map(|r| r.len()))
    }

    pub fn fit(&mut self, rows: &[Vec<f64>]) -> Result<()> {
        matrix_width(rows, 2)?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let kept = reference_indices(rows.len(), self.max_reference.max(2), &mut rng);
        self.reference = kept.iter().map(|&i| rows[i].clone()).collect();
        // small batches shrink the neighbourhood instead of failing
        self.neighbours = self.k.min(self.reference.len() - 1);

        let neighbourhoods: Vec<Vec<(usize, f64)>> = (0..self.reference.len())
            .map(|j| self.nearest(&self.reference[j], Some(j)))
            .collect();
        self.k_distances = neighbourhoods
            .iter()
            .map(|n| n.last().map_or(0.0, |&(_, d)| d))
            .collect();
        self.densities = neighbourhoods
            .iter()
            .map(|n| self.reachability_density(n))
            .collect();

        let training: Vec<f64> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| self.factor(row, kept.binary_search(&i).ok()))
            .collect();
        self.threshold = Some(decision_threshold(&training, self.contamination));
        Ok(())
    }

    pub fn score(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        check_width(rows, self.width())?;
        Ok(rows.iter().map(|row| self.factor(row, None)).collect())
    }

    /// k nearest reference rows as `(index, distance)`, closest first.
    fn nearest(&self, row: &[f64], skip: Option<usize>) -> Vec<(usize, f64)> {
        let mut distances: Vec<(usize, f64)> = self
            .reference
            .iter()
            .enumerate()
            .filter(|(j, _)| Some(*j) != skip)
            .map(|(j, r)| (j, euclidean(row, r)))
            .collect();
        distances.sort_by(|a, b| a.1.total_cmp(&b.1));
        distances.truncate(self.neighbours);
        distances
    }

    fn reachability_density(&self, neighbourhood: &[(usize, f64)]) -> f64 {
        if neighbourhood.is_empty() {
            return 1.0 / DENSITY_EPS;
        }
        let mean_reach = neighbourhood
            .iter()
            .map(|&(o, d)| d.max(self.k_distances[o]))
            .sum::<f64>()
            / neighbourhood.len() as f64;
        1.0 / (mean_reach + DENSITY_EPS)
    }

    fn factor(&self, row: &[f64], skip: Option<usize>) -> f64 {
        let neighbourhood = self.nearest(row, skip);
        if neighbourhood.is_empty() {
            return 1.0;
        }
        let density = self.reachability_density(&neighbourhood);
        let neighbour_density = neighbourhood
            .iter()
            .map(|&(o, _)| self.densities[o])
            .sum::<f64>()
            / neighbourhood.len() as f64;
        neighbour_density / density
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid() -> Vec<Vec<f64>> {
        (0..100)
            .map(|i| vec![(i % 10) as f64, (i / 10) as f64])
            .collect()
    }

    #[test]
    fn uniform_grid_interior_is_near_one() {
        let rows = grid();
        let mut lof = LofDetector::new(4, 0.05);
        lof.fit(&rows).unwrap();
        let scores = lof.score(&[vec![4.5, 4.5]]).unwrap();
        assert_relative_eq!(scores[0], 1.0, epsilon = 0.3);
    }

    #[test]
    fn distant_row_has_large_factor() {
        let mut rows = grid();
        rows.push(vec![30.0, 30.0]);
        let mut lof = LofDetector::new(20, 0.01);
        lof.fit(&rows).unwrap();

        let scores = lof.score(&rows).unwrap();
        assert!(scores[100] > 3.0);
        assert!(scores[100] > lof.threshold().unwrap());
    }

    #[test]
    fn small_batch_shrinks_neighbourhood() {
        let rows = vec![vec![0.0], vec![1.0], vec![2.0]];
        let mut lof = LofDetector::new(20, 0.1);
        lof.fit(&rows).unwrap();
        assert_eq!(lof.neighbours, 2);
        assert!(lof.threshold().is_some());
    }
}
