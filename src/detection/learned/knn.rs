//! k-nearest-neighbour distance detector.

use super::{check_width, decision_threshold, euclidean, matrix_width, reference_indices};
use crate::error::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Scores a row by the distance to its k-th nearest reference row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnDetector {
    pub k: usize,
    pub contamination: f64,
    pub max_reference: usize,
    pub seed: u64,
    reference: Vec<Vec<f64>>,
    threshold: Option<f64>,
}

impl KnnDetector {
    pub fn new(k: usize, contamination: f64) -> Self {
        Self {
            k: k.max(1),
            contamination,
            max_reference: 2000,
            seed: 42,
            reference: Vec::new(),
            threshold: None,
        }
    }

    pub fn with_max_reference(mut self, max_reference: usize) -> Self {
        self.max_reference = max_reference.max(1);
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
        matrix_width(rows, self.k + 1)?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let kept = reference_indices(rows.len(), self.max_reference.max(self.k + 1), &mut rng);
        self.reference = kept.iter().map(|&i| rows[i].clone()).collect();

        // training rows never count themselves as a neighbour
        let training: Vec<f64> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let skip = kept.binary_search(&i).ok();
                self.kth_distance(row, skip)
            })
            .collect();
        self.threshold = Some(decision_threshold(&training, self.contamination));
        Ok(())
    }

    pub fn score(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        check_width(rows, self.width())?;
        Ok(rows.iter().map(|row| self.kth_distance(row, None)).collect())
    }

    fn kth_distance(&self, row: &[f64], skip: Option<usize>) -> f64 {
        let mut distances: Vec<f64> = self
            .reference
            .iter()
            .enumerate()
            .filter(|(j, _)| Some(*j) != skip)
            .map(|(_, r)| euclidean(row, r))
            .collect();
        if distances.is_empty() {
            return 0.0;
        }
        let kth = (self.k - 1).min(distances.len() - 1);
        let (_, value, _) = distances.select_nth_unstable_by(kth, f64::total_cmp);
        *value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn kth_distance_on_a_line() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let mut knn = KnnDetector::new(2, 0.1);
        knn.fit(&rows).unwrap();

        let scores = knn.score(&[vec![20.0], vec![4.5]]).unwrap();
        assert_relative_eq!(scores[0], 12.0); // 9 and 8 are the two nearest
        assert_relative_eq!(scores[1], 0.5);
    }

    #[test]
    fn flags_isolated_row() {
        let mut rows: Vec<Vec<f64>> = (0..60).map(|i| vec![(i % 6) as f64, (i % 4) as f64]).collect();
        rows.push(vec![40.0, 40.0]);
        let mut knn = KnnDetector::new(5, 0.01);
        knn.fit(&rows).unwrap();

        let scores = knn.score(&rows).unwrap();
        let threshold = knn.threshold().unwrap();
        assert!(scores[60] > threshold);
        assert!(scores[..60].iter().all(|&s| s <= threshold));
    }

    #[test]
    fn subsampled_reference() {
        let rows: Vec<Vec<f64>> = (0..500).map(|i| vec![i as f64]).collect();
        let mut knn = KnnDetector::new(5, 0.05).with_max_reference(100);
        knn.fit(&rows).unwrap();
        assert_eq!(knn.reference.len(), 100);
        assert_eq!(knn.width(), Some(1));
    }

    #[test]
    fn needs_more_rows_than_neighbours() {
        let rows = vec![vec![1.0]; 5];
        assert!(KnnDetector::new(5, 0.1).fit(&rows).is_err());
    }
}
