//! Pairwise page similarity
//!
//! [`SimilarityMatrix`] holds cosine scores over the intelligible pages in
//! document order. [`SimilarityGraph`] keeps only the pairs at or above the
//! threshold and answers component queries for clustering.

mod graph;

pub use graph::SimilarityGraph;

use ndarray::{aview1, Array2};

use crate::corpus::PageKey;
use crate::embedding::{EmbeddingError, PageVector};
use crate::error::{Result, SiftError};

/// Symmetric cosine similarity over an ordered set of pages
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
    keys: Vec<PageKey>,
    scores: Array2<f32>,
}

impl SimilarityMatrix {
    /// Score every pair of `vectors`; `keys[i]` names `vectors[i]`
    ///
    /// Dense vectors are L2-normalized first. Sparse TF-IDF rows are already
    /// unit length and are used as-is.
    pub fn build(keys: Vec<PageKey>, vectors: &[PageVector]) -> Result<Self> {
        if keys.len() != vectors.len() {
            return Err(SiftError::Invariant(format!(
                "{} pages but {} vectors",
                keys.len(),
                vectors.len()
            )));
        }

        let n = keys.len();
        let mut scores = Array2::<f32>::zeros((n, n));

        if let Some(first) = vectors.first() {
            match first {
                PageVector::Sparse(_) => {
                    let rows = vectors
                        .iter()
                        .map(|v| match v {
                            PageVector::Sparse(row) => Ok(row),
                            PageVector::Dense(_) => Err(EmbeddingError::MixedVectorKinds),
                        })
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    for i in 0..n {
                        for j in (i + 1)..n {
                            let score = rows[i].dot(rows[j]);
                            scores[[i, j]] = score;
                            scores[[j, i]] = score;
                        }
                    }
                }
                PageVector::Dense(values) => {
                    let dimension = values.len();
                    let mut rows = Array2::<f32>::zeros((n, dimension));
                    for (i, vector) in vectors.iter().enumerate() {
                        let values = vector.as_dense().ok_or(EmbeddingError::MixedVectorKinds)?;
                        if values.len() != dimension {
                            return Err(EmbeddingError::DimensionMismatch {
                                expected: dimension,
                                actual: values.len(),
                            }
                            .into());
                        }
                        let row = aview1(values);
                        let norm = row.dot(&row).sqrt();
                        if norm > 0.0 {
                            rows.row_mut(i).assign(&(&row / norm));
                        } else {
                            rows.row_mut(i).assign(&row);
                        }
                    }
                    scores = rows.dot(&rows.t());
                    // The product kernel need not sum both triangles in the same order
                    for i in 0..n {
                        for j in (i + 1)..n {
                            scores[[j, i]] = scores[[i, j]];
                        }
                    }
                }
            }
        }

        for i in 0..n {
            scores[[i, i]] = 1.0;
        }

        Ok(Self { keys, scores })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Page keys, indexed like the matrix rows
    pub fn keys(&self) -> &[PageKey] {
        &self.keys
    }

    pub fn score(&self, i: usize, j: usize) -> f32 {
        self.scores[[i, j]]
    }

    pub fn position(&self, key: &PageKey) -> Option<usize> {
        self.keys.binary_search(key).ok()
    }

    /// Indices `j != i` whose similarity to `i` is at least `threshold`
    pub fn neighbors(&self, i: usize, threshold: f32) -> Vec<usize> {
        (0..self.len())
            .filter(|&j| j != i && self.scores[[i, j]] >= threshold)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::TfIdfModel;

    fn keys(n: usize) -> Vec<PageKey> {
        (0..n).map(|i| PageKey::new(0, i)).collect()
    }

    #[test]
    fn test_dense_cosine_is_scale_invariant() {
        let vectors = vec![
            PageVector::Dense(vec![1.0, 0.0]),
            PageVector::Dense(vec![10.0, 0.0]),
            PageVector::Dense(vec![0.0, 3.0]),
        ];
        let matrix = SimilarityMatrix::build(keys(3), &vectors).unwrap();
        assert!((matrix.score(0, 1) - 1.0).abs() < 1e-6);
        assert_eq!(matrix.score(0, 2), 0.0);
        assert_eq!(matrix.neighbors(0, 0.9), vec![1]);
    }

    #[test]
    fn test_dense_scores_match_cosine() {
        let vectors = vec![
            PageVector::Dense(vec![3.0, 4.0, 0.0]),
            PageVector::Dense(vec![0.0, 2.0, 2.0]),
            PageVector::Dense(vec![0.0, 0.0, 0.0]),
            PageVector::Dense(vec![-6.0, -8.0, 0.0]),
        ];
        let matrix = SimilarityMatrix::build(keys(4), &vectors).unwrap();

        let expected = 0.8 / 2.0f32.sqrt();
        assert!((matrix.score(0, 1) - expected).abs() < 1e-6);
        assert!((matrix.score(0, 3) + 1.0).abs() < 1e-6);
        assert_eq!(matrix.score(0, 2), 0.0);
        for i in 0..4 {
            assert_eq!(matrix.score(i, i), 1.0);
            for j in 0..4 {
                assert_eq!(matrix.score(i, j), matrix.score(j, i));
            }
        }
    }

    #[test]
    fn test_scores_symmetric() {
        let model = TfIdfModel::fit(&[
            "river water flood plain",
            "river water levels rising",
            "budget approved by council",
            "council budget meeting minutes",
        ]);
        let vectors: Vec<PageVector> = model
            .rows()
            .iter()
            .cloned()
            .map(PageVector::Sparse)
            .collect();
        let matrix = SimilarityMatrix::build(keys(4), &vectors).unwrap();

        for i in 0..4 {
            for j in 0..4 {
                assert_eq!(matrix.score(i, j), matrix.score(j, i));
            }
        }
        assert!(matrix.score(0, 1) > matrix.score(0, 2));
    }

    #[test]
    fn test_mixed_kinds_rejected() {
        let vectors = vec![
            PageVector::Dense(vec![1.0]),
            PageVector::Sparse(Default::default()),
        ];
        assert!(SimilarityMatrix::build(keys(2), &vectors).is_err());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let vectors = vec![PageVector::Dense(vec![1.0]), PageVector::Dense(vec![1.0, 2.0])];
        assert!(matches!(
            SimilarityMatrix::build(keys(2), &vectors),
            Err(SiftError::Embedding(EmbeddingError::DimensionMismatch { .. }))
        ));
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let vectors = vec![PageVector::Dense(vec![1.0])];
        assert!(matches!(
            SimilarityMatrix::build(keys(2), &vectors),
            Err(SiftError::Invariant(_))
        ));
    }

    #[test]
    fn test_position_lookup() {
        let matrix = SimilarityMatrix::build(
            vec![PageKey::new(0, 2), PageKey::new(1, 0)],
            &[PageVector::Dense(vec![1.0]), PageVector::Dense(vec![1.0])],
        )
        .unwrap();
        assert_eq!(matrix.position(&PageKey::new(1, 0)), Some(1));
        assert_eq!(matrix.position(&PageKey::new(0, 0)), None);
    }
}
