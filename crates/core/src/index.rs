//! Exact nearest-neighbor index over squared Euclidean distance.
//!
//! Vectors are stored as one row-major matrix; position `i` is the `i`-th
//! vector added. Searches scan every row, so results are exact and the
//! ordering is fully deterministic: ascending distance, then ascending
//! position.

use crate::error::RetrievalError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub position: usize,
    /// Squared L2 distance to the query.
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Result<Self, RetrievalError> {
        if dimension == 0 {
            return Err(RetrievalError::InvalidArgument(
                "vector dimension must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            dimension,
            data: Vec::new(),
        })
    }

    pub fn build(dimension: usize, vectors: &[Vec<f32>]) -> Result<Self, RetrievalError> {
        let mut index = Self::new(dimension)?;
        index.data.reserve(dimension.saturating_mul(vectors.len()));
        for vector in vectors {
            index.add(vector)?;
        }
        Ok(index)
    }

    pub fn add(&mut self, vector: &[f32]) -> Result<usize, RetrievalError> {
        self.check_dimension(vector)?;
        let position = self.count();
        self.data.extend_from_slice(vector);
        Ok(position)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn count(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        let end = start.checked_add(self.dimension)?;
        self.data.get(start..end)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        self.data.chunks_exact(self.dimension)
    }

    /// Returns at most `k` hits, nearest first. Asking for more than
    /// `count()` returns every stored vector; nothing is padded.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, RetrievalError> {
        self.check_dimension(query)?;

        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<SearchHit> = self
            .rows()
            .enumerate()
            .map(|(position, row)| SearchHit {
                position,
                distance: finite_or_infinite(squared_l2(query, row)),
            })
            .collect();

        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, compare_hits);
            hits.truncate(k);
        }
        hits.sort_unstable_by(compare_hits);

        Ok(hits)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), RetrievalError> {
        if vector.len() != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                found: vector.len(),
            });
        }
        Ok(())
    }
}

// NaN (e.g. `inf - inf`) ranks as infinitely far.
fn finite_or_infinite(distance: f32) -> f32 {
    if distance.is_nan() {
        f32::INFINITY
    } else {
        distance
    }
}

fn compare_hits(left: &SearchHit, right: &SearchHit) -> Ordering {
    left.distance
        .total_cmp(&right.distance)
        .then_with(|| left.position.cmp(&right.position))
}

pub fn squared_l2(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right.iter())
        .map(|(a, b)| {
            let diff = a - b;
            diff * diff
        })
        .sum()
}
