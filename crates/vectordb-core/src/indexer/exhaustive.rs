//! Exhaustive (brute-force) nearest-neighbor indexer.
//!
//! Linear scan over every stored vector; O(n) build, O(n) search. The
//! baseline against which [`crate::indexer::balltree`] is checked for
//! recall-1.0 equivalence (same top-k id set, scores agreeing to 1e-6).

use crate::error::Error;
use crate::indexer::topk::TopK;
use crate::indexer::{IndexStats, IndexerKind};
use crate::vector;

/// An exhaustive index: a flat array of `(chunk_id, unit_vector)`.
pub struct ExhaustiveIndex {
    points: Vec<(u128, Vec<f32>)>,
    dimension: usize,
    built_at_epoch_ms: u64,
}

impl ExhaustiveIndex {
    /// Build over `points`. All vectors must share one dimension and should
    /// already be unit-normalized (the indexer trusts, rather than
    /// re-verifies, normalization — callers are the library lifecycle).
    ///
    /// An empty `points` list is a valid (empty) index, per the boundary
    /// behavior that index build on an empty library succeeds.
    pub fn build(points: Vec<(u128, Vec<f32>)>, built_at_epoch_ms: u64) -> Result<Self, Error> {
        let dimension = points.first().map(|(_, v)| v.len()).unwrap_or(0);
        for (_, v) in &points {
            if v.len() != dimension {
                return Err(Error::DimMismatch {
                    expected: dimension,
                    actual: v.len(),
                });
            }
        }
        Ok(Self {
            points,
            dimension,
            built_at_epoch_ms,
        })
    }

    /// Find the `k` nearest neighbors to `query` by cosine similarity.
    ///
    /// Normalizes `query`; fails with `DimMismatch` if its dimension
    /// differs from the indexed vectors'. Uses a bounded min-heap so cost
    /// is `O(n log k)` rather than a full sort when `k` is small.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u128, f32)>, Error> {
        if k == 0 || self.points.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(Error::DimMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        let q = vector::normalize(query)?;

        let mut top_k = TopK::new(k);
        for (id, v) in &self.points {
            let score = vector::dot(&q, v)?;
            top_k.offer(*id, score);
        }
        Ok(top_k.into_sorted_vec())
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            kind: IndexerKind::Exhaustive,
            vector_count: self.points.len(),
            dimension: self.dimension,
            built_at_epoch_ms: self.built_at_epoch_ms,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn vector_count(&self) -> usize {
        self.points.len()
    }
}
