//! Ball-tree nearest-neighbor indexer.
//!
//! A binary space-partitioning tree over hyperspheres: every node is a
//! ball (center + radius) bounding the points beneath it, which lets
//! search prune whole subtrees whose best achievable similarity can't
//! beat what's already in hand.
//!
//! Construction and node shape are grounded on a teacher brute-force
//! ball-tree implementation, but the split seed and search are not: the
//! teacher picks its split pair via an O(n²) all-pairs scan and its
//! search always descends into both children ("traverse both,
//! optimization: add pruning" in the original comment). This version
//! uses the O(n) two-hop `furthest_pair_seed` and a real best-first
//! search bounded by the admissible upper bound
//! `dot(q, center) + radius`.

use std::collections::BinaryHeap;

use crate::error::Error;
use crate::indexer::topk::TopK;
use crate::indexer::{IndexStats, IndexerKind};
use crate::vector;

/// A ball-tree index: immutable once built, re-indexing replaces it wholesale.
pub struct BallTreeIndex {
    /// Struct-of-arrays vector storage; point `i` occupies
    /// `vectors[i*dimension .. (i+1)*dimension]`.
    vectors: Vec<f32>,
    ids: Vec<u128>,
    dimension: usize,
    leaf_size: usize,
    root: Option<BallNode>,
    built_at_epoch_ms: u64,
}

enum BallNode {
    Internal {
        center: Vec<f32>,
        radius: f32,
        left: Box<BallNode>,
        right: Box<BallNode>,
    },
    Leaf {
        members: Vec<usize>,
        center: Vec<f32>,
        radius: f32,
    },
}

impl BallNode {
    fn bounds(&self) -> (&[f32], f32) {
        match self {
            BallNode::Internal { center, radius, .. } => (center, *radius),
            BallNode::Leaf { center, radius, .. } => (center, *radius),
        }
    }
}

impl BallTreeIndex {
    /// Build a ball tree over `points` with the given `leaf_size`.
    ///
    /// An empty `points` list produces an empty tree (search on it then
    /// returns `[]`, not an error), per the boundary behavior.
    pub fn build(
        points: Vec<(u128, Vec<f32>)>,
        leaf_size: usize,
        built_at_epoch_ms: u64,
    ) -> Result<Self, Error> {
        let dimension = points.first().map(|(_, v)| v.len()).unwrap_or(0);
        let n = points.len();
        let mut ids = Vec::with_capacity(n);
        let mut vectors = Vec::with_capacity(n * dimension);
        for (id, v) in points {
            if v.len() != dimension {
                return Err(Error::DimMismatch {
                    expected: dimension,
                    actual: v.len(),
                });
            }
            ids.push(id);
            vectors.extend_from_slice(&v);
        }

        let mut index = Self {
            vectors,
            ids,
            dimension,
            leaf_size: leaf_size.max(1),
            root: None,
            built_at_epoch_ms,
        };

        if n > 0 {
            let positions: Vec<usize> = (0..n).collect();
            index.root = Some(index.build_tree(positions)?);
        }

        Ok(index)
    }

    fn get_vector(&self, pos: usize) -> &[f32] {
        let start = pos * self.dimension;
        &self.vectors[start..start + self.dimension]
    }

    fn build_tree(&self, members: Vec<usize>) -> Result<BallNode, Error> {
        let refs: Vec<&[f32]> = members.iter().map(|&p| self.get_vector(p)).collect();
        let center = vector::centroid(&refs)?;
        let radius = vector::radius(&center, &refs)?;

        if members.len() <= self.leaf_size || members.len() < 2 {
            return Ok(BallNode::Leaf {
                members,
                center,
                radius,
            });
        }

        let (seed_a_local, seed_b_local) = vector::furthest_pair_seed(&refs)?;
        let seed_a = self.get_vector(members[seed_a_local]);
        let seed_b = self.get_vector(members[seed_b_local]);

        let mut left = Vec::new();
        let mut right = Vec::new();
        for &pos in &members {
            let v = self.get_vector(pos);
            let da = vector::euclid(v, seed_a)?;
            let db = vector::euclid(v, seed_b)?;
            // Ties go to side `a` (left).
            if da <= db {
                left.push(pos);
            } else {
                right.push(pos);
            }
        }

        if left.is_empty() {
            // All points equidistant to seed_a; rebalance by moving the
            // point furthest from seed_a back across to the left.
            let furthest = Self::argmax_distance(&right, seed_a, self)?;
            let idx = right.iter().position(|&p| p == furthest).unwrap();
            left.push(right.remove(idx));
        } else if right.is_empty() {
            let furthest = Self::argmax_distance(&left, seed_b, self)?;
            let idx = left.iter().position(|&p| p == furthest).unwrap();
            right.push(left.remove(idx));
        }

        if left.is_empty() || right.is_empty() {
            // Still degenerate after rebalancing; fall back to a leaf.
            return Ok(BallNode::Leaf {
                members,
                center,
                radius,
            });
        }

        let left_node = self.build_tree(left)?;
        let right_node = self.build_tree(right)?;
        Ok(BallNode::Internal {
            center,
            radius,
            left: Box::new(left_node),
            right: Box::new(right_node),
        })
    }

    fn argmax_distance(positions: &[usize], target: &[f32], this: &Self) -> Result<usize, Error> {
        let mut best_pos = positions[0];
        let mut best_dist = -1.0f32;
        for &pos in positions {
            let d = vector::euclid(this.get_vector(pos), target)?;
            if d > best_dist {
                best_dist = d;
                best_pos = pos;
            }
        }
        Ok(best_pos)
    }

    /// Best-first pruned search for the `k` nearest neighbors by cosine
    /// similarity. Returns `[]` on an empty tree rather than erroring.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u128, f32)>, Error> {
        let Some(root) = self.root.as_ref() else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(Error::DimMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        let q = vector::normalize(query)?;

        let mut best = TopK::new(k);
        let mut queue: BinaryHeap<QueueEntry<'_>> = BinaryHeap::new();
        queue.push(self.entry_for(root, &q)?);

        while let Some(QueueEntry { ub, node }) = queue.pop() {
            if let Some(min_score) = best.min_score() {
                if ub <= min_score {
                    break;
                }
            }
            match node {
                BallNode::Leaf { members, .. } => {
                    for &pos in members {
                        let score = vector::dot(&q, self.get_vector(pos))?;
                        best.offer(self.ids[pos], score);
                    }
                }
                BallNode::Internal { left, right, .. } => {
                    queue.push(self.entry_for(left, &q)?);
                    queue.push(self.entry_for(right, &q)?);
                }
            }
        }

        Ok(best.into_sorted_vec())
    }

    fn entry_for<'a>(&self, node: &'a BallNode, q: &[f32]) -> Result<QueueEntry<'a>, Error> {
        let (center, radius) = node.bounds();
        let ub = vector::dot(q, center)? + radius;
        Ok(QueueEntry { ub, node })
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            kind: IndexerKind::BallTree,
            vector_count: self.ids.len(),
            dimension: self.dimension,
            built_at_epoch_ms: self.built_at_epoch_ms,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn vector_count(&self) -> usize {
        self.ids.len()
    }
}

/// A node queued for best-first traversal, ordered by its upper bound.
struct QueueEntry<'a> {
    ub: f32,
    node: &'a BallNode,
}

impl PartialEq for QueueEntry<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.ub == other.ub
    }
}
impl Eq for QueueEntry<'_> {}
impl PartialOrd for QueueEntry<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueueEntry<'_> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ub.partial_cmp(&other.ub).unwrap_or(std::cmp::Ordering::Equal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::exhaustive::ExhaustiveIndex;

    fn unit(v: Vec<f32>) -> Vec<f32> {
        vector::normalize(&v).unwrap()
    }

    #[test]
    fn empty_tree_build_and_search() {
        let idx = BallTreeIndex::build(Vec::new(), 40, 0).unwrap();
        assert_eq!(idx.search(&[1.0, 0.0], 5).unwrap(), Vec::new());
    }

    #[test]
    fn k_larger_than_n_returns_all() {
        let points = vec![(1u128, unit(vec![1.0, 0.0])), (2u128, unit(vec![0.0, 1.0]))];
        let idx = BallTreeIndex::build(points, 1, 0).unwrap();
        let results = idx.search(&[1.0, 0.0], 10).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn search_matches_exhaustive_on_small_set() {
        let raw = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![0.9, 0.1, 0.0],
            vec![0.1, 0.9, 0.1],
        ];
        let points: Vec<(u128, Vec<f32>)> = raw
            .iter()
            .enumerate()
            .map(|(i, v)| (i as u128, unit(v.clone())))
            .collect();

        let ball = BallTreeIndex::build(points.clone(), 2, 0).unwrap();
        let flat = ExhaustiveIndex::build(points, 0).unwrap();

        let query = [1.0, 0.2, 0.0];
        let k = 3;
        let ball_results = ball.search(&query, k).unwrap();
        let flat_results = flat.search(&query, k).unwrap();

        let mut ball_ids: Vec<u128> = ball_results.iter().map(|(id, _)| *id).collect();
        let mut flat_ids: Vec<u128> = flat_results.iter().map(|(id, _)| *id).collect();
        ball_ids.sort();
        flat_ids.sort();
        assert_eq!(ball_ids, flat_ids);
    }

    #[test]
    fn upper_bound_is_admissible() {
        // For a small tree, every leaf's points must satisfy
        // dot(q, p) <= dot(q, center) + radius + epsilon.
        let raw: Vec<Vec<f32>> = (0..20)
            .map(|i| {
                let t = i as f32;
                unit(vec![t.sin(), t.cos(), (t * 0.5).sin()])
            })
            .collect();
        let points: Vec<(u128, Vec<f32>)> = raw
            .iter()
            .enumerate()
            .map(|(i, v)| (i as u128, v.clone()))
            .collect();
        let tree = BallTreeIndex::build(points, 4, 0).unwrap();
        let root = tree.root.as_ref().unwrap();
        let q = unit(vec![0.3, 0.7, 0.1]);

        fn check(node: &BallNode, q: &[f32], tree: &BallTreeIndex) {
            let (center, radius) = node.bounds();
            let ub = vector::dot(q, center).unwrap() + radius;
            match node {
                BallNode::Leaf { members, .. } => {
                    for &pos in members {
                        let score = vector::dot(q, tree.get_vector(pos)).unwrap();
                        assert!(score <= ub + 1e-6, "score {score} exceeds bound {ub}");
                    }
                }
                BallNode::Internal { left, right, .. } => {
                    check(left, q, tree);
                    check(right, q, tree);
                }
            }
        }
        check(root, &q, &tree);
    }

    #[test]
    fn dimension_mismatch_on_search() {
        let points = vec![(1u128, unit(vec![1.0, 0.0, 0.0]))];
        let idx = BallTreeIndex::build(points, 40, 0).unwrap();
        assert!(matches!(
            idx.search(&[1.0, 0.0], 1),
            Err(Error::DimMismatch { .. })
        ));
    }
}
