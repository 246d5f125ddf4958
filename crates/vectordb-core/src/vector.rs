//! Vector math over dense fixed-length float vectors.
//!
//! Provides the handful of primitives the indexers in
//! [`crate::indexer::exhaustive`] and [`crate::indexer::balltree`] are
//! built from: normalization, dot product, Euclidean distance,
//! centroids, and the ball-tree split seed.
//!
//! All embeddings handled by this crate are expected to be unit-normalized
//! before they reach an indexer; `normalize` is how callers get there.

use crate::error::Error;

/// Threshold for treating a norm as "effectively zero".
///
/// Chosen to be larger than `f32::EPSILON` (~1.19e-7) to provide numerical
/// headroom while remaining small enough to only catch truly degenerate
/// (all-zero, or near-all-zero) vectors.
const NORM_EPSILON: f32 = 1e-9;

/// Dot product of two equal-length vectors.
///
/// # Errors
///
/// Returns [`Error::DimMismatch`] if `a.len() != b.len()`.
pub fn dot(a: &[f32], b: &[f32]) -> Result<f32, Error> {
    if a.len() != b.len() {
        return Err(Error::DimMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

/// L2 norm of a vector.
pub fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Euclidean distance between two equal-length vectors.
///
/// # Errors
///
/// Returns [`Error::DimMismatch`] if `a.len() != b.len()`.
pub fn euclid(a: &[f32], b: &[f32]) -> Result<f32, Error> {
    if a.len() != b.len() {
        return Err(Error::DimMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt())
}

/// Divide a vector by its L2 norm, producing a unit vector.
///
/// # Errors
///
/// Returns [`Error::BadVector`] if `v` has an effectively-zero norm
/// (nothing meaningful to normalize towards).
pub fn normalize(v: &[f32]) -> Result<Vec<f32>, Error> {
    let n = norm(v);
    if n <= NORM_EPSILON {
        return Err(Error::BadVector("zero (or near-zero) norm".to_string()));
    }
    Ok(v.iter().map(|x| x / n).collect())
}

/// Arithmetic mean of a non-empty set of equal-length vectors.
///
/// The result is **not** re-normalized: ball-tree centers live in the
/// ambient (non-unit-sphere) space, not on the unit sphere.
///
/// # Errors
///
/// Returns [`Error::BadVector`] if `points` is empty, or
/// [`Error::DimMismatch`] if the vectors disagree on length.
pub fn centroid(points: &[&[f32]]) -> Result<Vec<f32>, Error> {
    let Some(&first) = points.first() else {
        return Err(Error::BadVector("cannot take centroid of empty set".to_string()));
    };
    let dim = first.len();
    let mut sum = vec![0.0f32; dim];
    for p in points {
        if p.len() != dim {
            return Err(Error::DimMismatch {
                expected: dim,
                actual: p.len(),
            });
        }
        for (s, x) in sum.iter_mut().zip(p.iter()) {
            *s += x;
        }
    }
    let n = points.len() as f32;
    for s in sum.iter_mut() {
        *s /= n;
    }
    Ok(sum)
}

/// Maximum Euclidean distance from `center` to any point in `points`.
///
/// Returns `0.0` for an empty set (a degenerate, but harmless, ball).
///
/// # Errors
///
/// Returns [`Error::DimMismatch`] if any point disagrees with `center` on length.
pub fn radius(center: &[f32], points: &[&[f32]]) -> Result<f32, Error> {
    let mut r = 0.0f32;
    for p in points {
        let d = euclid(center, p)?;
        if d > r {
            r = d;
        }
    }
    Ok(r)
}

/// Pick a split seed pair for ball-tree partitioning.
///
/// Algorithm: take `x0 = points[0]`, let `x1 = argmax_x ‖x − x0‖`, then
/// `x2 = argmax_x ‖x − x1‖`. Returns the *indices into `points`* of `x1`
/// and `x2`. Deterministic given input ordering (ties keep the
/// lowest-indexed point).
///
/// # Errors
///
/// Returns [`Error::BadVector`] if `points` has fewer than 2 elements
/// (there is no meaningful pair to seed a split with).
pub fn furthest_pair_seed(points: &[&[f32]]) -> Result<(usize, usize), Error> {
    if points.len() < 2 {
        return Err(Error::BadVector(
            "need at least 2 points to seed a split".to_string(),
        ));
    }
    let x0 = points[0];
    let mut x1_idx = 0usize;
    let mut x1_dist = -1.0f32;
    for (i, p) in points.iter().enumerate() {
        let d = euclid(x0, p)?;
        if d > x1_dist {
            x1_dist = d;
            x1_idx = i;
        }
    }
    let x1 = points[x1_idx];
    let mut x2_idx = 0usize;
    let mut x2_dist = -1.0f32;
    for (i, p) in points.iter().enumerate() {
        let d = euclid(x1, p)?;
        if d > x2_dist {
            x2_dist = d;
            x2_idx = i;
        }
    }
    Ok((x1_idx, x2_idx))
}
