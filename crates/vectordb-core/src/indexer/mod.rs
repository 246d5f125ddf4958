//! Uniform indexer contract and the closed registry of indexer kinds.
//!
//! This generalizes the unified `ANNIndex` trait pattern (build/search/stats
//! over a common shape) down to exactly the two indexers this system needs:
//! [`Exhaustive`](exhaustive::ExhaustiveIndex) and
//! [`BallTree`](balltree::BallTreeIndex). The set is closed by design (see
//! `IndexerKind`), so a tagged enum stands in for the trait-object registry
//! a larger system would use.

pub mod balltree;
pub mod exhaustive;
mod topk;

use crate::error::Error;
use exhaustive::ExhaustiveIndex;

/// The two nearest-neighbor indexing strategies this system supports.
///
/// Public surface deliberately stays closed at these two variants (see
/// component D of the design: "the public surface only names the two
/// above"); extending the registry means adding a variant here and to
/// [`AnyIndex`], not opening up a string-keyed plugin mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexerKind {
    Exhaustive,
    BallTree,
}

impl IndexerKind {
    /// Parse a case-insensitive indexer type tag, as accepted over the wire.
    ///
    /// Accepts `BRUTE_FORCE`/`EXHAUSTIVE` for [`IndexerKind::Exhaustive`] and
    /// `BALL_TREE` for [`IndexerKind::BallTree`], matching any case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BRUTE_FORCE" | "EXHAUSTIVE" => Some(IndexerKind::Exhaustive),
            "BALL_TREE" | "BALLTREE" => Some(IndexerKind::BallTree),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexerKind::Exhaustive => "BRUTE_FORCE",
            IndexerKind::BallTree => "BALL_TREE",
        }
    }
}

// Hand-written rather than derived: the wire format (`BRUTE_FORCE`/`BALL_TREE`,
// §6) doesn't match the Rust variant names, and `indexer_type` needs to
// round-trip identically through a request body and a later status response.
#[cfg(feature = "serde")]
impl serde::Serialize for IndexerKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for IndexerKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        IndexerKind::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown indexer_type {s:?}")))
    }
}

/// Observability snapshot for an installed index.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexStats {
    pub kind: IndexerKind,
    pub vector_count: usize,
    pub dimension: usize,
    pub built_at_epoch_ms: u64,
}

/// Parameters accepted by [`build_index`], beyond the point set itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexParams {
    /// Leaf size for [`IndexerKind::BallTree`]; ignored for `Exhaustive`.
    /// Defaults to 40 when `None`.
    pub leaf_size: Option<usize>,
}

/// A built, queryable index: the uniform `{search, stats}` half of the
/// contract. Building happens once, up front, via [`build_index`] — the
/// indexers themselves are immutable after construction (ball tree) or
/// simply don't need mutation (exhaustive scan is just an array).
pub trait Index: Send + Sync {
    /// Find the `k` nearest neighbors to `query` by cosine similarity.
    ///
    /// `query` need not be pre-normalized; implementations normalize it.
    /// Returns `(chunk_id, score)` pairs sorted by score descending.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u128, f32)>, Error>;

    fn stats(&self) -> IndexStats;

    fn dimension(&self) -> usize;

    fn vector_count(&self) -> usize;
}

/// A built index, closed over the two supported kinds.
///
/// `chunk_id`s are represented as `u128` here (core has no notion of
/// `Uuid`; the server crate maps `Uuid::as_u128()` at the boundary).
pub enum AnyIndex {
    Exhaustive(ExhaustiveIndex),
    BallTree(balltree::BallTreeIndex),
}

impl Index for AnyIndex {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u128, f32)>, Error> {
        match self {
            AnyIndex::Exhaustive(idx) => idx.search(query, k),
            AnyIndex::BallTree(idx) => idx.search(query, k),
        }
    }

    fn stats(&self) -> IndexStats {
        match self {
            AnyIndex::Exhaustive(idx) => idx.stats(),
            AnyIndex::BallTree(idx) => idx.stats(),
        }
    }

    fn dimension(&self) -> usize {
        match self {
            AnyIndex::Exhaustive(idx) => idx.dimension(),
            AnyIndex::BallTree(idx) => idx.dimension(),
        }
    }

    fn vector_count(&self) -> usize {
        match self {
            AnyIndex::Exhaustive(idx) => idx.vector_count(),
            AnyIndex::BallTree(idx) => idx.vector_count(),
        }
    }
}

/// Build an index of the requested kind over `points`.
///
/// `points` is `(chunk_id, unit_vector)`; vectors must already be
/// unit-normalized (callers are the library lifecycle, which normalizes
/// at embed time) and must share one dimension `D`, else `Error::DimMismatch`.
///
/// `built_at_epoch_ms` is supplied by the caller rather than read from the
/// system clock here, keeping this crate free of a wall-clock dependency.
pub fn build_index(
    kind: IndexerKind,
    points: Vec<(u128, Vec<f32>)>,
    params: IndexParams,
    built_at_epoch_ms: u64,
) -> Result<AnyIndex, Error> {
    match kind {
        IndexerKind::Exhaustive => {
            Ok(AnyIndex::Exhaustive(ExhaustiveIndex::build(points, built_at_epoch_ms)?))
        }
        IndexerKind::BallTree => {
            let leaf_size = params.leaf_size.unwrap_or(40);
            Ok(AnyIndex::BallTree(balltree::BallTreeIndex::build(
                points,
                leaf_size,
                built_at_epoch_ms,
            )?))
        }
    }
}
