//! In-memory similarity indexing over unit-normalized dense embeddings.
//!
//! This crate is the pure math and indexing layer underneath a small
//! vector database: given a set of `(id, vector)` pairs it builds a
//! queryable nearest-neighbor index and answers top-k cosine-similarity
//! queries against it. It knows nothing about libraries, documents,
//! chunks, embedding providers, or HTTP — those live one layer up, in
//! the server crate that links against this one.
//!
//! # Modules
//!
//! - [`vector`]: dot product, norms, Euclidean distance, centroids, and
//!   the ball-tree split seed.
//! - [`indexer`]: the [`indexer::Index`] trait, the closed
//!   [`indexer::IndexerKind`] registry, and the two concrete
//!   implementations ([`indexer::exhaustive`], [`indexer::balltree`]).
//! - [`error`]: the narrow [`Error`] type this crate can fail with.
//!
//! # Example
//!
//! ```rust
//! use vectordb_core::indexer::{build_index, IndexerKind, IndexParams, Index};
//!
//! let points = vec![
//!     (1u128, vec![1.0, 0.0]),
//!     (2u128, vec![0.0, 1.0]),
//! ];
//! let index = build_index(IndexerKind::Exhaustive, points, IndexParams::default(), 0).unwrap();
//! let results = index.search(&[1.0, 0.0], 1).unwrap();
//! assert_eq!(results[0].0, 1);
//! ```

pub mod error;
pub mod indexer;
pub mod vector;

pub use error::{Error, Result};
pub use indexer::{build_index, AnyIndex, Index, IndexParams, IndexStats, IndexerKind};
