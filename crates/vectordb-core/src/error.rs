//! Error types for vectordb-core.

use thiserror::Error;

/// Errors produced by vector math and the indexers built on top of it.
///
/// This is deliberately narrow: core only ever fails on a dimension
/// mismatch or an unusable vector. Everything else (missing entities,
/// lifecycle states, persistence, embedding calls) is the server crate's
/// concern and is folded in there via `#[from]`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Two vectors (or a vector and an index) disagree on dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimMismatch { expected: usize, actual: usize },

    /// A vector cannot be used as given (e.g. zero norm under `normalize`).
    #[error("bad vector: {0}")]
    BadVector(String),
}

pub type Result<T> = std::result::Result<T, Error>;
