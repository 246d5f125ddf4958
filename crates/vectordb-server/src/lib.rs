//! Hierarchical library -> document -> chunk store, the per-library
//! indexing lifecycle state machine, an embedding client, a file-per-library
//! JSON persistence sink, and the REST facade that ties them together.
//!
//! This crate is components E-I of the vector database design: everything
//! that isn't pure vector math or indexing (that's [`vectordb_core`]).
//!
//! # Modules
//!
//! - [`model`]: `Library`/`Document`/`Chunk` entities and the persisted
//!   (embedding-free) variants written to disk.
//! - [`store`]: the three-table hierarchical store, its reverse-lookup
//!   invariants, and cascading delete.
//! - [`lifecycle`]: the `idle`/`building`/`ready`/`stale`/`failed` state
//!   machine that gates search and drives index (re)builds.
//! - [`embedding`]: the batched, retrying text-to-vector client.
//! - [`persistence`]: best-effort file-per-library JSON snapshots.
//! - [`config`]: environment-variable process configuration.
//! - [`context`]: [`context::AppContext`], wiring the above together.
//! - [`http`]: the `axum` REST surface over [`context::AppContext`].
//! - [`error`]: the unified error type and its HTTP status mapping.

pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod model;
pub mod persistence;
pub mod store;

pub use context::AppContext;
pub use error::{Error, Result};
