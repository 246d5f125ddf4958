//! Error type for the store, lifecycle, embedding client, persistence, and
//! REST facade, with a mapping onto HTTP status codes at the boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
    #[error("library {0} not found")]
    LibraryNotFound(Uuid),

    #[error("document {0} not found")]
    DocumentNotFound(Uuid),

    #[error("chunk {0} not found")]
    ChunkNotFound(Uuid),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Vector(#[from] vectordb_core::Error),

    #[error("library is not indexed")]
    NotIndexed,

    #[error("library is already being indexed")]
    AlreadyIndexing,

    #[error("index build was superseded by a concurrent mutation")]
    Superseded,

    #[error("invalid lifecycle transition: {0}")]
    InvalidState(String),

    #[error("embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("embedding provider authentication failed")]
    EmbeddingAuth,

    #[error("embedding provider returned a malformed response: {0}")]
    EmbeddingProtocol(String),

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The machine-readable error tag surfaced in the JSON error body.
    fn tag(&self) -> &'static str {
        match self {
            Error::LibraryNotFound(_) | Error::DocumentNotFound(_) | Error::ChunkNotFound(_) => {
                "NotFound"
            }
            Error::Validation(_) => "Validation",
            Error::Vector(vectordb_core::Error::DimMismatch { .. }) => "DimMismatch",
            Error::Vector(vectordb_core::Error::BadVector(_)) => "BadVector",
            Error::NotIndexed => "NotIndexed",
            Error::AlreadyIndexing => "AlreadyIndexing",
            Error::Superseded => "Superseded",
            Error::InvalidState(_) => "InvalidState",
            Error::EmbeddingUnavailable(_) => "EmbeddingUnavailable",
            Error::EmbeddingAuth => "EmbeddingAuth",
            Error::EmbeddingProtocol(_) => "EmbeddingProtocol",
            Error::Persistence(_) => "Persistence",
            Error::Internal(_) => "Internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::LibraryNotFound(_) | Error::DocumentNotFound(_) | Error::ChunkNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Error::Validation(_) | Error::Vector(_) => StatusCode::BAD_REQUEST,
            Error::NotIndexed | Error::AlreadyIndexing | Error::Superseded | Error::InvalidState(_) => {
                StatusCode::CONFLICT
            }
            Error::EmbeddingUnavailable(_) | Error::EmbeddingAuth | Error::EmbeddingProtocol(_) => {
                StatusCode::BAD_GATEWAY
            }
            Error::Persistence(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal error");
        }
        let body = ErrorBody {
            error: self.tag(),
            message: self.to_string(),
        };
        (status, axum::Json(body)).into_response()
    }
}
