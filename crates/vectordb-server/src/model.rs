//! Entity types: `Library` -> `Document` -> `Chunk`, plus the index status
//! record each library carries for observability and the search gate.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vectordb_core::IndexerKind;

pub type Metadata = HashMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub text: String,
    pub embedding: Option<Vec<f32>>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub library_id: Uuid,
    pub name: String,
    pub metadata: Metadata,
    pub chunk_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    pub id: Uuid,
    pub name: String,
    pub metadata: Metadata,
    pub document_ids: Vec<Uuid>,
}

/// Observability snapshot of a library's indexing state, and the gate a
/// search request is checked against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatus {
    pub indexed: bool,
    pub indexing_in_progress: bool,
    pub indexer_type: Option<IndexerKind>,
    pub last_indexed: Option<u64>,
    pub error: Option<String>,
}

impl Default for IndexStatus {
    fn default() -> Self {
        Self {
            indexed: false,
            indexing_in_progress: false,
            indexer_type: None,
            last_indexed: None,
            error: None,
        }
    }
}

/// What gets written to disk per library: everything except embeddings,
/// which are always rebuilt at index time from chunk text (SPEC_FULL.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedLibrary {
    pub library: Library,
    pub documents: Vec<Document>,
    pub chunks: Vec<PersistedChunk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedChunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub text: String,
    pub metadata: Metadata,
}

impl From<&Chunk> for PersistedChunk {
    fn from(c: &Chunk) -> Self {
        Self {
            id: c.id,
            document_id: c.document_id,
            text: c.text.clone(),
            metadata: c.metadata.clone(),
        }
    }
}
