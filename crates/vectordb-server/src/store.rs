//! Hierarchical library -> document -> chunk store.
//!
//! Three tables, one `parking_lot::RwLock` each, so lock acquisition is
//! explicit at every call site rather than hidden behind a lock-striped
//! map. Lock ordering is always library -> document -> chunk; operations
//! spanning tables acquire them in that order and release before calling
//! out (notably before notifying the lifecycle manager, and before any
//! embedding call).
//!
//! A library's forward ownership list (`Library::document_ids`,
//! `Document::chunk_ids`) doubles as the "reverse index" the design calls
//! for: given a document, its owning library is `chunk.document_id`'s
//! parent; given a library, its documents are exactly
//! `library.document_ids`. Keeping one copy of this relationship (rather
//! than a separate lookup map that could drift) is what invariant 2 in
//! SPEC_FULL.md §3 is checking.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{Chunk, Document, Library, Metadata};

/// Emitted for every mutation that should invalidate a library's index.
/// Embedding-fill writes are index-internal and never emit this.
pub type InvalidationSender = mpsc::UnboundedSender<Uuid>;

pub struct Store {
    libraries: RwLock<HashMap<Uuid, Library>>,
    documents: RwLock<HashMap<Uuid, Document>>,
    chunks: RwLock<HashMap<Uuid, Chunk>>,
    invalidations: InvalidationSender,
}

impl Store {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Uuid>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Self {
            libraries: RwLock::new(HashMap::new()),
            documents: RwLock::new(HashMap::new()),
            chunks: RwLock::new(HashMap::new()),
            invalidations: tx,
        };
        (Arc::new(store), rx)
    }

    fn invalidate(&self, library_id: Uuid) {
        // The receiver may have been dropped during shutdown; that's fine,
        // invalidation just becomes a no-op rather than an error.
        let _ = self.invalidations.send(library_id);
    }

    // ---- libraries ----

    pub fn create_library(&self, name: String, metadata: Metadata) -> Library {
        let library = Library {
            id: Uuid::new_v4(),
            name,
            metadata,
            document_ids: Vec::new(),
        };
        self.libraries.write().insert(library.id, library.clone());
        library
    }

    pub fn get_library(&self, id: Uuid) -> Result<Library> {
        self.libraries
            .read()
            .get(&id)
            .cloned()
            .ok_or(Error::LibraryNotFound(id))
    }

    pub fn list_libraries(&self) -> Vec<Library> {
        self.libraries.read().values().cloned().collect()
    }

    pub fn patch_library(&self, id: Uuid, name: Option<String>, metadata: Option<Metadata>) -> Result<Library> {
        let mut libraries = self.libraries.write();
        let library = libraries.get_mut(&id).ok_or(Error::LibraryNotFound(id))?;
        if let Some(name) = name {
            library.name = name;
        }
        if let Some(metadata) = metadata {
            library.metadata = metadata;
        }
        let updated = library.clone();
        drop(libraries);
        self.invalidate(id);
        Ok(updated)
    }

    /// Cascading delete: removes the library, all its documents, and all
    /// their chunks. No orphans survive.
    pub fn delete_library(&self, id: Uuid) -> Result<()> {
        let mut libraries = self.libraries.write();
        let library = libraries.remove(&id).ok_or(Error::LibraryNotFound(id))?;
        let mut documents = self.documents.write();
        let mut chunks = self.chunks.write();
        for document_id in library.document_ids {
            if let Some(document) = documents.remove(&document_id) {
                for chunk_id in document.chunk_ids {
                    chunks.remove(&chunk_id);
                }
            }
        }
        drop(chunks);
        drop(documents);
        drop(libraries);
        // The library is already gone from the table, but the lifecycle
        // manager still needs this signal: it's how an in-flight build gets
        // marked superseded and its entry evicted (SPEC_FULL.md §5).
        self.invalidate(id);
        Ok(())
    }

    // ---- documents ----

    pub fn create_document(&self, library_id: Uuid, name: String, metadata: Metadata) -> Result<Document> {
        let mut libraries = self.libraries.write();
        let library = libraries.get_mut(&library_id).ok_or(Error::LibraryNotFound(library_id))?;
        let document = Document {
            id: Uuid::new_v4(),
            library_id,
            name,
            metadata,
            chunk_ids: Vec::new(),
        };
        library.document_ids.push(document.id);
        self.documents.write().insert(document.id, document.clone());
        drop(libraries);
        self.invalidate(library_id);
        Ok(document)
    }

    pub fn get_document(&self, id: Uuid) -> Result<Document> {
        self.documents.read().get(&id).cloned().ok_or(Error::DocumentNotFound(id))
    }

    pub fn list_documents(&self, library_id: Uuid) -> Result<Vec<Document>> {
        let library = self.get_library(library_id)?;
        let documents = self.documents.read();
        Ok(library
            .document_ids
            .iter()
            .filter_map(|id| documents.get(id).cloned())
            .collect())
    }

    pub fn patch_document(&self, id: Uuid, name: Option<String>, metadata: Option<Metadata>) -> Result<Document> {
        let mut documents = self.documents.write();
        let document = documents.get_mut(&id).ok_or(Error::DocumentNotFound(id))?;
        if let Some(name) = name {
            document.name = name;
        }
        if let Some(metadata) = metadata {
            document.metadata = metadata;
        }
        let updated = document.clone();
        let library_id = updated.library_id;
        drop(documents);
        self.invalidate(library_id);
        Ok(updated)
    }

    /// Cascading delete: removes the document and all its chunks, and
    /// drops it from its library's `document_ids`.
    pub fn delete_document(&self, id: Uuid) -> Result<()> {
        let mut documents = self.documents.write();
        let document = documents.remove(&id).ok_or(Error::DocumentNotFound(id))?;
        let mut chunks = self.chunks.write();
        for chunk_id in &document.chunk_ids {
            chunks.remove(chunk_id);
        }
        drop(chunks);
        drop(documents);

        let mut libraries = self.libraries.write();
        if let Some(library) = libraries.get_mut(&document.library_id) {
            library.document_ids.retain(|d| *d != id);
        }
        drop(libraries);
        self.invalidate(document.library_id);
        Ok(())
    }

    // ---- chunks ----

    pub fn create_chunk(&self, document_id: Uuid, text: String, metadata: Metadata) -> Result<Chunk> {
        let mut documents = self.documents.write();
        let document = documents.get_mut(&document_id).ok_or(Error::DocumentNotFound(document_id))?;
        let chunk = Chunk {
            id: Uuid::new_v4(),
            document_id,
            text,
            embedding: None,
            metadata,
        };
        document.chunk_ids.push(chunk.id);
        let library_id = document.library_id;
        self.chunks.write().insert(chunk.id, chunk.clone());
        drop(documents);
        self.invalidate(library_id);
        Ok(chunk)
    }

    pub fn create_chunks_batch(&self, document_id: Uuid, inputs: Vec<(String, Metadata)>) -> Result<Vec<Chunk>> {
        let mut documents = self.documents.write();
        let document = documents.get_mut(&document_id).ok_or(Error::DocumentNotFound(document_id))?;
        let mut chunks = self.chunks.write();
        let mut created = Vec::with_capacity(inputs.len());
        for (text, metadata) in inputs {
            let chunk = Chunk {
                id: Uuid::new_v4(),
                document_id,
                text,
                embedding: None,
                metadata,
            };
            document.chunk_ids.push(chunk.id);
            chunks.insert(chunk.id, chunk.clone());
            created.push(chunk);
        }
        let library_id = document.library_id;
        drop(chunks);
        drop(documents);
        self.invalidate(library_id);
        Ok(created)
    }

    pub fn get_chunk(&self, id: Uuid) -> Result<Chunk> {
        self.chunks.read().get(&id).cloned().ok_or(Error::ChunkNotFound(id))
    }

    pub fn patch_chunk(&self, id: Uuid, text: Option<String>, metadata: Option<Metadata>) -> Result<Chunk> {
        let mut chunks = self.chunks.write();
        let chunk = chunks.get_mut(&id).ok_or(Error::ChunkNotFound(id))?;
        if let Some(text) = text {
            chunk.text = text;
            // Text changed; any prior embedding is now stale.
            chunk.embedding = None;
        }
        if let Some(metadata) = metadata {
            chunk.metadata = metadata;
        }
        let updated = chunk.clone();
        drop(chunks);
        let library_id = self.library_id_for_document(updated.document_id)?;
        self.invalidate(library_id);
        Ok(updated)
    }

    pub fn delete_chunk(&self, id: Uuid) -> Result<()> {
        let mut chunks = self.chunks.write();
        let chunk = chunks.remove(&id).ok_or(Error::ChunkNotFound(id))?;
        drop(chunks);

        let mut documents = self.documents.write();
        if let Some(document) = documents.get_mut(&chunk.document_id) {
            document.chunk_ids.retain(|c| *c != id);
        }
        let library_id = documents
            .get(&chunk.document_id)
            .map(|d| d.library_id)
            .ok_or(Error::DocumentNotFound(chunk.document_id))?;
        drop(documents);
        self.invalidate(library_id);
        Ok(())
    }

    /// Write an embedding back into a chunk without emitting an
    /// invalidation signal — this is the index-internal fill described in
    /// SPEC_FULL.md §4.6 step 2, not a user mutation.
    pub fn set_chunk_embedding(&self, id: Uuid, embedding: Vec<f32>) -> Result<()> {
        let mut chunks = self.chunks.write();
        let chunk = chunks.get_mut(&id).ok_or(Error::ChunkNotFound(id))?;
        chunk.embedding = Some(embedding);
        Ok(())
    }

    fn library_id_for_document(&self, document_id: Uuid) -> Result<Uuid> {
        self.documents
            .read()
            .get(&document_id)
            .map(|d| d.library_id)
            .ok_or(Error::DocumentNotFound(document_id))
    }

    /// All chunks currently owned by `library_id`, in document order.
    /// Used by the lifecycle build procedure to snapshot and re-validate.
    pub fn snapshot_chunks(&self, library_id: Uuid) -> Result<Vec<Chunk>> {
        let library = self.get_library(library_id)?;
        let documents = self.documents.read();
        let chunks = self.chunks.read();
        let mut result = Vec::new();
        for document_id in &library.document_ids {
            let Some(document) = documents.get(document_id) else {
                continue;
            };
            for chunk_id in &document.chunk_ids {
                if let Some(chunk) = chunks.get(chunk_id) {
                    result.push(chunk.clone());
                }
            }
        }
        Ok(result)
    }

    pub fn chunk_count(&self, library_id: Uuid) -> Result<usize> {
        Ok(self.snapshot_chunks(library_id)?.len())
    }

    /// Full persistence snapshot of one library: the library record, its
    /// documents, and their chunks (without embeddings — callers strip
    /// those when serializing).
    pub fn snapshot_library(&self, library_id: Uuid) -> Result<(Library, Vec<Document>, Vec<Chunk>)> {
        let library = self.get_library(library_id)?;
        let documents = self.list_documents(library_id)?;
        let chunks = self.snapshot_chunks(library_id)?;
        Ok((library, documents, chunks))
    }

    /// Restore a library (and its documents/chunks) from a persisted
    /// snapshot, e.g. at startup. Does not emit an invalidation signal —
    /// the library starts `idle`/`stale`, which the lifecycle manager
    /// assigns directly.
    pub fn restore_library(&self, library: Library, documents: Vec<Document>, chunks: Vec<Chunk>) {
        self.libraries.write().insert(library.id, library);
        let mut doc_table = self.documents.write();
        for document in documents {
            doc_table.insert(document.id, document);
        }
        drop(doc_table);
        let mut chunk_table = self.chunks.write();
        for chunk in chunks {
            chunk_table.insert(chunk.id, chunk);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_store() -> Arc<Store> {
        Store::new().0
    }

    #[test]
    fn create_and_fetch_library() {
        let store = new_store();
        let lib = store.create_library("docs".to_string(), Metadata::new());
        assert_eq!(store.get_library(lib.id).unwrap().name, "docs");
    }

    #[test]
    fn cascading_document_delete_removes_chunks() {
        let store = new_store();
        let lib = store.create_library("docs".to_string(), Metadata::new());
        let doc = store.create_document(lib.id, "doc1".to_string(), Metadata::new()).unwrap();
        let chunk = store.create_chunk(doc.id, "hello".to_string(), Metadata::new()).unwrap();

        store.delete_document(doc.id).unwrap();
        assert!(matches!(store.get_document(doc.id), Err(Error::DocumentNotFound(_))));
        assert!(matches!(store.get_chunk(chunk.id), Err(Error::ChunkNotFound(_))));
        assert!(store.get_library(lib.id).unwrap().document_ids.is_empty());
    }

    #[test]
    fn cascading_library_delete_removes_everything() {
        let store = new_store();
        let lib = store.create_library("docs".to_string(), Metadata::new());
        let doc = store.create_document(lib.id, "doc1".to_string(), Metadata::new()).unwrap();
        let chunk = store.create_chunk(doc.id, "hello".to_string(), Metadata::new()).unwrap();

        store.delete_library(lib.id).unwrap();
        assert!(matches!(store.get_library(lib.id), Err(Error::LibraryNotFound(_))));
        assert!(matches!(store.get_document(doc.id), Err(Error::DocumentNotFound(_))));
        assert!(matches!(store.get_chunk(chunk.id), Err(Error::ChunkNotFound(_))));
    }

    #[test]
    fn delete_document_leaves_siblings_intact() {
        let store = new_store();
        let lib = store.create_library("docs".to_string(), Metadata::new());
        let doc_a = store.create_document(lib.id, "a".to_string(), Metadata::new()).unwrap();
        let doc_b = store.create_document(lib.id, "b".to_string(), Metadata::new()).unwrap();
        store.create_chunk(doc_a.id, "hello".to_string(), Metadata::new()).unwrap();
        let chunk_b = store.create_chunk(doc_b.id, "world".to_string(), Metadata::new()).unwrap();

        store.delete_document(doc_a.id).unwrap();
        assert!(store.get_document(doc_b.id).is_ok());
        assert!(store.get_chunk(chunk_b.id).is_ok());
    }

    #[test]
    fn create_chunk_under_missing_document_fails() {
        let store = new_store();
        let result = store.create_chunk(Uuid::new_v4(), "x".to_string(), Metadata::new());
        assert!(matches!(result, Err(Error::DocumentNotFound(_))));
    }

    #[tokio::test]
    async fn mutation_emits_invalidation_signal() {
        let (store, mut rx) = Store::new();
        let lib = store.create_library("docs".to_string(), Metadata::new());
        // create_library itself doesn't invalidate (nothing to invalidate yet);
        // the first signal comes from create_document.
        store.create_document(lib.id, "doc1".to_string(), Metadata::new()).unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received, lib.id);
    }

    #[test]
    fn embedding_fill_does_not_invalidate() {
        let (store, mut rx) = Store::new();
        let lib = store.create_library("docs".to_string(), Metadata::new());
        let doc = store.create_document(lib.id, "doc1".to_string(), Metadata::new()).unwrap();
        let chunk = store.create_chunk(doc.id, "hello".to_string(), Metadata::new()).unwrap();
        // Drain the two signals already emitted above.
        rx.try_recv().unwrap();
        rx.try_recv().unwrap();

        store.set_chunk_embedding(chunk.id, vec![1.0, 0.0]).unwrap();
        assert!(rx.try_recv().is_err());
    }
}
