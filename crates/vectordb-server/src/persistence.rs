//! File-per-library JSON persistence sink.
//!
//! Grounded on the teacher's `persistence::directory::FsDirectory` (write via
//! a temp file, then atomic rename) but scoped down to exactly what this
//! system needs: one `library_{uuid}.json` file per library, written
//! best-effort after every mutation and read back wholesale at startup. The
//! teacher's `Directory` trait abstraction (filesystem/memory/S3-pluggable
//! backends) has no counterpart here — this system only ever runs against
//! local disk, so the trait indirection would be unused surface.
//!
//! Per SPEC_FULL.md §6/§7: write failures are logged, not surfaced, since
//! in-memory state is the source of truth and a cold restart may lose the
//! most recent unsaved change.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::model::{Chunk, Document, Library, PersistedChunk, PersistedLibrary};

pub struct PersistenceSink {
    data_dir: PathBuf,
}

impl PersistenceSink {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    fn path_for(&self, library_id: Uuid) -> PathBuf {
        self.data_dir.join(format!("library_{library_id}.json"))
    }

    /// Write a library's current snapshot to disk via write-temp-then-rename.
    /// Errors are logged and swallowed; the caller never sees them (§7).
    pub fn save_library(&self, library: &Library, documents: &[Document], chunks: &[Chunk]) {
        if let Err(e) = self.try_save_library(library, documents, chunks) {
            tracing::warn!(library_id = %library.id, error = %e, "failed to persist library snapshot");
        }
    }

    fn try_save_library(
        &self,
        library: &Library,
        documents: &[Document],
        chunks: &[Chunk],
    ) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        let snapshot = PersistedLibrary {
            library: library.clone(),
            documents: documents.to_vec(),
            chunks: chunks.iter().map(PersistedChunk::from).collect(),
        };
        let body = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let final_path = self.path_for(library.id);
        let tmp_path = final_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, body)?;
        std::fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }

    /// Delete a library's persisted file, if any. Missing files are not an
    /// error — the library may never have been saved (e.g. created and
    /// deleted within the same process lifetime before a mutation landed).
    pub fn delete_library(&self, library_id: Uuid) {
        let path = self.path_for(library_id);
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(library_id = %library_id, error = %e, "failed to remove persisted library file");
            }
        }
    }

    /// Load every `library_*.json` file in `data_dir`. Malformed files are
    /// logged and skipped rather than aborting startup.
    pub fn load_all(&self) -> Vec<PersistedLibrary> {
        let mut out = Vec::new();
        let Ok(entries) = std::fs::read_dir(&self.data_dir) else {
            return out;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !is_library_file(&path) {
                continue;
            }
            match load_one(&path) {
                Ok(snapshot) => out.push(snapshot),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to load persisted library"),
            }
        }
        out
    }

    /// Load the bundled seed library used when `TESTING_DATA=true`.
    pub fn load_seed(&self) -> Option<PersistedLibrary> {
        let bytes = include_str!("../seed/testing_library.json");
        match serde_json::from_str(bytes) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse bundled seed library");
                None
            }
        }
    }
}

fn is_library_file(path: &Path) -> bool {
    path.extension().map(|ext| ext == "json").unwrap_or(false)
        && path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.starts_with("library_"))
            .unwrap_or(false)
}

fn load_one(path: &Path) -> std::io::Result<PersistedLibrary> {
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Metadata;

    #[test]
    fn round_trips_a_library_without_embeddings() {
        let dir = tempfile_dir();
        let sink = PersistenceSink::new(&dir);

        let library = Library {
            id: Uuid::new_v4(),
            name: "docs".to_string(),
            metadata: Metadata::new(),
            document_ids: vec![],
        };
        let document = Document {
            id: Uuid::new_v4(),
            library_id: library.id,
            name: "doc1".to_string(),
            metadata: Metadata::new(),
            chunk_ids: vec![],
        };
        let chunk = Chunk {
            id: Uuid::new_v4(),
            document_id: document.id,
            text: "hello".to_string(),
            embedding: Some(vec![1.0, 0.0]),
            metadata: Metadata::new(),
        };

        sink.save_library(&library, &[document.clone()], &[chunk.clone()]);
        let loaded = sink.load_all();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].library.id, library.id);
        assert_eq!(loaded[0].chunks[0].id, chunk.id);
        assert_eq!(loaded[0].chunks[0].text, "hello");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn delete_is_idempotent_for_missing_file() {
        let dir = tempfile_dir();
        let sink = PersistenceSink::new(&dir);
        sink.delete_library(Uuid::new_v4());
        std::fs::remove_dir_all(&dir).ok();
    }

    fn tempfile_dir() -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("vectordb-persistence-test-{}", Uuid::new_v4()));
        dir
    }
}
