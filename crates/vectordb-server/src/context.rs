//! Process-wide application context: the `Store`, `LibraryLifecycle`,
//! embedding client, and persistence sink, wired together and handed to
//! every HTTP handler by reference.
//!
//! Grounded on SPEC_FULL.md §9's explicit redesign note: "global mutable
//! store accessed through an imported symbol: replace with an explicit
//! `AppContext`". This type is that replacement — no module-level statics
//! anywhere in this crate.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::AppConfig;
use crate::embedding::{CohereEmbeddingClient, EmbeddingClient, MissingCredentialClient};
use crate::lifecycle::LibraryLifecycle;
use crate::persistence::PersistenceSink;
use crate::store::Store;

pub struct AppContext {
    pub store: Arc<Store>,
    pub lifecycle: Arc<LibraryLifecycle>,
    pub persistence: Arc<PersistenceSink>,
    pub config: AppConfig,
}

impl AppContext {
    /// Build the context and load whatever is already on disk. Does not
    /// start the HTTP server — that's `main`'s job, so this stays testable
    /// without binding a socket.
    pub fn bootstrap(config: AppConfig) -> Arc<Self> {
        let (store, invalidation_rx) = Store::new();
        let persistence = Arc::new(PersistenceSink::new(&config.data_dir));

        let embedder: Arc<dyn EmbeddingClient> = match &config.cohere_api_key {
            Some(key) => Arc::new(CohereEmbeddingClient::new(key.clone(), config.embedding)),
            None => {
                tracing::warn!("COHERE_API_KEY not set; embedding calls will fail with EmbeddingAuth");
                Arc::new(MissingCredentialClient)
            }
        };

        let lifecycle = LibraryLifecycle::spawn(store.clone(), invalidation_rx, embedder);

        let ctx = Arc::new(Self {
            store,
            lifecycle,
            persistence,
            config,
        });
        ctx.load_from_disk();
        ctx
    }

    fn load_from_disk(&self) {
        let mut snapshots = self.persistence.load_all();
        if self.config.testing_data {
            if let Some(seed) = self.persistence.load_seed() {
                snapshots.push(seed);
            }
        }
        for snapshot in snapshots {
            let library_id = snapshot.library.id;
            let chunks = snapshot
                .chunks
                .into_iter()
                .map(|c| crate::model::Chunk {
                    id: c.id,
                    document_id: c.document_id,
                    text: c.text,
                    embedding: None,
                    metadata: c.metadata,
                })
                .collect();
            self.store.restore_library(snapshot.library, snapshot.documents, chunks);
            // Embeddings never survive a restart; the library needs a
            // re-index before it can serve search (SPEC_FULL.md §8 #6).
            self.lifecycle.mark_restored(library_id);
        }
    }

    /// Snapshot and persist one library. Called by every HTTP handler that
    /// mutates the store, after the mutation has already landed — writes
    /// are best-effort and never surfaced to the caller (SPEC_FULL.md §7).
    pub fn persist_library(&self, library_id: Uuid) {
        let Ok((library, documents, chunks)) = self.store.snapshot_library(library_id) else {
            return; // library was deleted concurrently; nothing to persist
        };
        self.persistence.save_library(&library, &documents, &chunks);
    }
}
