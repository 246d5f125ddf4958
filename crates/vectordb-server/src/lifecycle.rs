//! Library indexing lifecycle: the state machine from SPEC_FULL.md §4.6.
//!
//! Grounded on the teacher's `dense/ann/autotune.rs` background-task shape
//! (a manager holding per-collection state behind a lock, driven by events
//! off the request path) and `dense/ann/factory.rs` for the
//! build-then-atomic-swap pattern, generalized here to a full state machine
//! with `idle`/`building`/`ready`/`stale`/`failed` rather than the teacher's
//! simpler "is there an index yet" boolean.
//!
//! One [`LibraryLifecycle`] is shared process-wide; it holds one entry per
//! library it has ever seen a mutation or index request for. A background
//! task owns the receiving half of `Store`'s invalidation channel and feeds
//! every signal into [`LibraryLifecycle::on_mutation`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use uuid::Uuid;
use vectordb_core::{build_index, AnyIndex, Index, IndexParams, IndexerKind};

use crate::embedding::{EmbedRole, EmbeddingClient};
use crate::error::{Error, Result};
use crate::model::IndexStatus;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Building,
    Ready,
    Stale,
    Failed,
}

struct Entry {
    state: State,
    /// Bumped on every `start_index`; a completing build discards its
    /// result if the entry's generation has moved on (a newer `start_index`
    /// raced it, or the library was deleted and re-evicted).
    generation: u64,
    /// Set when a mutation lands while `state == Building`; checked by the
    /// in-flight build at its re-validation step.
    superseded: bool,
    indexer_type: Option<IndexerKind>,
    last_indexed: Option<u64>,
    error: Option<String>,
    installed: Arc<ArcSwapOption<AnyIndex>>,
}

impl Entry {
    fn idle() -> Self {
        Self {
            state: State::Idle,
            generation: 0,
            superseded: false,
            indexer_type: None,
            last_indexed: None,
            error: None,
            installed: Arc::new(ArcSwapOption::empty()),
        }
    }

    fn status(&self) -> IndexStatus {
        IndexStatus {
            indexed: self.state == State::Ready,
            indexing_in_progress: self.state == State::Building,
            indexer_type: self.indexer_type,
            last_indexed: self.last_indexed,
            error: self.error.clone(),
        }
    }
}

pub struct LibraryLifecycle {
    store: Arc<Store>,
    embedder: Arc<dyn EmbeddingClient>,
    entries: RwLock<HashMap<Uuid, Arc<Mutex<Entry>>>>,
    clock: AtomicU64,
}

impl LibraryLifecycle {
    /// Construct the manager and spawn the background task that drains
    /// `Store`'s invalidation channel for its lifetime.
    pub fn spawn(
        store: Arc<Store>,
        mut invalidations: mpsc::UnboundedReceiver<Uuid>,
        embedder: Arc<dyn EmbeddingClient>,
    ) -> Arc<Self> {
        let manager = Arc::new(Self {
            store,
            embedder,
            entries: RwLock::new(HashMap::new()),
            clock: AtomicU64::new(0),
        });
        let background = manager.clone();
        tokio::spawn(async move {
            while let Some(library_id) = invalidations.recv().await {
                background.on_mutation(library_id);
            }
        });
        manager
    }

    /// Monotonic stand-in for a wall clock, so this module stays free of a
    /// direct `SystemTime` dependency at every call site; callers that need
    /// an actual epoch timestamp (persistence, `last_indexed`) go through
    /// [`epoch_ms`].
    fn next_tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn entry(&self, library_id: Uuid) -> Arc<Mutex<Entry>> {
        if let Some(entry) = self.entries.read().get(&library_id) {
            return entry.clone();
        }
        self.entries
            .write()
            .entry(library_id)
            .or_insert_with(|| Arc::new(Mutex::new(Entry::idle())))
            .clone()
    }

    /// Called by the background task for every mutation signal. A mutation
    /// against a library that no longer exists (the delete itself) evicts
    /// the entry outright instead of marking it stale.
    fn on_mutation(&self, library_id: Uuid) {
        if self.store.get_library(library_id).is_err() {
            self.entries.write().remove(&library_id);
            return;
        }
        let entry = self.entry(library_id);
        let mut guard = entry.lock();
        match guard.state {
            State::Building => guard.superseded = true,
            State::Ready | State::Stale => guard.state = State::Stale,
            State::Idle | State::Failed => {}
        }
    }

    /// Load a library restored from disk directly into `stale`: its
    /// documents/chunks survived the restart but embeddings did not, so the
    /// installed index (if any, from a prior process) no longer exists and
    /// a re-index is required (SPEC_FULL.md §8 scenario 6).
    pub fn mark_restored(&self, library_id: Uuid) {
        let entry = self.entry(library_id);
        let mut guard = entry.lock();
        guard.state = State::Stale;
    }

    pub fn status(&self, library_id: Uuid) -> IndexStatus {
        match self.entries.read().get(&library_id) {
            Some(entry) => entry.lock().status(),
            None => IndexStatus::default(),
        }
    }

    /// Begin an index build. Returns the status to report back (202) on
    /// success; fails with `AlreadyIndexing` if a build is already running.
    pub fn start_index(
        self: &Arc<Self>,
        library_id: Uuid,
        kind: IndexerKind,
        params: IndexParams,
    ) -> Result<IndexStatus> {
        let entry = self.entry(library_id);
        let generation = {
            let mut guard = entry.lock();
            if guard.state == State::Building {
                return Err(Error::AlreadyIndexing);
            }
            guard.state = State::Building;
            guard.superseded = false;
            guard.error = None;
            guard.generation += 1;
            guard.generation
        };

        let manager = self.clone();
        tokio::spawn(async move {
            manager.run_build(library_id, kind, params, generation).await;
        });

        Ok(entry.lock().status())
    }

    async fn run_build(
        self: Arc<Self>,
        library_id: Uuid,
        kind: IndexerKind,
        params: IndexParams,
        generation: u64,
    ) {
        // Step 1: snapshot under the store's own locks, then release them —
        // never hold a store lock across the embedding call.
        let snapshot = match self.store.snapshot_chunks(library_id) {
            Ok(s) => s,
            Err(e) => {
                self.fail_if_current(&library_id, generation, e.to_string());
                return;
            }
        };

        // Step 2: embed only chunks lacking a vector (Open Question 1 in
        // SPEC_FULL.md §9 resolves to "missing only", not a full re-embed).
        let missing: Vec<(Uuid, String)> = snapshot
            .iter()
            .filter(|c| c.embedding.is_none())
            .map(|c| (c.id, c.text.clone()))
            .collect();

        if !missing.is_empty() {
            let texts: Vec<String> = missing.iter().map(|(_, t)| t.clone()).collect();
            let embedded = match self.embedder.embed_batch(&texts, EmbedRole::Document).await {
                Ok(v) => v,
                Err(e) => {
                    self.fail_if_current(&library_id, generation, e.to_string());
                    return;
                }
            };
            for ((chunk_id, _), vector) in missing.iter().zip(embedded.into_iter()) {
                // Index-internal: does not emit an invalidation signal.
                let _ = self.store.set_chunk_embedding(*chunk_id, vector);
            }
        }

        // Step 3: re-validate. Either an explicit mutation flagged this
        // build superseded, or the chunk set itself drifted underneath us.
        let entry = self.entry(library_id);
        if entry.lock().superseded {
            self.finish_superseded(&entry, generation);
            return;
        }
        let current = match self.store.snapshot_chunks(library_id) {
            Ok(s) => s,
            Err(_) => {
                self.finish_superseded(&entry, generation);
                return;
            }
        };
        if !same_chunk_set(&snapshot, &current) {
            self.finish_superseded(&entry, generation);
            return;
        }

        // Step 4: build the indexer over the (now fully embedded) snapshot.
        let points: Vec<(u128, Vec<f32>)> = match points_from(&current) {
            Ok(p) => p,
            Err(e) => {
                self.fail_if_current(&library_id, generation, e.to_string());
                return;
            }
        };

        // Ball-tree construction is CPU-bound and can run long over a large
        // library; offload it so it doesn't block this task's runtime worker.
        let built_at = epoch_ms();
        let build_result = tokio::task::spawn_blocking(move || build_index(kind, points, params, built_at))
            .await
            .map_err(|e| Error::Internal(e.to_string()));
        let index = match build_result.and_then(|r| r.map_err(Error::from)) {
            Ok(idx) => idx,
            Err(e) => {
                self.fail_if_current(&library_id, generation, e.to_string());
                return;
            }
        };

        // Step 5: atomic swap + transition, but only if nothing superseded
        // us while the index was under construction.
        let mut guard = entry.lock();
        if guard.generation != generation {
            return; // a newer start_index already took over this entry
        }
        if guard.superseded {
            guard.state = State::Stale;
            guard.superseded = false;
            return;
        }
        guard.installed.store(Some(Arc::new(index)));
        guard.state = State::Ready;
        guard.indexer_type = Some(kind);
        guard.last_indexed = Some(built_at);
        guard.error = None;
    }

    fn finish_superseded(&self, entry: &Arc<Mutex<Entry>>, generation: u64) {
        let mut guard = entry.lock();
        if guard.generation != generation {
            return;
        }
        guard.state = State::Stale;
        guard.superseded = false;
    }

    fn fail_if_current(&self, library_id: &Uuid, generation: u64, message: String) {
        let entry = self.entry(*library_id);
        let mut guard = entry.lock();
        if guard.generation != generation {
            return;
        }
        guard.state = State::Failed;
        guard.error = Some(message);
    }

    /// Search gate + forward per SPEC_FULL.md §4.6: the library must be
    /// `ready`, and the installed indexer's vector count must still agree
    /// with the store's current chunk count for this library (cheap
    /// consistency check; the state machine is the real source of truth).
    pub async fn search(
        &self,
        library_id: Uuid,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<(Uuid, f32)>> {
        let entry = self.entry(library_id);
        let installed = {
            let guard = entry.lock();
            if guard.state != State::Ready {
                return Err(Error::NotIndexed);
            }
            guard.installed.load_full()
        };
        let Some(index) = installed else {
            return Err(Error::NotIndexed);
        };
        let current_count = self.store.chunk_count(library_id)?;
        if index.vector_count() != current_count {
            return Err(Error::NotIndexed);
        }

        let query_vector = self
            .embedder
            .embed_batch(&[query_text.to_string()], EmbedRole::Query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Internal("embedding provider returned no vectors for query".to_string()))?;

        let hits = tokio::task::spawn_blocking(move || index.search(&query_vector, top_k))
            .await
            .map_err(|e| Error::Internal(e.to_string()))??;
        Ok(hits.into_iter().map(|(id, score)| (Uuid::from_u128(id), score)).collect())
    }
}

fn same_chunk_set(before: &[crate::model::Chunk], after: &[crate::model::Chunk]) -> bool {
    if before.len() != after.len() {
        return false;
    }
    let after_by_id: HashMap<Uuid, &str> = after.iter().map(|c| (c.id, c.text.as_str())).collect();
    before.iter().all(|c| after_by_id.get(&c.id) == Some(&c.text.as_str()))
}

fn points_from(chunks: &[crate::model::Chunk]) -> Result<Vec<(u128, Vec<f32>)>> {
    let mut out = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let Some(embedding) = &chunk.embedding else {
            return Err(Error::Internal(format!(
                "chunk {} has no embedding after the build's embed step",
                chunk.id
            )));
        };
        let unit = vectordb_core::vector::normalize(embedding)?;
        out.push((chunk.id.as_u128(), unit));
    }
    Ok(out)
}

/// Milliseconds since the Unix epoch, for `IndexStats`/`IndexStatus` and
/// persistence timestamps.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
