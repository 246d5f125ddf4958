//! Randomized CRUD sequences must leave the store's forward ownership lists
//! exactly mirroring reality, per SPEC_FULL.md §8: "for all sequences of
//! CRUD operations, `chunks_by_document` and `documents_by_library` exactly
//! mirror the forward ownership after every operation."

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use uuid::Uuid;
use vectordb_server::model::Metadata;
use vectordb_server::store::Store;

#[derive(Debug, Clone)]
enum Op {
    CreateDocument,
    CreateChunk { doc_idx: usize },
    DeleteDocument { doc_idx: usize },
    DeleteChunk { doc_idx: usize, chunk_idx: usize },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::CreateDocument),
        (0usize..8).prop_map(|doc_idx| Op::CreateChunk { doc_idx }),
        (0usize..8).prop_map(|doc_idx| Op::DeleteDocument { doc_idx }),
        (0usize..8, 0usize..8).prop_map(|(doc_idx, chunk_idx)| Op::DeleteChunk { doc_idx, chunk_idx }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn forward_lists_mirror_reality_after_every_op(ops in prop::collection::vec(arb_op(), 0..60)) {
        let (store, _rx) = Store::new();
        let library = store.create_library("docs".to_string(), Metadata::new());

        // Shadow model: document insertion order (so `doc_idx` indexes
        // stably even as entries are removed) and each live document's set
        // of live chunk ids.
        let mut doc_order: Vec<Uuid> = Vec::new();
        let mut live_docs: HashSet<Uuid> = HashSet::new();
        let mut chunks_of: HashMap<Uuid, Vec<Uuid>> = HashMap::new();

        for op in ops {
            match op {
                Op::CreateDocument => {
                    let doc = store.create_document(library.id, "d".to_string(), Metadata::new()).unwrap();
                    live_docs.insert(doc.id);
                    chunks_of.insert(doc.id, Vec::new());
                    doc_order.push(doc.id);
                }
                Op::CreateChunk { doc_idx } => {
                    let Some(&doc_id) = doc_order.get(doc_idx) else { continue };
                    if !live_docs.contains(&doc_id) {
                        continue;
                    }
                    let chunk = store.create_chunk(doc_id, "text".to_string(), Metadata::new()).unwrap();
                    chunks_of.get_mut(&doc_id).unwrap().push(chunk.id);
                }
                Op::DeleteDocument { doc_idx } => {
                    let Some(&doc_id) = doc_order.get(doc_idx) else { continue };
                    if !live_docs.remove(&doc_id) {
                        continue;
                    }
                    store.delete_document(doc_id).unwrap();
                    chunks_of.remove(&doc_id);
                }
                Op::DeleteChunk { doc_idx, chunk_idx } => {
                    let Some(&doc_id) = doc_order.get(doc_idx) else { continue };
                    if !live_docs.contains(&doc_id) {
                        continue;
                    }
                    let chunks = chunks_of.get_mut(&doc_id).unwrap();
                    if chunks.is_empty() {
                        continue;
                    }
                    let chunk_id = chunks[chunk_idx % chunks.len()];
                    store.delete_chunk(chunk_id).unwrap();
                    chunks.retain(|id| *id != chunk_id);
                }
            }

            // Invariant: the library's document_ids set matches exactly
            // the set of documents our model believes are still live.
            let current_library = store.get_library(library.id).unwrap();
            let actual_docs: HashSet<Uuid> = current_library.document_ids.iter().copied().collect();
            prop_assert_eq!(actual_docs, live_docs.clone());

            // Invariant: every live document's chunk_ids set matches
            // exactly what our model tracked for it, and no chunk outlives
            // its document.
            for &doc_id in &live_docs {
                let document = store.get_document(doc_id).unwrap();
                let actual_chunks: HashSet<Uuid> = document.chunk_ids.iter().copied().collect();
                let expected_chunks: HashSet<Uuid> = chunks_of[&doc_id].iter().copied().collect();
                prop_assert_eq!(actual_chunks, expected_chunks);
                for chunk_id in &document.chunk_ids {
                    prop_assert!(store.get_chunk(*chunk_id).is_ok());
                }
            }

            // Invariant: deleted documents, and every chunk they owned,
            // are gone with no orphans left behind.
            for doc_id in &doc_order {
                if !live_docs.contains(doc_id) {
                    prop_assert!(store.get_document(*doc_id).is_err());
                }
            }
        }
    }
}
