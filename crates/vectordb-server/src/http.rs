//! REST facade: thin `axum` handlers over the store and lifecycle manager.
//!
//! This is component I from SPEC_FULL.md §2 — "spec'd only as interface" —
//! so handlers stay adapters: decode the request, call into `Store` or
//! `LibraryLifecycle`, persist if the call mutated anything, map the result
//! (or [`Error`]) to a response. No business logic lives here.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;
use vectordb_core::{IndexParams, IndexerKind};

use crate::context::AppContext;
use crate::error::{Error, Result};
use crate::model::{Chunk, Document, IndexStatus, Library, Metadata};

pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/libraries", post(create_library).get(list_libraries))
        .route(
            "/api/libraries/{id}",
            get(get_library).patch(patch_library).delete(delete_library),
        )
        .route("/api/libraries/{id}/index", post(start_index))
        .route("/api/libraries/{id}/index/status", get(index_status))
        .route("/api/libraries/{id}/search", post(search))
        .route("/api/libraries/{id}/documents", post(create_document).get(list_documents))
        .route(
            "/api/documents/{id}",
            get(get_document).patch(patch_document).delete(delete_document),
        )
        .route("/api/documents/{id}/chunks", post(create_chunk))
        .route("/api/chunks/batch", post(create_chunks_batch))
        .route(
            "/api/chunks/{id}",
            get(get_chunk).patch(patch_chunk).delete(delete_chunk),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ---- libraries ----

#[derive(Deserialize)]
struct CreateLibraryRequest {
    name: String,
    #[serde(default)]
    metadata: Metadata,
}

async fn create_library(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<CreateLibraryRequest>,
) -> Result<(StatusCode, Json<Library>)> {
    let library = ctx.store.create_library(req.name, req.metadata);
    ctx.persist_library(library.id);
    Ok((StatusCode::CREATED, Json(library)))
}

async fn list_libraries(State(ctx): State<Arc<AppContext>>) -> Json<Vec<Library>> {
    Json(ctx.store.list_libraries())
}

async fn get_library(State(ctx): State<Arc<AppContext>>, Path(id): Path<Uuid>) -> Result<Json<Library>> {
    Ok(Json(ctx.store.get_library(id)?))
}

#[derive(Deserialize, Default)]
struct PatchLibraryRequest {
    name: Option<String>,
    metadata: Option<Metadata>,
}

async fn patch_library(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
    Json(req): Json<PatchLibraryRequest>,
) -> Result<Json<Library>> {
    let library = ctx.store.patch_library(id, req.name, req.metadata)?;
    ctx.persist_library(id);
    Ok(Json(library))
}

async fn delete_library(State(ctx): State<Arc<AppContext>>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    ctx.store.delete_library(id)?;
    ctx.persistence.delete_library(id);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct StartIndexRequest {
    indexer_type: String,
    leaf_size: Option<usize>,
}

async fn start_index(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
    Json(req): Json<StartIndexRequest>,
) -> Result<(StatusCode, Json<IndexStatus>)> {
    ctx.store.get_library(id)?; // 404 before 409
    let kind = IndexerKind::parse(&req.indexer_type)
        .ok_or_else(|| Error::Validation(format!("unknown indexer_type {:?}", req.indexer_type)))?;
    let params = IndexParams { leaf_size: req.leaf_size };
    let status = ctx.lifecycle.start_index(id, kind, params)?;
    Ok((StatusCode::ACCEPTED, Json(status)))
}

async fn index_status(State(ctx): State<Arc<AppContext>>, Path(id): Path<Uuid>) -> Result<Json<IndexStatus>> {
    ctx.store.get_library(id)?;
    Ok(Json(ctx.lifecycle.status(id)))
}

#[derive(Deserialize)]
struct SearchRequest {
    query_text: String,
    #[serde(default = "default_top_k")]
    top_k: usize,
}

fn default_top_k() -> usize {
    5
}

#[derive(Serialize)]
struct SearchHit {
    chunk_id: Uuid,
    document_id: Uuid,
    score: f32,
    text: String,
    metadata: Metadata,
}

async fn search(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<Vec<SearchHit>>> {
    ctx.store.get_library(id)?;
    let hits = ctx.lifecycle.search(id, &req.query_text, req.top_k).await?;
    let mut out = Vec::with_capacity(hits.len());
    for (chunk_id, score) in hits {
        let chunk = ctx.store.get_chunk(chunk_id)?;
        out.push(SearchHit {
            chunk_id: chunk.id,
            document_id: chunk.document_id,
            score,
            text: chunk.text,
            metadata: chunk.metadata,
        });
    }
    Ok(Json(out))
}

// ---- documents ----

#[derive(Deserialize)]
struct CreateDocumentRequest {
    name: String,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    chunks: Vec<InlineChunk>,
}

#[derive(Deserialize)]
struct InlineChunk {
    text: String,
    #[serde(default)]
    metadata: Metadata,
}

async fn create_document(
    State(ctx): State<Arc<AppContext>>,
    Path(library_id): Path<Uuid>,
    Json(req): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<Document>)> {
    let document = ctx.store.create_document(library_id, req.name, req.metadata)?;
    if !req.chunks.is_empty() {
        let inputs = req.chunks.into_iter().map(|c| (c.text, c.metadata)).collect();
        ctx.store.create_chunks_batch(document.id, inputs)?;
    }
    ctx.persist_library(library_id);
    let document = ctx.store.get_document(document.id)?;
    Ok((StatusCode::CREATED, Json(document)))
}

async fn list_documents(
    State(ctx): State<Arc<AppContext>>,
    Path(library_id): Path<Uuid>,
) -> Result<Json<Vec<Document>>> {
    Ok(Json(ctx.store.list_documents(library_id)?))
}

async fn get_document(State(ctx): State<Arc<AppContext>>, Path(id): Path<Uuid>) -> Result<Json<Document>> {
    Ok(Json(ctx.store.get_document(id)?))
}

#[derive(Deserialize, Default)]
struct PatchDocumentRequest {
    name: Option<String>,
    metadata: Option<Metadata>,
}

async fn patch_document(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
    Json(req): Json<PatchDocumentRequest>,
) -> Result<Json<Document>> {
    let document = ctx.store.patch_document(id, req.name, req.metadata)?;
    ctx.persist_library(document.library_id);
    Ok(Json(document))
}

async fn delete_document(State(ctx): State<Arc<AppContext>>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    let document = ctx.store.get_document(id)?;
    ctx.store.delete_document(id)?;
    ctx.persist_library(document.library_id);
    Ok(StatusCode::NO_CONTENT)
}

// ---- chunks ----

#[derive(Deserialize)]
struct CreateChunkRequest {
    text: String,
    #[serde(default)]
    metadata: Metadata,
}

async fn create_chunk(
    State(ctx): State<Arc<AppContext>>,
    Path(document_id): Path<Uuid>,
    Json(req): Json<CreateChunkRequest>,
) -> Result<(StatusCode, Json<Chunk>)> {
    let chunk = ctx.store.create_chunk(document_id, req.text, req.metadata)?;
    let document = ctx.store.get_document(document_id)?;
    ctx.persist_library(document.library_id);
    Ok((StatusCode::CREATED, Json(chunk)))
}

#[derive(Deserialize)]
struct BatchChunkRequest {
    document_id: Uuid,
    chunks: Vec<InlineChunk>,
}

async fn create_chunks_batch(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<BatchChunkRequest>,
) -> Result<(StatusCode, Json<Vec<Chunk>>)> {
    let inputs = req.chunks.into_iter().map(|c| (c.text, c.metadata)).collect();
    let chunks = ctx.store.create_chunks_batch(req.document_id, inputs)?;
    let document = ctx.store.get_document(req.document_id)?;
    ctx.persist_library(document.library_id);
    Ok((StatusCode::CREATED, Json(chunks)))
}

async fn get_chunk(State(ctx): State<Arc<AppContext>>, Path(id): Path<Uuid>) -> Result<Json<Chunk>> {
    Ok(Json(ctx.store.get_chunk(id)?))
}

#[derive(Deserialize, Default)]
struct PatchChunkRequest {
    text: Option<String>,
    metadata: Option<Metadata>,
}

async fn patch_chunk(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
    Json(req): Json<PatchChunkRequest>,
) -> Result<Json<Chunk>> {
    let chunk = ctx.store.patch_chunk(id, req.text, req.metadata)?;
    let document = ctx.store.get_document(chunk.document_id)?;
    ctx.persist_library(document.library_id);
    Ok(Json(chunk))
}

async fn delete_chunk(State(ctx): State<Arc<AppContext>>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    let chunk = ctx.store.get_chunk(id)?;
    ctx.store.delete_chunk(id)?;
    let document = ctx.store.get_document(chunk.document_id)?;
    ctx.persist_library(document.library_id);
    Ok(StatusCode::NO_CONTENT)
}
