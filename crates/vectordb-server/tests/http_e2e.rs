//! End-to-end REST surface tests: drive the `axum` router with
//! `tower::ServiceExt::oneshot`, exercising the scenarios listed in
//! SPEC_FULL.md §8 through the actual HTTP layer rather than calling
//! `Store`/`LibraryLifecycle` directly.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use vectordb_server::config::AppConfig;
use vectordb_server::context::AppContext;
use vectordb_server::http::router;

fn test_context() -> std::sync::Arc<AppContext> {
    let mut dir = std::env::temp_dir();
    dir.push(format!("vectordb-e2e-{}", uuid::Uuid::new_v4()));
    let config = AppConfig {
        data_dir: dir,
        testing_data: false,
        cohere_api_key: None,
        ..AppConfig::default()
    };
    // Tests never exercise the real Cohere client; the router is built
    // against AppContext directly so its embedding calls would fail with
    // EmbeddingAuth if they ever reached it. These tests therefore only
    // drive paths that don't need an embedding call (CRUD, status), except
    // where noted.
    AppContext::bootstrap(config)
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn health_check_returns_ok() {
    let app = router(test_context());
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn full_crud_and_cascade_lifecycle() {
    let app = router(test_context());

    let (status, library) = send(&app, "POST", "/api/libraries", json!({ "name": "docs" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let library_id = library["id"].as_str().unwrap();

    let (status, document) = send(
        &app,
        "POST",
        &format!("/api/libraries/{library_id}/documents"),
        json!({ "name": "doc1", "chunks": [{ "text": "the cat sat" }, { "text": "astronomy telescope" }] }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let document_id = document["id"].as_str().unwrap();
    assert_eq!(document["chunk_ids"].as_array().unwrap().len(), 2);

    let (status, listed) = send(&app, "GET", &format!("/api/libraries/{library_id}/documents"), Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    // Non-existent document -> 404.
    let (status, _) = send(&app, "GET", &format!("/api/documents/{}", uuid::Uuid::new_v4()), Value::Null).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Creating a chunk under a missing document -> 404.
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/documents/{}/chunks", uuid::Uuid::new_v4()),
        json!({ "text": "orphan" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Delete the document; its chunks go with it.
    let (status, _) = send(&app, "DELETE", &format!("/api/documents/{document_id}"), Value::Null).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", &format!("/api/documents/{document_id}"), Value::Null).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Delete the (now-empty) library.
    let (status, _) = send(&app, "DELETE", &format!("/api/libraries/{library_id}"), Value::Null).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", &format!("/api/libraries/{library_id}"), Value::Null).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn search_before_index_is_409_not_indexed() {
    let app = router(test_context());
    let (_, library) = send(&app, "POST", "/api/libraries", json!({ "name": "docs" })).await;
    let library_id = library["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/libraries/{library_id}/search"),
        json!({ "query_text": "felines" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "NotIndexed");
}

#[tokio::test]
async fn index_status_starts_idle_and_unknown_library_is_404() {
    let app = router(test_context());
    let (_, library) = send(&app, "POST", "/api/libraries", json!({ "name": "docs" })).await;
    let library_id = library["id"].as_str().unwrap();

    let (status, body) = send(&app, "GET", &format!("/api/libraries/{library_id}/index/status"), Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["indexed"], false);
    assert_eq!(body["indexing_in_progress"], false);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/libraries/{}/index/status", uuid::Uuid::new_v4()),
        Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_indexer_type_is_a_validation_error() {
    let app = router(test_context());
    let (_, library) = send(&app, "POST", "/api/libraries", json!({ "name": "docs" })).await;
    let library_id = library["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/libraries/{library_id}/index"),
        json!({ "indexer_type": "NOT_A_REAL_KIND" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation");
}

#[tokio::test]
async fn starting_index_on_missing_library_is_404() {
    let app = router(test_context());
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/libraries/{}/index", uuid::Uuid::new_v4()),
        json!({ "indexer_type": "BALL_TREE" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patching_a_library_round_trips_name_and_metadata() {
    let app = router(test_context());
    let (_, library) = send(&app, "POST", "/api/libraries", json!({ "name": "docs" })).await;
    let library_id = library["id"].as_str().unwrap();

    let (status, patched) = send(
        &app,
        "PATCH",
        &format!("/api/libraries/{library_id}"),
        json!({ "name": "renamed", "metadata": { "k": "v" } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["name"], "renamed");
    assert_eq!(patched["metadata"]["k"], "v");
}

#[tokio::test]
async fn batch_chunk_creation_across_documents() {
    let app = router(test_context());
    let (_, library) = send(&app, "POST", "/api/libraries", json!({ "name": "docs" })).await;
    let library_id = library["id"].as_str().unwrap();
    let (_, document) = send(
        &app,
        "POST",
        &format!("/api/libraries/{library_id}/documents"),
        json!({ "name": "doc1" }),
    )
    .await;
    let document_id = document["id"].as_str().unwrap();

    let (status, chunks) = send(
        &app,
        "POST",
        "/api/chunks/batch",
        json!({ "document_id": document_id, "chunks": [{ "text": "a" }, { "text": "b" }, { "text": "c" }] }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(chunks.as_array().unwrap().len(), 3);
}
