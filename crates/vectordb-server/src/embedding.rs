//! Text-to-vector embedding client: batching, bounded concurrency, and
//! retry with exponential backoff over an external embedding provider.
//!
//! Grounded on `madkoding-neuro-agent`'s `ModelProvider` trait
//! (`async_trait` + `reqwest::Client` + a `thiserror` error enum that
//! distinguishes connection failures from auth failures) — the same
//! split drives this module's `EmbeddingUnavailable` (retry) vs
//! `EmbeddingAuth` (fail fast) behavior.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which side of a search a text is being embedded for. Some providers
/// (Cohere among them) use different model heads for corpus vs query
/// embeddings, which meaningfully affects recall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedRole {
    Document,
    Query,
}

/// Converts batches of text into batches of equal-length dense vectors.
///
/// Stateless with respect to the store: the lifecycle manager injects a
/// client, which lets tests substitute [`StubEmbeddingClient`] without
/// touching any store or lifecycle code.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed_batch(&self, texts: &[String], role: EmbedRole) -> Result<Vec<Vec<f32>>>;
}

/// Tunables for [`CohereEmbeddingClient`], loaded from `AppConfig`.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddingParams {
    pub batch_size: usize,
    pub concurrency: usize,
    pub timeout: Duration,
}

impl Default for EmbeddingParams {
    fn default() -> Self {
        Self {
            batch_size: 96,
            concurrency: 4,
            timeout: Duration::from_secs(30),
        }
    }
}

const MAX_RETRIES: u32 = 4;
const BACKOFF_BASE: Duration = Duration::from_millis(250);

pub struct CohereEmbeddingClient {
    client: reqwest::Client,
    api_key: String,
    params: EmbeddingParams,
}

impl CohereEmbeddingClient {
    pub fn new(api_key: String, params: EmbeddingParams) -> Self {
        let client = reqwest::Client::builder()
            .timeout(params.timeout)
            .build()
            .unwrap_or_default();
        Self { client, api_key, params }
    }

    async fn embed_one_batch(&self, texts: &[String], role: EmbedRole) -> Result<Vec<Vec<f32>>> {
        let input_type = match role {
            EmbedRole::Document => "search_document",
            EmbedRole::Query => "search_query",
        };
        let request = CohereEmbedRequest {
            texts: texts.to_vec(),
            model: "embed-english-v3.0".to_string(),
            input_type: input_type.to_string(),
        };

        let mut attempt = 0u32;
        loop {
            let result = self
                .client
                .post("https://api.cohere.ai/v1/embed")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&request)
                .send()
                .await;

            match result {
                Ok(response) if response.status() == 401 || response.status() == 403 => {
                    return Err(Error::EmbeddingAuth);
                }
                Ok(response) if response.status().is_success() => {
                    let body: CohereEmbedResponse = response
                        .json()
                        .await
                        .map_err(|e| Error::EmbeddingProtocol(e.to_string()))?;
                    return validate_uniform_dimension(body.embeddings);
                }
                Ok(response) => {
                    let status = response.status();
                    if attempt >= MAX_RETRIES {
                        return Err(Error::EmbeddingUnavailable(format!(
                            "embedding provider returned HTTP {status} after {attempt} retries"
                        )));
                    }
                    tracing::warn!(%status, attempt, "embedding call failed, retrying");
                }
                Err(e) => {
                    if attempt >= MAX_RETRIES {
                        return Err(Error::EmbeddingUnavailable(e.to_string()));
                    }
                    tracing::warn!(error = %e, attempt, "embedding call failed, retrying");
                }
            }
            tokio::time::sleep(BACKOFF_BASE * 2u32.pow(attempt)).await;
            attempt += 1;
        }
    }
}

fn validate_uniform_dimension(vectors: Vec<Vec<f32>>) -> Result<Vec<Vec<f32>>> {
    let dim = vectors.first().map(|v| v.len());
    if let Some(dim) = dim {
        if vectors.iter().any(|v| v.len() != dim) {
            return Err(Error::EmbeddingProtocol(
                "provider returned embeddings of differing dimension in one batch".to_string(),
            ));
        }
    }
    Ok(vectors)
}

#[async_trait]
impl EmbeddingClient for CohereEmbeddingClient {
    async fn embed_batch(&self, texts: &[String], role: EmbedRole) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let chunks: Vec<Vec<String>> = texts
            .chunks(self.params.batch_size)
            .map(|c| c.to_vec())
            .collect();

        let semaphore = std::sync::Arc::new(tokio::sync::Semaphore::new(self.params.concurrency));
        let mut handles = Vec::with_capacity(chunks.len());
        for batch in chunks {
            let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
            let client = reqwest::Client::clone(&self.client);
            let api_key = self.api_key.clone();
            let params = self.params;
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let worker = CohereEmbeddingClient { client, api_key, params };
                worker.embed_one_batch(&batch, role).await
            }));
        }

        let mut out = Vec::with_capacity(texts.len());
        for handle in handles {
            let embedded = handle.await.map_err(|e| Error::Internal(e.to_string()))??;
            out.extend(embedded);
        }
        Ok(out)
    }
}

#[derive(Serialize)]
struct CohereEmbedRequest {
    texts: Vec<String>,
    model: String,
    input_type: String,
}

#[derive(Deserialize)]
struct CohereEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Stands in for [`CohereEmbeddingClient`] when no provider credential is
/// configured. Every call fails fast with `EmbeddingAuth` rather than
/// attempting (and retrying) a request that can never succeed.
pub struct MissingCredentialClient;

#[async_trait]
impl EmbeddingClient for MissingCredentialClient {
    async fn embed_batch(&self, _texts: &[String], _role: EmbedRole) -> Result<Vec<Vec<f32>>> {
        Err(Error::EmbeddingAuth)
    }
}

/// Deterministic in-process embedder for tests: maps each text onto a
/// small fixed-dimension space by hashing whitespace-separated tokens
/// onto axes, so that texts sharing tokens end up with high cosine
/// similarity without any network dependency.
pub struct StubEmbeddingClient {
    dimension: usize,
}

impl StubEmbeddingClient {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingClient for StubEmbeddingClient {
    async fn embed_batch(&self, texts: &[String], _role: EmbedRole) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hash_embed(t, self.dimension)).collect())
    }
}

fn hash_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dimension];
    for token in text.to_ascii_lowercase().split_whitespace() {
        let mut hash: u64 = 1469598103934665603;
        for byte in token.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(1099511628211);
        }
        let axis = (hash as usize) % dimension;
        v[axis] += 1.0;
    }
    if v.iter().all(|x| *x == 0.0) {
        v[0] = 1.0;
    }
    v
}
