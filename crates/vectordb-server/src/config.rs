//! Process configuration, read from environment variables per SPEC_FULL.md §6.
//!
//! Grounded on the teacher pack's `neuro-agent` config module (env-var
//! overrides, `Default` + explicit `load()`), scaled down: this system has
//! no config file layer, only environment variables, so `AppConfig::load`
//! is a flat set of `std::env::var` reads with defaults rather than a
//! layered file/CLI/env merge.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::embedding::EmbeddingParams;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding `library_{uuid}.json` persistence files.
    pub data_dir: PathBuf,
    /// When true, a bundled seed library is loaded at startup alongside
    /// whatever is already in `data_dir`.
    pub testing_data: bool,
    /// Opaque embedding provider credential. `None` means every embedding
    /// call fails fast with `EmbeddingAuth`.
    pub cohere_api_key: Option<String>,
    pub embedding: EmbeddingParams,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    pub fn load() -> Self {
        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());
        let testing_data = std::env::var("TESTING_DATA")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let cohere_api_key = std::env::var("COHERE_API_KEY").ok().filter(|s| !s.is_empty());
        let bind_addr = std::env::var("BIND_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| "0.0.0.0:8000".parse().unwrap());

        let embed_timeout_secs: u64 = std::env::var("EMBEDDING_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Self {
            data_dir: PathBuf::from(data_dir),
            testing_data,
            cohere_api_key,
            embedding: EmbeddingParams {
                timeout: Duration::from_secs(embed_timeout_secs),
                ..EmbeddingParams::default()
            },
            bind_addr,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            testing_data: false,
            cohere_api_key: None,
            embedding: EmbeddingParams::default(),
            bind_addr: "0.0.0.0:8000".parse().unwrap(),
        }
    }
}
