//! Binary entry point: load config, bootstrap the `AppContext`, serve the
//! REST facade over `axum`/`tokio`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vectordb_server::config::AppConfig;
use vectordb_server::context::AppContext;
use vectordb_server::http;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load();
    let bind_addr = config.bind_addr;
    tracing::info!(%bind_addr, data_dir = %config.data_dir.display(), "starting vectordb-server");

    let ctx = AppContext::bootstrap(config);
    let app = http::router(ctx);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {bind_addr}: {e}"));
    axum::serve(listener, app).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "server exited with error");
    });
}
