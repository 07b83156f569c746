use anyhow::{Context, Result};
use chesslink::api::link::exchange::HttpLichessApi;
use chesslink::api::{create_link_router, run_session_cleanup, LinkAppState, SessionStore};
use chesslink::config::{self, ChesslinkConfig};
use chesslink::credentials::LinkStore;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chesslink=info".into()),
        )
        .init();

    let config = ChesslinkConfig::load()?;
    let encryption_key = config::encryption_key_from_env()?;

    let links = LinkStore::new(
        &config.storage.db_path,
        &encryption_key,
        config.storage.pool_size,
    )
    .context("Failed to open link store")?;

    let sessions = SessionStore::new(config.session.ttl_seconds);
    let lichess = HttpLichessApi::new(&config.lichess)?;

    tokio::spawn(run_session_cleanup(
        sessions.clone(),
        config.session.cleanup_interval_seconds,
    ));

    let app = create_link_router(LinkAppState {
        sessions,
        links: Arc::new(links),
        lichess: Arc::new(lichess),
        lichess_config: config.lichess.clone(),
        public_base_url: config.server.public_base_url.clone(),
        done_redirect_url: config.server.done_redirect_url.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!(addr = %config.server.bind_addr, "chesslink listening");
    axum::serve(listener, app).await?;

    Ok(())
}
