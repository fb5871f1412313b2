// ABOUTME: Builds application state from configuration and runs the axum server.
// ABOUTME: Shuts down gracefully on ctrl-c or SIGTERM.

use std::sync::Arc;

use anyhow::{Context, Result};
use lore_crawler::{Crawler, Discoverer, KnowledgeStore, SourceRegistry};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::routes::create_router;
use crate::state::AppState;

/// Open the store, pick the fetcher and assemble shared state.
pub fn build_state(config: &ServerConfig) -> Result<AppState> {
    let store = KnowledgeStore::open(&config.db)
        .with_context(|| format!("opening knowledge store {}", config.db.display()))?;
    let opts = config.crawler_options();

    let crawler = Crawler::builder()
        .options(opts.clone())
        .build(Arc::new(store))
        .context("building crawler")?;
    let discoverer = Discoverer::new(&opts).context("building discovery client")?;

    let sources = match &config.sources {
        Some(path) => SourceRegistry::load(path)?,
        None => SourceRegistry::default(),
    };

    info!(
        db = %config.db.display(),
        fetcher = ?opts.fetcher,
        sources = sources.len(),
        allow_private_networks = opts.allow_private_networks,
        "state ready"
    );

    Ok(AppState::new(
        crawler,
        sources,
        discoverer,
        config.batch_timeout(),
    ))
}

/// Serve the API until a shutdown signal arrives.
pub async fn run(config: ServerConfig) -> Result<()> {
    let state = build_state(&config)?;
    let app = create_router(state);

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!("knowledge API listening on http://{}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
