// ABOUTME: Route table for the knowledge-base HTTP API.
// ABOUTME: Binds paths to handlers and layers request tracing and CORS on top.

use axum::http::Method;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the API router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/health", get(handlers::health))
        // Crawl lifecycle
        .route("/add", post(handlers::add))
        .route("/crawl", post(handlers::crawl))
        .route("/crawl-all", post(handlers::crawl_all))
        .route("/recrawl-all", post(handlers::recrawl_all))
        // Reads
        .route("/all", get(handlers::all))
        .route("/entry", get(handlers::entry))
        .route("/stats", get(handlers::stats))
        .route("/search", get(handlers::search))
        .route("/semantic-search", get(handlers::semantic_search))
        // Deletes
        .route("/remove", delete(handlers::remove))
        .route("/clear", delete(handlers::clear))
        // Protected entries
        .route("/add-wallet-info", post(handlers::add_wallet_info))
        .route("/wallets", get(handlers::wallets))
        // Url sources
        .route("/discover", post(handlers::discover))
        .route("/sources/seed", post(handlers::seed_sources))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
