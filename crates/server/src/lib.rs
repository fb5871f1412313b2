// ABOUTME: HTTP surface for the lore knowledge-base crawler.
// ABOUTME: Exposes the router, shared state and configuration so tests can drive the API in-process.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

pub use crate::config::ServerConfig;
pub use crate::error::ApiError;
pub use crate::routes::create_router;
pub use crate::state::AppState;
