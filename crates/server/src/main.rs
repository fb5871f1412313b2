// ABOUTME: lore-server binary: parses configuration, initialises logging and serves the API.
// ABOUTME: RUST_LOG overrides the default filter; --log-json switches to JSON log lines.

use anyhow::Result;
use clap::Parser;
use lore_server::{server, ServerConfig};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "lore=info,tower_http=info";

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::parse();
    init_tracing(config.log_json);
    server::run(config).await
}
