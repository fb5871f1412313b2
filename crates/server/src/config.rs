// ABOUTME: Server configuration from command-line flags with environment fallbacks.
// ABOUTME: Maps onto CrawlerOptions for the crawler and carries server-only knobs.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use lore_crawler::{CrawlerOptions, FetcherKind};

/// Knowledge-base crawler HTTP server.
#[derive(Parser, Debug, Clone)]
#[command(name = "lore-server")]
#[command(about = "Serve the knowledge-base crawler over HTTP", long_about = None)]
pub struct ServerConfig {
    /// Address to listen on.
    #[arg(long, env = "LORE_BIND", default_value = "127.0.0.1:3050")]
    pub bind: SocketAddr,

    /// SQLite database file.
    #[arg(long, env = "LORE_DB", default_value = "knowledge.db")]
    pub db: PathBuf,

    /// Page fetcher backend: browser or http.
    #[arg(long, env = "LORE_FETCHER", default_value = "browser", value_parser = ["browser", "http"])]
    pub fetcher: String,

    /// Chromium executable for the browser fetcher.
    #[arg(long, env = "LORE_CHROMIUM_PATH")]
    pub chromium: Option<PathBuf>,

    /// Upper bound a caller waits for crawl-all or recrawl-all.
    #[arg(long, env = "LORE_BATCH_TIMEOUT_SECS", default_value_t = 180)]
    pub batch_timeout_secs: u64,

    /// Pause between batch items, in milliseconds.
    #[arg(long, env = "LORE_DELAY_MS", default_value_t = 1000)]
    pub delay_ms: u64,

    /// Navigation timeout per page, in seconds.
    #[arg(long, env = "LORE_NAV_TIMEOUT_SECS", default_value_t = 25)]
    pub nav_timeout_secs: u64,

    /// JSON file listing seed sources.
    #[arg(long, env = "LORE_SOURCES")]
    pub sources: Option<PathBuf>,

    /// Allow crawling private and loopback addresses.
    #[arg(long, env = "LORE_ALLOW_PRIVATE_NETWORKS", default_value_t = false)]
    pub allow_private_networks: bool,

    /// Emit logs as JSON lines.
    #[arg(long, env = "LORE_LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

impl ServerConfig {
    pub fn crawler_options(&self) -> CrawlerOptions {
        CrawlerOptions {
            nav_timeout: Duration::from_secs(self.nav_timeout_secs),
            crawl_delay: Duration::from_millis(self.delay_ms),
            allow_private_networks: self.allow_private_networks,
            chromium_path: self.chromium.clone(),
            fetcher: FetcherKind::from(self.fetcher.as_str()),
            ..Default::default()
        }
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }
}
