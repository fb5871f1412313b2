// ABOUTME: Shared application state handed to every request handler.
// ABOUTME: Holds the crawler (and through it the store), the source registry and the discoverer.

use std::sync::Arc;
use std::time::Duration;

use lore_crawler::{Crawler, Discoverer, KnowledgeStore, SourceRegistry};

#[derive(Clone)]
pub struct AppState {
    pub crawler: Arc<Crawler>,
    pub sources: Arc<SourceRegistry>,
    pub discoverer: Arc<Discoverer>,
    /// How long batch callers wait before getting a 504.
    pub batch_timeout: Duration,
}

impl AppState {
    pub fn new(
        crawler: Crawler,
        sources: SourceRegistry,
        discoverer: Discoverer,
        batch_timeout: Duration,
    ) -> Self {
        Self {
            crawler: Arc::new(crawler),
            sources: Arc::new(sources),
            discoverer: Arc::new(discoverer),
            batch_timeout,
        }
    }

    pub fn store(&self) -> &KnowledgeStore {
        self.crawler.store()
    }
}
