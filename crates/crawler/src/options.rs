// ABOUTME: Configuration options for the crawler including FetcherKind, CrawlerOptions, and CrawlerBuilder.
// ABOUTME: CrawlerBuilder provides a fluent API for constructing Crawler instances with custom settings.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::crawler::Crawler;
use crate::error::CrawlError;
use crate::extractors::ExtractorRegistry;
use crate::fetch::{BrowserFetcher, HttpFetcher, PageFetcher};
use crate::store::KnowledgeStore;

/// A desktop Chrome user agent; headless markers get pages blocked.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Which page fetcher backs the crawler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetcherKind {
    /// Headless Chromium, executes scripts before reading the DOM.
    #[default]
    Browser,
    /// Plain HTTP GET, no script execution.
    Http,
}

impl fmt::Display for FetcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FetcherKind::Browser => "browser",
            FetcherKind::Http => "http",
        };
        write!(f, "{}", s)
    }
}

impl From<&str> for FetcherKind {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "http" | "plain" => FetcherKind::Http,
            _ => FetcherKind::Browser,
        }
    }
}

/// Configuration options for the crawler.
#[derive(Debug, Clone)]
pub struct CrawlerOptions {
    /// Upper bound on page navigation.
    pub nav_timeout: Duration,
    /// Wait after load so client-side rendering can finish.
    pub settle_delay: Duration,
    /// Pause between items of a batch.
    pub crawl_delay: Duration,
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub allow_private_networks: bool,
    /// Concurrent browser sessions. One keeps the footprint bounded.
    pub browser_slots: usize,
    pub chromium_path: Option<PathBuf>,
    pub fetcher: FetcherKind,
    pub headers: HashMap<String, String>,
}

impl Default for CrawlerOptions {
    fn default() -> Self {
        Self {
            nav_timeout: Duration::from_secs(25),
            settle_delay: Duration::from_millis(1500),
            crawl_delay: Duration::from_secs(1),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            viewport: (1366, 768),
            allow_private_networks: false,
            browser_slots: 1,
            chromium_path: None,
            fetcher: FetcherKind::Browser,
            headers: HashMap::new(),
        }
    }
}

impl CrawlerOptions {
    /// Overall budget for one fetch: navigation, settle, plus teardown slack.
    pub fn fetch_budget(&self) -> Duration {
        self.nav_timeout + self.settle_delay + Duration::from_secs(5)
    }

    /// Construct the configured fetcher.
    pub fn build_fetcher(&self) -> Result<Arc<dyn PageFetcher>, CrawlError> {
        Ok(match self.fetcher {
            FetcherKind::Browser => Arc::new(BrowserFetcher::new(self.clone())),
            FetcherKind::Http => Arc::new(HttpFetcher::new(self)?),
        })
    }
}

/// Builder for constructing Crawler instances with custom configuration.
#[derive(Clone)]
pub struct CrawlerBuilder {
    opts: CrawlerOptions,
    fetcher: Option<Arc<dyn PageFetcher>>,
    registry: Option<ExtractorRegistry>,
}

impl CrawlerBuilder {
    /// Create a new CrawlerBuilder with default options.
    pub fn new() -> Self {
        Self {
            opts: CrawlerOptions::default(),
            fetcher: None,
            registry: None,
        }
    }

    /// Start from a complete option set.
    pub fn options(mut self, opts: CrawlerOptions) -> Self {
        self.opts = opts;
        self
    }

    /// Set the navigation timeout.
    pub fn nav_timeout(mut self, timeout: Duration) -> Self {
        self.opts.nav_timeout = timeout;
        self
    }

    /// Set the post-load settle delay.
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.opts.settle_delay = delay;
        self
    }

    /// Set the pause between batch items.
    pub fn crawl_delay(mut self, delay: Duration) -> Self {
        self.opts.crawl_delay = delay;
        self
    }

    /// Set the User-Agent presented to sites.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.opts.user_agent = user_agent.into();
        self
    }

    /// Allow or disallow crawling private networks.
    pub fn allow_private_networks(mut self, allow: bool) -> Self {
        self.opts.allow_private_networks = allow;
        self
    }

    /// Set the number of concurrent browser sessions.
    pub fn browser_slots(mut self, slots: usize) -> Self {
        self.opts.browser_slots = slots.max(1);
        self
    }

    /// Point at a specific Chromium binary.
    pub fn chromium_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.opts.chromium_path = Some(path.into());
        self
    }

    /// Choose the fetcher backend.
    pub fn fetcher_kind(mut self, kind: FetcherKind) -> Self {
        self.opts.fetcher = kind;
        self
    }

    /// Add a custom header to plain HTTP fetches.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.headers.insert(key.into(), value.into());
        self
    }

    /// Use a custom fetcher instead of the configured backend.
    pub fn fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Set a custom extractor registry.
    pub fn registry(mut self, reg: ExtractorRegistry) -> Self {
        self.registry = Some(reg);
        self
    }

    /// Build the Crawler over the given store.
    pub fn build(self, store: Arc<KnowledgeStore>) -> Result<Crawler, CrawlError> {
        let fetcher = match self.fetcher {
            Some(f) => f,
            None => self.opts.build_fetcher()?,
        };
        let registry = self.registry.unwrap_or_else(ExtractorRegistry::builtin);
        Ok(Crawler::new(store, fetcher, registry, self.opts))
    }
}

impl Default for CrawlerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let opts = CrawlerOptions::default();
        assert_eq!(opts.nav_timeout, Duration::from_secs(25));
        assert_eq!(opts.settle_delay, Duration::from_millis(1500));
        assert_eq!(opts.crawl_delay, Duration::from_secs(1));
        assert_eq!(opts.browser_slots, 1);
        assert!(!opts.allow_private_networks);
        assert!(!opts.user_agent.contains("Headless"));
    }

    #[test]
    fn fetcher_kind_parses_loosely() {
        assert_eq!(FetcherKind::from("HTTP"), FetcherKind::Http);
        assert_eq!(FetcherKind::from("browser"), FetcherKind::Browser);
        assert_eq!(FetcherKind::from("anything"), FetcherKind::Browser);
        assert_eq!(FetcherKind::Http.to_string(), "http");
    }

    #[test]
    fn browser_slots_never_zero() {
        let builder = CrawlerBuilder::new().browser_slots(0);
        assert_eq!(builder.opts.browser_slots, 1);
    }
}
