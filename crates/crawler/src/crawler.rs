// ABOUTME: The Crawler orchestrates fetch -> extract -> normalize -> tag -> store for one url or a batch.
// ABOUTME: Failures are classified at this boundary and recorded; batches never abort on one url.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use url::Url;

use crate::classify::{classify, ErrorKind};
use crate::entry::{KnowledgeEntry, PageMetadata};
use crate::error::{CrawlError, StoreError};
use crate::extractors::ExtractorRegistry;
use crate::fetch::{PageFetcher, RenderedPage};
use crate::guard::validate_url;
use crate::options::{CrawlerBuilder, CrawlerOptions};
use crate::pipeline::{derive, tags_for_content, DerivedEntry};
use crate::store::KnowledgeStore;

/// Characters of content echoed back as a preview.
pub const PREVIEW_CHARS: usize = 100;

pub const NOTHING_TO_CRAWL: &str = "Nothing to crawl: no pending or failed entries";
pub const NOTHING_TO_RECRAWL: &str = "Nothing to recrawl: no entries outside protected ones";

/// A successful crawl.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlSuccess {
    pub url: String,
    pub content: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub preview: String,
    pub extractor: &'static str,
}

/// A crawl that failed and was recorded as such.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlFailure {
    pub url: String,
    pub error: String,
    pub error_type: ErrorKind,
    pub retryable: bool,
}

/// Result of crawling one url. Never an `Err`: failures are values.
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlOutcome {
    Success(CrawlSuccess),
    Failure(CrawlFailure),
    /// The url was not crawled at all (protected entry).
    Skipped { url: String, reason: String },
}

impl CrawlOutcome {
    pub fn url(&self) -> &str {
        match self {
            CrawlOutcome::Success(s) => &s.url,
            CrawlOutcome::Failure(f) => &f.url,
            CrawlOutcome::Skipped { url, .. } => url,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CrawlOutcome::Success(_))
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            CrawlOutcome::Failure(f) => Some(f.error_type),
            _ => None,
        }
    }
}

impl Serialize for CrawlOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Tagged<'a, T: Serialize> {
            success: bool,
            #[serde(flatten)]
            body: &'a T,
        }

        match self {
            CrawlOutcome::Success(s) => Tagged { success: true, body: s }.serialize(serializer),
            CrawlOutcome::Failure(f) => Tagged { success: false, body: f }.serialize(serializer),
            CrawlOutcome::Skipped { url, reason } => {
                let mut map = serializer.serialize_map(Some(4))?;
                map.serialize_entry("success", &false)?;
                map.serialize_entry("skipped", &true)?;
                map.serialize_entry("url", url)?;
                map.serialize_entry("reason", reason)?;
                map.end()
            }
        }
    }
}

/// A recrawl that grew the derived tag set or content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Improvement {
    pub url: String,
    pub old_tag_count: usize,
    pub new_tag_count: usize,
    pub old_content_length: usize,
    pub new_content_length: usize,
    pub tag_improvement: bool,
    pub content_improvement: bool,
}

impl Improvement {
    /// Compare structurally: counts and lengths only, not the text itself.
    pub fn detect(previous: &KnowledgeEntry, current: &CrawlSuccess) -> Option<Self> {
        let old_tag_count = previous.tags.len();
        let new_tag_count = current.tags.len();
        let old_content_length = previous.content_len();
        let new_content_length = current.content.chars().count();
        let tag_improvement = new_tag_count > old_tag_count;
        let content_improvement = new_content_length > old_content_length;
        (tag_improvement || content_improvement).then(|| Improvement {
            url: current.url.clone(),
            old_tag_count,
            new_tag_count,
            old_content_length,
            new_content_length,
            tag_improvement,
            content_improvement,
        })
    }
}

/// Summary of a batch run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub total: usize,
    pub success: usize,
    pub errors: usize,
    pub skipped: usize,
    pub error_breakdown: BTreeMap<ErrorKind, usize>,
    pub results: Vec<CrawlOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improvements: Option<Vec<Improvement>>,
    pub message: String,
}

impl BatchReport {
    fn record(&mut self, outcome: CrawlOutcome) {
        match outcome {
            CrawlOutcome::Success(_) => self.success += 1,
            CrawlOutcome::Failure(ref f) => {
                self.errors += 1;
                *self.error_breakdown.entry(f.error_type).or_insert(0) += 1;
            }
            CrawlOutcome::Skipped { .. } => self.skipped += 1,
        }
        self.results.push(outcome);
    }
}

fn preview(content: &str) -> String {
    let mut out: String = content.chars().take(PREVIEW_CHARS).collect();
    if content.chars().count() > PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}

/// Drives crawls against a knowledge store.
pub struct Crawler {
    store: Arc<KnowledgeStore>,
    fetcher: Arc<dyn PageFetcher>,
    registry: ExtractorRegistry,
    opts: CrawlerOptions,
    /// Bounds concurrent fetches; one permit by default.
    slots: Arc<Semaphore>,
}

impl std::fmt::Debug for Crawler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crawler")
            .field("fetcher", &self.fetcher.name())
            .field("registry", &self.registry)
            .field("opts", &self.opts)
            .finish()
    }
}

impl Crawler {
    pub fn new(
        store: Arc<KnowledgeStore>,
        fetcher: Arc<dyn PageFetcher>,
        registry: ExtractorRegistry,
        opts: CrawlerOptions,
    ) -> Self {
        let slots = Arc::new(Semaphore::new(opts.browser_slots.max(1)));
        Self {
            store,
            fetcher,
            registry,
            opts,
            slots,
        }
    }

    /// Create a builder for configuring a Crawler.
    pub fn builder() -> CrawlerBuilder {
        CrawlerBuilder::new()
    }

    pub fn store(&self) -> &Arc<KnowledgeStore> {
        &self.store
    }

    pub fn options(&self) -> &CrawlerOptions {
        &self.opts
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    /// Apply the URL guard with this crawler's network policy.
    pub fn validate(&self, url: &str) -> Result<Url, CrawlError> {
        validate_url(url, self.opts.allow_private_networks)
    }

    /// Add a url as pending. Returns false if it was already known.
    pub fn add(&self, url: &str) -> Result<bool, StoreError> {
        let url = url.trim();
        self.validate(url)?;
        self.store.add_pending(url)
    }

    /// Write content supplied by the caller instead of crawling.
    ///
    /// Tags are derived from the content when none are given.
    pub fn add_content(
        &self,
        url: &str,
        content: &str,
        tags: Option<Vec<String>>,
    ) -> Result<(), StoreError> {
        let url = url.trim();
        self.validate(url)?;
        let tags = tags.unwrap_or_else(|| tags_for_content(content, url));
        self.store.put_crawled(url, content, &tags, None)
    }

    /// Administrative write of a crawl-immune entry.
    pub fn add_protected(
        &self,
        url: &str,
        content: &str,
        tags: Option<Vec<String>>,
        metadata: Option<PageMetadata>,
    ) -> Result<(), StoreError> {
        let url = url.trim();
        self.validate(url)?;
        let tags = tags.unwrap_or_else(|| tags_for_content(content, url));
        self.store
            .put_protected(url, content, &tags, metadata.as_ref())
    }

    /// Fetch and derive a page without touching the store.
    pub async fn preview(&self, url: &str) -> Result<DerivedEntry, CrawlError> {
        self.validate(url)?;
        let page = self.fetch_page(url).await?;
        Ok(derive(&self.registry, &page))
    }

    async fn fetch_page(&self, url: &str) -> Result<RenderedPage, CrawlError> {
        let _permit = self
            .slots
            .acquire()
            .await
            .map_err(|e| CrawlError::browser(url, "Acquire", Some(e.into())))?;
        let budget = self.opts.fetch_budget();
        match tokio::time::timeout(budget, self.fetcher.fetch(url)).await {
            Ok(result) => result,
            Err(_) => Err(CrawlError::timeout(
                url,
                "Fetch",
                Some(anyhow::anyhow!("no page after {:?}", budget)),
            )),
        }
    }

    fn failure(&self, url: &str, err: &CrawlError) -> CrawlFailure {
        let kind = classify(&err.detail());
        CrawlFailure {
            url: url.to_string(),
            error: err.to_string(),
            error_type: kind,
            retryable: kind.is_retryable(),
        }
    }

    /// Crawl one url and record the result.
    ///
    /// Never returns an error: invalid urls, fetch failures and store
    /// failures all come back as [`CrawlOutcome::Failure`].
    pub async fn crawl_one(&self, url: &str) -> CrawlOutcome {
        self.crawl_tracked(url).await.0
    }

    /// Crawl one url, also returning the entry as it was before the crawl.
    async fn crawl_tracked(&self, url: &str) -> (CrawlOutcome, Option<KnowledgeEntry>) {
        let url = url.trim();
        if let Err(err) = self.validate(url) {
            let failure = self.failure(url, &err);
            warn!(url, error_type = %failure.error_type, "rejected url");
            return (CrawlOutcome::Failure(failure), None);
        }

        let previous = match self.store.begin_crawl(url) {
            Ok(prev) => prev,
            Err(StoreError::Protected(_)) => {
                info!(url, "skipping protected entry");
                return (
                    CrawlOutcome::Skipped {
                        url: url.to_string(),
                        reason: "protected".to_string(),
                    },
                    None,
                );
            }
            Err(err) => return (self.store_failure(url, &err), None),
        };

        let started = Instant::now();
        info!(url, fetcher = self.fetcher.name(), "crawl started");
        let page = match self.fetch_page(url).await {
            Ok(page) => page,
            Err(err) => {
                let failure = self.failure(url, &err);
                warn!(
                    url,
                    error_type = %failure.error_type,
                    retryable = failure.retryable,
                    error = %err,
                    "crawl failed"
                );
                if let Err(store_err) = self.store.record_failure(url, &failure.error) {
                    warn!(url, error = %store_err, "could not record failure");
                }
                return (CrawlOutcome::Failure(failure), previous);
            }
        };

        let derived = derive(&self.registry, &page);
        debug!(
            url,
            extractor = derived.extractor,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "page derived"
        );
        if derived.is_inaccessible() {
            warn!(url, "no usable content, storing inaccessible marker");
        }

        let metadata = (!derived.metadata.is_empty()).then_some(&derived.metadata);
        match self
            .store
            .put_crawled(url, &derived.content, &derived.tags, metadata)
        {
            Ok(()) => {}
            Err(StoreError::Protected(_)) => {
                return (
                    CrawlOutcome::Skipped {
                        url: url.to_string(),
                        reason: "protected".to_string(),
                    },
                    None,
                );
            }
            Err(err) => return (self.store_failure(url, &err), previous),
        }

        info!(
            url,
            tags = derived.tags.len(),
            chars = derived.content.chars().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "crawl finished"
        );
        let success = CrawlSuccess {
            url: url.to_string(),
            preview: preview(&derived.content),
            content: derived.content,
            title: derived.title,
            description: derived.description,
            tags: derived.tags,
            extractor: derived.extractor,
        };
        (CrawlOutcome::Success(success), previous)
    }

    fn store_failure(&self, url: &str, err: &StoreError) -> CrawlOutcome {
        warn!(url, error = %err, "store error during crawl");
        if let Err(record_err) = self.store.record_failure(url, &err.to_string()) {
            warn!(url, error = %record_err, "could not record crawl failure");
        }
        let error_type = classify(&err.to_string());
        CrawlOutcome::Failure(CrawlFailure {
            url: url.to_string(),
            error: err.to_string(),
            error_type,
            retryable: error_type.is_retryable(),
        })
    }

    async fn run_batch(
        &self,
        entries: Vec<KnowledgeEntry>,
        track_improvements: bool,
    ) -> BatchReport {
        let mut report = BatchReport {
            total: entries.len(),
            improvements: track_improvements.then(Vec::new),
            ..Default::default()
        };

        for (i, entry) in entries.iter().enumerate() {
            if i > 0 && !self.opts.crawl_delay.is_zero() {
                tokio::time::sleep(self.opts.crawl_delay).await;
            }
            let (outcome, previous) = self.crawl_tracked(&entry.url).await;
            if let (Some(list), CrawlOutcome::Success(s)) = (report.improvements.as_mut(), &outcome) {
                let before = previous.as_ref().unwrap_or(entry);
                if let Some(improvement) = Improvement::detect(before, s) {
                    list.push(improvement);
                }
            }
            report.record(outcome);
        }
        report
    }

    /// Crawl every pending or failed entry, one at a time.
    pub async fn crawl_pending_and_failed(&self) -> Result<BatchReport, StoreError> {
        let entries = self.store.list_crawlable()?;
        if entries.is_empty() {
            return Ok(BatchReport {
                message: NOTHING_TO_CRAWL.to_string(),
                ..Default::default()
            });
        }
        info!(count = entries.len(), "batch crawl started");
        let mut report = self.run_batch(entries, false).await;
        report.message = format!(
            "Crawled {} of {} entries ({} errors)",
            report.success, report.total, report.errors
        );
        info!(
            total = report.total,
            success = report.success,
            errors = report.errors,
            "batch crawl finished"
        );
        Ok(report)
    }

    /// Recrawl every non-protected entry and report improvements.
    pub async fn recrawl_all(&self) -> Result<BatchReport, StoreError> {
        let entries = self.store.list_recrawlable()?;
        if entries.is_empty() {
            return Ok(BatchReport {
                improvements: Some(Vec::new()),
                message: NOTHING_TO_RECRAWL.to_string(),
                ..Default::default()
            });
        }
        info!(count = entries.len(), "recrawl started");
        let mut report = self.run_batch(entries, true).await;
        let improved = report.improvements.as_ref().map_or(0, Vec::len);
        report.message = format!(
            "Recrawled {} of {} entries, {} improved",
            report.success, report.total, improved
        );
        info!(
            total = report.total,
            success = report.success,
            errors = report.errors,
            improved,
            "recrawl finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Status;
    use async_trait::async_trait;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    struct StaticFetcher(&'static str);

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<RenderedPage, CrawlError> {
            Ok(RenderedPage::from_html(url, self.0))
        }

        fn name(&self) -> &'static str {
            "static"
        }
    }

    fn crawler(html: &'static str) -> Crawler {
        let store = Arc::new(KnowledgeStore::open_in_memory().unwrap());
        let opts = CrawlerOptions {
            crawl_delay: std::time::Duration::ZERO,
            ..Default::default()
        };
        Crawler::new(store, Arc::new(StaticFetcher(html)), ExtractorRegistry::builtin(), opts)
    }

    #[test]
    fn preview_is_clipped() {
        assert_eq!(preview("short"), "short");
        let long = "x".repeat(150);
        assert_eq!(preview(&long).chars().count(), PREVIEW_CHARS + 3);
    }

    #[test]
    fn outcome_serializes_with_success_flag() {
        let failure = CrawlOutcome::Failure(CrawlFailure {
            url: "https://a.example/".to_string(),
            error: "boom".to_string(),
            error_type: ErrorKind::DnsError,
            retryable: true,
        });
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["errorType"], "DNS_ERROR");
        assert_eq!(json["retryable"], true);

        let skipped = CrawlOutcome::Skipped {
            url: "https://w.example/".to_string(),
            reason: "protected".to_string(),
        };
        let json = serde_json::to_value(&skipped).unwrap();
        assert_eq!(json["skipped"], true);
    }

    #[test]
    fn improvement_requires_strict_growth() {
        let previous = KnowledgeEntry {
            url: "https://a.example/".to_string(),
            status: Status::Crawled,
            content: Some("abc".to_string()),
            tags: vec!["one".to_string()],
            error_msg: None,
            metadata: None,
            updated_at: Utc::now(),
        };
        let mut current = CrawlSuccess {
            url: previous.url.clone(),
            content: "xyz".to_string(),
            title: None,
            description: None,
            tags: vec!["two".to_string()],
            preview: String::new(),
            extractor: "generic",
        };
        assert!(Improvement::detect(&previous, &current).is_none());

        current.tags.push("three".to_string());
        let improvement = Improvement::detect(&previous, &current).unwrap();
        assert!(improvement.tag_improvement);
        assert!(!improvement.content_improvement);
    }

    #[tokio::test]
    async fn invalid_url_fails_without_a_row() {
        let c = crawler("<html></html>");
        let outcome = c.crawl_one("ftp://example.com/file").await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::InvalidUrl));
        assert!(c.store().list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn title_only_page_succeeds() {
        let c = crawler("<html><head><title>Foo</title></head><body></body></html>");
        match c.crawl_one("https://example.com/a").await {
            CrawlOutcome::Success(s) => {
                assert_eq!(s.content, "Foo");
                assert_eq!(s.title.as_deref(), Some("Foo"));
            }
            other => panic!("expected success, got {:?}", other),
        }
        let stored = c.store().get("https://example.com/a").unwrap().unwrap();
        assert_eq!(stored.status, Status::Crawled);
    }

    #[test]
    fn store_error_mid_crawl_leaves_entry_failed() {
        let c = crawler("<html></html>");
        let url = "https://example.com/a";
        c.store().begin_crawl(url).unwrap();

        let outcome = c.store_failure(url, &StoreError::Corrupt("disk I/O error".to_string()));
        assert!(matches!(outcome, CrawlOutcome::Failure(_)));

        let stored = c.store().get(url).unwrap().unwrap();
        assert_eq!(stored.status, Status::Failed);
        assert!(stored.error_msg.unwrap().contains("disk I/O error"));
    }

    #[tokio::test]
    async fn add_validates_and_is_idempotent() {
        let c = crawler("<html></html>");
        assert!(c.add("https://example.com/a").unwrap());
        assert!(!c.add("https://example.com/a").unwrap());
        assert!(matches!(
            c.add("http://localhost/admin"),
            Err(StoreError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn empty_batch_reports_nothing_to_crawl() {
        let c = crawler("<html></html>");
        let report = c.crawl_pending_and_failed().await.unwrap();
        assert_eq!(report.total, 0);
        assert!(report.results.is_empty());
        assert_eq!(report.message, NOTHING_TO_CRAWL);
    }
}
