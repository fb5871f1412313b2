// ABOUTME: Main library entry point for the lore knowledge-base crawler.
// ABOUTME: Re-exports the public API: Crawler, CrawlerBuilder, KnowledgeStore, CrawlOutcome, CrawlError, ErrorKind.

//! Lore - a knowledge-base crawler.
//!
//! Urls are added to a [`KnowledgeStore`] as pending entries, then crawled
//! through one pipeline (fetch, site-aware extraction, normalization,
//! tagging) whether the trigger is a single crawl, a batch over pending and
//! failed entries, or a full recrawl. Failures are classified into a closed
//! [`ErrorKind`] set and recorded next to the entry.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use lore_crawler::{Crawler, KnowledgeStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(KnowledgeStore::open("knowledge.db")?);
//!     let crawler = Crawler::builder().build(store)?;
//!     crawler.add("https://bitcoin.org/en/")?;
//!     let report = crawler.crawl_pending_and_failed().await?;
//!     println!("{}", report.message);
//!     Ok(())
//! }
//! ```

pub mod classify;
pub mod crawler;
pub mod discovery;
pub mod dom;
pub mod entry;
pub mod error;
pub mod extractors;
pub mod fetch;
pub mod guard;
pub mod normalize;
pub mod options;
pub mod pipeline;
pub mod search;
pub mod sources;
pub mod store;
pub mod tags;
pub mod vocabulary;

pub use crate::classify::{classify, is_retryable, ErrorKind};
pub use crate::crawler::{
    BatchReport, CrawlFailure, CrawlOutcome, CrawlSuccess, Crawler, Improvement,
};
pub use crate::discovery::{Discoverer, Discovery};
pub use crate::entry::{KnowledgeEntry, PageMetadata, Status, MAX_CONTENT_CHARS, MAX_TAGS};
pub use crate::error::{CrawlError, ErrorCode, StoreError};
pub use crate::extractors::{ExtractorRegistry, SiteExtractor, UrlPattern};
pub use crate::fetch::{BrowserFetcher, HttpFetcher, PageFetcher, RenderedPage};
pub use crate::options::{CrawlerBuilder, CrawlerOptions, FetcherKind};
pub use crate::pipeline::{derive, DerivedEntry};
pub use crate::search::ScoredEntry;
pub use crate::sources::{seed, SeedReport, Source, SourceRegistry};
pub use crate::store::KnowledgeStore;
pub use crate::tags::extract_tags;
