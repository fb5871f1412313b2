// ABOUTME: Page fetching seam: the PageFetcher trait and the RenderedPage it produces.
// ABOUTME: Backends are a headless browser (default) and a plain HTTP client.

mod browser;
mod http;

pub use browser::{find_chromium, BrowserFetcher};
pub use http::{
    build_client, decode_body, extract_charset, fetch, FetchOptions, FetchResult, HttpFetcher,
    MAX_CONTENT_LENGTH,
};

use async_trait::async_trait;

use crate::error::CrawlError;

/// A page as the fetcher saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    /// The url that was requested.
    pub url: String,
    /// Where the page actually ended up after redirects.
    pub final_url: String,
    /// Serialized DOM after scripts ran (or the raw body for plain HTTP).
    pub html: String,
    /// Text a human would see, when the backend can compute it.
    pub visible_text: Option<String>,
}

impl RenderedPage {
    /// A page with no rendered text, as plain HTTP produces.
    pub fn from_html(url: impl Into<String>, html: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            final_url: url.clone(),
            url,
            html: html.into(),
            visible_text: None,
        }
    }
}

/// Retrieves a page for extraction.
///
/// Implementations must enforce the SSRF policy on the host they contact
/// and must release any per-request resources before returning, on
/// success and on failure.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RenderedPage, CrawlError>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}
