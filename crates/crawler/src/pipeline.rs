// ABOUTME: The extract -> normalize -> tag pipeline shared by every crawl trigger.
// ABOUTME: Pure over a RenderedPage, so single, batch and recrawl runs derive identical entries.

use serde::Serialize;

use crate::entry::{cap_tags, PageMetadata};
use crate::extractors::ExtractorRegistry;
use crate::fetch::RenderedPage;
use crate::normalize::summarize;
use crate::tags::{extract_tags, INACCESSIBLE_CONTENT};

/// Everything derived from one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedEntry {
    pub url: String,
    pub content: String,
    pub tags: Vec<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub metadata: PageMetadata,
    pub extractor: &'static str,
}

impl DerivedEntry {
    pub fn is_inaccessible(&self) -> bool {
        self.content == INACCESSIBLE_CONTENT
    }
}

/// Derive the stored form of a fetched page.
pub fn derive(registry: &ExtractorRegistry, page: &RenderedPage) -> DerivedEntry {
    let extraction = registry.extract(page);

    let mut content = summarize(&extraction.text);
    if content.is_empty() {
        content = INACCESSIBLE_CONTENT.to_string();
    }
    let tags = cap_tags(extract_tags(&content, &page.url, Some(&extraction.metadata)));

    DerivedEntry {
        url: page.url.clone(),
        content,
        tags,
        title: extraction.title,
        description: extraction.description,
        metadata: extraction.metadata,
        extractor: extraction.extractor,
    }
}

/// Derive tags for content written directly rather than crawled.
pub fn tags_for_content(content: &str, url: &str) -> Vec<String> {
    extract_tags(&summarize(content), url, None)
}
