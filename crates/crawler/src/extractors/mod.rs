// ABOUTME: Site-aware content extraction: the SiteExtractor trait, URL patterns, and the ordered registry.
// ABOUTME: The registry picks one strategy per URL and degrades to weaker extraction instead of failing.

//! Content extraction module.
//!
//! A page is routed to exactly one [`SiteExtractor`] by walking an ordered
//! list of `(UrlPattern, extractor)` pairs; the first matching pattern wins
//! and the generic extractor catches everything else. Extractors return raw
//! text only. Summarizing and length limits are the normalizer's job.
//!
//! Submodules:
//! - `compiled`: selector cache.
//! - `fields`: selector-based field helpers.
//! - `metadata`: social links, emails, and marketing signatures.
//! - `repository`, `social`, `forum`, `topic`, `generic`: the strategies.

pub mod compiled;
pub mod fields;
pub mod forum;
pub mod generic;
pub mod metadata;
pub mod repository;
pub mod social;
pub mod topic;

use std::collections::BTreeMap;
use std::sync::Arc;

use scraper::Html;
use url::Url;

use crate::dom::normalize_whitespace;
use crate::entry::PageMetadata;
use crate::fetch::RenderedPage;

pub use forum::ForumExtractor;
pub use generic::GenericExtractor;
pub use repository::RepositoryExtractor;
pub use social::SocialExtractor;
pub use topic::TopicExtractor;

/// Raw text plus site-specific facts produced by one extractor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteText {
    pub text: String,
    pub facts: BTreeMap<String, serde_json::Value>,
}

impl SiteText {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            facts: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// One extraction strategy.
///
/// Implementations never fail: a missing selector or a site quirk yields
/// less text, not an error.
pub trait SiteExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, doc: &Html, page: &RenderedPage) -> SiteText;

    /// Whether an empty result may be replaced by the generic body walk.
    ///
    /// Hosts that serve login walls to crawlers return false, so their
    /// body text is never stored as knowledge.
    fn allows_body_fallback(&self) -> bool {
        true
    }
}

/// Predicate over a page URL.
///
/// `hosts` match the host exactly or as a parent domain, `host_keywords`
/// match anywhere in the host, `url_keywords` anywhere in the full URL.
#[derive(Debug, Clone, Default)]
pub struct UrlPattern {
    hosts: Vec<String>,
    host_keywords: Vec<String>,
    url_keywords: Vec<String>,
}

impl UrlPattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hosts(mut self, hosts: &[&str]) -> Self {
        self.hosts.extend(hosts.iter().map(|h| h.to_lowercase()));
        self
    }

    pub fn host_keywords(mut self, words: &[&str]) -> Self {
        self.host_keywords.extend(words.iter().map(|w| w.to_lowercase()));
        self
    }

    pub fn url_keywords(mut self, words: &[&str]) -> Self {
        self.url_keywords.extend(words.iter().map(|w| w.to_lowercase()));
        self
    }

    pub fn matches(&self, url: &Url) -> bool {
        let host = url
            .host_str()
            .unwrap_or_default()
            .to_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);

        if self
            .hosts
            .iter()
            .any(|h| host == h.as_str() || host.ends_with(&format!(".{}", h)))
        {
            return true;
        }
        if self.host_keywords.iter().any(|k| host.contains(k.as_str())) {
            return true;
        }
        let full = url.as_str().to_lowercase();
        self.url_keywords.iter().any(|k| full.contains(k.as_str()))
    }
}

/// Everything the pipeline needs from one page, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub text: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub metadata: PageMetadata,
    /// Name of the strategy whose text was kept.
    pub extractor: &'static str,
}

/// Ordered strategy table with a generic fallback.
#[derive(Clone)]
pub struct ExtractorRegistry {
    routes: Vec<(UrlPattern, Arc<dyn SiteExtractor>)>,
    fallback: Arc<dyn SiteExtractor>,
}

impl ExtractorRegistry {
    /// An empty table; every page goes to the generic extractor.
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            fallback: Arc::new(GenericExtractor),
        }
    }

    /// The built-in table in precedence order:
    /// repository, short-form social, forum/mailing list, topic keyword.
    pub fn builtin() -> Self {
        Self::new()
            .route(
                UrlPattern::new().hosts(&["github.com", "gitlab.com", "codeberg.org"]),
                Arc::new(RepositoryExtractor),
            )
            .route(
                UrlPattern::new().hosts(&[
                    "twitter.com",
                    "x.com",
                    "instagram.com",
                    "facebook.com",
                    "threads.net",
                    "tiktok.com",
                    "linkedin.com",
                ]),
                Arc::new(SocialExtractor),
            )
            .route(
                UrlPattern::new()
                    .hosts(&[
                        "groups.google.com",
                        "groups.io",
                        "lists.linuxfoundation.org",
                        "delvingbitcoin.org",
                        "stacker.news",
                    ])
                    .url_keywords(&["forum", "mailman", "pipermail", "mailing-list", "discourse"]),
                Arc::new(ForumExtractor),
            )
            .route(
                UrlPattern::new().host_keywords(&[
                    "bitcoin",
                    "lightning",
                    "nostr",
                    "wallet",
                    "crypto",
                    "blockchain",
                ]),
                Arc::new(TopicExtractor),
            )
    }

    /// Append a route; earlier routes take precedence.
    pub fn route(mut self, pattern: UrlPattern, extractor: Arc<dyn SiteExtractor>) -> Self {
        self.routes.push((pattern, extractor));
        self
    }

    /// The strategy for `url`.
    pub fn select(&self, url: &Url) -> &dyn SiteExtractor {
        self.routes
            .iter()
            .find(|(pattern, _)| pattern.matches(url))
            .map(|(_, extractor)| extractor.as_ref())
            .unwrap_or(self.fallback.as_ref())
    }

    /// Run the matching strategy, degrading to generic text and then to title/description.
    pub fn extract(&self, page: &RenderedPage) -> Extraction {
        let doc = Html::parse_document(&page.html);
        let url = Url::parse(&page.final_url)
            .or_else(|_| Url::parse(&page.url))
            .ok();

        let chosen = match url {
            Some(ref u) => self.select(u),
            None => self.fallback.as_ref(),
        };
        tracing::debug!(url = %page.url, extractor = chosen.name(), "extractor selected");

        let mut site = chosen.extract(&doc, page);
        let mut extractor = chosen.name();

        if site.is_empty() && extractor != self.fallback.name() && chosen.allows_body_fallback() {
            tracing::warn!(url = %page.url, extractor, "no text from site extractor, using generic");
            let generic = self.fallback.extract(&doc, page);
            site.text = generic.text;
            extractor = self.fallback.name();
        }

        let title = fields::page_title(&doc);
        let description = fields::page_description(&doc);

        let mut text = normalize_whitespace(&site.text);
        if text.is_empty() {
            text = [title.as_deref(), description.as_deref()]
                .into_iter()
                .flatten()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(". ");
            if !text.is_empty() {
                tracing::warn!(url = %page.url, "no body text, using title and description");
                extractor = "meta";
            }
        }

        let mut meta = match url {
            Some(ref u) => metadata::collect(&doc, &page.html, u),
            None => PageMetadata::default(),
        };
        meta.title = title.clone();
        meta.description = description.clone();
        meta.extra = site.facts;

        Extraction {
            text,
            title,
            description,
            metadata: meta,
            extractor,
        }
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field(
                "routes",
                &self.routes.iter().map(|(_, e)| e.name()).collect::<Vec<_>>(),
            )
            .field("fallback", &self.fallback.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn name_for(url: &str) -> &'static str {
        let registry = ExtractorRegistry::builtin();
        registry.select(&Url::parse(url).unwrap()).name()
    }

    #[test]
    fn dispatch_follows_precedence() {
        assert_eq!(name_for("https://github.com/bitcoin/bitcoin"), "repository");
        assert_eq!(name_for("https://x.com/someone"), "social");
        assert_eq!(name_for("https://mobile.twitter.com/someone"), "social");
        assert_eq!(name_for("https://groups.google.com/g/bitcoindev"), "forum");
        assert_eq!(name_for("https://example.org/forum/thread/1"), "forum");
        assert_eq!(name_for("https://bitcoinmagazine.com/article"), "topic");
        assert_eq!(name_for("https://example.com/"), "generic");
    }

    #[test]
    fn repository_beats_topic_keyword() {
        // host keyword "bitcoin" would match topic, but repository comes first
        assert_eq!(name_for("https://github.com/bitcoin-dev/project"), "repository");
    }

    #[test]
    fn hosts_do_not_match_lookalikes() {
        assert_eq!(name_for("https://notgithub.com/a/b"), "generic");
        assert_eq!(name_for("https://www.github.com/a/b"), "repository");
    }

    #[test]
    fn title_only_page_falls_back_to_title() {
        let page = RenderedPage::from_html(
            "https://example.com/a",
            "<html><head><title>Foo</title></head><body></body></html>",
        );
        let extraction = ExtractorRegistry::builtin().extract(&page);
        assert_eq!(extraction.text, "Foo");
        assert_eq!(extraction.extractor, "meta");
        assert_eq!(extraction.title.as_deref(), Some("Foo"));
    }

    #[test]
    fn empty_site_text_degrades_to_generic() {
        let page = RenderedPage::from_html(
            "https://github.com/a/b",
            "<html><body><div>Plain text with no repository markup at all.</div></body></html>",
        );
        let extraction = ExtractorRegistry::builtin().extract(&page);
        assert_eq!(extraction.extractor, "generic");
        assert!(extraction.text.contains("Plain text"));
    }

    #[test]
    fn social_login_wall_is_not_stored_as_text() {
        let page = RenderedPage::from_html(
            "https://x.com/alice",
            "<html><body><div>Sign up now to see what Alice and others are posting.</div></body></html>",
        );
        let extraction = ExtractorRegistry::builtin().extract(&page);
        assert_eq!(extraction.extractor, "social");
        assert_eq!(extraction.text, "");
    }

    #[test]
    fn social_without_meta_uses_page_title() {
        let page = RenderedPage::from_html(
            "https://x.com/alice",
            "<html><head><title>Alice (@alice)</title></head>\
             <body><div>Sign up now to see what Alice is posting.</div></body></html>",
        );
        let extraction = ExtractorRegistry::builtin().extract(&page);
        assert_eq!(extraction.extractor, "meta");
        assert_eq!(extraction.text, "Alice (@alice)");
    }

    #[test]
    fn custom_routes_are_additive() {
        struct Fixed;
        impl SiteExtractor for Fixed {
            fn name(&self) -> &'static str {
                "fixed"
            }
            fn extract(&self, _doc: &Html, _page: &RenderedPage) -> SiteText {
                SiteText::text("fixed text")
            }
        }

        let registry = ExtractorRegistry::builtin()
            .route(UrlPattern::new().hosts(&["example.net"]), Arc::new(Fixed));
        let page = RenderedPage::from_html("https://docs.example.net/x", "<html></html>");
        let extraction = registry.extract(&page);
        assert_eq!(extraction.extractor, "fixed");
        assert_eq!(extraction.text, "fixed text");
    }
}
