// ABOUTME: Extractor for topic-keyword hosts: tries known content containers before the full body.

use scraper::Html;

use super::compiled::get_or_compile;
use super::{SiteExtractor, SiteText};
use crate::dom::{looks_like_boilerplate, visible_text};
use crate::fetch::RenderedPage;

const CONTAINER_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role='main']",
    ".post-content",
    ".entry-content",
    ".article-content",
    ".article-body",
    ".content",
    "#content",
];

/// A container shorter than this is probably a teaser, not the content.
const MIN_CONTAINER_CHARS: usize = 80;

#[derive(Debug, Clone, Copy, Default)]
pub struct TopicExtractor;

impl SiteExtractor for TopicExtractor {
    fn name(&self) -> &'static str {
        "topic"
    }

    fn extract(&self, doc: &Html, _page: &RenderedPage) -> SiteText {
        for css in CONTAINER_SELECTORS {
            let Some(sel) = get_or_compile(css) else {
                continue;
            };
            for el in doc.select(&sel) {
                let text = visible_text(el);
                if text.chars().count() >= MIN_CONTAINER_CHARS && !looks_like_boilerplate(&text) {
                    return SiteText::text(text);
                }
            }
        }

        let body = get_or_compile("body")
            .and_then(|sel| doc.select(&sel).next())
            .map(visible_text)
            .unwrap_or_default();
        if looks_like_boilerplate(&body) {
            return SiteText::default();
        }
        SiteText::text(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(html: &str) -> String {
        let page = RenderedPage::from_html("https://bitcoinops.org/en/newsletters/", html);
        TopicExtractor.extract(&Html::parse_document(html), &page).text
    }

    #[test]
    fn prefers_substantial_container() {
        let article = "Weekly summary of notable changes to wallets, nodes, and the protocol, with links to discussions.";
        let html = format!(
            "<html><body><div>Subscribe now</div><article>{}</article></body></html>",
            article
        );
        assert_eq!(run(&html), article);
    }

    #[test]
    fn short_container_falls_back_to_body() {
        let html = "<html><body><main>Short</main><div>Rest of page</div></body></html>";
        assert_eq!(run(html), "Short Rest of page");
    }
}
