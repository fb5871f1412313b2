// ABOUTME: Extractor for short-form social hosts, which block automated rendering of post bodies.
// ABOUTME: Reads only meta tags; a missing body is expected and never an error.

use scraper::Html;

use super::fields::extract_meta_content;
use super::{SiteExtractor, SiteText};
use crate::fetch::RenderedPage;

const TITLE_META: &[&str] = &["meta[property='og:title']", "meta[name='twitter:title']"];

const DESCRIPTION_META: &[&str] = &[
    "meta[property='og:description']",
    "meta[name='twitter:description']",
    "meta[name='description']",
    "meta[property='description']",
];

/// Extractor for social hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocialExtractor;

impl SiteExtractor for SocialExtractor {
    fn name(&self) -> &'static str {
        "social"
    }

    fn extract(&self, doc: &Html, _page: &RenderedPage) -> SiteText {
        let title = TITLE_META.iter().find_map(|sel| extract_meta_content(doc, sel));
        let description = DESCRIPTION_META
            .iter()
            .find_map(|sel| extract_meta_content(doc, sel));

        let parts: Vec<String> = [title, description].into_iter().flatten().collect();
        SiteText::text(parts.join(". "))
    }

    fn allows_body_fallback(&self) -> bool {
        false
    }
}
