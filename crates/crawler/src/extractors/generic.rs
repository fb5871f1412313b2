// ABOUTME: Fallback extractor: visible text of the page, discarding CSS/script/interstitial captures.
// ABOUTME: Prefers the browser-computed visible text and falls back to a DOM walk.

use scraper::Html;

use super::compiled::get_or_compile;
use super::{SiteExtractor, SiteText};
use crate::dom::{looks_like_boilerplate, normalize_whitespace, visible_text};
use crate::fetch::RenderedPage;

#[derive(Debug, Clone, Copy, Default)]
pub struct GenericExtractor;

impl SiteExtractor for GenericExtractor {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn extract(&self, doc: &Html, page: &RenderedPage) -> SiteText {
        // Computed styles see stylesheet-hidden nodes the static walk cannot.
        if let Some(rendered) = page.visible_text.as_deref() {
            let rendered = normalize_whitespace(rendered);
            if !looks_like_boilerplate(&rendered) {
                return SiteText::text(rendered);
            }
        }

        let text = get_or_compile("body")
            .and_then(|sel| doc.select(&sel).next())
            .map(visible_text)
            .unwrap_or_default();
        if looks_like_boilerplate(&text) {
            tracing::debug!(url = %page.url, "generic text looks like boilerplate, discarded");
            return SiteText::default();
        }
        SiteText::text(text)
    }
}
