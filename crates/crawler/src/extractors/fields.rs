// ABOUTME: Field extraction utilities shared by the site extractors.
// ABOUTME: Provides helpers to extract meta content, attributes, and visible text with fallback selectors.

//! Field extraction utilities.
//!
//! Key behaviors:
//! - Selectors are tried in order; first non-empty match wins.
//! - Whitespace is normalized (collapsed to single spaces, trimmed).
//! - Empty strings are treated as no match.

use scraper::{ElementRef, Html};

use super::compiled::get_or_compile;
use crate::dom::{normalize_whitespace, visible_text};

/// Extracts an attribute value from the first matching selector that yields a non-empty result.
pub fn extract_first_attr(doc: &Html, selectors: &[&str], attr: &str) -> Option<String> {
    for &sel_str in selectors {
        let Some(sel) = get_or_compile(sel_str) else {
            continue;
        };
        for el in doc.select(&sel) {
            if let Some(value) = el.value().attr(attr) {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }
    None
}

/// Extracts the `content` attribute from the first matching meta tag.
pub fn extract_meta_content(doc: &Html, selector: &str) -> Option<String> {
    extract_first_attr(doc, &[selector], "content").map(|c| normalize_whitespace(&c))
}

/// Extracts text from the first matching selector that yields a non-empty result.
///
/// For meta tags (selectors starting with "meta"), extracts the `content`
/// attribute. For other elements, extracts visible text.
pub fn extract_first_text(doc: &Html, selectors: &[&str]) -> Option<String> {
    for &sel_str in selectors {
        if sel_str.trim_start().starts_with("meta") {
            if let Some(content) = extract_meta_content(doc, sel_str) {
                return Some(content);
            }
            continue;
        }
        let Some(sel) = get_or_compile(sel_str) else {
            continue;
        };
        for el in doc.select(&sel) {
            let text = visible_text(el);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// Visible text of every element matching `selector`, up to `limit` non-empty hits.
pub fn extract_all_text(doc: &Html, selector: &str, limit: usize) -> Vec<String> {
    let Some(sel) = get_or_compile(selector) else {
        return Vec::new();
    };
    doc.select(&sel)
        .map(visible_text)
        .filter(|t| !t.is_empty())
        .take(limit)
        .collect()
}

/// Visible text of the first element matching `selector` inside `scope`.
pub fn scoped_text(scope: ElementRef, selector: &str) -> Option<String> {
    let sel = get_or_compile(selector)?;
    scope
        .select(&sel)
        .map(visible_text)
        .find(|t| !t.is_empty())
}

/// The document's `<title>`, whitespace-normalized.
pub fn document_title(doc: &Html) -> Option<String> {
    let sel = get_or_compile("title")?;
    doc.select(&sel)
        .map(|el| normalize_whitespace(&el.text().collect::<String>()))
        .find(|t| !t.is_empty())
}

/// Page title from social meta tags, falling back to `<title>`.
pub fn page_title(doc: &Html) -> Option<String> {
    extract_first_text(
        doc,
        &["meta[property='og:title']", "meta[name='twitter:title']"],
    )
    .or_else(|| document_title(doc))
}

/// Page description from the standard and social meta tags.
pub fn page_description(doc: &Html) -> Option<String> {
    extract_first_text(
        doc,
        &[
            "meta[name='description']",
            "meta[property='og:description']",
            "meta[name='twitter:description']",
        ],
    )
}

/// Truncate to at most `max` characters on a char boundary, appending an ellipsis when cut.
pub fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{}...", cut.trim_end())
}
