// ABOUTME: Process-wide cache of parsed CSS selectors shared by the site extractors.
// ABOUTME: Extractors look up the same selectors for every page; each is parsed once.

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;
use scraper::Selector;

/// Parsed selectors by source text; `None` marks a selector that failed to parse.
static CACHE: Lazy<RwLock<HashMap<String, Option<Selector>>>> = Lazy::new(Default::default);

/// The parsed selector for `css`, or `None` if it does not parse.
///
/// A poisoned lock falls back to parsing on every call.
pub fn get_or_compile(css: &str) -> Option<Selector> {
    let hit = CACHE.read().ok().and_then(|c| c.get(css).cloned());
    if let Some(selector) = hit {
        return selector;
    }

    let parsed = Selector::parse(css).ok();
    if let Ok(mut cache) = CACHE.write() {
        return cache
            .entry(css.to_string())
            .or_insert(parsed)
            .clone();
    }
    parsed
}
