// ABOUTME: Deterministic tag derivation from content, url, and page metadata.
// ABOUTME: Vocabulary, frequency, ecosystem and metadata tags are merged, deduplicated, and capped.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::entry::{cap_tags, PageMetadata};
use crate::vocabulary::{canonicalize, domain_terms_in, ecosystems_in, is_noise_word};

/// Stored in place of content when a page yields no usable text.
pub const INACCESSIBLE_CONTENT: &str =
    "Content not accessible: the site blocks automated access or requires authentication.";

/// The complete tag set for inaccessible content.
pub const INACCESSIBLE_TAGS: &[&str] = &["inaccessible", "restricted"];

/// Most frequent words kept by frequency analysis.
const TOP_FREQUENT: usize = 10;
const MIN_WORD_LEN: usize = 3;
const MAX_WORD_LEN: usize = 20;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z]+").expect("word pattern must compile"));

/// Top words by frequency; ties keep first-seen order.
fn frequent_words(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, m) in WORD_RE.find_iter(&lower).enumerate() {
        let word = m.as_str();
        let len = word.chars().count();
        if !(MIN_WORD_LEN..=MAX_WORD_LEN).contains(&len) || is_noise_word(word) {
            continue;
        }
        counts.entry(word).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(&str, usize, usize)> =
        counts.into_iter().map(|(w, (count, first))| (w, count, first)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked
        .into_iter()
        .take(TOP_FREQUENT)
        .map(|(w, _, _)| w.to_string())
        .collect()
}

/// Tags contributed by page metadata.
fn metadata_tags(meta: &PageMetadata) -> Vec<&'static str> {
    let mut out = Vec::new();
    if !meta.social_links.is_empty() {
        out.push("social");
    }
    if !meta.emails.is_empty() {
        out.push("contact");
    }
    if !meta.marketing.is_empty() {
        out.push("analytics");
    }
    out
}

/// Derive up to fifteen lowercase tags.
///
/// Deterministic: identical `(content, url, metadata)` always yields the
/// same ordered list.
pub fn extract_tags(content: &str, url: &str, metadata: Option<&PageMetadata>) -> Vec<String> {
    if content.trim() == INACCESSIBLE_CONTENT {
        return INACCESSIBLE_TAGS.iter().map(|t| t.to_string()).collect();
    }

    let canonical = canonicalize(content);
    let haystack = format!("{} {}", canonical, url);

    let mut tags: Vec<String> = Vec::new();
    tags.extend(domain_terms_in(&haystack).into_iter().map(str::to_string));
    tags.extend(frequent_words(&canonical));
    tags.extend(ecosystems_in(&haystack).into_iter().map(str::to_string));
    if let Some(meta) = metadata {
        tags.extend(metadata_tags(meta).into_iter().map(str::to_string));
    }

    cap_tags(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::MAX_TAGS;
    use pretty_assertions::assert_eq;

    #[test]
    fn sentinel_gets_fixed_tags() {
        assert_eq!(
            extract_tags(INACCESSIBLE_CONTENT, "https://x.com/a", None),
            vec!["inaccessible", "restricted"]
        );
    }

    #[test]
    fn merges_all_sources_in_order() {
        let meta = PageMetadata {
            social_links: vec!["https://twitter.com/acme".to_string()],
            emails: vec!["hi@acme.io".to_string()],
            ..Default::default()
        };
        let tags = extract_tags(
            "A lightning wallet. The wallet supports lnurl payments.",
            "https://acme.io/wallet",
            Some(&meta),
        );
        assert_eq!(
            tags,
            vec![
                "lightning",
                "wallet",
                "payments",
                "supports",
                "lnurl",
                "social",
                "contact",
            ]
        );
    }

    #[test]
    fn frequency_ranks_by_count_then_first_seen() {
        let words = frequent_words("zeta alpha alpha beta beta gamma the and");
        assert_eq!(words, vec!["alpha", "beta", "zeta", "gamma"]);
    }

    #[test]
    fn frequency_drops_short_long_and_noise_words() {
        let words = frequent_words("an ox cookie menu supercalifragilisticexpialidocious relay");
        assert_eq!(words, vec!["relay"]);
    }

    #[test]
    fn synonyms_agree_with_content() {
        let tags = extract_tags("Every NFT is unique", "https://example.com", None);
        assert!(tags.contains(&"nft".to_string()));
        assert!(tags.contains(&"fungible".to_string()));
    }

    #[test]
    fn capped_and_deterministic() {
        let content = (0..40)
            .map(|i| format!("term{} ", i).replace(char::is_numeric, "x").repeat(i % 3 + 1))
            .collect::<String>()
            + " bitcoin lightning nostr ethereum wallet mining privacy security node exchange";
        let first = extract_tags(&content, "https://example.com/bitcoin", None);
        let second = extract_tags(&content, "https://example.com/bitcoin", None);
        assert!(first.len() <= MAX_TAGS);
        assert_eq!(first, second);
    }
}
