// ABOUTME: Content normalizer: repairs concatenation artifacts, canonicalizes synonyms, summarizes.
// ABOUTME: Output is at most three meaningful sentences and never longer than MAX_CONTENT_CHARS.

//! Content normalization.
//!
//! Text pulled out of a DOM by concatenating nodes loses the whitespace
//! between adjacent blocks, so `<h1>Wallet</h1><p>Store</p>` can come out
//! as `WalletStore`. [`repair_boundaries`] re-inserts those spaces at
//! camelCase, acronym, digit-letter and sentence boundaries, leaving URLs,
//! emails and known brand spellings alone.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::entry::MAX_CONTENT_CHARS;
use crate::vocabulary::{canonicalize, is_preserved};

/// Sentences kept in a summary.
pub const MAX_SENTENCES: usize = 3;

/// Sentences shorter than this are fragments, not content.
pub const MIN_SENTENCE_CHARS: usize = 10;

static BOUNDARY_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // "done.Next" -> "done. Next"
        r"([a-z]{2,}[.!?])([A-Z])",
        // "HTMLParser" -> "HTML Parser"
        r"([A-Z]{2,})([A-Z][a-z]{2,})",
        // "walletBitcoin" -> "wallet Bitcoin"
        r"([a-z]{2,})([A-Z])",
        // "2024Bitcoin" -> "2024 Bitcoin"
        r"(\d)([A-Z][a-z])",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("boundary rule must compile"))
    .collect()
});

fn is_protected_token(token: &str) -> bool {
    token.contains("://")
        || token.starts_with("www.")
        || token.contains('@')
        || is_preserved(token)
}

/// Re-insert spaces lost when adjacent DOM nodes were concatenated.
pub fn repair_boundaries(text: &str) -> String {
    text.split(' ')
        .map(|token| {
            if token.is_empty() || is_protected_token(token) {
                return token.to_string();
            }
            let mut fixed = token.to_string();
            for rule in BOUNDARY_RULES.iter() {
                if rule.is_match(&fixed) {
                    fixed = rule.replace_all(&fixed, "$1 $2").into_owned();
                }
            }
            fixed
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split at `.`, `!` or `?` followed by whitespace or end of text.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().map_or(true, |n| n.is_whitespace()) {
            let s = current.trim();
            if !s.is_empty() {
                sentences.push(s.to_string());
            }
            current.clear();
        }
    }
    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

/// Up to [`MAX_SENTENCES`] sentences of at least [`MIN_SENTENCE_CHARS`] chars.
///
/// When nothing qualifies the text is returned unchanged.
pub fn first_sentences(text: &str) -> String {
    let kept: Vec<String> = split_sentences(text)
        .into_iter()
        .filter(|s| s.chars().count() >= MIN_SENTENCE_CHARS)
        .take(MAX_SENTENCES)
        .collect();
    if kept.is_empty() {
        return text.to_string();
    }
    kept.join(" ")
}

/// Cut to at most `max` chars at a word boundary, marking the cut with `...`.
pub fn truncate_words(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let budget = max.saturating_sub(3);
    let prefix: String = text.chars().take(budget).collect();
    // A cut that lands exactly on a space keeps the whole last word.
    let next_is_space = text.chars().nth(budget).map_or(true, char::is_whitespace);
    let cut = if next_is_space {
        prefix.as_str()
    } else {
        match prefix.rfind(char::is_whitespace) {
            Some(idx) if idx > 0 => &prefix[..idx],
            _ => prefix.as_str(),
        }
    };
    let cut = cut.trim_end_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':'));
    format!("{}...", cut)
}

/// Full normalization: whitespace, boundaries, synonyms, sentence limit, length cap.
pub fn summarize(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return collapsed;
    }
    let repaired = repair_boundaries(&collapsed);
    let canonical = canonicalize(&repaired);
    let summary = first_sentences(&canonical);
    truncate_words(&summary, MAX_CONTENT_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn repairs_concatenation_artifacts() {
        assert_eq!(repair_boundaries("WalletStore your coins"), "Wallet Store your coins");
        assert_eq!(repair_boundaries("HTMLParser"), "HTML Parser");
        assert_eq!(repair_boundaries("Released 2024Bitcoin"), "Released 2024 Bitcoin");
        assert_eq!(repair_boundaries("done.Next step"), "done. Next step");
    }

    #[test]
    fn leaves_brands_urls_and_emails_alone() {
        assert_eq!(repair_boundaries("Find us on GitHub."), "Find us on GitHub.");
        assert_eq!(repair_boundaries("Built with JavaScript"), "Built with JavaScript");
        assert_eq!(
            repair_boundaries("See https://example.com/fooBar or mail helloWorld@example.com"),
            "See https://example.com/fooBar or mail helloWorld@example.com"
        );
    }

    #[test]
    fn keeps_three_meaningful_sentences() {
        let text = "Hi. This is the first real sentence. Second sentence is here! \
                    Is this the third one? Fourth is dropped.";
        assert_eq!(
            first_sentences(text),
            "This is the first real sentence. Second sentence is here! Is this the third one?"
        );
    }

    #[test]
    fn short_text_is_kept_whole() {
        assert_eq!(first_sentences("Foo"), "Foo");
    }

    #[test]
    fn decimal_points_do_not_split() {
        assert_eq!(split_sentences("Version 2.5 is out now."), vec!["Version 2.5 is out now."]);
    }

    #[test]
    fn truncation_respects_words_and_limit() {
        let long = "word ".repeat(100);
        let out = truncate_words(long.trim(), 300);
        assert!(out.chars().count() <= 300);
        assert!(out.ends_with("word..."));
        assert!(!out.contains("wor..."));
    }

    #[test]
    fn summarize_canonicalizes_and_caps() {
        let out = summarize("An   NFT\nmarketplace for DeFi users.");
        assert_eq!(
            out,
            "An Non-Fungible Token (NFT) marketplace for Decentralized Finance (DeFi) users."
        );

        let huge = format!("{}.", "verylongword ".repeat(60).trim());
        assert!(summarize(&huge).chars().count() <= MAX_CONTENT_CHARS);
    }

    #[test]
    fn summarize_is_idempotent_on_its_output() {
        let once = summarize("Lightning Network (LN) payments are instant. Fees are tiny.");
        assert_eq!(summarize(&once), once);
    }
}
