// ABOUTME: Heuristics that recognize text which is code, styling, or an anti-bot interstitial.
// ABOUTME: Extractors discard such text rather than storing it as page content.

use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;

/// Fragments that show up when script or stylesheet source leaks into text.
const CODE_MARKERS: &[&str] = &[
    "function(",
    "function (",
    "var ",
    "const ",
    "window.",
    "document.",
    "@media",
    "@font-face",
    "!important",
    "webpack",
    "=>",
    "px;",
    "{display:",
];

/// Interstitial and challenge-page phrases.
const INTERSTITIAL_PHRASES: &[&str] = &[
    "enable javascript",
    "javascript is disabled",
    "javascript is required",
    "please turn javascript on",
    "checking your browser",
    "verify you are human",
    "verifying you are human",
    "just a moment",
    "attention required",
    "access denied",
    "are you a robot",
    "unusual traffic",
];

/// Interstitial phrases only disqualify short texts.
const INTERSTITIAL_MAX_CHARS: usize = 600;

static CODE_MATCHER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(CODE_MARKERS)
        .expect("code markers must compile")
});

static INTERSTITIAL_MATCHER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(INTERSTITIAL_PHRASES)
        .expect("interstitial phrases must compile")
});

/// True if `text` is unusable as page content.
pub fn looks_like_boilerplate(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return true;
    }

    let mut non_ws = 0usize;
    let mut letters = 0usize;
    let mut syntax = 0usize;
    for c in text.chars() {
        if c.is_whitespace() {
            continue;
        }
        non_ws += 1;
        if c.is_alphabetic() {
            letters += 1;
        }
        if matches!(c, '{' | '}' | ';' | '=' | '<' | '>' | '(' | ')' | '[' | ']') {
            syntax += 1;
        }
    }

    if non_ws >= 20 {
        if (letters as f64) / (non_ws as f64) < 0.5 {
            return true;
        }
        if (syntax as f64) / (non_ws as f64) > 0.06 {
            return true;
        }
    }

    if CODE_MATCHER.find_iter(text).count() >= 3 {
        return true;
    }

    text.chars().count() < INTERSTITIAL_MAX_CHARS && INTERSTITIAL_MATCHER.is_match(text)
}
