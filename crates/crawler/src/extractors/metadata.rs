// ABOUTME: Page metadata harvesting: outbound social profile links, contact emails, marketing signatures.
// ABOUTME: Results feed PageMetadata and the metadata-derived tags.

use std::collections::BTreeSet;

use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use url::Url;

use super::compiled::get_or_compile;
use crate::dom::visible_text;
use crate::entry::PageMetadata;

const MAX_SOCIAL_LINKS: usize = 20;
const MAX_EMAILS: usize = 10;

/// Hosts whose links count as social profiles.
const SOCIAL_HOSTS: &[&str] = &[
    "twitter.com",
    "x.com",
    "facebook.com",
    "instagram.com",
    "linkedin.com",
    "youtube.com",
    "tiktok.com",
    "t.me",
    "telegram.me",
    "discord.gg",
    "discord.com",
    "reddit.com",
    "mastodon.social",
    "primal.net",
    "njump.me",
    "medium.com",
    "github.com",
];

/// Script and pixel fingerprints of analytics and marketing tooling, with their labels.
const MARKETING_SIGNATURES: &[(&str, &str)] = &[
    ("googletagmanager.com", "google-tag-manager"),
    ("google-analytics.com", "google-analytics"),
    ("gtag(", "google-analytics"),
    ("connect.facebook.net", "facebook-pixel"),
    ("fbq(", "facebook-pixel"),
    ("static.hotjar.com", "hotjar"),
    ("cdn.segment.com", "segment"),
    ("analytics.js", "segment"),
    ("cdn.mxpnl.com", "mixpanel"),
    ("mixpanel", "mixpanel"),
    ("plausible.io", "plausible"),
    ("js.hs-scripts.com", "hubspot"),
    ("hs-analytics", "hubspot"),
    ("matomo", "matomo"),
    ("_paq.push", "matomo"),
];

static MARKETING_MATCHER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(MARKETING_SIGNATURES.iter().map(|(needle, _)| *needle))
        .expect("marketing signatures must compile")
});

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").expect("email pattern must compile")
});

/// Image filenames like `logo@2x.png` look like emails.
const IMAGE_SUFFIXES: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".avif"];

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

fn is_social_host(host: &str) -> bool {
    let host = strip_www(host);
    SOCIAL_HOSTS
        .iter()
        .any(|s| host == *s || host.ends_with(&format!(".{}", s)))
}

/// Outbound links to social profiles, resolved against `base`, excluding the page's own host.
pub fn social_links(doc: &Html, base: &Url) -> Vec<String> {
    let Some(sel) = get_or_compile("a[href]") else {
        return Vec::new();
    };
    let own_host = base.host_str().map(|h| strip_www(&h.to_lowercase()).to_string());

    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for el in doc.select(&sel) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let Ok(link) = base.join(href.trim()) else {
            continue;
        };
        if link.scheme() != "http" && link.scheme() != "https" {
            continue;
        }
        let Some(host) = link.host_str().map(|h| h.to_lowercase()) else {
            continue;
        };
        if Some(strip_www(&host).to_string()) == own_host || !is_social_host(&host) {
            continue;
        }
        // bare hosts are share buttons, not profiles
        if link.path().trim_matches('/').is_empty() {
            continue;
        }
        let s = link.to_string();
        if seen.insert(s.clone()) {
            out.push(s);
            if out.len() == MAX_SOCIAL_LINKS {
                break;
            }
        }
    }
    out
}

fn push_email(candidate: &str, seen: &mut BTreeSet<String>, out: &mut Vec<String>) {
    let email = candidate.trim().trim_end_matches('.').to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return;
    }
    if IMAGE_SUFFIXES.iter().any(|s| email.ends_with(s)) {
        return;
    }
    if seen.insert(email.clone()) {
        out.push(email);
    }
}

/// Contact emails from `mailto:` links and visible text.
pub fn emails(doc: &Html) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();

    if let Some(sel) = get_or_compile("a[href^='mailto:']") {
        for el in doc.select(&sel) {
            if let Some(href) = el.value().attr("href") {
                let addr = href
                    .trim_start_matches("mailto:")
                    .split('?')
                    .next()
                    .unwrap_or_default();
                push_email(addr, &mut seen, &mut out);
            }
        }
    }

    if let Some(body) = get_or_compile("body").and_then(|sel| doc.select(&sel).next()) {
        let text = visible_text(body);
        for m in EMAIL_RE.find_iter(&text) {
            push_email(m.as_str(), &mut seen, &mut out);
        }
    }

    out.truncate(MAX_EMAILS);
    out
}

/// Marketing and analytics labels whose fingerprints appear in the raw HTML.
pub fn marketing(html: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut hits: Vec<usize> = MARKETING_MATCHER
        .find_overlapping_iter(html)
        .map(|m| m.pattern().as_usize())
        .collect();
    hits.sort_unstable();
    for idx in hits {
        let label = MARKETING_SIGNATURES[idx].1;
        if !out.iter().any(|l| l == label) {
            out.push(label.to_string());
        }
    }
    out
}

/// Social links, emails, and marketing signatures for a page.
pub fn collect(doc: &Html, html: &str, base: &Url) -> PageMetadata {
    PageMetadata {
        social_links: social_links(doc, base),
        emails: emails(doc),
        marketing: marketing(html),
        ..Default::default()
    }
}
