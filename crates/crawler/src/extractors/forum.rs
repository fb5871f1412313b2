// ABOUTME: Extractor for forums and mailing-list archives.
// ABOUTME: Strips page chrome, then gathers group identity, activity counts, topic titles, and message excerpts.

use std::collections::HashSet;

use ego_tree::NodeId;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use serde_json::json;

use super::compiled::get_or_compile;
use super::fields::{clip, extract_meta_content};
use super::{SiteExtractor, SiteText};
use crate::dom::{is_excluded, visible_text, visible_text_excluding};
use crate::fetch::RenderedPage;

/// Page chrome removed before reading.
const CHROME_SELECTORS: &[&str] = &[
    "nav",
    "header",
    "footer",
    "aside",
    "[role='navigation']",
    "[role='banner']",
    "[role='contentinfo']",
    "[role='search']",
    ".sidebar",
    ".navbar",
    ".menu",
    ".breadcrumb",
    ".breadcrumbs",
    ".cookie-banner",
    "#cookie-banner",
];

const NAME_SELECTORS: &[&str] = &["h1", ".group-name", "[itemprop='name']"];
const DESCRIPTION_SELECTORS: &[&str] = &[".group-description", "[itemprop='description']"];

const TOPIC_SELECTORS: &[&str] = &[
    ".topic-title",
    ".thread-title",
    "a.title",
    "td.subject a",
    "[role='row'] a",
    "li a[href*='/topic']",
    "a[href*='/t/']",
    "h3 a",
];

const MESSAGE_SELECTORS: &[&str] = &[
    ".message-body",
    ".post-body",
    ".cooked",
    "[itemprop='text']",
    ".msg-body",
    "blockquote",
    "pre",
];

const MAX_TOPICS: usize = 10;
const MAX_MESSAGES: usize = 5;
const EXCERPT_CHARS: usize = 200;
const MIN_TOPIC_CHARS: usize = 5;

static MEMBERS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d[\d,.]*\s*[km]?)\s+(?:members?|subscribers?)\b")
        .expect("member pattern must compile")
});

static ACTIVITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d[\d,.]*\s*[km]?)\s+(topics?|posts?|messages?|threads?|conversations?)\b")
        .expect("activity pattern must compile")
});

/// Extractor for forum and mailing-list hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForumExtractor;

fn chrome_ids(doc: &Html) -> HashSet<NodeId> {
    let mut ids = HashSet::new();
    for css in CHROME_SELECTORS {
        if let Some(sel) = get_or_compile(css) {
            ids.extend(doc.select(&sel).map(|el| el.id()));
        }
    }
    ids
}

/// Distinct non-chrome texts for the selectors, in selector order.
fn collect_texts(
    doc: &Html,
    selectors: &[&str],
    chrome: &HashSet<NodeId>,
    min_chars: usize,
    limit: usize,
) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for css in selectors {
        let Some(sel) = get_or_compile(css) else {
            continue;
        };
        for el in doc.select(&sel) {
            if is_excluded(el, chrome) {
                continue;
            }
            let text = visible_text(el);
            if text.chars().count() < min_chars || out.contains(&text) {
                continue;
            }
            out.push(text);
            if out.len() == limit {
                return out;
            }
        }
    }
    out
}

impl SiteExtractor for ForumExtractor {
    fn name(&self) -> &'static str {
        "forum"
    }

    fn extract(&self, doc: &Html, _page: &RenderedPage) -> SiteText {
        let chrome = chrome_ids(doc);
        let mut site = SiteText::default();

        let body_text = get_or_compile("body")
            .and_then(|sel| doc.select(&sel).next())
            .map(|body| visible_text_excluding(body, &chrome))
            .unwrap_or_default();

        let name = collect_texts(doc, NAME_SELECTORS, &chrome, 1, 1).into_iter().next();
        let description = collect_texts(doc, DESCRIPTION_SELECTORS, &chrome, 1, 1)
            .into_iter()
            .next()
            .or_else(|| extract_meta_content(doc, "meta[name='description']"));
        let members = MEMBERS_RE
            .captures(&body_text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string());
        let activity = ACTIVITY_RE
            .captures(&body_text)
            .map(|c| format!("{} {}", &c[1].trim(), &c[2].to_lowercase()));
        let topics = collect_texts(doc, TOPIC_SELECTORS, &chrome, MIN_TOPIC_CHARS, MAX_TOPICS);
        let messages: Vec<String> =
            collect_texts(doc, MESSAGE_SELECTORS, &chrome, MIN_TOPIC_CHARS, MAX_MESSAGES)
                .into_iter()
                .map(|m| clip(&m, EXCERPT_CHARS))
                .collect();

        let mut parts: Vec<String> = Vec::new();
        if let Some(ref n) = name {
            parts.push(format!("{}.", n.trim_end_matches('.')));
            site.facts.insert("group".to_string(), json!(n));
        }
        if let Some(d) = description {
            parts.push(format!("{}.", d.trim_end_matches('.')));
        }
        if let Some(m) = members {
            parts.push(format!("{} members.", m));
            site.facts.insert("members".to_string(), json!(m));
        }
        if let Some(a) = activity {
            parts.push(format!("{}.", a));
            site.facts.insert("activity".to_string(), json!(a));
        }
        if !topics.is_empty() {
            parts.push(format!("Recent topics: {}.", topics.join("; ")));
            site.facts.insert("topics".to_string(), json!(topics));
        }
        parts.extend(messages);

        // Only a bare heading means the structure did not match; use the clean body.
        site.text = if parts.len() <= 1 && !body_text.is_empty() {
            body_text
        } else {
            parts.join(" ")
        };
        site
    }
}
