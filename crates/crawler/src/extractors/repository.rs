// ABOUTME: Extractor for code-hosting sites: README-first project pages and bio-first profile pages.
// ABOUTME: Reports topics and star/fork/watch counts as site facts.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use serde_json::json;
use url::Url;

use super::fields::{extract_all_text, extract_first_text};
use super::{SiteExtractor, SiteText};
use crate::fetch::RenderedPage;

const README_SELECTORS: &[&str] = &["article.markdown-body", "#readme article", "#readme"];
const DESCRIPTION_SELECTORS: &[&str] = &[
    "[data-testid='repository-about'] p",
    ".BorderGrid-cell p.f4",
    "p.f4.my-3",
    ".repository-content .f4",
    "meta[property='og:description']",
];
const MAIN_SELECTORS: &[&str] = &["main", "[role='main']", "#content"];

const PROFILE_NAME_SELECTORS: &[&str] = &["span.p-name", "h1.vcard-names", "[itemprop='name']"];
const PROFILE_BIO_SELECTORS: &[&str] = &["div.p-note", ".user-profile-bio", "[data-bio-text]"];
const PINNED_SELECTOR: &str = ".pinned-item-list-item .repo";
const RECENT_SELECTOR: &str = "a[itemprop='name codeRepository']";

const STARS_SELECTORS: &[&str] = &["#repo-stars-counter-star", "a[href$='/stargazers'] strong"];
const FORKS_SELECTORS: &[&str] = &["#repo-network-counter", "a[href$='/forks'] strong"];
const WATCHERS_SELECTORS: &[&str] = &["a[href$='/watchers'] strong"];

const MAX_TOPICS: usize = 20;
const MAX_PROJECTS: usize = 6;

/// Path segments that are site sections, not accounts.
const RESERVED_SEGMENTS: &[&str] = &[
    "about", "explore", "features", "marketplace", "orgs", "pricing", "settings", "sponsors",
    "topics", "trending",
];

static COUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^([\d.,]+)\s*([km])?$").expect("count pattern must compile"));

/// Parse display counts like `1,204`, `3.4k`, or `2M`.
pub fn parse_count(raw: &str) -> Option<u64> {
    let caps = COUNT_RE.captures(raw.trim())?;
    let number = caps.get(1)?.as_str().replace(',', "");
    let value: f64 = number.parse().ok()?;
    let scale = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(ref s) if s == "k" => 1_000.0,
        Some(ref s) if s == "m" => 1_000_000.0,
        _ => 1.0,
    };
    Some((value * scale).round() as u64)
}

/// Kind of page under a code host.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PageKind {
    Profile(String),
    Project { owner: String, name: String },
    Other,
}

fn page_kind(url: &Url) -> PageKind {
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
    match segments.as_slice() {
        [account] if !RESERVED_SEGMENTS.contains(account) => PageKind::Profile(account.to_string()),
        [owner, name, ..] if !RESERVED_SEGMENTS.contains(owner) => PageKind::Project {
            owner: owner.to_string(),
            name: name.to_string(),
        },
        _ => PageKind::Other,
    }
}

/// Extractor for repository hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepositoryExtractor;

impl RepositoryExtractor {
    fn profile(&self, doc: &Html, account: &str) -> SiteText {
        let mut site = SiteText::default();
        let name = extract_first_text(doc, PROFILE_NAME_SELECTORS);
        let bio = extract_first_text(doc, PROFILE_BIO_SELECTORS);
        let pinned = extract_all_text(doc, PINNED_SELECTOR, MAX_PROJECTS);
        let recent = extract_all_text(doc, RECENT_SELECTOR, MAX_PROJECTS);

        let mut parts: Vec<String> = Vec::new();
        match (name, bio) {
            (Some(n), Some(b)) => parts.push(format!("{} ({}). {}", n, account, b)),
            (Some(n), None) => parts.push(format!("{} ({}).", n, account)),
            (None, Some(b)) => parts.push(b),
            (None, None) => {}
        }
        if !pinned.is_empty() {
            parts.push(format!("Pinned projects: {}.", pinned.join(", ")));
            site.facts.insert("pinned".to_string(), json!(pinned));
        }
        if !recent.is_empty() {
            parts.push(format!("Recent projects: {}.", recent.join(", ")));
            site.facts.insert("recent".to_string(), json!(recent));
        }
        site.facts.insert("kind".to_string(), json!("profile"));
        site.text = parts.join(" ");
        site
    }

    fn project(&self, doc: &Html, owner: &str, name: &str) -> SiteText {
        let mut site = SiteText::default();

        let readme = extract_first_text(doc, README_SELECTORS);
        let description = extract_first_text(doc, DESCRIPTION_SELECTORS);

        site.text = if let Some(readme) = readme {
            readme
        } else if let Some(desc) = description {
            format!("{}/{}: {}", owner, name, desc)
        } else if let Some(main) = extract_first_text(doc, MAIN_SELECTORS) {
            main
        } else {
            extract_first_text(doc, &["title"]).unwrap_or_default()
        };

        let topics = extract_all_text(doc, "a.topic-tag", MAX_TOPICS);
        if !topics.is_empty() {
            site.facts.insert("topics".to_string(), json!(topics));
        }
        for (key, selectors) in [
            ("stars", STARS_SELECTORS),
            ("forks", FORKS_SELECTORS),
            ("watchers", WATCHERS_SELECTORS),
        ] {
            if let Some(count) = extract_first_text(doc, selectors).and_then(|t| parse_count(&t)) {
                site.facts.insert(key.to_string(), json!(count));
            }
        }
        site.facts.insert("kind".to_string(), json!("project"));
        site
    }
}

impl SiteExtractor for RepositoryExtractor {
    fn name(&self) -> &'static str {
        "repository"
    }

    fn extract(&self, doc: &Html, page: &RenderedPage) -> SiteText {
        let url = Url::parse(&page.final_url).or_else(|_| Url::parse(&page.url));
        match url.as_ref().map(page_kind) {
            Ok(PageKind::Profile(account)) => self.profile(doc, &account),
            Ok(PageKind::Project { owner, name }) => self.project(doc, &owner, &name),
            _ => SiteText::text(extract_first_text(doc, MAIN_SELECTORS).unwrap_or_default()),
        }
    }
}
