// ABOUTME: Candidate url discovery from robots.txt Sitemap lines and sitemap XML.
// ABOUTME: Found urls are same-host, deduplicated and capped; they feed the pending queue.

use std::collections::{HashSet, VecDeque};

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use tracing::{debug, info};
use url::Url;

use crate::error::CrawlError;
use crate::fetch::{build_client, fetch, FetchOptions};
use crate::guard::validate_url;
use crate::options::CrawlerOptions;

/// Default cap on urls returned by one discovery run.
pub const DEFAULT_DISCOVERY_LIMIT: usize = 200;

/// Sitemap documents fetched per run, index children included.
const MAX_SITEMAPS: usize = 10;

/// The parts of robots.txt discovery cares about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsTxt {
    pub sitemaps: Vec<String>,
    /// Disallow prefixes from the `*` group.
    pub disallow: Vec<String>,
}

impl RobotsTxt {
    pub fn parse(content: &str) -> Self {
        let mut robots = Self::default();
        let mut in_wildcard = false;
        let mut last_was_agent = false;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match directive.trim().to_lowercase().as_str() {
                "user-agent" => {
                    // consecutive user-agent lines share one group
                    if !last_was_agent {
                        in_wildcard = false;
                    }
                    in_wildcard |= value == "*";
                    last_was_agent = true;
                    continue;
                }
                "disallow" if in_wildcard && !value.is_empty() => {
                    robots.disallow.push(value.to_string());
                }
                "sitemap" if !value.is_empty() => {
                    robots.sitemaps.push(value.to_string());
                }
                _ => {}
            }
            last_was_agent = false;
        }
        robots
    }

    pub fn allows(&self, path: &str) -> bool {
        !self.disallow.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }
}

/// Locations listed in one sitemap document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SitemapDoc {
    /// `<url><loc>` entries.
    pub pages: Vec<String>,
    /// `<sitemap><loc>` entries of a sitemap index.
    pub children: Vec<String>,
}

/// Parse a urlset or a sitemap index.
pub fn parse_sitemap(xml: &str) -> Result<SitemapDoc, CrawlError> {
    let mut reader = Reader::from_str(xml);
    let mut doc = SitemapDoc::default();
    let mut buf = Vec::new();

    let mut in_url = false;
    let mut in_sitemap = false;
    let mut in_loc = false;
    let mut loc = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"url" => in_url = true,
                b"sitemap" => in_sitemap = true,
                b"loc" if in_url || in_sitemap => {
                    in_loc = true;
                    loc.clear();
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_loc => {
                loc.push_str(&e.decode().map(|s| s.into_owned()).unwrap_or_default());
            }
            Ok(Event::CData(ref e)) if in_loc => {
                loc.push_str(&e.decode().map(|s| s.into_owned()).unwrap_or_default());
            }
            Ok(Event::GeneralRef(ref e)) if in_loc => {
                if let Ok(Some(ch)) = e.resolve_char_ref() {
                    loc.push(ch);
                } else if let Ok(name) = e.decode() {
                    if let Some(resolved) = resolve_predefined_entity(&name) {
                        loc.push_str(resolved);
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"loc" if in_loc => {
                    in_loc = false;
                    let value = loc.trim().to_string();
                    if !value.is_empty() {
                        if in_url {
                            doc.pages.push(value);
                        } else if in_sitemap {
                            doc.children.push(value);
                        }
                    }
                }
                b"url" => in_url = false,
                b"sitemap" => in_sitemap = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(CrawlError::extract(
                    "",
                    "ParseSitemap",
                    Some(anyhow::anyhow!("XML parse error at {}: {}", reader.buffer_position(), e)),
                ))
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(doc)
}

fn bare_host(url: &Url) -> Option<String> {
    url.host_str()
        .map(|h| h.trim_start_matches("www.").to_lowercase())
}

/// What one discovery run found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discovery {
    pub site: String,
    pub sitemaps: Vec<String>,
    pub urls: Vec<String>,
}

/// Finds crawlable urls for a site without rendering anything.
#[derive(Debug, Clone)]
pub struct Discoverer {
    client: reqwest::Client,
    fetch_opts: FetchOptions,
    limit: usize,
}

impl Discoverer {
    pub fn new(opts: &CrawlerOptions) -> Result<Self, CrawlError> {
        let client = build_client(opts)?;
        Ok(Self::with_client(client, opts.allow_private_networks))
    }

    pub fn with_client(client: reqwest::Client, allow_private_networks: bool) -> Self {
        Self {
            client,
            fetch_opts: FetchOptions {
                allow_private_networks,
                ..Default::default()
            },
            limit: DEFAULT_DISCOVERY_LIMIT,
        }
    }

    /// Cap the number of urls returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    async fn fetch_text(&self, url: &str) -> Result<String, CrawlError> {
        fetch(&self.client, url, &self.fetch_opts)
            .await
            .map(|r| r.text())
    }

    /// Discover urls on `site_url`'s host.
    ///
    /// Missing robots.txt or sitemaps yield an empty result, not an error;
    /// only an invalid or disallowed site url fails.
    pub async fn discover(&self, site_url: &str) -> Result<Discovery, CrawlError> {
        let base = validate_url(site_url, self.fetch_opts.allow_private_networks)?;
        let origin = base.origin().ascii_serialization();
        let host = bare_host(&base);

        let robots = match self.fetch_text(&format!("{}/robots.txt", origin)).await {
            Ok(text) => RobotsTxt::parse(&text),
            Err(err) => {
                debug!(site = %origin, error = %err, "no robots.txt");
                RobotsTxt::default()
            }
        };

        let roots: Vec<String> = if robots.sitemaps.is_empty() {
            vec![format!("{}/sitemap.xml", origin)]
        } else {
            robots.sitemaps.clone()
        };
        // (sitemap url, is a root sitemap)
        let mut queue: VecDeque<(String, bool)> = roots.into_iter().map(|u| (u, true)).collect();
        let mut seen_sitemaps: Vec<String> = Vec::new();
        let mut candidates: Vec<String> = Vec::new();

        while let Some((sitemap_url, is_root)) = queue.pop_front() {
            if seen_sitemaps.len() >= MAX_SITEMAPS || seen_sitemaps.contains(&sitemap_url) {
                continue;
            }
            seen_sitemaps.push(sitemap_url.clone());

            let xml = match self.fetch_text(&sitemap_url).await {
                Ok(xml) => xml,
                Err(err) => {
                    debug!(sitemap = %sitemap_url, error = %err, "sitemap unavailable");
                    continue;
                }
            };
            let doc = match parse_sitemap(&xml) {
                Ok(doc) => doc,
                Err(err) => {
                    debug!(sitemap = %sitemap_url, error = %err, "sitemap unparseable");
                    continue;
                }
            };
            candidates.extend(doc.pages);
            // one level of index nesting
            if is_root {
                queue.extend(doc.children.into_iter().map(|u| (u, false)));
            }
        }

        let mut seen: HashSet<String> = HashSet::new();
        let urls: Vec<String> = candidates
            .into_iter()
            .filter_map(|raw| {
                let parsed = Url::parse(&raw).ok()?;
                let same_host = bare_host(&parsed) == host;
                let web = matches!(parsed.scheme(), "http" | "https");
                (same_host && web && robots.allows(parsed.path())).then_some(raw)
            })
            .filter(|u| seen.insert(u.clone()))
            .take(self.limit)
            .collect();

        info!(site = %origin, sitemaps = seen_sitemaps.len(), found = urls.len(), "discovery finished");
        Ok(Discovery {
            site: origin,
            sitemaps: seen_sitemaps,
            urls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn robots_collects_sitemaps_and_wildcard_disallow() {
        let robots = RobotsTxt::parse(
            "User-agent: Googlebot\nDisallow: /nogoogle\n\n\
             User-agent: *\nDisallow: /private # internal\nAllow: /\n\
             Sitemap: https://example.com/sitemap-a.xml\n\
             sitemap: https://example.com/sitemap-b.xml\n",
        );
        assert_eq!(
            robots.sitemaps,
            vec![
                "https://example.com/sitemap-a.xml",
                "https://example.com/sitemap-b.xml"
            ]
        );
        assert_eq!(robots.disallow, vec!["/private"]);
        assert!(!robots.allows("/private/x"));
        assert!(robots.allows("/nogoogle"));
    }

    #[test]
    fn parses_urlset_with_entities() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
              <url><loc>https://example.com/</loc></url>
              <url><loc> https://example.com/search?q=a&amp;page=2 </loc></url>
            </urlset>"#;
        let doc = parse_sitemap(xml).unwrap();
        assert_eq!(
            doc.pages,
            vec!["https://example.com/", "https://example.com/search?q=a&page=2"]
        );
        assert!(doc.children.is_empty());
    }

    #[test]
    fn parses_sitemap_index() {
        let xml = r#"<sitemapindex>
              <sitemap><loc>https://example.com/s1.xml</loc></sitemap>
              <sitemap><loc>https://example.com/s2.xml</loc></sitemap>
            </sitemapindex>"#;
        let doc = parse_sitemap(xml).unwrap();
        assert_eq!(doc.children.len(), 2);
        assert!(doc.pages.is_empty());
    }

    #[test]
    fn garbage_does_not_panic() {
        for input in ["", "not xml", "<", "<urlset><url><loc>", "<<<>>>"] {
            let _ = parse_sitemap(input);
        }
    }

    #[tokio::test]
    async fn discovers_through_robots_and_index() {
        let server = MockServer::start_async().await;
        let robots = format!("User-agent: *\nDisallow: /admin\nSitemap: {}\n", server.url("/index.xml"));
        server
            .mock_async(|when, then| {
                when.method(GET).path("/robots.txt");
                then.status(200).body(robots.clone());
            })
            .await;
        let index = format!(
            "<sitemapindex><sitemap><loc>{}</loc></sitemap></sitemapindex>",
            server.url("/pages.xml")
        );
        server
            .mock_async(|when, then| {
                when.method(GET).path("/index.xml");
                then.status(200).body(index.clone());
            })
            .await;
        let pages = format!(
            "<urlset><url><loc>{a}</loc></url><url><loc>{a}</loc></url>\
             <url><loc>{admin}</loc></url><url><loc>https://elsewhere.example/x</loc></url>\
             <url><loc>{b}</loc></url></urlset>",
            a = server.url("/a"),
            b = server.url("/b"),
            admin = server.url("/admin/panel"),
        );
        server
            .mock_async(|when, then| {
                when.method(GET).path("/pages.xml");
                then.status(200).body(pages.clone());
            })
            .await;

        let discoverer = Discoverer::with_client(reqwest::Client::new(), true);
        let found = discoverer.discover(&server.base_url()).await.unwrap();
        assert_eq!(found.urls, vec![server.url("/a"), server.url("/b")]);
        assert_eq!(found.sitemaps.len(), 2);
    }

    #[tokio::test]
    async fn falls_back_to_sitemap_xml_and_respects_limit() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/robots.txt");
                then.status(404);
            })
            .await;
        let body = (0..5)
            .map(|i| format!("<url><loc>{}</loc></url>", server.url(&format!("/p{}", i))))
            .collect::<String>();
        let body = format!("<urlset>{}</urlset>", body);
        server
            .mock_async(|when, then| {
                when.method(GET).path("/sitemap.xml");
                then.status(200).body(body.clone());
            })
            .await;

        let discoverer = Discoverer::with_client(reqwest::Client::new(), true).limit(3);
        let found = discoverer.discover(&server.base_url()).await.unwrap();
        assert_eq!(found.urls.len(), 3);
    }

    #[tokio::test]
    async fn missing_sitemaps_yield_empty() {
        let server = MockServer::start_async().await;
        let discoverer = Discoverer::with_client(reqwest::Client::new(), true);
        let found = discoverer.discover(&server.base_url()).await.unwrap();
        assert!(found.urls.is_empty());
    }

    #[tokio::test]
    async fn private_site_rejected_by_default() {
        let discoverer = Discoverer::with_client(reqwest::Client::new(), false);
        let err = discoverer.discover("http://127.0.0.1:9/").await.unwrap_err();
        assert!(err.is_ssrf());
    }
}
