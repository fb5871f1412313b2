// ABOUTME: SourceRegistry: an injected list of seed urls loaded from JSON.
// ABOUTME: Seeding adds each source as pending and optionally runs discovery on it.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::crawler::Crawler;
use crate::discovery::Discoverer;

/// One seed source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Also run sitemap discovery on this source when seeding.
    #[serde(default)]
    pub discover: bool,
}

impl Source {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: None,
            discover: false,
        }
    }
}

/// Seed sources, scoped to whoever holds the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    /// Build a registry, dropping blank and repeated urls.
    pub fn new(sources: impl IntoIterator<Item = Source>) -> Self {
        let mut kept: Vec<Source> = Vec::new();
        for mut source in sources {
            source.url = source.url.trim().to_string();
            if source.url.is_empty() || kept.iter().any(|s| s.url == source.url) {
                continue;
            }
            kept.push(source);
        }
        Self { sources: kept }
    }

    /// Parse a JSON array of sources. Bare strings are accepted as urls.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Item {
            Url(String),
            Full(Source),
        }

        let items: Vec<Item> = serde_json::from_str(json)?;
        Ok(Self::new(items.into_iter().map(|item| match item {
            Item::Url(url) => Source::new(url),
            Item::Full(source) => source,
        })))
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading source registry {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("parsing source registry {}", path.display()))
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Result of seeding the store from a registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedReport {
    /// Source urls newly added as pending.
    pub added: usize,
    /// Source urls that were already in the store.
    pub known: usize,
    /// Urls newly added through discovery.
    pub discovered: usize,
    /// Urls the guard or the store refused.
    pub rejected: Vec<String>,
}

/// Add every source as pending, running discovery where a source asks for it.
pub async fn seed(
    crawler: &Crawler,
    registry: &SourceRegistry,
    discoverer: Option<&Discoverer>,
) -> SeedReport {
    let mut report = SeedReport::default();

    for source in registry.sources() {
        match crawler.add(&source.url) {
            Ok(true) => report.added += 1,
            Ok(false) => report.known += 1,
            Err(err) => {
                warn!(url = %source.url, error = %err, "source rejected");
                report.rejected.push(source.url.clone());
                continue;
            }
        }

        let Some(discoverer) = discoverer.filter(|_| source.discover) else {
            continue;
        };
        match discoverer.discover(&source.url).await {
            Ok(found) => {
                for url in &found.urls {
                    match crawler.add(url) {
                        Ok(true) => report.discovered += 1,
                        Ok(false) => {}
                        Err(err) => {
                            warn!(url = %url, error = %err, "discovered url rejected");
                            report.rejected.push(url.clone());
                        }
                    }
                }
            }
            Err(err) => warn!(url = %source.url, error = %err, "discovery failed"),
        }
    }

    info!(
        added = report.added,
        known = report.known,
        discovered = report.discovered,
        rejected = report.rejected.len(),
        "sources seeded"
    );
    report
}
