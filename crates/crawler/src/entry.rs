// ABOUTME: Knowledge entry data model: crawl status lifecycle, derived metadata, and hard caps.
// ABOUTME: Shared by the store, the crawler, and the HTTP surface.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of tags stored per entry.
pub const MAX_TAGS: usize = 15;

/// Maximum length of stored content, in characters.
pub const MAX_CONTENT_CHARS: usize = 300;

/// Crawl lifecycle of a knowledge entry.
///
/// `Protected` is terminal and only reachable through the administrative
/// writer; crawl, recrawl and bulk clear never touch such rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Crawling,
    Crawled,
    Failed,
    Protected,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Crawling => "crawling",
            Status::Crawled => "crawled",
            Status::Failed => "failed",
            Status::Protected => "protected",
        }
    }

    /// Content and tags are only meaningful in these states.
    pub fn has_content(self) -> bool {
        matches!(self, Status::Crawled | Status::Protected)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Status::Pending),
            "crawling" => Ok(Status::Crawling),
            "crawled" => Ok(Status::Crawled),
            "failed" => Ok(Status::Failed),
            "protected" => Ok(Status::Protected),
            other => Err(format!("unknown status {:?}", other)),
        }
    }
}

/// Auxiliary data derived from a page alongside its content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub social_links: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<String>,
    /// Marketing and analytics tooling detected on the page.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marketing: Vec<String>,
    /// Site-specific facts reported by the extractor (stars, topics, member counts).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl PageMetadata {
    pub fn is_empty(&self) -> bool {
        self == &PageMetadata::default()
    }
}

/// One record per crawled resource, keyed by url.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeEntry {
    pub url: String,
    pub status: Status,
    pub content: Option<String>,
    pub tags: Vec<String>,
    pub error_msg: Option<String>,
    pub metadata: Option<PageMetadata>,
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeEntry {
    pub fn content_len(&self) -> usize {
        self.content.as_deref().map(|c| c.chars().count()).unwrap_or(0)
    }
}

/// Lowercase, dedupe, and cap a tag list, keeping first-seen order.
pub fn cap_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim().to_lowercase();
        if tag.is_empty() || out.contains(&tag) {
            continue;
        }
        out.push(tag);
        if out.len() == MAX_TAGS {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrips_through_str() {
        for status in [
            Status::Pending,
            Status::Crawling,
            Status::Crawled,
            Status::Failed,
            Status::Protected,
        ] {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
        assert!("archived".parse::<Status>().is_err());
    }

    #[test]
    fn cap_tags_dedupes_and_limits() {
        let many: Vec<String> = (0..40).map(|i| format!("Tag{}", i % 20)).collect();
        let capped = cap_tags(&many);
        assert_eq!(capped.len(), MAX_TAGS);
        assert_eq!(capped[0], "tag0");
        assert!(capped.iter().all(|t| t == &t.to_lowercase()));
    }

    #[test]
    fn metadata_skips_empty_fields() {
        let meta = PageMetadata {
            title: Some("Foo".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json, serde_json::json!({ "title": "Foo" }));
        assert!(PageMetadata::default().is_empty());
    }
}
