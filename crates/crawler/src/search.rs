// ABOUTME: Keyword and scored semantic search over knowledge entries.
// ABOUTME: Ranking is pure over an already recency-ordered entry list.

//! Search over the knowledge base.
//!
//! Both searches take entries in store order (most recently updated
//! first) so that recency breaks ties without a second sort key.

use serde::Serialize;

use crate::entry::{KnowledgeEntry, PageMetadata, Status};
use crate::vocabulary::ecosystems_in;

/// Result cap for single-word keyword queries.
pub const KEYWORD_LIMIT_SINGLE: usize = 10;
/// Result cap for multi-word keyword queries.
pub const KEYWORD_LIMIT_MULTI: usize = 15;
/// Result cap for semantic search.
pub const SEMANTIC_LIMIT: usize = 10;

const CONTENT_POINTS: u32 = 10;
const TAG_POINTS: u32 = 15;
const ECOSYSTEM_POINTS: u32 = 20;
const URL_POINTS: u32 = 5;

/// Lowercase query words longer than two characters, deduplicated.
///
/// A query with no such word searches for the whole trimmed query instead.
pub fn significant_words(query: &str) -> Vec<String> {
    let trimmed = query.trim().to_lowercase();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let mut words: Vec<String> = Vec::new();
    for raw in trimmed.split_whitespace() {
        let word = raw.trim_matches(|c: char| !c.is_alphanumeric() && c != '-');
        if word.chars().count() > 2 && !words.iter().any(|w| w == word) {
            words.push(word.to_string());
        }
    }
    if words.is_empty() {
        words.push(trimmed);
    }
    words
}

fn haystack(entry: &KnowledgeEntry) -> String {
    let mut hay = String::new();
    if let Some(ref c) = entry.content {
        hay.push_str(c);
    }
    hay.push(' ');
    hay.push_str(&entry.tags.join(" "));
    hay.push(' ');
    hay.push_str(&entry.url);
    if let Some(ref meta) = entry.metadata {
        push_metadata_values(&mut hay, meta);
    }
    hay.to_lowercase()
}

/// Metadata contributes its values only; field names never match a query.
fn push_metadata_values(hay: &mut String, meta: &PageMetadata) {
    let scalars = meta.title.iter().chain(meta.description.iter());
    let lists = meta.social_links.iter().chain(&meta.emails).chain(&meta.marketing);
    for value in scalars.chain(lists) {
        hay.push(' ');
        hay.push_str(value);
    }
    for value in meta.extra.values() {
        hay.push(' ');
        match value {
            serde_json::Value::String(s) => hay.push_str(s),
            other => hay.push_str(&other.to_string()),
        }
    }
}

/// Prioritized keyword search.
///
/// Entries matching every word come before entries matching some word;
/// within each group the input (recency) order is kept.
pub fn keyword_search(entries: Vec<KnowledgeEntry>, query: &str) -> Vec<KnowledgeEntry> {
    let words = significant_words(query);
    if words.is_empty() {
        return Vec::new();
    }
    let limit = if words.len() == 1 {
        KEYWORD_LIMIT_SINGLE
    } else {
        KEYWORD_LIMIT_MULTI
    };

    let mut all = Vec::new();
    let mut any = Vec::new();
    for entry in entries {
        let hay = haystack(&entry);
        let hits = words.iter().filter(|w| hay.contains(w.as_str())).count();
        if hits == words.len() {
            all.push(entry);
        } else if hits > 0 {
            any.push(entry);
        }
    }
    all.extend(any);
    all.truncate(limit);
    all
}

/// An entry with its semantic score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredEntry {
    #[serde(flatten)]
    pub entry: KnowledgeEntry,
    pub score: u32,
}

/// Score one entry against the query words and the query's ecosystems.
pub fn score_entry(entry: &KnowledgeEntry, words: &[String], query_ecosystems: &[&str]) -> u32 {
    let content = entry.content.as_deref().unwrap_or_default().to_lowercase();
    let url = entry.url.to_lowercase();
    let mut score = 0;

    for word in words {
        if content.contains(word.as_str()) {
            score += CONTENT_POINTS;
        }
        if entry.tags.iter().any(|t| t.contains(word.as_str())) {
            score += TAG_POINTS;
        }
    }

    if !query_ecosystems.is_empty() {
        let mut entry_ecosystems = ecosystems_in(&format!("{} {}", content, url));
        entry_ecosystems.extend(
            query_ecosystems
                .iter()
                .filter(|label| entry.tags.iter().any(|t| t == *label))
                .copied(),
        );
        if query_ecosystems.iter().any(|q| entry_ecosystems.contains(q)) {
            score += ECOSYSTEM_POINTS;
        }
    }

    if words.iter().any(|w| url.contains(w.as_str())) {
        score += URL_POINTS;
    }
    score
}

/// Scored search over entries that carry content.
pub fn semantic_search(entries: Vec<KnowledgeEntry>, query: &str) -> Vec<ScoredEntry> {
    let words = significant_words(query);
    if words.is_empty() {
        return Vec::new();
    }
    let query_ecosystems = ecosystems_in(query);

    let mut scored: Vec<ScoredEntry> = entries
        .into_iter()
        .filter(|e| matches!(e.status, Status::Crawled | Status::Protected))
        .filter_map(|entry| {
            let score = score_entry(&entry, &words, &query_ecosystems);
            (score > 0).then_some(ScoredEntry { entry, score })
        })
        .collect();
    // stable: equal scores keep recency order
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(SEMANTIC_LIMIT);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn entry(url: &str, content: &str, tags: &[&str]) -> KnowledgeEntry {
        KnowledgeEntry {
            url: url.to_string(),
            status: Status::Crawled,
            content: Some(content.to_string()),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            error_msg: None,
            metadata: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn metadata_field_names_do_not_match() {
        let mut garden = entry("https://garden.example/", "Garden tools", &[]);
        garden.metadata = Some(PageMetadata {
            title: Some("Acme".to_string()),
            social_links: vec!["https://x.com/acme".to_string()],
            ..Default::default()
        });
        let all = vec![garden];

        assert!(keyword_search(all.clone(), "title").is_empty());
        assert!(keyword_search(all.clone(), "sociallinks").is_empty());
        assert!(keyword_search(all.clone(), "socialLinks").is_empty());
        assert_eq!(keyword_search(all, "acme").len(), 1);
    }

    #[test]
    fn significant_words_filter_and_fallback() {
        assert_eq!(significant_words("a lightning  Wallet"), vec!["lightning", "wallet"]);
        assert_eq!(significant_words(" ai "), vec!["ai"]);
        assert!(significant_words("   ").is_empty());
        assert_eq!(significant_words("wallet wallet"), vec!["wallet"]);
    }

    #[test]
    fn dual_match_ranks_first() {
        // newer entry first in input, matching only one word
        let entries = vec![
            entry("https://a.example/wallet", "A simple wallet", &["wallet"]),
            entry("https://b.example/ln", "A lightning wallet for payments", &[]),
        ];
        let results = keyword_search(entries, "lightning wallet");
        let urls: Vec<_> = results.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, vec!["https://b.example/ln", "https://a.example/wallet"]);
    }

    #[test]
    fn keyword_limits_depend_on_word_count() {
        let many: Vec<_> = (0..20)
            .map(|i| entry(&format!("https://e{}.example/", i), "wallet lightning", &[]))
            .collect();
        assert_eq!(keyword_search(many.clone(), "wallet").len(), KEYWORD_LIMIT_SINGLE);
        assert_eq!(keyword_search(many, "wallet lightning").len(), KEYWORD_LIMIT_MULTI);
    }

    #[test]
    fn keyword_matches_url_and_metadata() {
        let mut e = entry("https://acme.example/docs", "", &[]);
        e.metadata = Some(crate::entry::PageMetadata {
            title: Some("Acme Handbook".to_string()),
            ..Default::default()
        });
        assert_eq!(keyword_search(vec![e.clone()], "handbook").len(), 1);
        assert_eq!(keyword_search(vec![e], "acme").len(), 1);
    }

    #[test]
    fn semantic_scoring_components() {
        let e = entry("https://example.com/lightning", "lightning payments", &["lightning"]);
        let words = significant_words("lightning");
        let eco = ecosystems_in("lightning");
        // content 10 + tags 15 + ecosystem 20 + url 5
        assert_eq!(score_entry(&e, &words, &eco), 50);
    }

    #[test]
    fn semantic_ecosystem_bonus_without_literal_match() {
        let entries = vec![
            entry("https://x.example/", "lnd node setup guide", &["lightning"]),
            entry("https://y.example/", "gardening tips", &["garden"]),
        ];
        let results = semantic_search(entries, "lnurl");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entry.url, "https://x.example/");
        assert_eq!(results[0].score, ECOSYSTEM_POINTS);
    }

    #[test]
    fn semantic_skips_entries_without_content_status() {
        let mut pending = entry("https://p.example/wallet", "wallet", &["wallet"]);
        pending.status = Status::Pending;
        assert!(semantic_search(vec![pending], "wallet").is_empty());
    }

    #[test]
    fn semantic_sorted_and_capped() {
        let mut entries: Vec<_> = (0..12)
            .map(|i| entry(&format!("https://e{}.example/", i), "wallet", &[]))
            .collect();
        entries.push(entry("https://best.example/wallet", "wallet", &["wallet"]));
        let results = semantic_search(entries, "wallet");
        assert_eq!(results.len(), SEMANTIC_LIMIT);
        assert_eq!(results[0].entry.url, "https://best.example/wallet");
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }
}
