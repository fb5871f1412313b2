// ABOUTME: SQLite-backed knowledge store with a status lifecycle and protected rows.
// ABOUTME: Every write is a single-row statement keyed by url; caps are enforced here.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::entry::{cap_tags, KnowledgeEntry, PageMetadata, Status, MAX_CONTENT_CHARS};
use crate::error::StoreError;
use crate::normalize::truncate_words;
use crate::search::{keyword_search, semantic_search, ScoredEntry};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS knowledge (
    url TEXT PRIMARY KEY,
    status TEXT NOT NULL DEFAULT 'pending',
    content TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    error_msg TEXT,
    metadata TEXT,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_knowledge_status ON knowledge(status);
CREATE INDEX IF NOT EXISTS idx_knowledge_updated ON knowledge(updated_at);
";

const COLUMNS: &str = "url, status, content, tags, error_msg, metadata, updated_at";
const ORDER: &str = "ORDER BY updated_at DESC, url ASC";

struct Inner {
    conn: Connection,
    last_stamp: DateTime<Utc>,
}

impl Inner {
    /// Strictly increasing timestamps, so recency order is total.
    fn stamp(&mut self) -> String {
        let mut now = Utc::now();
        if now <= self.last_stamp {
            now = self.last_stamp + Duration::microseconds(1);
        }
        self.last_stamp = now;
        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

/// Raw column values, decoded outside the rusqlite row closure.
struct RawRow {
    url: String,
    status: String,
    content: Option<String>,
    tags: String,
    error_msg: Option<String>,
    metadata: Option<String>,
    updated_at: String,
}

impl RawRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            url: row.get(0)?,
            status: row.get(1)?,
            content: row.get(2)?,
            tags: row.get(3)?,
            error_msg: row.get(4)?,
            metadata: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn decode(self) -> Result<KnowledgeEntry, StoreError> {
        let status = self
            .status
            .parse::<Status>()
            .map_err(|e| StoreError::Corrupt(format!("{}: {}", self.url, e)))?;
        let tags: Vec<String> = serde_json::from_str(&self.tags)?;
        let metadata = match self.metadata {
            Some(ref json) => Some(serde_json::from_str::<PageMetadata>(json)?),
            None => None,
        };
        let updated_at = DateTime::parse_from_rfc3339(&self.updated_at)?.with_timezone(&Utc);
        Ok(KnowledgeEntry {
            url: self.url,
            status,
            content: self.content,
            tags,
            error_msg: self.error_msg,
            metadata,
            updated_at,
        })
    }
}

fn capped_content(content: &str) -> String {
    truncate_words(content.trim(), MAX_CONTENT_CHARS)
}

fn tags_json(tags: &[String]) -> Result<String, StoreError> {
    Ok(serde_json::to_string(&cap_tags(tags))?)
}

fn metadata_json(metadata: Option<&PageMetadata>) -> Result<Option<String>, StoreError> {
    match metadata {
        Some(m) if !m.is_empty() => Ok(Some(serde_json::to_string(m)?)),
        _ => Ok(None),
    }
}

/// The persisted set of knowledge entries.
pub struct KnowledgeStore {
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for KnowledgeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeStore").finish_non_exhaustive()
    }
}

impl KnowledgeStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// A private in-memory store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            inner: Mutex::new(Inner {
                conn,
                last_stamp: DateTime::<Utc>::MIN_UTC,
            }),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    fn query(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<KnowledgeEntry>, StoreError> {
        let raw: Vec<RawRow> = {
            let inner = self.lock()?;
            let mut stmt = inner.conn.prepare(sql)?;
            let rows = stmt.query_map(args, RawRow::read)?;
            let collected: Vec<RawRow> = rows.collect::<Result<_, _>>()?;
            collected
        };
        raw.into_iter().map(RawRow::decode).collect()
    }

    /// Insert a pending entry. Returns false if the url already exists.
    pub fn add_pending(&self, url: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        let stamp = inner.stamp();
        let changed = inner.conn.execute(
            "INSERT OR IGNORE INTO knowledge (url, status, tags, updated_at)
             VALUES (?1, 'pending', '[]', ?2)",
            params![url, stamp],
        )?;
        Ok(changed > 0)
    }

    /// Fetch one entry.
    pub fn get(&self, url: &str) -> Result<Option<KnowledgeEntry>, StoreError> {
        let sql = format!("SELECT {} FROM knowledge WHERE url = ?1", COLUMNS);
        let raw = {
            let inner = self.lock()?;
            let found = inner
                .conn
                .query_row(&sql, params![url], RawRow::read)
                .optional()?;
            found
        };
        raw.map(RawRow::decode).transpose()
    }

    /// Mark an entry as being crawled, creating it if absent.
    ///
    /// Returns the entry as it was before, so callers can diff a recrawl.
    pub fn begin_crawl(&self, url: &str) -> Result<Option<KnowledgeEntry>, StoreError> {
        let previous = self.get(url)?;
        if let Some(ref prev) = previous {
            if prev.status == Status::Protected {
                return Err(StoreError::Protected(url.to_string()));
            }
        }
        let mut inner = self.lock()?;
        let stamp = inner.stamp();
        let changed = inner.conn.execute(
            "INSERT INTO knowledge (url, status, tags, updated_at)
             VALUES (?1, 'crawling', '[]', ?2)
             ON CONFLICT(url) DO UPDATE SET
                status = 'crawling', error_msg = NULL, updated_at = excluded.updated_at
             WHERE knowledge.status != 'protected'",
            params![url, stamp],
        )?;
        if changed == 0 {
            return Err(StoreError::Protected(url.to_string()));
        }
        Ok(previous)
    }

    /// Write crawled content, creating the entry if absent.
    ///
    /// Fails with [`StoreError::Protected`] instead of touching a protected row.
    pub fn put_crawled(
        &self,
        url: &str,
        content: &str,
        tags: &[String],
        metadata: Option<&PageMetadata>,
    ) -> Result<(), StoreError> {
        let content = capped_content(content);
        let tags = tags_json(tags)?;
        let metadata = metadata_json(metadata)?;
        let mut inner = self.lock()?;
        let stamp = inner.stamp();
        let changed = inner.conn.execute(
            "INSERT INTO knowledge (url, status, content, tags, error_msg, metadata, updated_at)
             VALUES (?1, 'crawled', ?2, ?3, NULL, ?4, ?5)
             ON CONFLICT(url) DO UPDATE SET
                status = 'crawled',
                content = excluded.content,
                tags = excluded.tags,
                error_msg = NULL,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at
             WHERE knowledge.status != 'protected'",
            params![url, content, tags, metadata, stamp],
        )?;
        if changed == 0 {
            return Err(StoreError::Protected(url.to_string()));
        }
        Ok(())
    }

    /// Record a failed crawl. Prior content and tags are left as they were.
    pub fn record_failure(&self, url: &str, error_msg: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let stamp = inner.stamp();
        let changed = inner.conn.execute(
            "INSERT INTO knowledge (url, status, tags, error_msg, updated_at)
             VALUES (?1, 'failed', '[]', ?2, ?3)
             ON CONFLICT(url) DO UPDATE SET
                status = 'failed', error_msg = excluded.error_msg, updated_at = excluded.updated_at
             WHERE knowledge.status != 'protected'",
            params![url, error_msg, stamp],
        )?;
        if changed == 0 {
            return Err(StoreError::Protected(url.to_string()));
        }
        Ok(())
    }

    /// Administrative write of a protected entry. Overwrites any existing row.
    pub fn put_protected(
        &self,
        url: &str,
        content: &str,
        tags: &[String],
        metadata: Option<&PageMetadata>,
    ) -> Result<(), StoreError> {
        let content = capped_content(content);
        let tags = tags_json(tags)?;
        let metadata = metadata_json(metadata)?;
        let mut inner = self.lock()?;
        let stamp = inner.stamp();
        inner.conn.execute(
            "INSERT INTO knowledge (url, status, content, tags, error_msg, metadata, updated_at)
             VALUES (?1, 'protected', ?2, ?3, NULL, ?4, ?5)
             ON CONFLICT(url) DO UPDATE SET
                status = 'protected',
                content = excluded.content,
                tags = excluded.tags,
                error_msg = NULL,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at",
            params![url, content, tags, metadata, stamp],
        )?;
        Ok(())
    }

    /// All entries, most recently updated first.
    pub fn list(&self) -> Result<Vec<KnowledgeEntry>, StoreError> {
        self.query(&format!("SELECT {} FROM knowledge {}", COLUMNS, ORDER), &[])
    }

    /// Entries in any of `statuses`, most recently updated first.
    pub fn list_by_status(&self, statuses: &[Status]) -> Result<Vec<KnowledgeEntry>, StoreError> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = (1..=statuses.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM knowledge WHERE status IN ({}) {}",
            COLUMNS, placeholders, ORDER
        );
        let names: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        let args: Vec<&dyn rusqlite::ToSql> = names.iter().map(|n| n as &dyn rusqlite::ToSql).collect();
        self.query(&sql, &args)
    }

    /// Entries awaiting a first crawl or a retry.
    pub fn list_crawlable(&self) -> Result<Vec<KnowledgeEntry>, StoreError> {
        self.list_by_status(&[Status::Pending, Status::Failed])
    }

    /// Every entry a recrawl may touch.
    pub fn list_recrawlable(&self) -> Result<Vec<KnowledgeEntry>, StoreError> {
        self.query(
            &format!(
                "SELECT {} FROM knowledge WHERE status != 'protected' {}",
                COLUMNS, ORDER
            ),
            &[],
        )
    }

    pub fn list_protected(&self) -> Result<Vec<KnowledgeEntry>, StoreError> {
        self.list_by_status(&[Status::Protected])
    }

    /// Delete one entry, protected or not. Returns false if it did not exist.
    pub fn remove(&self, url: &str) -> Result<bool, StoreError> {
        let inner = self.lock()?;
        let changed = inner
            .conn
            .execute("DELETE FROM knowledge WHERE url = ?1", params![url])?;
        Ok(changed > 0)
    }

    /// Delete every non-protected entry. Returns the number removed.
    pub fn clear(&self) -> Result<usize, StoreError> {
        let inner = self.lock()?;
        let changed = inner
            .conn
            .execute("DELETE FROM knowledge WHERE status != 'protected'", [])?;
        Ok(changed)
    }

    /// Entry counts keyed by status name; every status is present.
    pub fn count_by_status(&self) -> Result<BTreeMap<String, usize>, StoreError> {
        let mut counts: BTreeMap<String, usize> = [
            Status::Pending,
            Status::Crawling,
            Status::Crawled,
            Status::Failed,
            Status::Protected,
        ]
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();

        let inner = self.lock()?;
        let mut stmt = inner
            .conn
            .prepare("SELECT status, COUNT(*) FROM knowledge GROUP BY status")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (status, n) = row?;
            counts.insert(status, n.max(0) as usize);
        }
        Ok(counts)
    }

    /// Prioritized keyword search.
    pub fn search(&self, query: &str) -> Result<Vec<KnowledgeEntry>, StoreError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(keyword_search(self.list()?, query))
    }

    /// Scored search over crawled and protected entries.
    pub fn semantic_search(&self, query: &str) -> Result<Vec<ScoredEntry>, StoreError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let entries = self.list_by_status(&[Status::Crawled, Status::Protected])?;
        Ok(semantic_search(entries, query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::MAX_TAGS;
    use pretty_assertions::assert_eq;

    fn store() -> KnowledgeStore {
        KnowledgeStore::open_in_memory().unwrap()
    }

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn add_is_idempotent() {
        let s = store();
        assert!(s.add_pending("https://example.com/a").unwrap());
        assert!(!s.add_pending("https://example.com/a").unwrap());
        let all = s.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, Status::Pending);
        assert!(all[0].content.is_none());
        assert!(all[0].tags.is_empty());
    }

    #[test]
    fn lifecycle_success_then_failure_keeps_content() {
        let s = store();
        let url = "https://example.com/a";
        s.add_pending(url).unwrap();
        s.begin_crawl(url).unwrap();
        assert_eq!(s.get(url).unwrap().unwrap().status, Status::Crawling);

        s.put_crawled(url, "Some content here.", &tags(&["wallet"]), None)
            .unwrap();
        let crawled = s.get(url).unwrap().unwrap();
        assert_eq!(crawled.status, Status::Crawled);
        assert!(crawled.error_msg.is_none());

        s.begin_crawl(url).unwrap();
        s.record_failure(url, "timeout").unwrap();
        let failed = s.get(url).unwrap().unwrap();
        assert_eq!(failed.status, Status::Failed);
        assert_eq!(failed.error_msg.as_deref(), Some("timeout"));
        assert_eq!(failed.content, crawled.content);
        assert_eq!(failed.tags, crawled.tags);
    }

    #[test]
    fn caps_enforced_on_write() {
        let s = store();
        let many: Vec<String> = (0..30).map(|i| format!("tag{}", i)).collect();
        let long = "word ".repeat(200);
        s.put_crawled("https://example.com/big", &long, &many, None)
            .unwrap();
        let e = s.get("https://example.com/big").unwrap().unwrap();
        assert_eq!(e.tags.len(), MAX_TAGS);
        assert!(e.content_len() <= MAX_CONTENT_CHARS);
    }

    #[test]
    fn protected_rows_survive_crawl_paths_and_clear() {
        let s = store();
        let url = "https://wallet.example/";
        s.put_protected(url, "A curated wallet entry.", &tags(&["wallet"]), None)
            .unwrap();

        assert!(matches!(s.begin_crawl(url), Err(StoreError::Protected(_))));
        assert!(matches!(
            s.put_crawled(url, "overwritten", &[], None),
            Err(StoreError::Protected(_))
        ));
        assert!(matches!(
            s.record_failure(url, "boom"),
            Err(StoreError::Protected(_))
        ));

        s.add_pending("https://other.example/").unwrap();
        assert_eq!(s.clear().unwrap(), 1);

        let kept = s.get(url).unwrap().unwrap();
        assert_eq!(kept.status, Status::Protected);
        assert_eq!(kept.content.as_deref(), Some("A curated wallet entry."));
        assert_eq!(s.list_protected().unwrap().len(), 1);
        assert!(s.list_recrawlable().unwrap().is_empty());
    }

    #[test]
    fn list_orders_by_recency() {
        let s = store();
        s.add_pending("https://a.example/").unwrap();
        s.add_pending("https://b.example/").unwrap();
        s.put_crawled("https://a.example/", "Updated later.", &[], None)
            .unwrap();
        let urls: Vec<_> = s.list().unwrap().into_iter().map(|e| e.url).collect();
        assert_eq!(urls, vec!["https://a.example/", "https://b.example/"]);
    }

    #[test]
    fn crawlable_selects_pending_and_failed() {
        let s = store();
        s.add_pending("https://p.example/").unwrap();
        s.record_failure("https://f.example/", "boom").unwrap();
        s.put_crawled("https://c.example/", "Done.", &[], None).unwrap();
        let mut urls: Vec<_> = s
            .list_crawlable()
            .unwrap()
            .into_iter()
            .map(|e| e.url)
            .collect();
        urls.sort();
        assert_eq!(urls, vec!["https://f.example/", "https://p.example/"]);
    }

    #[test]
    fn remove_and_counts() {
        let s = store();
        s.add_pending("https://a.example/").unwrap();
        s.put_protected("https://w.example/", "Wallet.", &[], None)
            .unwrap();
        let counts = s.count_by_status().unwrap();
        assert_eq!(counts["pending"], 1);
        assert_eq!(counts["protected"], 1);
        assert_eq!(counts["crawled"], 0);

        assert!(s.remove("https://w.example/").unwrap());
        assert!(!s.remove("https://w.example/").unwrap());
    }

    #[test]
    fn metadata_roundtrips_through_json() {
        let s = store();
        let meta = PageMetadata {
            title: Some("Acme".to_string()),
            emails: vec!["hi@acme.io".to_string()],
            ..Default::default()
        };
        s.put_crawled("https://acme.io/", "Acme makes wallets.", &[], Some(&meta))
            .unwrap();
        let e = s.get("https://acme.io/").unwrap().unwrap();
        assert_eq!(e.metadata, Some(meta));
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge.db");
        {
            let s = KnowledgeStore::open(&path).unwrap();
            s.add_pending("https://example.com/a").unwrap();
        }
        let s = KnowledgeStore::open(&path).unwrap();
        assert_eq!(s.list().unwrap().len(), 1);
    }

    #[test]
    fn store_search_prefers_dual_match() {
        let s = store();
        s.put_crawled("https://a.example/", "A hardware wallet.", &tags(&["wallet"]), None)
            .unwrap();
        s.put_crawled(
            "https://b.example/",
            "A lightning wallet for instant payments.",
            &tags(&["lightning", "wallet"]),
            None,
        )
        .unwrap();
        s.put_crawled("https://c.example/", "A newer wallet page.", &[], None)
            .unwrap();
        let urls: Vec<_> = s
            .search("lightning wallet")
            .unwrap()
            .into_iter()
            .map(|e| e.url)
            .collect();
        assert_eq!(urls[0], "https://b.example/");
        assert_eq!(urls.len(), 3);
        assert!(s.search("  ").unwrap().is_empty());
    }

    #[test]
    fn semantic_search_includes_protected() {
        let s = store();
        s.put_protected("https://w.example/", "Self-custody wallet.", &tags(&["wallet"]), None)
            .unwrap();
        s.add_pending("https://wallet.example/").unwrap();
        let results = s.semantic_search("wallet").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entry.url, "https://w.example/");
    }
}
