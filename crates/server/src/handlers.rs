// ABOUTME: Request handlers for the knowledge-base HTTP API.
// ABOUTME: Thin adapters from JSON bodies and query strings onto Crawler and KnowledgeStore calls.

use std::future::Future;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lore_crawler::{
    seed, BatchReport, CrawlOutcome, Crawler, PageMetadata, SeedReport, StoreError,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::state::AppState;

type ApiResult = Result<Response, ApiError>;

fn require_url(url: &str) -> Result<&str, ApiError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ApiError::BadRequest("url is required".into()));
    }
    Ok(url)
}

#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct AddRequest {
    #[serde(default)]
    pub url: String,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct WalletRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
    pub tags: Option<Vec<String>>,
    /// Display name, stored as the metadata title.
    pub name: Option<String>,
    pub metadata: Option<PageMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct DiscoverRequest {
    #[serde(default)]
    pub url: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct EntryQuery {
    #[serde(default)]
    pub url: String,
}

#[derive(Serialize)]
struct Flagged<T: Serialize> {
    success: bool,
    #[serde(flatten)]
    body: T,
}

fn ok<T: Serialize>(body: T) -> Response {
    (StatusCode::OK, Json(Flagged { success: true, body })).into_response()
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// POST /add: direct write when content is given, otherwise a pending insert.
pub async fn add(State(state): State<AppState>, Json(req): Json<AddRequest>) -> ApiResult {
    let url = require_url(&req.url)?;

    match req.content.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(content) => {
            state.crawler.add_content(url, content, req.tags)?;
            info!(url, "content added directly");
            Ok(ok(json!({ "url": url, "status": "crawled" })))
        }
        None => {
            let added = state.crawler.add(url)?;
            let status = state
                .store()
                .get(url)?
                .map(|e| e.status)
                .ok_or_else(|| ApiError::NotFound(url.to_string()))?;
            Ok(ok(json!({ "url": url, "added": added, "status": status })))
        }
    }
}

/// POST /crawl
pub async fn crawl(State(state): State<AppState>, Json(req): Json<UrlRequest>) -> ApiResult {
    let url = require_url(&req.url)?;
    match state.crawler.crawl_one(url).await {
        outcome @ CrawlOutcome::Success(_) => Ok((StatusCode::OK, Json(outcome)).into_response()),
        CrawlOutcome::Failure(failure) => Err(ApiError::Crawl(failure)),
        CrawlOutcome::Skipped { url, .. } => Err(ApiError::Protected(url)),
    }
}

/// Run a batch on its own task and wait for it up to the configured bound.
///
/// A batch that outlives the wait keeps running; the caller gets a 504.
async fn run_batch<F, Fut>(state: &AppState, name: &'static str, batch: F) -> ApiResult
where
    F: FnOnce(Arc<Crawler>) -> Fut,
    Fut: Future<Output = Result<BatchReport, StoreError>> + Send + 'static,
{
    let task = tokio::spawn(batch(state.crawler.clone()));
    match tokio::time::timeout(state.batch_timeout, task).await {
        Ok(Ok(Ok(report))) => Ok(ok(report)),
        Ok(Ok(Err(err))) => Err(err.into()),
        Ok(Err(join)) => Err(ApiError::Internal(format!("{} task: {}", name, join))),
        Err(_) => {
            warn!(batch = name, timeout = ?state.batch_timeout, "batch outlived caller wait");
            Err(ApiError::BatchTimeout(state.batch_timeout))
        }
    }
}

/// POST /crawl-all
pub async fn crawl_all(State(state): State<AppState>) -> ApiResult {
    run_batch(&state, "crawl-all", |crawler| async move {
        crawler.crawl_pending_and_failed().await
    })
    .await
}

/// POST /recrawl-all
pub async fn recrawl_all(State(state): State<AppState>) -> ApiResult {
    run_batch(&state, "recrawl-all", |crawler| async move {
        crawler.recrawl_all().await
    })
    .await
}

pub async fn all(State(state): State<AppState>) -> ApiResult {
    Ok(Json(state.store().list()?).into_response())
}

pub async fn search(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> ApiResult {
    Ok(Json(state.store().search(&query.q)?).into_response())
}

pub async fn semantic_search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult {
    Ok(Json(state.store().semantic_search(&query.q)?).into_response())
}

/// GET /entry?url=
pub async fn entry(State(state): State<AppState>, Query(query): Query<EntryQuery>) -> ApiResult {
    let url = require_url(&query.url)?;
    match state.store().get(url)? {
        Some(entry) => Ok(Json(entry).into_response()),
        None => Err(ApiError::NotFound(url.to_string())),
    }
}

/// DELETE /remove
pub async fn remove(State(state): State<AppState>, Json(req): Json<UrlRequest>) -> ApiResult {
    let url = require_url(&req.url)?;
    if !state.store().remove(url)? {
        return Err(ApiError::NotFound(url.to_string()));
    }
    info!(url, "entry removed");
    Ok(ok(json!({ "url": url })))
}

/// DELETE /clear: removes everything except protected entries.
pub async fn clear(State(state): State<AppState>) -> ApiResult {
    let removed = state.store().clear()?;
    warn!(removed, "knowledge base cleared");
    Ok(ok(json!({ "removed": removed })))
}

/// POST /add-wallet-info
pub async fn add_wallet_info(
    State(state): State<AppState>,
    Json(req): Json<WalletRequest>,
) -> ApiResult {
    let url = require_url(&req.url)?;
    let content = req.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("content is required".into()));
    }

    let mut metadata = req.metadata.unwrap_or_default();
    if metadata.title.is_none() {
        metadata.title = req.name.filter(|n| !n.trim().is_empty());
    }
    let metadata = (!metadata.is_empty()).then_some(metadata);

    state
        .crawler
        .add_protected(url, content, req.tags, metadata)?;
    info!(url, "protected entry written");
    Ok(ok(json!({ "url": url, "status": "protected" })))
}

/// GET /wallets
pub async fn wallets(State(state): State<AppState>) -> ApiResult {
    Ok(Json(state.store().list_protected()?).into_response())
}

/// POST /discover: find urls through robots.txt and sitemaps, add them as pending.
pub async fn discover(
    State(state): State<AppState>,
    Json(req): Json<DiscoverRequest>,
) -> ApiResult {
    let url = require_url(&req.url)?;
    let discoverer = match req.limit {
        Some(limit) => (*state.discoverer).clone().limit(limit),
        None => (*state.discoverer).clone(),
    };

    let found = discoverer.discover(url).await.map_err(|err| {
        if err.is_invalid_url() || err.is_ssrf() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    })?;

    let mut added = 0;
    for candidate in &found.urls {
        match state.crawler.add(candidate) {
            Ok(true) => added += 1,
            Ok(false) => {}
            Err(err) => warn!(url = %candidate, error = %err, "discovered url rejected"),
        }
    }
    info!(site = %found.site, found = found.urls.len(), added, "discovery finished");

    Ok(ok(json!({
        "site": found.site,
        "sitemaps": found.sitemaps,
        "found": found.urls.len(),
        "added": added,
        "urls": found.urls,
    })))
}

/// POST /sources/seed
pub async fn seed_sources(State(state): State<AppState>) -> ApiResult {
    let report: SeedReport = seed(&state.crawler, &state.sources, Some(&state.discoverer)).await;
    Ok(ok(report))
}

/// GET /stats
pub async fn stats(State(state): State<AppState>) -> ApiResult {
    let by_status = state.store().count_by_status()?;
    let total: usize = by_status.values().sum();
    Ok(Json(json!({ "total": total, "byStatus": by_status })).into_response())
}
