// ABOUTME: Plain HTTP GET with the SSRF guard applied to the target and to every redirect hop.
// ABOUTME: Backs the http fetcher and robots.txt/sitemap discovery; bodies are capped and charset-decoded.

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use bytes::Bytes;
use encoding_rs::Encoding;
use url::Url;

use super::{PageFetcher, RenderedPage};
use crate::error::CrawlError;
use crate::guard::{ensure_public_host, is_private_ip, validate_url};
use crate::options::CrawlerOptions;

/// Bodies larger than this are refused (10 MB).
pub const MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub headers: HashMap<String, String>,
    pub allow_private_networks: bool,
}

/// A 2xx response with its body read.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: u16,
    pub url: String,
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl FetchResult {
    pub fn text(&self) -> String {
        decode_body(&self.body, self.content_type.as_deref())
    }
}

/// Decode with the declared charset, falling back to detection.
pub fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    let declared = content_type
        .and_then(extract_charset)
        .and_then(|label| Encoding::for_label(label.as_bytes()));
    let encoding = declared.unwrap_or_else(|| {
        let mut detector = chardetng::EncodingDetector::new();
        detector.feed(body, true);
        detector.guess(None, true)
    });
    encoding.decode(body).0.into_owned()
}

/// The `charset=` parameter of a Content-Type value, lowercased and unquoted.
pub fn extract_charset(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(|c| c == '"' || c == '\'').to_lowercase())
    })
}

/// Reject redirect hops that name a private address literally.
///
/// The redirect policy runs synchronously inside the async client, so no
/// DNS lookup happens here. Hostname hops are followed and the landing host
/// is resolved and checked by [`fetch`] once the response arrives.
fn vet_redirect(next: &Url) -> Result<(), &'static str> {
    let Some(host) = next.host_str() else {
        return Ok(());
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    match host.parse::<IpAddr>() {
        Ok(ip) if is_private_ip(&ip) => Err("redirect to private IP blocked"),
        _ => Ok(()),
    }
}

/// Build a client configured from crawler options.
pub fn build_client(opts: &CrawlerOptions) -> Result<reqwest::Client, CrawlError> {
    let allow_private = opts.allow_private_networks;
    let policy = reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        if allow_private {
            return attempt.follow();
        }
        match vet_redirect(attempt.url()) {
            Ok(()) => attempt.follow(),
            Err(reason) => attempt.error(reason),
        }
    });

    reqwest::Client::builder()
        .redirect(policy)
        .user_agent(&opts.user_agent)
        .timeout(opts.nav_timeout)
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()
        .map_err(|e| CrawlError::fetch("", "BuildClient", Some(e.into())))
}

fn too_large(url: &str, size: impl std::fmt::Display) -> CrawlError {
    CrawlError::fetch(
        url,
        "Fetch",
        Some(anyhow::anyhow!("content too large: {} bytes", size)),
    )
}

/// GET `url`. Non-2xx statuses fail with `HTTP status N` in the detail.
pub async fn fetch(
    client: &reqwest::Client,
    url: &str,
    opts: &FetchOptions,
) -> Result<FetchResult, CrawlError> {
    let target = validate_url(url, opts.allow_private_networks)?;
    ensure_public_host(&target, opts.allow_private_networks).await?;

    let request = opts
        .headers
        .iter()
        .fold(client.get(target.as_str()), |req, (k, v)| req.header(k, v));

    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            CrawlError::timeout(url, "Fetch", Some(e.into()))
        } else {
            // {:#} keeps the hyper/io cause chain, which the classifier reads
            CrawlError::fetch(url, "Fetch", Some(anyhow::Error::new(e).context("request failed")))
        }
    })?;

    if let Err(err) = ensure_public_host(response.url(), opts.allow_private_networks).await {
        return Err(match err.is_ssrf() {
            true => CrawlError::ssrf(
                url,
                "Fetch",
                Some(anyhow::anyhow!("redirected to a private address")),
            ),
            false => err,
        });
    }

    if let Some(len) = response.content_length() {
        if len as usize > MAX_CONTENT_LENGTH {
            return Err(too_large(url, len));
        }
    }

    let status = response.status().as_u16();
    if !(200..300).contains(&status) {
        return Err(CrawlError::fetch(
            url,
            "Fetch",
            Some(anyhow::anyhow!("HTTP status {}", status)),
        ));
    }

    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_lowercase);
    let body = response
        .bytes()
        .await
        .map_err(|e| CrawlError::fetch(url, "ReadBody", Some(e.into())))?;
    if body.len() > MAX_CONTENT_LENGTH {
        return Err(too_large(url, body.len()));
    }

    Ok(FetchResult {
        status,
        url: url.to_string(),
        final_url,
        content_type,
        body,
    })
}

/// Fetcher that skips rendering: the raw response body is the page.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    fetch_opts: FetchOptions,
}

impl HttpFetcher {
    pub fn new(opts: &CrawlerOptions) -> Result<Self, CrawlError> {
        Ok(Self {
            client: build_client(opts)?,
            fetch_opts: FetchOptions {
                headers: opts.headers.clone(),
                allow_private_networks: opts.allow_private_networks,
            },
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<RenderedPage, CrawlError> {
        let result = fetch(&self.client, url, &self.fetch_opts).await?;
        let html = result.text();
        Ok(RenderedPage {
            url: result.url,
            final_url: result.final_url,
            html,
            visible_text: None,
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
