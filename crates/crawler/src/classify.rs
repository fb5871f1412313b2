// ABOUTME: Translation boundary from raw fetch/browser failure text to the closed ErrorKind set.
// ABOUTME: Engine-specific error strings live only here; the rest of the pipeline sees ErrorKind.

//! Crawl failure classification.
//!
//! Failures coming out of the browser engine or the HTTP client are plain
//! text. [`classify`] maps that text onto [`ErrorKind`] by substring match
//! against an ordered signature table. When several signatures match, the
//! one listed first wins, so the table runs from most to least specific.

use std::fmt;

use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Closed taxonomy of crawl failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Timeout,
    ConnectionRefused,
    DnsError,
    ConnectionTimeout,
    SslError,
    Blocked,
    InvalidUrl,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::ConnectionRefused => "CONNECTION_REFUSED",
            ErrorKind::DnsError => "DNS_ERROR",
            ErrorKind::ConnectionTimeout => "CONNECTION_TIMEOUT",
            ErrorKind::SslError => "SSL_ERROR",
            ErrorKind::Blocked => "BLOCKED",
            ErrorKind::InvalidUrl => "INVALID_URL",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }

    /// Transient failures worth another attempt on a later batch.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout | ErrorKind::ConnectionTimeout | ErrorKind::DnsError
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered failure signatures, most specific first.
const SIGNATURES: &[(&str, ErrorKind)] = &[
    // DNS
    ("err_name_not_resolved", ErrorKind::DnsError),
    ("err_name_resolution_failed", ErrorKind::DnsError),
    ("enotfound", ErrorKind::DnsError),
    ("eai_again", ErrorKind::DnsError),
    ("dns error", ErrorKind::DnsError),
    ("dns lookup failed", ErrorKind::DnsError),
    ("failed to lookup address", ErrorKind::DnsError),
    ("name or service not known", ErrorKind::DnsError),
    ("no such host", ErrorKind::DnsError),
    // Connect-phase timeouts
    ("err_connection_timed_out", ErrorKind::ConnectionTimeout),
    ("etimedout", ErrorKind::ConnectionTimeout),
    ("connection timed out", ErrorKind::ConnectionTimeout),
    ("connect timeout", ErrorKind::ConnectionTimeout),
    // Refused
    ("err_connection_refused", ErrorKind::ConnectionRefused),
    ("econnrefused", ErrorKind::ConnectionRefused),
    ("connection refused", ErrorKind::ConnectionRefused),
    // TLS
    ("err_cert_", ErrorKind::SslError),
    ("err_ssl_", ErrorKind::SslError),
    ("invalid peer certificate", ErrorKind::SslError),
    ("certificate", ErrorKind::SslError),
    ("tls handshake", ErrorKind::SslError),
    ("ssl", ErrorKind::SslError),
    // Rejected before any network traffic
    ("err_invalid_url", ErrorKind::InvalidUrl),
    ("invalid url", ErrorKind::InvalidUrl),
    ("invalid uri", ErrorKind::InvalidUrl),
    ("relative url without a base", ErrorKind::InvalidUrl),
    ("unsupported scheme", ErrorKind::InvalidUrl),
    ("ssrf rejected", ErrorKind::InvalidUrl),
    // Anti-bot and access control
    ("err_blocked_by_client", ErrorKind::Blocked),
    ("err_blocked_by_response", ErrorKind::Blocked),
    ("err_blocked_by_administrator", ErrorKind::Blocked),
    ("http status 401", ErrorKind::Blocked),
    ("http status 403", ErrorKind::Blocked),
    ("http status 429", ErrorKind::Blocked),
    ("access denied", ErrorKind::Blocked),
    ("forbidden", ErrorKind::Blocked),
    ("captcha", ErrorKind::Blocked),
    ("too many requests", ErrorKind::Blocked),
    ("blocked", ErrorKind::Blocked),
    // Generic timeouts last, they overlap with the connect-phase ones
    ("navigation timeout", ErrorKind::Timeout),
    ("err_timed_out", ErrorKind::Timeout),
    ("timed out", ErrorKind::Timeout),
    ("timeout", ErrorKind::Timeout),
    ("deadline", ErrorKind::Timeout),
];

static MATCHER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(SIGNATURES.iter().map(|(pattern, _)| *pattern))
        .expect("classifier signatures must compile")
});

/// Map raw failure text onto the closed [`ErrorKind`] set.
pub fn classify(raw: &str) -> ErrorKind {
    MATCHER
        .find_overlapping_iter(raw)
        .map(|m| m.pattern().as_usize())
        .min()
        .map(|idx| SIGNATURES[idx].1)
        .unwrap_or(ErrorKind::Unknown)
}

/// True only for the transient kinds: TIMEOUT, CONNECTION_TIMEOUT, DNS_ERROR.
pub fn is_retryable(kind: ErrorKind) -> bool {
    kind.is_retryable()
}
