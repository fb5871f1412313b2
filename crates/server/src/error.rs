// ABOUTME: ApiError maps store, crawl and request failures onto HTTP status codes.
// ABOUTME: Every error body has the shape {success: false, error, errorType?, retryable?}.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lore_crawler::{CrawlFailure, ErrorKind, StoreError};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("no entry for {0}")]
    NotFound(String),

    #[error("{0} is protected and cannot be changed by crawling")]
    Protected(String),

    #[error("crawl failed: {}", .0.error)]
    Crawl(CrawlFailure),

    #[error("batch still running after {}s; it continues in the background", .0.as_secs())]
    BatchTimeout(Duration),

    #[error("store: {0}")]
    Store(StoreError),

    #[error("internal: {0}")]
    Internal(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_type: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retryable: Option<bool>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Protected(_) => StatusCode::CONFLICT,
            ApiError::Crawl(f) if f.error_type == ErrorKind::InvalidUrl => StatusCode::BAD_REQUEST,
            ApiError::Crawl(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BatchTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Protected(url) => ApiError::Protected(url),
            StoreError::NotFound(url) => ApiError::NotFound(url),
            StoreError::InvalidUrl(e) => ApiError::BadRequest(e.to_string()),
            other => ApiError::Store(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        }

        let body = match self {
            ApiError::Crawl(failure) => ErrorBody {
                success: false,
                error: failure.error,
                error_type: Some(failure.error_type),
                retryable: Some(failure.retryable),
            },
            ApiError::BadRequest(msg) => ErrorBody {
                success: false,
                error: msg,
                error_type: None,
                retryable: None,
            },
            other => ErrorBody {
                success: false,
                error: other.to_string(),
                error_type: None,
                retryable: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lore_crawler::CrawlError;

    #[test]
    fn store_errors_map_to_statuses() {
        let cases = [
            (StoreError::Protected("u".into()), StatusCode::CONFLICT),
            (StoreError::NotFound("u".into()), StatusCode::NOT_FOUND),
            (
                StoreError::InvalidUrl(CrawlError::invalid_url("ftp://x", "Guard", None)),
                StatusCode::BAD_REQUEST,
            ),
            (StoreError::Poisoned, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, want) in cases {
            assert_eq!(ApiError::from(err).status(), want);
        }
    }

    #[test]
    fn invalid_url_crawl_is_bad_request() {
        let failure = CrawlFailure {
            url: "javascript:alert(1)".into(),
            error: "unsupported scheme".into(),
            error_type: ErrorKind::InvalidUrl,
            retryable: false,
        };
        assert_eq!(ApiError::Crawl(failure).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::BatchTimeout(Duration::from_secs(1)).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }
}
