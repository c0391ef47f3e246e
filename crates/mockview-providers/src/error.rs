//! Mapping of HTTP failures onto the core error types.

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Deserialize;

use mockview_core::error::{AnalyzerError, AuthError};

/// Delay used when a 429 response carries no usable `retry-after` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// Error body shape used by the backend: `{"detail": "..."}`.
#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

/// The backend's `detail` message, or the status text when the body has none.
pub(crate) fn error_reason(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|e| e.detail)
        .ok()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
        })
}

/// `retry-after` in milliseconds; only the delay-seconds form is understood.
pub(crate) fn retry_after_ms(headers: &HeaderMap) -> u64 {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
        * 1000
}

/// Classify a transport failure from the analyzer endpoint.
pub(crate) fn analyzer_send_error(err: reqwest::Error, timeout_ms: u64) -> AnalyzerError {
    if err.is_timeout() {
        AnalyzerError::Timeout(timeout_ms)
    } else {
        AnalyzerError::Network(err.to_string())
    }
}

/// Classify a non-success response from the analyzer endpoint.
pub(crate) fn analyzer_status_error(
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
) -> AnalyzerError {
    match status.as_u16() {
        429 => AnalyzerError::RateLimited {
            retry_after_ms: retry_after_ms(headers),
        },
        400 | 422 => AnalyzerError::Rejected(error_reason(status, body)),
        code => AnalyzerError::Api {
            status: code,
            message: error_reason(status, body),
        },
    }
}

pub(crate) fn auth_send_error(err: reqwest::Error) -> AuthError {
    AuthError::Network(err.to_string())
}
