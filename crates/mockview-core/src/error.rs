//! Error types.
//!
//! `SessionError` is what callers of the engine, auth session, and aggregator
//! see. `AnalyzerError` and `AuthError` come back from the external
//! collaborators and are classified here so the engine can make retry
//! decisions without string matching.

use thiserror::Error;

/// Errors surfaced by session-bearing operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Malformed input to an operation, e.g. an empty question list.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// User input that must be corrected before retrying, e.g. an empty answer.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Another operation is in flight for this session.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The analyzer failed after all retries.
    #[error("analysis failed after {attempts} attempt(s): {reason}")]
    Analysis { attempts: u32, reason: String },

    /// Login was rejected; the message is safe to show to the user.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The caller is not authenticated and should be sent to the login entry.
    #[error("not authenticated")]
    Unauthorized,

    /// An illegal transition; indicates a caller bug.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The persistence collaborator failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl SessionError {
    /// Whether the enclosing application should redirect to login.
    pub fn requires_login(&self) -> bool {
        matches!(self, SessionError::Unauthorized)
    }

    pub(crate) fn storage(err: anyhow::Error) -> Self {
        SessionError::Storage(format!("{err:#}"))
    }
}

/// Failures reported by an answer analyzer.
#[derive(Debug, Clone, Error)]
pub enum AnalyzerError {
    /// The analyzer asked us to back off.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// A single attempt exceeded its time budget.
    #[error("analysis timed out after {0}ms")]
    Timeout(u64),

    #[error("network error: {0}")]
    Network(String),

    /// The analyzer returned an error response.
    #[error("analyzer error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The analyzer answered with something we cannot use.
    #[error("invalid analyzer response: {0}")]
    InvalidResponse(String),

    /// The analyzer refused the request outright.
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl AnalyzerError {
    /// Returns `true` if the failure is worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            AnalyzerError::RateLimited { .. }
            | AnalyzerError::Timeout(_)
            | AnalyzerError::Network(_) => true,
            AnalyzerError::Api { status, .. } => *status >= 500 || *status == 408,
            AnalyzerError::InvalidResponse(_) | AnalyzerError::Rejected(_) => false,
        }
    }

    /// Returns the retry-after delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            AnalyzerError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

/// Failures reported by an authentication backend.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Credentials or token were refused; carries the backend's reason.
    #[error("{0}")]
    Rejected(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid authentication response: {0}")]
    InvalidResponse(String),
}

impl From<AuthError> for SessionError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Rejected(reason) => SessionError::Authentication(reason),
            other => SessionError::Authentication(other.to_string()),
        }
    }
}
