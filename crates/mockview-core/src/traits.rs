//! Trait definitions for the collaborators the engine depends on.
//!
//! The analyzer and authentication backends are implemented by
//! `mockview-providers`; storage traits have in-crate implementations in
//! [`crate::store`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AnalyzerError, AuthError};
use crate::model::{AnalysisResult, QuestionId, SessionId, SessionState, SessionStatus};

// ---------------------------------------------------------------------------
// Answer analyzer
// ---------------------------------------------------------------------------

/// Scores a free-text answer against a question.
#[async_trait]
pub trait AnswerAnalyzer: Send + Sync {
    /// Human-readable analyzer name (e.g. "http").
    fn name(&self) -> &str;

    /// Analyze one answer.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalyzerError>;
}

/// What is sent to the analyzer for one answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub question_id: QuestionId,
    /// The question text.
    pub question: String,
    #[serde(default)]
    pub skill_tags: Vec<String>,
    pub answer_text: String,
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// Login credentials.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// A successful login or refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// The remote authentication exchange.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, AuthError>;

    /// Exchange a still-valid token for a fresh one.
    async fn refresh(&self, token: &str) -> Result<LoginResponse, AuthError>;
}

/// Persists the login across process restarts.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn save(&self, login: &LoginResponse) -> anyhow::Result<()>;

    async fn load(&self) -> anyhow::Result<Option<LoginResponse>>;

    async fn clear(&self) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// Session persistence
// ---------------------------------------------------------------------------

/// Snapshot storage for resumable sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: &SessionState) -> anyhow::Result<()>;

    async fn load(&self, session_id: SessionId) -> anyhow::Result<Option<SessionState>>;

    /// All sessions owned by `user_id`, optionally filtered by status, oldest first.
    async fn list(
        &self,
        user_id: &str,
        status: Option<SessionStatus>,
    ) -> anyhow::Result<Vec<SessionState>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_masks_password() {
        let creds = Credentials {
            email: "a@example.com".into(),
            password: "hunter2".into(),
        };
        let dbg = format!("{creds:?}");
        assert!(dbg.contains("a@example.com"));
        assert!(!dbg.contains("hunter2"));
    }

    #[test]
    fn login_response_parses_wire_shape() {
        let json = r#"{
            "user_id": "u-42",
            "full_name": "Ada Lovelace",
            "email": "ada@example.com",
            "token": "tok",
            "expires_at": "2030-01-01T00:00:00Z"
        }"#;
        let resp: LoginResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.user_id, "u-42");
        assert_eq!(resp.full_name, "Ada Lovelace");
    }
}
