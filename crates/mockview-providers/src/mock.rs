//! Offline analyzer and auth backend for testing and local practice.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use mockview_core::error::{AnalyzerError, AuthError};
use mockview_core::model::AnalysisResult;
use mockview_core::traits::{
    AnalysisRequest, AnswerAnalyzer, AuthBackend, Credentials, LoginResponse,
};

/// Default score when nothing else applies.
pub const DEFAULT_MOCK_SCORE: u8 = 80;

/// An analyzer that scores answers without any network calls.
///
/// Answers containing a configured keyword get that keyword's score; anything
/// else gets the fixed score. Scripted failures are returned first, one per
/// call, before any scoring happens.
pub struct MockAnalyzer {
    score: u8,
    /// Lowercased keyword → score; first match wins.
    keywords: Vec<(String, u8)>,
    failures: Mutex<VecDeque<AnalyzerError>>,
    call_count: AtomicU32,
    last_request: Mutex<Option<AnalysisRequest>>,
}

impl MockAnalyzer {
    /// A mock that gives every answer the same score.
    pub fn with_fixed_score(score: u8) -> Self {
        Self {
            score: score.min(mockview_core::model::MAX_SCORE),
            keywords: Vec::new(),
            failures: Mutex::new(VecDeque::new()),
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Score answers mentioning `keyword` (case-insensitive) with `score`.
    pub fn with_keyword(mut self, keyword: &str, score: u8) -> Self {
        self.keywords
            .push((keyword.to_lowercase(), score.min(mockview_core::model::MAX_SCORE)));
        self
    }

    /// Fail the next calls with these errors, in order.
    pub fn with_failures(self, failures: Vec<AnalyzerError>) -> Self {
        *self.failures.lock().unwrap_or_else(PoisonError::into_inner) = failures.into();
        self
    }

    /// Get the number of calls made to this analyzer.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Get the last request made to this analyzer.
    pub fn last_request(&self) -> Option<AnalysisRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn score_for(&self, answer: &str) -> u8 {
        let answer = answer.to_lowercase();
        self.keywords
            .iter()
            .find(|(keyword, _)| answer.contains(keyword.as_str()))
            .map(|(_, score)| *score)
            .unwrap_or(self.score)
    }
}

impl Default for MockAnalyzer {
    fn default() -> Self {
        Self::with_fixed_score(DEFAULT_MOCK_SCORE)
    }
}

fn feedback_for(score: u8) -> &'static str {
    match score {
        90..=100 => "Excellent answer with clear structure and concrete examples.",
        70..=89 => "Good answer. Adding a specific example would make it stronger.",
        50..=69 => "Reasonable start, but the answer lacks depth and structure.",
        _ => "The answer does not address the question well. Try the STAR format.",
    }
}

#[async_trait]
impl AnswerAnalyzer for MockAnalyzer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalyzerError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(request.clone());

        let failure = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(err) = failure {
            return Err(err);
        }

        let score = self.score_for(&request.answer_text);
        Ok(AnalysisResult {
            question_id: request.question_id,
            score,
            feedback: feedback_for(score).to_string(),
            skill_scores: Default::default(),
        })
    }
}

const TOKEN_PREFIX: &str = "mock:";

/// Auth backend that logs anyone in with a non-empty password, or only
/// with the configured password when one is set.
pub struct MockAuthBackend {
    password: Option<String>,
    ttl: Duration,
}

impl MockAuthBackend {
    pub fn new() -> Self {
        Self {
            password: None,
            ttl: Duration::hours(24),
        }
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    fn issue(&self, email: &str) -> LoginResponse {
        let name = email.split('@').next().unwrap_or(email);
        LoginResponse {
            user_id: email.to_lowercase(),
            full_name: name.to_string(),
            email: email.to_string(),
            token: format!("{TOKEN_PREFIX}{}:{}", email.to_lowercase(), uuid::Uuid::new_v4()),
            expires_at: Utc::now() + self.ttl,
        }
    }
}

impl Default for MockAuthBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthBackend for MockAuthBackend {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, AuthError> {
        let accepted = match &self.password {
            Some(expected) => credentials.password == *expected,
            None => !credentials.password.is_empty(),
        };
        if !accepted || credentials.email.trim().is_empty() {
            return Err(AuthError::Rejected("Incorrect email or password".into()));
        }
        Ok(self.issue(credentials.email.trim()))
    }

    async fn refresh(&self, token: &str) -> Result<LoginResponse, AuthError> {
        let email = token
            .strip_prefix(TOKEN_PREFIX)
            .and_then(|rest| rest.rsplit_once(':'))
            .map(|(email, _)| email)
            .filter(|email| !email.is_empty())
            .ok_or_else(|| AuthError::Rejected("Could not validate credentials".into()))?;
        Ok(self.issue(email))
    }
}
