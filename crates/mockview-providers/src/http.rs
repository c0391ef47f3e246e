//! Remote answer analyzer over HTTP.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use mockview_core::error::AnalyzerError;
use mockview_core::model::{AnalysisResult, MAX_SCORE};
use mockview_core::traits::{AnalysisRequest, AnswerAnalyzer};

use crate::error::{analyzer_send_error, analyzer_status_error};

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Analyzer that posts answers to `{base_url}/analyze`.
pub struct HttpAnalyzer {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpAnalyzer {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        Self::with_timeout(base_url, api_key, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// The client-side timeout should not be shorter than the engine's
    /// per-attempt timeout, or the engine never sees its own timeouts.
    pub fn with_timeout(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            timeout,
            client,
        })
    }
}

#[derive(Deserialize)]
struct AnalyzeResponse {
    score: u32,
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    skill_scores: BTreeMap<String, u32>,
}

fn to_score(value: u32, what: &str) -> Result<u8, AnalyzerError> {
    u8::try_from(value)
        .ok()
        .filter(|s| *s <= MAX_SCORE)
        .ok_or_else(|| AnalyzerError::InvalidResponse(format!("{what} {value} out of range")))
}

#[async_trait]
impl AnswerAnalyzer for HttpAnalyzer {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, request), fields(question_id = request.question_id))]
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalyzerError> {
        let mut builder = self
            .client
            .post(format!("{}/analyze", self.base_url))
            .json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| analyzer_send_error(e, self.timeout.as_millis() as u64))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(analyzer_status_error(status, &headers, &body));
        }

        let body: AnalyzeResponse = response.json().await.map_err(|e| {
            AnalyzerError::InvalidResponse(format!("failed to parse response: {e}"))
        })?;

        let skill_scores = body
            .skill_scores
            .into_iter()
            .map(|(skill, score)| to_score(score, "skill score").map(|s| (skill, s)))
            .collect::<Result<_, _>>()?;

        Ok(AnalysisResult {
            question_id: request.question_id,
            score: to_score(body.score, "score")?,
            feedback: body.feedback,
            skill_scores,
        })
    }
}
