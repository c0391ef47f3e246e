//! Core data model types for mockview.
//!
//! Questions, answers, analysis results, and the per-session record that the
//! engine drives through an interview.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a question within a question set.
pub type QuestionId = u32;

/// Opaque session identifier.
pub type SessionId = Uuid;

/// Highest score an analyzer may award.
pub const MAX_SCORE: u8 = 100;

/// A single interview question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Identity of the question.
    pub id: QuestionId,
    /// The question as asked to the candidate.
    pub text: String,
    /// Skills this question exercises.
    #[serde(default)]
    pub skill_tags: BTreeSet<String>,
}

impl Question {
    pub fn new(id: QuestionId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            skill_tags: BTreeSet::new(),
        }
    }

    /// Add a skill tag.
    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.skill_tags.insert(skill.into());
        self
    }
}

/// A candidate's answer to one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: QuestionId,
    pub text: String,
    pub submitted_at: DateTime<Utc>,
}

/// Score and feedback for one answer, as returned by an analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub question_id: QuestionId,
    /// Overall score in `0..=100`.
    pub score: u8,
    pub feedback: String,
    /// Per-skill scores in `0..=100`.
    #[serde(default)]
    pub skill_scores: BTreeMap<String, u8>,
}

impl AnalysisResult {
    /// Check that every score lies within `0..=100`.
    pub fn check_range(&self) -> Result<(), String> {
        if self.score > MAX_SCORE {
            return Err(format!("score {} exceeds {MAX_SCORE}", self.score));
        }
        if let Some((skill, score)) = self.skill_scores.iter().find(|(_, s)| **s > MAX_SCORE) {
            return Err(format!("skill score {score} for '{skill}' exceeds {MAX_SCORE}"));
        }
        Ok(())
    }

    /// Score credited to `skill`: the analyzer's per-skill score when it gave
    /// one, otherwise the overall score.
    pub fn score_for_skill(&self, skill: &str) -> u8 {
        self.skill_scores.get(skill).copied().unwrap_or(self.score)
    }
}

/// Lifecycle of an interview session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Analyzing,
    Completed,
    Failed,
}

impl SessionStatus {
    /// `Completed` and `Failed` accept no further mutation.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::NotStarted => write!(f, "not_started"),
            SessionStatus::InProgress => write!(f, "in_progress"),
            SessionStatus::Analyzing => write!(f, "analyzing"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "not_started" => Ok(SessionStatus::NotStarted),
            "in_progress" => Ok(SessionStatus::InProgress),
            "analyzing" => Ok(SessionStatus::Analyzing),
            "completed" => Ok(SessionStatus::Completed),
            "failed" | "abandoned" => Ok(SessionStatus::Failed),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// The authoritative record of one interview session.
///
/// Fields are read-only outside this crate; every mutation goes through
/// [`crate::engine::InterviewSessionEngine`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    session_id: SessionId,
    user_id: String,
    questions: Vec<Question>,
    current_index: usize,
    answers: BTreeMap<QuestionId, Answer>,
    results: BTreeMap<QuestionId, AnalysisResult>,
    status: SessionStatus,
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    ended_at: Option<DateTime<Utc>>,
}

impl PartialEq for SessionState {
    fn eq(&self, other: &Self) -> bool {
        self.session_id == other.session_id
    }
}

impl Eq for SessionState {}

impl SessionState {
    /// A fresh, not yet started session. `questions` must be non-empty.
    pub(crate) fn new(user_id: &str, questions: Vec<Question>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            questions,
            current_index: 0,
            answers: BTreeMap::new(),
            results: BTreeMap::new(),
            status: SessionStatus::NotStarted,
            started_at: None,
            ended_at: None,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn answers(&self) -> &BTreeMap<QuestionId, Answer> {
        &self.answers
    }

    pub fn results(&self) -> &BTreeMap<QuestionId, AnalysisResult> {
        &self.results
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// The question at the current index.
    pub fn current_question(&self) -> &Question {
        // current_index is kept in bounds and questions is never empty.
        &self.questions[self.current_index]
    }

    pub fn is_complete(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    pub fn is_last_question(&self) -> bool {
        self.current_index + 1 == self.questions.len()
    }

    pub fn answer(&self, question_id: QuestionId) -> Option<&Answer> {
        self.answers.get(&question_id)
    }

    pub fn result(&self, question_id: QuestionId) -> Option<&AnalysisResult> {
        self.results.get(&question_id)
    }

    /// Wall-clock time from start to end; `None` until the session has ended.
    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Index of the first question that has no analysis result yet.
    pub fn first_unresolved_index(&self) -> Option<usize> {
        self.questions
            .iter()
            .position(|q| !self.results.contains_key(&q.id))
    }

    // -- engine-only mutators -------------------------------------------------

    pub(crate) fn begin(&mut self, now: DateTime<Utc>) {
        self.status = SessionStatus::InProgress;
        self.current_index = 0;
        self.started_at = Some(now);
    }

    pub(crate) fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
    }

    pub(crate) fn set_current_index(&mut self, index: usize) {
        debug_assert!(index < self.questions.len());
        self.current_index = index.min(self.questions.len() - 1);
    }

    /// Record an answer for the current question, replacing any earlier answer
    /// and dropping its stale result.
    pub(crate) fn record_answer(&mut self, text: &str, now: DateTime<Utc>) -> QuestionId {
        let question_id = self.current_question().id;
        self.results.remove(&question_id);
        self.answers.insert(
            question_id,
            Answer {
                question_id,
                text: text.to_string(),
                submitted_at: now,
            },
        );
        question_id
    }

    /// Attach a result. The question must already have an answer.
    pub(crate) fn attach_result(&mut self, result: AnalysisResult) -> bool {
        if !self.answers.contains_key(&result.question_id) {
            return false;
        }
        self.results.insert(result.question_id, result);
        true
    }

    pub(crate) fn finish(&mut self, status: SessionStatus, now: DateTime<Utc>) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.ended_at = Some(now);
    }

    /// Check and repair a snapshot loaded from storage.
    ///
    /// Rejects snapshots that break the model: no questions, duplicate
    /// question ids, answers or results for unknown questions, or a completed
    /// session with unresolved questions. An analysis that was in flight when
    /// the snapshot was taken is not resumed.
    pub(crate) fn normalize_loaded(&mut self) -> Result<(), String> {
        if self.questions.is_empty() {
            return Err("session has no questions".into());
        }
        let mut ids = BTreeSet::new();
        if let Some(dup) = self.questions.iter().find(|q| !ids.insert(q.id)) {
            return Err(format!("duplicate question id {}", dup.id));
        }
        if let Some(id) = self.answers.keys().find(|id| !ids.contains(*id)) {
            return Err(format!("answer for unknown question {id}"));
        }
        if let Some(id) = self.results.keys().find(|id| !ids.contains(*id)) {
            return Err(format!("result for unknown question {id}"));
        }
        if self.status == SessionStatus::Completed {
            if let Some(q) = self
                .questions
                .iter()
                .find(|q| !self.results.contains_key(&q.id))
            {
                return Err(format!(
                    "completed session has no result for question {}",
                    q.id
                ));
            }
        }

        if self.status == SessionStatus::Analyzing {
            self.status = SessionStatus::InProgress;
        }
        if self.current_index >= self.questions.len() {
            self.current_index = self.questions.len() - 1;
        }
        let answered = &self.answers;
        self.results.retain(|id, _| answered.contains_key(id));
        Ok(())
    }
}
