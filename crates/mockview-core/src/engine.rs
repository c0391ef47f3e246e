//! Interview session engine.
//!
//! Drives a session through its questions: records answers, calls the
//! analyzer with timeout and exponential-backoff retries, attaches results,
//! and advances or completes the session.
//!
//! Each session has at most one analysis in flight. The state sits behind a
//! mutex that is never held across an `.await`; a submission takes a ticket,
//! and `detach`/`abort` invalidate outstanding tickets so late results are
//! discarded.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::auth::AuthSession;
use crate::bank::{QuestionBank, QuestionCriteria};
use crate::error::{AnalyzerError, SessionError};
use crate::model::{AnalysisResult, Question, SessionId, SessionState, SessionStatus};
use crate::statistics::{self, SessionSummary};
use crate::traits::{AnalysisRequest, AnswerAnalyzer, SessionStore};

/// Configuration for the session engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Automatic retries after the first failed analyzer attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub retry_base_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub retry_factor: u32,
    /// Upper bound on any single retry delay.
    pub max_retry_delay: Duration,
    /// Time budget for one analyzer attempt.
    pub analysis_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_base_delay: Duration::from_millis(500),
            retry_factor: 2,
            max_retry_delay: Duration::from_secs(10),
            analysis_timeout: Duration::from_secs(10),
        }
    }
}

struct Live {
    state: SessionState,
    /// Bumped whenever an in-flight analysis must be disowned.
    ticket: u64,
}

/// Shared handle to a live session.
///
/// Cloning the handle does not copy the session. Reads go through
/// [`InterviewSession::snapshot`]; all writes go through the engine.
#[derive(Clone)]
pub struct InterviewSession {
    inner: Arc<Mutex<Live>>,
}

impl InterviewSession {
    fn new(state: SessionState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Live { state, ticket: 0 })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Live> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.lock().state.clone()
    }

    pub fn session_id(&self) -> SessionId {
        self.lock().state.session_id()
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().state.status()
    }
}

impl std::fmt::Debug for InterviewSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let live = self.lock();
        f.debug_struct("InterviewSession")
            .field("session_id", &live.state.session_id())
            .field("status", &live.state.status())
            .field("current_index", &live.state.current_index())
            .finish()
    }
}

/// Reverts an abandoned submission when its future is dropped mid-analysis.
struct InFlight<'a> {
    session: &'a InterviewSession,
    ticket: u64,
    armed: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut live = self.session.lock();
        if live.ticket == self.ticket && live.state.status() == SessionStatus::Analyzing {
            live.ticket += 1;
            live.state.set_status(SessionStatus::InProgress);
            debug!(session_id = %live.state.session_id(), "submission dropped, analysis detached");
        }
    }
}

/// A failed analysis after retries.
struct AnalysisFailure {
    attempts: u32,
    error: AnalyzerError,
}

/// The central session engine.
pub struct InterviewSessionEngine {
    analyzer: Arc<dyn AnswerAnalyzer>,
    auth: Arc<AuthSession>,
    store: Option<Arc<dyn SessionStore>>,
    config: EngineConfig,
}

impl InterviewSessionEngine {
    pub fn new(
        analyzer: Arc<dyn AnswerAnalyzer>,
        auth: Arc<AuthSession>,
        config: EngineConfig,
    ) -> Self {
        Self {
            analyzer,
            auth,
            store: None,
            config,
        }
    }

    /// Persist session snapshots to `store`; without one sessions are memory-only.
    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start a new session for the authenticated user.
    pub async fn start(
        &self,
        user_id: &str,
        questions: Vec<Question>,
    ) -> Result<InterviewSession, SessionError> {
        let authenticated = self.auth.require_authentication()?;
        if authenticated != user_id {
            return Err(SessionError::Unauthorized);
        }
        if questions.is_empty() {
            return Err(SessionError::InvalidInput(
                "a session needs at least one question".into(),
            ));
        }
        let mut ids = HashSet::new();
        if let Some(dup) = questions.iter().find(|q| !ids.insert(q.id)) {
            return Err(SessionError::InvalidInput(format!(
                "duplicate question id {}",
                dup.id
            )));
        }

        let mut state = SessionState::new(user_id, questions);
        state.begin(Utc::now());
        if let Some(store) = &self.store {
            store.save(&state).await.map_err(SessionError::storage)?;
        }

        info!(
            session_id = %state.session_id(),
            user_id,
            questions = state.questions().len(),
            "session started"
        );
        Ok(InterviewSession::new(state))
    }

    /// Start a session with questions pulled from `bank`.
    pub async fn start_from_bank(
        &self,
        user_id: &str,
        bank: &dyn QuestionBank,
        criteria: &QuestionCriteria,
    ) -> Result<InterviewSession, SessionError> {
        self.auth.require_authentication()?;
        let questions = bank.get_questions(criteria)?;
        self.start(user_id, questions).await
    }

    /// Reload a persisted session owned by the authenticated user.
    pub async fn resume(&self, session_id: SessionId) -> Result<InterviewSession, SessionError> {
        let user_id = self.auth.require_authentication()?;
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| SessionError::NotFound("no session store configured".into()))?;
        let mut state = store
            .load(session_id)
            .await
            .map_err(SessionError::storage)?
            .ok_or_else(|| SessionError::NotFound(format!("session {session_id}")))?;
        if state.user_id() != user_id {
            return Err(SessionError::Unauthorized);
        }
        state
            .normalize_loaded()
            .map_err(|e| SessionError::Storage(format!("session {session_id} is corrupt: {e}")))?;
        info!(%session_id, status = %state.status(), "session resumed");
        Ok(InterviewSession::new(state))
    }

    /// Submit an answer for the current question and wait for its analysis.
    ///
    /// On success the session advances (or completes on the last question).
    /// On analyzer failure the answer stays recorded, the index is unchanged,
    /// and [`SessionError::Analysis`] is returned.
    pub async fn submit_answer(
        &self,
        session: &InterviewSession,
        text: &str,
    ) -> Result<SessionState, SessionError> {
        let (ticket, request, snapshot) = {
            let mut live = session.lock();
            match live.state.status() {
                SessionStatus::Completed | SessionStatus::Failed => {
                    return Err(SessionError::InvalidState(format!(
                        "cannot submit an answer to a {} session",
                        live.state.status()
                    )));
                }
                SessionStatus::NotStarted => {
                    return Err(SessionError::InvalidState("session has not started".into()));
                }
                _ => {}
            }
            if live.state.status() == SessionStatus::Analyzing {
                return Err(SessionError::Conflict(
                    "an answer is already being analyzed".into(),
                ));
            }
            if text.trim().is_empty() {
                return Err(SessionError::Validation("answer must not be empty".into()));
            }

            let question = live.state.current_question().clone();
            live.state.record_answer(text, Utc::now());
            live.state.set_status(SessionStatus::Analyzing);
            live.ticket += 1;

            let request = AnalysisRequest {
                question_id: question.id,
                question: question.text,
                skill_tags: question.skill_tags.into_iter().collect(),
                answer_text: text.to_string(),
            };
            (live.ticket, request, live.state.clone())
        };

        let mut guard = InFlight {
            session,
            ticket,
            armed: true,
        };
        debug!(session_id = %snapshot.session_id(), question_id = request.question_id, "answer recorded");
        self.persist(&snapshot).await;

        let outcome = self.analyze_with_retry(&request).await;

        let snapshot = {
            let mut live = session.lock();
            guard.armed = false;

            if live.ticket != ticket {
                debug!(session_id = %live.state.session_id(), "discarding result of detached analysis");
                return Err(SessionError::InvalidState(
                    "session was detached while the answer was being analyzed".into(),
                ));
            }
            live.ticket += 1;
            live.state.set_status(SessionStatus::InProgress);

            if !self.auth.is_authenticated() {
                warn!(session_id = %live.state.session_id(), "logged out during analysis, result discarded");
                return Err(SessionError::Unauthorized);
            }

            match outcome {
                Ok(result) => {
                    live.state.attach_result(result);
                    self.advance(&mut live.state);
                    live.state.clone()
                }
                Err(failure) => {
                    warn!(
                        session_id = %live.state.session_id(),
                        question_id = request.question_id,
                        attempts = failure.attempts,
                        "analysis failed: {}",
                        failure.error
                    );
                    return Err(SessionError::Analysis {
                        attempts: failure.attempts,
                        reason: failure.error.to_string(),
                    });
                }
            }
        };

        self.persist(&snapshot).await;
        Ok(snapshot)
    }

    /// Move to the question after a freshly analyzed one.
    fn advance(&self, state: &mut SessionState) {
        if !state.is_last_question() {
            state.set_current_index(state.current_index() + 1);
            return;
        }
        match state.first_unresolved_index() {
            Some(index) => {
                // Never complete with a question left unanalyzed.
                state.set_current_index(index);
            }
            None => {
                state.finish(SessionStatus::Completed, Utc::now());
                info!(session_id = %state.session_id(), "session completed");
            }
        }
    }

    async fn analyze_with_retry(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResult, AnalysisFailure> {
        let timeout_ms = self.config.analysis_timeout.as_millis() as u64;
        let mut delay = self.config.retry_base_delay;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let outcome = match tokio::time::timeout(
                self.config.analysis_timeout,
                self.analyzer.analyze(request),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(AnalyzerError::Timeout(timeout_ms)),
            };
            let outcome = outcome.and_then(|result| check_result(request, result));

            match outcome {
                Ok(result) => {
                    debug!(
                        question_id = request.question_id,
                        attempts,
                        score = result.score,
                        "analysis succeeded"
                    );
                    return Ok(result);
                }
                Err(error) if error.is_transient() && attempts <= self.config.max_retries => {
                    let wait = error
                        .retry_after_ms()
                        .map(Duration::from_millis)
                        .unwrap_or(delay)
                        .min(self.config.max_retry_delay);
                    warn!(
                        analyzer = self.analyzer.name(),
                        question_id = request.question_id,
                        attempt = attempts,
                        "transient analysis failure, retrying in {}ms: {error}",
                        wait.as_millis()
                    );
                    tokio::time::sleep(wait).await;
                    delay = (delay * self.config.retry_factor).min(self.config.max_retry_delay);
                }
                Err(error) => return Err(AnalysisFailure { attempts, error }),
            }
        }
    }

    /// Step back one question. Captured answers and results are kept.
    pub async fn go_to_previous(
        &self,
        session: &InterviewSession,
    ) -> Result<SessionState, SessionError> {
        let snapshot = {
            let mut live = session.lock();
            let status = live.state.status();
            if status != SessionStatus::InProgress {
                return Err(SessionError::InvalidState(format!(
                    "cannot navigate while the session is {status}"
                )));
            }
            let index = live.state.current_index();
            if index == 0 {
                return Err(SessionError::InvalidState(
                    "already at the first question".into(),
                ));
            }
            live.state.set_current_index(index - 1);
            live.state.clone()
        };
        self.persist(&snapshot).await;
        Ok(snapshot)
    }

    /// Abandon the session. An in-flight analysis is detached.
    pub async fn abort(&self, session: &InterviewSession) -> Result<SessionState, SessionError> {
        let snapshot = {
            let mut live = session.lock();
            if live.state.status().is_terminal() {
                return Err(SessionError::InvalidState(format!(
                    "session is already {}",
                    live.state.status()
                )));
            }
            live.ticket += 1;
            live.state.finish(SessionStatus::Failed, Utc::now());
            live.state.clone()
        };
        info!(session_id = %snapshot.session_id(), "session abandoned");
        self.persist(&snapshot).await;
        Ok(snapshot)
    }

    /// Disown an in-flight analysis, e.g. when the UI surface goes away.
    ///
    /// The session returns to `InProgress` with its answer kept; the eventual
    /// analyzer result is discarded. A no-op when nothing is in flight.
    pub fn detach(&self, session: &InterviewSession) -> SessionState {
        let mut live = session.lock();
        if live.state.status() == SessionStatus::Analyzing {
            live.ticket += 1;
            live.state.set_status(SessionStatus::InProgress);
            debug!(session_id = %live.state.session_id(), "analysis detached");
        }
        live.state.clone()
    }

    /// The question the session is currently on.
    pub fn current_question(&self, session: &InterviewSession) -> Question {
        session.lock().state.current_question().clone()
    }

    pub fn is_complete(&self, session: &InterviewSession) -> bool {
        session.lock().state.is_complete()
    }

    /// Final statistics; fails unless the session is completed.
    pub fn aggregate(&self, session: &InterviewSession) -> Result<SessionSummary, SessionError> {
        statistics::aggregate(&session.lock().state)
    }

    /// Statistics over the results gathered so far, if any.
    pub fn running_summary(&self, session: &InterviewSession) -> Option<SessionSummary> {
        statistics::running_summary(&session.lock().state)
    }

    /// The authenticated user's stored sessions, oldest first.
    pub async fn history(
        &self,
        status: Option<SessionStatus>,
    ) -> Result<Vec<SessionState>, SessionError> {
        let user_id = self.auth.require_authentication()?;
        match &self.store {
            Some(store) => store
                .list(&user_id, status)
                .await
                .map_err(SessionError::storage),
            None => Ok(Vec::new()),
        }
    }

    async fn persist(&self, snapshot: &SessionState) {
        let Some(store) = &self.store else {
            return;
        };
        if !self.auth.is_authenticated() {
            debug!(session_id = %snapshot.session_id(), "not authenticated, snapshot not saved");
            return;
        }
        if let Err(e) = store.save(snapshot).await {
            warn!(session_id = %snapshot.session_id(), "failed to save session: {e:#}");
        }
    }
}

/// Reject analyzer output that does not belong to the request or is out of range.
fn check_result(
    request: &AnalysisRequest,
    result: AnalysisResult,
) -> Result<AnalysisResult, AnalyzerError> {
    if result.question_id != request.question_id {
        return Err(AnalyzerError::InvalidResponse(format!(
            "result for question {} does not match request for question {}",
            result.question_id, request.question_id
        )));
    }
    result.check_range().map_err(AnalyzerError::InvalidResponse)?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::auth::tests::logged_in;
    use crate::model::tests::three_questions;
    use crate::store::MemorySessionStore;

    /// Pops scripted outcomes, then scores every answer `fallback`.
    struct ScriptedAnalyzer {
        script: Mutex<VecDeque<Result<u8, AnalyzerError>>>,
        fallback: u8,
        gate: Option<Arc<Semaphore>>,
        stall: Option<Duration>,
        calls: AtomicU32,
    }

    impl ScriptedAnalyzer {
        fn scoring(score: u8) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fallback: score,
                gate: None,
                stall: None,
                calls: AtomicU32::new(0),
            }
        }

        fn with_script(mut self, script: Vec<Result<u8, AnalyzerError>>) -> Self {
            self.script = Mutex::new(script.into());
            self
        }

        fn gated(mut self, gate: Arc<Semaphore>) -> Self {
            self.gate = Some(gate);
            self
        }

        /// First call sleeps this long before answering.
        fn stalling(mut self, stall: Duration) -> Self {
            self.stall = Some(stall);
            self
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AnswerAnalyzer for ScriptedAnalyzer {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn analyze(
            &self,
            request: &AnalysisRequest,
        ) -> Result<AnalysisResult, AnalyzerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await.expect("gate closed");
            }
            if call == 0 {
                if let Some(stall) = self.stall {
                    tokio::time::sleep(stall).await;
                }
            }
            let next = self.script.lock().unwrap().pop_front();
            let score = next.unwrap_or(Ok(self.fallback))?;
            Ok(AnalysisResult {
                question_id: request.question_id,
                score,
                feedback: format!("scored {score}"),
                skill_scores: BTreeMap::new(),
            })
        }
    }

    fn transient() -> AnalyzerError {
        AnalyzerError::Network("connection reset".into())
    }

    async fn setup(
        analyzer: ScriptedAnalyzer,
    ) -> (Arc<ScriptedAnalyzer>, InterviewSessionEngine, InterviewSession) {
        let analyzer = Arc::new(analyzer);
        let auth = logged_in().await;
        let engine =
            InterviewSessionEngine::new(analyzer.clone(), auth, EngineConfig::default());
        let session = engine.start("user-1", three_questions()).await.unwrap();
        (analyzer, engine, session)
    }

    fn assert_results_subset(state: &SessionState) {
        assert!(state
            .results()
            .keys()
            .all(|id| state.answers().contains_key(id)));
    }

    #[tokio::test]
    async fn start_initializes_session() {
        let (_, engine, session) = setup(ScriptedAnalyzer::scoring(80)).await;
        let state = session.snapshot();
        assert_eq!(state.current_index(), 0);
        assert_eq!(state.status(), SessionStatus::InProgress);
        assert!(state.answers().is_empty());
        assert!(state.results().is_empty());
        assert!(state.started_at().is_some());
        assert_eq!(engine.current_question(&session).id, 1);
        assert!(!engine.is_complete(&session));
    }

    #[tokio::test]
    async fn start_rejects_empty_and_duplicate_questions() {
        let (_, engine, _) = setup(ScriptedAnalyzer::scoring(80)).await;
        assert!(matches!(
            engine.start("user-1", vec![]).await,
            Err(SessionError::InvalidInput(_))
        ));
        let dup = vec![Question::new(1, "a"), Question::new(1, "b")];
        assert!(matches!(
            engine.start("user-1", dup).await,
            Err(SessionError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn start_requires_authentication() {
        let auth = logged_in().await;
        let engine = InterviewSessionEngine::new(
            Arc::new(ScriptedAnalyzer::scoring(80)),
            auth.clone(),
            EngineConfig::default(),
        );
        assert!(matches!(
            engine.start("someone-else", three_questions()).await,
            Err(SessionError::Unauthorized)
        ));

        auth.logout().await;
        let err = engine
            .start("user-1", three_questions())
            .await
            .unwrap_err();
        assert!(err.requires_login());
    }

    #[tokio::test]
    async fn successful_answer_advances() {
        let (_, engine, session) = setup(ScriptedAnalyzer::scoring(80)).await;
        let state = engine
            .submit_answer(&session, "I have 5 years experience")
            .await
            .unwrap();
        assert_eq!(state.result(1).unwrap().score, 80);
        assert_eq!(state.current_index(), 1);
        assert_eq!(state.status(), SessionStatus::InProgress);
        assert_eq!(state.answer(1).unwrap().text, "I have 5 years experience");
        assert_results_subset(&state);
    }

    #[tokio::test]
    async fn blank_answer_is_rejected_without_change() {
        let (analyzer, engine, session) = setup(ScriptedAnalyzer::scoring(80)).await;
        for text in ["", "   ", "\n\t"] {
            let err = engine.submit_answer(&session, text).await.unwrap_err();
            assert!(matches!(err, SessionError::Validation(_)));
        }
        let state = session.snapshot();
        assert!(state.answers().is_empty());
        assert_eq!(state.status(), SessionStatus::InProgress);
        assert_eq!(analyzer.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_with_backoff() {
        let analyzer =
            ScriptedAnalyzer::scoring(60).with_script(vec![Err(transient()), Err(transient())]);
        let (analyzer, engine, session) = setup(analyzer).await;

        let started = tokio::time::Instant::now();
        let state = engine.submit_answer(&session, "answer").await.unwrap();
        let waited = started.elapsed();

        assert_eq!(state.result(1).unwrap().score, 60);
        assert_eq!(analyzer.calls(), 3, "one attempt plus exactly two retries");
        assert!(waited >= Duration::from_millis(1500), "waited {waited:?}");
        assert!(waited < Duration::from_millis(1600), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn retries_exhausted_surfaces_analysis_error() {
        let analyzer = ScriptedAnalyzer::scoring(60).with_script(vec![
            Err(transient()),
            Err(transient()),
            Err(transient()),
        ]);
        let (analyzer, engine, session) = setup(analyzer).await;

        let err = engine.submit_answer(&session, "answer").await.unwrap_err();
        assert!(matches!(err, SessionError::Analysis { attempts: 3, .. }));
        assert_eq!(analyzer.calls(), 3);

        let state = session.snapshot();
        assert_eq!(state.status(), SessionStatus::InProgress);
        assert_eq!(state.current_index(), 0);
        assert_eq!(state.answer(1).unwrap().text, "answer");

        // The same answer can be resubmitted once the analyzer recovers.
        let state = engine.submit_answer(&session, "answer").await.unwrap();
        assert_eq!(state.current_index(), 1);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let analyzer = ScriptedAnalyzer::scoring(60).with_script(vec![Err(
            AnalyzerError::Rejected("malformed request".into()),
        )]);
        let (analyzer, engine, session) = setup(analyzer).await;

        let err = engine
            .submit_answer(&session, "I have 5 years experience")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Analysis { attempts: 1, .. }));
        assert_eq!(analyzer.calls(), 1);

        let state = session.snapshot();
        assert_eq!(
            state.answer(1).unwrap().text,
            "I have 5 years experience"
        );
        assert!(state.result(1).is_none());
        assert_eq!(state.status(), SessionStatus::InProgress);
        assert_eq!(state.current_index(), 0);
    }

    #[tokio::test]
    async fn out_of_range_score_is_a_permanent_failure() {
        let analyzer = ScriptedAnalyzer::scoring(60).with_script(vec![Ok(150)]);
        let (analyzer, engine, session) = setup(analyzer).await;
        let err = engine.submit_answer(&session, "answer").await.unwrap_err();
        assert!(matches!(err, SessionError::Analysis { attempts: 1, .. }));
        assert_eq!(analyzer.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_as_transient_failure() {
        let analyzer = ScriptedAnalyzer::scoring(70).stalling(Duration::from_secs(60));
        let (analyzer, engine, session) = setup(analyzer).await;

        let state = engine.submit_answer(&session, "answer").await.unwrap();
        assert_eq!(state.result(1).unwrap().score, 70);
        assert_eq!(analyzer.calls(), 2);
    }

    #[tokio::test]
    async fn second_submit_while_analyzing_conflicts() {
        let gate = Arc::new(Semaphore::new(0));
        let (_, engine, session) =
            setup(ScriptedAnalyzer::scoring(90).gated(gate.clone())).await;

        let (first, second) = tokio::join!(engine.submit_answer(&session, "first"), async {
            assert_eq!(session.status(), SessionStatus::Analyzing);
            let second = engine.submit_answer(&session, "second").await;
            let blank = engine.submit_answer(&session, "   ").await;
            assert!(matches!(blank, Err(SessionError::Conflict(_))));
            let previous = engine.go_to_previous(&session).await;
            assert!(matches!(previous, Err(SessionError::InvalidState(_))));
            gate.add_permits(1);
            second
        });

        assert!(matches!(second, Err(SessionError::Conflict(_))));
        let state = first.unwrap();
        assert_eq!(state.answer(1).unwrap().text, "first");
        assert_eq!(state.result(1).unwrap().score, 90);
        assert_eq!(state.current_index(), 1);
    }

    #[tokio::test]
    async fn completing_last_question_completes_session() {
        let (_, engine, session) = setup(ScriptedAnalyzer::scoring(75)).await;
        for answer in ["one", "two", "three"] {
            engine.submit_answer(&session, answer).await.unwrap();
        }
        let state = session.snapshot();
        assert_eq!(state.status(), SessionStatus::Completed);
        assert_eq!(state.results().len(), 3);
        assert!(state.ended_at().is_some());
        assert!(engine.is_complete(&session));

        assert!(matches!(
            engine.go_to_previous(&session).await,
            Err(SessionError::InvalidState(_))
        ));
        assert!(matches!(
            engine.submit_answer(&session, "again").await,
            Err(SessionError::InvalidState(_))
        ));
        assert_eq!(engine.aggregate(&session).unwrap().average_score, 75.0);
    }

    #[tokio::test]
    async fn go_to_previous_keeps_answers() {
        let (_, engine, session) = setup(ScriptedAnalyzer::scoring(80)).await;

        assert!(matches!(
            engine.go_to_previous(&session).await,
            Err(SessionError::InvalidState(_))
        ));

        engine.submit_answer(&session, "one").await.unwrap();
        engine.submit_answer(&session, "two").await.unwrap();
        let state = engine.go_to_previous(&session).await.unwrap();
        assert_eq!(state.current_index(), 1);
        assert_eq!(state.answer(2).unwrap().text, "two");
        assert!(state.result(2).is_some());
        assert!(state.answer(1).is_some());
    }

    #[tokio::test]
    async fn resubmission_replaces_answer_and_result() {
        let analyzer = ScriptedAnalyzer::scoring(50).with_script(vec![
            Ok(40),
            Err(AnalyzerError::Rejected("bad".into())),
        ]);
        let (_, engine, session) = setup(analyzer).await;

        engine.submit_answer(&session, "draft").await.unwrap();
        engine.go_to_previous(&session).await.unwrap();

        let err = engine.submit_answer(&session, "better").await.unwrap_err();
        assert!(matches!(err, SessionError::Analysis { .. }));
        let state = session.snapshot();
        assert_eq!(state.answer(1).unwrap().text, "better");
        assert!(state.result(1).is_none(), "stale result must be discarded");
        assert_results_subset(&state);

        let state = engine.submit_answer(&session, "better").await.unwrap();
        assert_eq!(state.result(1).unwrap().score, 50);
        assert_eq!(state.current_index(), 1);
    }

    #[tokio::test]
    async fn failed_resubmission_blocks_progress_until_resolved() {
        let analyzer = ScriptedAnalyzer::scoring(80).with_script(vec![
            Ok(80),
            Ok(80),
            Err(AnalyzerError::Rejected("bad".into())),
        ]);
        let (_, engine, session) = setup(analyzer).await;

        engine.submit_answer(&session, "one").await.unwrap();
        engine.submit_answer(&session, "two").await.unwrap();
        // Back to Q2; the failed resubmission drops its old result.
        engine.go_to_previous(&session).await.unwrap();
        assert!(engine.submit_answer(&session, "two again").await.is_err());
        assert_eq!(session.snapshot().current_index(), 1);
        assert!(session.snapshot().result(2).is_none());

        engine.submit_answer(&session, "two again").await.unwrap();
        let state = engine.submit_answer(&session, "three").await.unwrap();
        assert_eq!(state.status(), SessionStatus::Completed);
        assert_eq!(state.results().len(), 3);
    }

    #[tokio::test]
    async fn last_question_with_gap_returns_to_unresolved() {
        let (_, engine, _) = setup(ScriptedAnalyzer::scoring(80)).await;
        let mut state = SessionState::new("user-1", three_questions());
        state.begin(Utc::now());
        for (index, id) in [(0, 1), (2, 3)] {
            state.set_current_index(index);
            state.record_answer("answer", Utc::now());
            state.attach_result(AnalysisResult {
                question_id: id,
                score: 80,
                feedback: String::new(),
                skill_scores: BTreeMap::new(),
            });
        }

        engine.advance(&mut state);
        assert_eq!(state.current_index(), 1);
        assert_eq!(state.status(), SessionStatus::InProgress);
        assert!(state.ended_at().is_none());
    }

    #[tokio::test]
    async fn detach_discards_late_result() {
        let gate = Arc::new(Semaphore::new(0));
        let (_, engine, session) =
            setup(ScriptedAnalyzer::scoring(90).gated(gate.clone())).await;

        let (outcome, _) = tokio::join!(engine.submit_answer(&session, "answer"), async {
            let state = engine.detach(&session);
            assert_eq!(state.status(), SessionStatus::InProgress);
            gate.add_permits(1);
        });

        assert!(matches!(outcome, Err(SessionError::InvalidState(_))));
        let state = session.snapshot();
        assert_eq!(state.status(), SessionStatus::InProgress);
        assert!(state.results().is_empty());
        assert_eq!(state.answer(1).unwrap().text, "answer");
        assert_eq!(state.current_index(), 0);
    }

    #[tokio::test]
    async fn abort_during_analysis_fails_session() {
        let gate = Arc::new(Semaphore::new(0));
        let (_, engine, session) =
            setup(ScriptedAnalyzer::scoring(90).gated(gate.clone())).await;

        let (outcome, aborted) = tokio::join!(engine.submit_answer(&session, "answer"), async {
            let aborted = engine.abort(&session).await;
            gate.add_permits(1);
            aborted
        });

        assert_eq!(aborted.unwrap().status(), SessionStatus::Failed);
        assert!(outcome.is_err());
        let state = session.snapshot();
        assert_eq!(state.status(), SessionStatus::Failed);
        assert!(state.results().is_empty());
        assert!(matches!(
            engine.abort(&session).await,
            Err(SessionError::InvalidState(_))
        ));
        assert!(matches!(
            engine.aggregate(&session),
            Err(SessionError::InvalidState(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_submission_returns_to_in_progress() {
        let gate = Arc::new(Semaphore::new(0));
        let (_, engine, session) =
            setup(ScriptedAnalyzer::scoring(90).gated(gate.clone())).await;

        let outcome = tokio::time::timeout(
            Duration::from_secs(1),
            engine.submit_answer(&session, "answer"),
        )
        .await;
        assert!(outcome.is_err(), "submission should still be pending");

        let state = session.snapshot();
        assert_eq!(state.status(), SessionStatus::InProgress);
        assert_eq!(state.answer(1).unwrap().text, "answer");
    }

    #[tokio::test]
    async fn logout_during_analysis_discards_result() {
        let gate = Arc::new(Semaphore::new(0));
        let analyzer = Arc::new(ScriptedAnalyzer::scoring(90).gated(gate.clone()));
        let auth = logged_in().await;
        let engine =
            InterviewSessionEngine::new(analyzer, auth.clone(), EngineConfig::default());
        let session = engine.start("user-1", three_questions()).await.unwrap();

        let (outcome, _) = tokio::join!(engine.submit_answer(&session, "answer"), async {
            auth.logout().await;
            gate.add_permits(1);
        });

        assert!(matches!(outcome, Err(SessionError::Unauthorized)));
        let state = session.snapshot();
        assert_eq!(state.status(), SessionStatus::InProgress);
        assert!(state.results().is_empty());
    }

    #[tokio::test]
    async fn store_snapshots_and_resume() {
        let store = Arc::new(MemorySessionStore::default());
        let auth = logged_in().await;
        let engine = InterviewSessionEngine::new(
            Arc::new(ScriptedAnalyzer::scoring(65)),
            auth,
            EngineConfig::default(),
        )
        .with_store(store.clone());

        let session = engine.start("user-1", three_questions()).await.unwrap();
        engine.submit_answer(&session, "one").await.unwrap();

        let resumed = engine.resume(session.session_id()).await.unwrap();
        let state = resumed.snapshot();
        assert_eq!(state.current_index(), 1);
        assert_eq!(state.result(1).unwrap().score, 65);

        let history = engine.history(None).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(engine
            .history(Some(SessionStatus::Completed))
            .await
            .unwrap()
            .is_empty());

        assert!(matches!(
            engine.resume(uuid::Uuid::new_v4()).await,
            Err(SessionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn resume_rejects_corrupt_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let engine = InterviewSessionEngine::new(
            Arc::new(ScriptedAnalyzer::scoring(80)),
            logged_in().await,
            EngineConfig::default(),
        )
        .with_store(Arc::new(crate::store::JsonFileSessionStore::new(dir.path())));

        let id = uuid::Uuid::new_v4();
        let snapshot = serde_json::json!({
            "session_id": id,
            "user_id": "user-1",
            "questions": [],
            "current_index": 0,
            "answers": {},
            "results": {},
            "status": "in_progress"
        });
        std::fs::write(dir.path().join(format!("{id}.json")), snapshot.to_string()).unwrap();

        let err = engine.resume(id).await.unwrap_err();
        assert!(matches!(err, SessionError::Storage(ref m) if m.contains("no questions")));
    }

    #[tokio::test]
    async fn running_summary_tracks_progress() {
        let analyzer = ScriptedAnalyzer::scoring(50).with_script(vec![Ok(90)]);
        let (_, engine, session) = setup(analyzer).await;
        assert!(engine.running_summary(&session).is_none());

        engine.submit_answer(&session, "one").await.unwrap();
        engine.submit_answer(&session, "two").await.unwrap();
        let summary = engine.running_summary(&session).unwrap();
        assert_eq!(summary.answered_questions, 2);
        assert_eq!(summary.average_score, 70.0);
        assert!(matches!(
            engine.aggregate(&session),
            Err(SessionError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_sessions_are_independent() {
        let (_, engine, first) = setup(ScriptedAnalyzer::scoring(80)).await;
        let second = engine.start("user-1", three_questions()).await.unwrap();

        let (a, b) = futures::join!(
            engine.submit_answer(&first, "a"),
            engine.submit_answer(&second, "b")
        );
        assert_eq!(a.unwrap().current_index(), 1);
        assert_eq!(b.unwrap().current_index(), 1);
    }
}
