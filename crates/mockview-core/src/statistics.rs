//! Score aggregation for a single session and across session history.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::model::{SessionId, SessionState, SessionStatus};

/// Statistics derived from one session's analysis results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub status: SessionStatus,
    /// Arithmetic mean of the overall scores.
    pub average_score: f64,
    pub best_score: u8,
    pub worst_score: u8,
    /// Mean score per skill tag. Skills with no analyzed question are absent.
    pub per_skill_average: BTreeMap<String, f64>,
    pub total_questions: usize,
    pub answered_questions: usize,
    /// Start to end in milliseconds; `None` while the session is open.
    pub total_duration_ms: Option<u64>,
}

/// Final statistics for a completed session.
///
/// Fails with [`SessionError::InvalidState`] for any other status.
pub fn aggregate(session: &SessionState) -> Result<SessionSummary, SessionError> {
    if session.status() != SessionStatus::Completed {
        return Err(SessionError::InvalidState(format!(
            "cannot aggregate a {} session",
            session.status()
        )));
    }
    summarize(session).ok_or_else(|| {
        SessionError::InvalidState("completed session has no analysis results".into())
    })
}

/// Statistics over whatever results exist so far; `None` before the first one.
pub fn running_summary(session: &SessionState) -> Option<SessionSummary> {
    summarize(session)
}

fn summarize(session: &SessionState) -> Option<SessionSummary> {
    let results = session.results();
    if results.is_empty() {
        return None;
    }

    let scores: Vec<u8> = results.values().map(|r| r.score).collect();
    let average_score = mean(scores.iter().map(|&s| f64::from(s)))?;
    let best_score = scores.iter().copied().max()?;
    let worst_score = scores.iter().copied().min()?;

    let mut per_skill: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    for question in session.questions() {
        let Some(result) = results.get(&question.id) else {
            continue;
        };
        for skill in &question.skill_tags {
            per_skill
                .entry(skill.clone())
                .or_default()
                .push(result.score_for_skill(skill));
        }
    }
    let per_skill_average = per_skill
        .into_iter()
        .filter_map(|(skill, scores)| {
            mean(scores.into_iter().map(f64::from)).map(|avg| (skill, avg))
        })
        .collect();

    Some(SessionSummary {
        session_id: session.session_id(),
        status: session.status(),
        average_score,
        best_score,
        worst_score,
        per_skill_average,
        total_questions: session.questions().len(),
        answered_questions: session.answers().len(),
        total_duration_ms: duration_ms(session),
    })
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

fn duration_ms(session: &SessionState) -> Option<u64> {
    session
        .duration()
        .map(|d| d.num_milliseconds().max(0) as u64)
}

/// Statistics across a user's sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub total_sessions: usize,
    pub completed_sessions: usize,
    pub abandoned_sessions: usize,
    /// Mean of the completed sessions' average scores.
    pub average_score: Option<f64>,
    /// Highest completed-session average.
    pub best_session_score: Option<f64>,
    /// Lowest completed-session average.
    pub worst_session_score: Option<f64>,
    /// Mean score per skill over every analyzed question in completed sessions.
    pub per_skill_average: BTreeMap<String, f64>,
    /// Summed duration of all ended sessions.
    pub total_duration_ms: u64,
}

/// Fold a set of sessions into history statistics.
pub fn summarize_history(sessions: &[SessionState]) -> HistoryStats {
    let mut stats = HistoryStats {
        total_sessions: sessions.len(),
        ..Default::default()
    };

    let mut session_averages = Vec::new();
    let mut skill_totals: BTreeMap<String, (f64, usize)> = BTreeMap::new();

    for session in sessions {
        stats.total_duration_ms += duration_ms(session).unwrap_or(0);
        match session.status() {
            SessionStatus::Completed => stats.completed_sessions += 1,
            SessionStatus::Failed => {
                stats.abandoned_sessions += 1;
                continue;
            }
            _ => continue,
        }
        let Some(summary) = summarize(session) else {
            continue;
        };
        session_averages.push(summary.average_score);

        for question in session.questions() {
            let Some(result) = session.result(question.id) else {
                continue;
            };
            for skill in &question.skill_tags {
                let entry = skill_totals.entry(skill.clone()).or_default();
                entry.0 += f64::from(result.score_for_skill(skill));
                entry.1 += 1;
            }
        }
    }

    stats.average_score = mean(session_averages.iter().copied());
    stats.best_session_score = session_averages.iter().copied().reduce(f64::max);
    stats.worst_session_score = session_averages.iter().copied().reduce(f64::min);
    stats.per_skill_average = skill_totals
        .into_iter()
        .map(|(skill, (sum, n))| (skill, sum / n as f64))
        .collect();
    stats
}
