//! Question sets and the question bank that serves them.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::model::{Question, QuestionId};

/// Broad category of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    #[default]
    Behavioral,
    Technical,
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionKind::Behavioral => write!(f, "behavioral"),
            QuestionKind::Technical => write!(f, "technical"),
        }
    }
}

impl FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "behavioral" | "behavioural" => Ok(QuestionKind::Behavioral),
            "technical" => Ok(QuestionKind::Technical),
            other => Err(format!("unknown question kind: {other}")),
        }
    }
}

/// A question plus the metadata used to select it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionEntry {
    pub question: Question,
    #[serde(default)]
    pub kind: QuestionKind,
    /// 1 (easy) to 5 (hard).
    #[serde(default = "default_difficulty")]
    pub difficulty: u8,
}

fn default_difficulty() -> u8 {
    3
}

/// A named, ordered collection of questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSet {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub entries: Vec<QuestionEntry>,
}

/// Which questions a session should get.
#[derive(Debug, Clone, Default)]
pub struct QuestionCriteria {
    /// Restrict to one question set.
    pub set_id: Option<String>,
    /// Keep questions tagged with any of these skills; empty keeps all.
    pub skills: Vec<String>,
    pub kind: Option<QuestionKind>,
    pub max_difficulty: Option<u8>,
    /// Keep at most this many questions.
    pub limit: Option<usize>,
}

impl QuestionCriteria {
    fn matches(&self, set: &QuestionSet, entry: &QuestionEntry) -> bool {
        if self.set_id.as_ref().is_some_and(|id| *id != set.id) {
            return false;
        }
        if !self.skills.is_empty()
            && !self
                .skills
                .iter()
                .any(|s| entry.question.skill_tags.contains(s))
        {
            return false;
        }
        if self.kind.is_some_and(|k| k != entry.kind) {
            return false;
        }
        if self.max_difficulty.is_some_and(|max| entry.difficulty > max) {
            return false;
        }
        true
    }
}

/// Supplies the ordered questions for a session.
pub trait QuestionBank: Send + Sync {
    /// Questions matching `criteria`, in a deterministic order.
    ///
    /// Fails with [`SessionError::NotFound`] when nothing matches.
    fn get_questions(&self, criteria: &QuestionCriteria) -> Result<Vec<Question>, SessionError>;
}

/// Question bank over sets held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryQuestionBank {
    sets: Vec<QuestionSet>,
}

impl InMemoryQuestionBank {
    pub fn new(sets: Vec<QuestionSet>) -> Self {
        Self { sets }
    }

    /// A bank holding only the built-in general interview set.
    pub fn builtin() -> Self {
        Self::new(vec![builtin_set()])
    }

    pub fn sets(&self) -> &[QuestionSet] {
        &self.sets
    }
}

impl QuestionBank for InMemoryQuestionBank {
    fn get_questions(&self, criteria: &QuestionCriteria) -> Result<Vec<Question>, SessionError> {
        let mut picked: Vec<(&str, &Question)> = self
            .sets
            .iter()
            .flat_map(|set| {
                set.entries
                    .iter()
                    .filter(move |entry| criteria.matches(set, entry))
                    .map(move |entry| (set.id.as_str(), &entry.question))
            })
            .collect();

        if let Some(limit) = criteria.limit {
            picked.truncate(limit);
        }

        if picked.is_empty() {
            return Err(SessionError::NotFound(
                "no questions match the given criteria".into(),
            ));
        }

        let mut owners: HashMap<QuestionId, &str> = HashMap::new();
        for (set_id, question) in &picked {
            if let Some(owner) = owners.insert(question.id, *set_id) {
                if owner != *set_id {
                    return Err(SessionError::InvalidInput(format!(
                        "question id {} is used by both `{owner}` and `{set_id}`; choose one set",
                        question.id
                    )));
                }
            }
        }

        Ok(picked.into_iter().map(|(_, q)| q.clone()).collect())
    }
}

/// The general interview set used when no question files are configured.
pub fn builtin_set() -> QuestionSet {
    let entry = |id, text: &str, skills: &[&str]| {
        let question = skills
            .iter()
            .fold(Question::new(id, text), |q, s| q.with_skill(*s));
        QuestionEntry {
            question,
            kind: QuestionKind::Behavioral,
            difficulty: 2,
        }
    };

    QuestionSet {
        id: "general".into(),
        name: "General interview".into(),
        description: "Common behavioral questions".into(),
        entries: vec![
            entry(
                1,
                "Tell me about yourself and your experience.",
                &["communication"],
            ),
            entry(
                2,
                "What are your strengths and weaknesses?",
                &["self_awareness", "communication"],
            ),
            entry(
                3,
                "Where do you see yourself in 5 years?",
                &["motivation"],
            ),
            entry(
                4,
                "Why do you want to work for our company?",
                &["motivation", "communication"],
            ),
            entry(
                5,
                "Describe a challenging situation you faced at work.",
                &["problem_solving", "teamwork"],
            ),
        ],
    }
}
