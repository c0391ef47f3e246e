//! TOML question set parser.
//!
//! Loads question sets from TOML files and directories, and validates them.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::bank::{QuestionEntry, QuestionKind, QuestionSet};
use crate::model::{Question, QuestionId};

/// Intermediate TOML structure for parsing question set files.
#[derive(Debug, Deserialize)]
struct TomlQuestionFile {
    question_set: TomlQuestionSetHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestionSetHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_kind_str")]
    default_kind: String,
}

fn default_kind_str() -> String {
    "behavioral".to_string()
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: QuestionId,
    text: String,
    #[serde(default)]
    skills: Vec<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default = "default_difficulty")]
    difficulty: u8,
}

fn default_difficulty() -> u8 {
    3
}

/// Parse a single TOML file into a `QuestionSet`.
pub fn parse_question_set(path: &Path) -> Result<QuestionSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read question set file: {}", path.display()))?;

    parse_question_set_str(&content, path)
}

/// Parse a TOML string into a `QuestionSet` (useful for testing).
pub fn parse_question_set_str(content: &str, source_path: &Path) -> Result<QuestionSet> {
    let parsed: TomlQuestionFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let default_kind: QuestionKind = parsed
        .question_set
        .default_kind
        .parse()
        .map_err(|e: String| anyhow::anyhow!("{}", e))?;

    let entries = parsed
        .questions
        .into_iter()
        .map(|q| {
            let kind = q
                .kind
                .map(|k| k.parse().map_err(|e: String| anyhow::anyhow!("{}", e)))
                .transpose()?
                .unwrap_or(default_kind);

            Ok(QuestionEntry {
                question: Question {
                    id: q.id,
                    text: q.text,
                    skill_tags: q.skills.into_iter().collect::<BTreeSet<_>>(),
                },
                kind,
                difficulty: q.difficulty,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(QuestionSet {
        id: parsed.question_set.id,
        name: parsed.question_set.name,
        description: parsed.question_set.description,
        entries,
    })
}

/// Recursively load all `.toml` question set files from a directory.
pub fn load_question_directory(dir: &Path) -> Result<Vec<QuestionSet>> {
    let mut sets = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    // Directory order is platform dependent; sort for a deterministic bank.
    paths.sort();

    for path in paths {
        if path.is_dir() {
            sets.extend(load_question_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_question_set(&path) {
                Ok(set) => sets.push(set),
                Err(e) => {
                    tracing::warn!("skipping {}: {}", path.display(), e);
                }
            }
        }
    }

    Ok(sets)
}

/// Load a file or a directory of question sets.
pub fn load_question_sets(path: &Path) -> Result<Vec<QuestionSet>> {
    if path.is_dir() {
        load_question_directory(path)
    } else {
        Ok(vec![parse_question_set(path)?])
    }
}

/// A warning from question set validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question the warning applies to, if any.
    pub question_id: Option<QuestionId>,
    pub message: String,
}

/// Check a question set for problems that would make sessions awkward.
pub fn validate_question_set(set: &QuestionSet) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if set.entries.is_empty() {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "question set has no questions".into(),
        });
    }

    let mut seen = HashSet::new();
    for entry in &set.entries {
        let q = &entry.question;
        if !seen.insert(q.id) {
            warnings.push(ValidationWarning {
                question_id: Some(q.id),
                message: format!("duplicate question id {}", q.id),
            });
        }
        if q.text.trim().is_empty() {
            warnings.push(ValidationWarning {
                question_id: Some(q.id),
                message: "question text is empty".into(),
            });
        }
        if q.skill_tags.is_empty() {
            warnings.push(ValidationWarning {
                question_id: Some(q.id),
                message: "no skills tagged; per-skill averages will skip this question".into(),
            });
        }
        if !(1..=5).contains(&entry.difficulty) {
            warnings.push(ValidationWarning {
                question_id: Some(q.id),
                message: format!("difficulty {} outside 1-5", entry.difficulty),
            });
        }
    }

    warnings
}

/// Report question ids reused across sets.
///
/// A bank that serves several sets at once needs unique ids; colliding sets
/// can still be used one at a time.
pub fn validate_question_sets(sets: &[QuestionSet]) -> Vec<ValidationWarning> {
    let mut owners: HashMap<QuestionId, &str> = HashMap::new();
    let mut warnings = Vec::new();
    for set in sets {
        let mut in_set = HashSet::new();
        for entry in &set.entries {
            let id = entry.question.id;
            if !in_set.insert(id) {
                continue;
            }
            match owners.get(&id) {
                Some(owner) => warnings.push(ValidationWarning {
                    question_id: Some(id),
                    message: format!(
                        "question id {id} is used by both `{owner}` and `{}`",
                        set.id
                    ),
                }),
                None => {
                    owners.insert(id, &set.id);
                }
            }
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[question_set]
id = "backend"
name = "Backend engineer"
default_kind = "technical"

[[questions]]
id = 1
text = "How would you design a rate limiter?"
skills = ["system_design", "technical"]
difficulty = 4

[[questions]]
id = 2
text = "Tell me about a conflict in your team."
skills = ["teamwork"]
kind = "behavioral"
"#;

    #[test]
    fn parse_sample_set() {
        let set = parse_question_set_str(SAMPLE, Path::new("sample.toml")).unwrap();
        assert_eq!(set.id, "backend");
        assert_eq!(set.entries.len(), 2);
        assert_eq!(set.entries[0].kind, QuestionKind::Technical);
        assert_eq!(set.entries[0].difficulty, 4);
        assert!(set.entries[0].question.skill_tags.contains("system_design"));
        assert_eq!(set.entries[1].kind, QuestionKind::Behavioral);
        assert_eq!(set.entries[1].difficulty, 3);
        assert!(validate_question_set(&set).is_empty());
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let bad = SAMPLE.replace("kind = \"behavioral\"", "kind = \"trivia\"");
        let err = parse_question_set_str(&bad, Path::new("bad.toml")).unwrap_err();
        assert!(err.to_string().contains("trivia"));
    }

    #[test]
    fn validation_flags_problems() {
        let toml = r#"
[question_set]
id = "broken"
name = "Broken"

[[questions]]
id = 7
text = "  "
difficulty = 9

[[questions]]
id = 7
text = "Duplicate"
skills = ["x"]
"#;
        let set = parse_question_set_str(toml, Path::new("broken.toml")).unwrap();
        let warnings = validate_question_set(&set);
        let messages: Vec<&str> = warnings.iter().map(|w| w.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("duplicate question id 7")));
        assert!(messages.iter().any(|m| m.contains("text is empty")));
        assert!(messages.iter().any(|m| m.contains("no skills tagged")));
        assert!(messages.iter().any(|m| m.contains("difficulty 9")));
    }

    #[test]
    fn ids_shared_across_sets_are_reported() {
        let first = parse_question_set_str(SAMPLE, Path::new("a.toml")).unwrap();
        let second = parse_question_set_str(
            &SAMPLE.replace("id = \"backend\"", "id = \"frontend\""),
            Path::new("b.toml"),
        )
        .unwrap();
        assert!(validate_question_sets(std::slice::from_ref(&first)).is_empty());

        let warnings = validate_question_sets(&[first, second]);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0]
            .message
            .contains("used by both `backend` and `frontend`"));
    }

    #[test]
    fn load_directory_skips_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.toml"), SAMPLE).unwrap();
        std::fs::write(dir.path().join("b.toml"), "not = [valid").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let sets = load_question_directory(dir.path()).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].name, "Backend engineer");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_question_sets(Path::new("does-not-exist.toml")).is_err());
    }
}
