//! The `mockview validate` command.

use std::path::PathBuf;

use anyhow::Result;

use mockview_core::parser::{load_question_sets, validate_question_set, validate_question_sets};

pub fn execute(questions_path: PathBuf) -> Result<()> {
    let sets = load_question_sets(&questions_path)?;
    anyhow::ensure!(
        !sets.is_empty(),
        "no question sets found in {}",
        questions_path.display()
    );

    let mut total_warnings = 0;

    for set in &sets {
        println!("Question set: {} ({} questions)", set.name, set.entries.len());

        let warnings = validate_question_set(set);
        for w in &warnings {
            let prefix = w
                .question_id
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    let shared = validate_question_sets(&sets);
    for w in &shared {
        println!("WARNING: {}; use --set to pick one", w.message);
    }
    total_warnings += shared.len();

    if total_warnings == 0 {
        println!("All question sets valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
