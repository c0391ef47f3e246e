//! The `mockview summary` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use mockview_core::model::SessionStatus;
use mockview_core::statistics::{aggregate, running_summary, SessionSummary};
use mockview_core::store::load_session_file;

pub fn execute(session_path: PathBuf, json: bool) -> Result<()> {
    let session = load_session_file(&session_path)?;

    let summary = if session.status() == SessionStatus::Completed {
        aggregate(&session)?
    } else {
        running_summary(&session).ok_or_else(|| {
            anyhow::anyhow!(
                "session {} has no analyzed answers yet",
                session.session_id()
            )
        })?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Session {} ({})", summary.session_id, summary.status);
    if session.status() != SessionStatus::Completed {
        println!("Partial results: the session is not completed.");
    }
    print_summary(&summary);
    Ok(())
}

/// Print overall and per-skill tables.
pub fn print_summary(summary: &SessionSummary) {
    let mut table = Table::new();
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec![
        Cell::new("Average score"),
        Cell::new(format!("{:.1}", summary.average_score)),
    ]);
    table.add_row(vec![
        Cell::new("Best score"),
        Cell::new(summary.best_score),
    ]);
    table.add_row(vec![
        Cell::new("Worst score"),
        Cell::new(summary.worst_score),
    ]);
    table.add_row(vec![
        Cell::new("Answered"),
        Cell::new(format!(
            "{}/{}",
            summary.answered_questions, summary.total_questions
        )),
    ]);
    if let Some(ms) = summary.total_duration_ms {
        table.add_row(vec![Cell::new("Duration"), Cell::new(format_duration(ms))]);
    }
    println!("{table}");

    if !summary.per_skill_average.is_empty() {
        let mut skills = Table::new();
        skills.set_header(vec!["Skill", "Average"]);
        for (skill, avg) in &summary.per_skill_average {
            skills.add_row(vec![Cell::new(skill), Cell::new(format!("{avg:.1}"))]);
        }
        println!("{skills}");
    }
}

pub fn format_duration(ms: u64) -> String {
    let secs = ms / 1000;
    match secs {
        0..=59 => format!("{secs}s"),
        60..=3599 => format!("{}m {:02}s", secs / 60, secs % 60),
        _ => format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(59_999), "59s");
        assert_eq!(format_duration(90_000), "1m 30s");
        assert_eq!(format_duration(3_660_000), "1h 01m");
    }
}
