//! The `mockview history` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use mockview_core::model::SessionStatus;
use mockview_core::statistics::{running_summary, summarize_history};

use super::app::App;
use super::summary::format_duration;

pub async fn execute(status: Option<String>, config: Option<PathBuf>) -> Result<()> {
    let status = status
        .map(|s| s.parse::<SessionStatus>().map_err(|e| anyhow::anyhow!(e)))
        .transpose()?;

    let app = App::open(config.as_deref()).await?;
    app.ensure_login(None, None).await?;
    let sessions = app.engine.history(status).await?;

    if sessions.is_empty() {
        println!("No interviews yet. Start one with `mockview interview`.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Session", "Started", "Status", "Answered", "Average"]);
    for session in &sessions {
        let started = session
            .started_at()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".into());
        let average = running_summary(session)
            .map(|s| format!("{:.1}", s.average_score))
            .unwrap_or_else(|| "-".into());
        table.add_row(vec![
            Cell::new(session.session_id()),
            Cell::new(started),
            Cell::new(session.status()),
            Cell::new(format!(
                "{}/{}",
                session.answers().len(),
                session.questions().len()
            )),
            Cell::new(average),
        ]);
    }
    println!("{table}");

    let stats = summarize_history(&sessions);
    println!(
        "{} interview(s), {} completed, {} abandoned, {} total",
        stats.total_sessions,
        stats.completed_sessions,
        stats.abandoned_sessions,
        format_duration(stats.total_duration_ms)
    );
    if let (Some(avg), Some(best), Some(worst)) = (
        stats.average_score,
        stats.best_session_score,
        stats.worst_session_score,
    ) {
        println!("Average score {avg:.1} (best {best:.1}, worst {worst:.1})");
    }
    if !stats.per_skill_average.is_empty() {
        let mut skills = Table::new();
        skills.set_header(vec!["Skill", "Average"]);
        for (skill, avg) in &stats.per_skill_average {
            skills.add_row(vec![Cell::new(skill), Cell::new(format!("{avg:.1}"))]);
        }
        println!("{skills}");
    }

    Ok(())
}
