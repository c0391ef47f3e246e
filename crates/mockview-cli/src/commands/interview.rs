//! The `mockview interview` command.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use mockview_core::bank::QuestionCriteria;
use mockview_core::engine::InterviewSession;
use mockview_core::error::SessionError;
use mockview_core::model::SessionStatus;

use super::app::App;
use super::summary::print_summary;

pub struct InterviewArgs {
    pub email: Option<String>,
    pub password: Option<String>,
    pub set: Option<String>,
    pub skills: Option<String>,
    pub kind: Option<String>,
    pub max_difficulty: Option<u8>,
    pub limit: Option<usize>,
    pub resume: Option<Uuid>,
    pub config: Option<PathBuf>,
}

impl InterviewArgs {
    fn criteria(&self) -> Result<QuestionCriteria> {
        let kind = self
            .kind
            .as_deref()
            .map(|k| k.parse().map_err(|e: String| anyhow::anyhow!(e)))
            .transpose()?;
        let skills = self
            .skills
            .as_deref()
            .map(|s| {
                s.split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        if let Some(max) = self.max_difficulty {
            anyhow::ensure!((1..=5).contains(&max), "max difficulty must be between 1 and 5");
        }
        anyhow::ensure!(self.limit != Some(0), "limit must be at least 1");

        Ok(QuestionCriteria {
            set_id: self.set.clone(),
            skills,
            kind,
            max_difficulty: self.max_difficulty,
            limit: self.limit,
        })
    }
}

enum Input {
    Answer(String),
    Previous,
    Summary,
    Quit,
    Abort,
}

fn parse_input(line: &str) -> Input {
    match line.trim() {
        ":prev" | ":p" => Input::Previous,
        ":summary" | ":s" => Input::Summary,
        ":quit" | ":q" => Input::Quit,
        ":abort" => Input::Abort,
        _ => Input::Answer(line.to_string()),
    }
}

pub async fn execute(args: InterviewArgs) -> Result<()> {
    let criteria = args.criteria()?;
    let app = App::open(args.config.as_deref()).await?;
    let user_id = app.ensure_login(args.email.clone(), args.password.clone()).await?;

    let session = match args.resume {
        Some(id) => app.engine.resume(id).await?,
        None => {
            let bank = app.question_bank()?;
            app.engine
                .start_from_bank(&user_id, &bank, &criteria)
                .await?
        }
    };

    let state = session.snapshot();
    match state.status() {
        SessionStatus::Completed => {
            println!("Session {} is already completed.", state.session_id());
            print_summary(&app.engine.aggregate(&session)?);
            return Ok(());
        }
        SessionStatus::Failed => {
            anyhow::bail!("session {} was abandoned", state.session_id());
        }
        _ => {}
    }

    println!(
        "Session {} with {} question(s).",
        state.session_id(),
        state.questions().len()
    );
    println!("Type your answer and press Enter. Commands: :prev  :summary  :quit  :abort");

    if run_loop(&app, &session).await? {
        println!("\nSession completed.");
        print_summary(&app.engine.aggregate(&session)?);
    }
    Ok(())
}

/// Drive the session from stdin. Returns whether the session completed.
async fn run_loop(app: &App, session: &InterviewSession) -> Result<bool> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let state = session.snapshot();
        if state.is_complete() {
            return Ok(true);
        }

        let question = state.current_question();
        println!(
            "\nQuestion {}/{}: {}",
            state.current_index() + 1,
            state.questions().len(),
            question.text
        );
        if let Some(previous) = state.answer(question.id) {
            println!("(your previous answer: {})", previous.text);
        }
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            print_resume_hint(session);
            return Ok(false);
        };

        match parse_input(&line) {
            Input::Quit => {
                print_resume_hint(session);
                return Ok(false);
            }
            Input::Abort => {
                app.engine.abort(session).await?;
                println!("Session abandoned.");
                return Ok(false);
            }
            Input::Previous => {
                if let Err(e) = app.engine.go_to_previous(session).await {
                    println!("{e}");
                }
            }
            Input::Summary => match app.engine.running_summary(session) {
                Some(summary) => print_summary(&summary),
                None => println!("No answers analyzed yet."),
            },
            Input::Answer(text) => {
                println!("Analyzing...");
                match app.engine.submit_answer(session, &text).await {
                    Ok(state) => {
                        if let Some(result) = state.result(question.id) {
                            println!("Score: {}/100. {}", result.score, result.feedback);
                        }
                    }
                    Err(SessionError::Validation(message)) => println!("{message}"),
                    Err(e @ SessionError::Analysis { .. }) => {
                        println!("{e}");
                        println!("Your answer was kept. Submit again to retry.");
                    }
                    Err(e) if e.requires_login() => {
                        anyhow::bail!("logged out during the interview; log in and resume it")
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }
}

fn print_resume_hint(session: &InterviewSession) {
    println!(
        "Session saved. Resume with: mockview interview --resume {}",
        session.session_id()
    );
}
