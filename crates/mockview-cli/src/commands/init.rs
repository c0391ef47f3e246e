//! The `mockview init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("mockview.toml").exists() {
        println!("mockview.toml already exists, skipping.");
    } else {
        std::fs::write("mockview.toml", SAMPLE_CONFIG)?;
        println!("Created mockview.toml");
    }

    std::fs::create_dir_all("questions")?;
    let example_path = std::path::Path::new("questions/example.toml");
    if example_path.exists() {
        println!("questions/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_QUESTION_SET)?;
        println!("Created questions/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit mockview.toml to point at your analysis server, or keep the mock analyzer");
    println!("  2. Run: mockview validate --questions questions/example.toml");
    println!("  3. Run: mockview interview --email you@example.com --password <password>");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# mockview configuration

max_retries = 2
retry_delay_ms = 500
analysis_timeout_secs = 10
question_sets = "questions"
session_dir = "mockview-sessions"

# Offline scoring. Switch to the HTTP analyzer for real feedback:
#
# [analyzer]
# type = "http"
# base_url = "http://localhost:8000/api/v1"
# api_key = "${MOCKVIEW_API_KEY}"
[analyzer]
type = "mock"
score = 80

[analyzer.keywords]
example = 90

# [auth]
# type = "http"
# base_url = "http://localhost:8000/api/v1"
[auth]
type = "mock"
"#;

const EXAMPLE_QUESTION_SET: &str = r#"[question_set]
id = "example"
name = "Example interview"
description = "A short mixed interview to get started"
default_kind = "behavioral"

[[questions]]
id = 1
text = "Tell me about yourself and your experience."
skills = ["communication"]
difficulty = 1

[[questions]]
id = 2
text = "Describe a challenging situation you faced at work and how you handled it."
skills = ["problem_solving", "communication"]
difficulty = 3

[[questions]]
id = 3
text = "Tell me about a time you disagreed with a teammate."
skills = ["teamwork"]
difficulty = 3

[[questions]]
id = 4
text = "How would you find the cause of a memory leak in a long-running service?"
skills = ["technical", "problem_solving"]
kind = "technical"
difficulty = 4

[[questions]]
id = 5
text = "Where do you see yourself in 5 years?"
skills = ["motivation"]
difficulty = 1
"#;
