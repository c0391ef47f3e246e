//! mockview CLI: practice interviews from the terminal.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use uuid::Uuid;

mod commands;

#[derive(Parser)]
#[command(name = "mockview", version, about = "Practice interview session runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an interactive interview session
    Interview {
        /// Log in with this email before starting
        #[arg(long, requires = "password")]
        email: Option<String>,

        /// Password for --email
        #[arg(long, requires = "email")]
        password: Option<String>,

        /// Only ask questions from this question set
        #[arg(long)]
        set: Option<String>,

        /// Only ask questions tagged with one of these skills (comma-separated)
        #[arg(long)]
        skills: Option<String>,

        /// Only ask questions of this kind: behavioral, technical
        #[arg(long)]
        kind: Option<String>,

        /// Skip questions harder than this (1-5)
        #[arg(long)]
        max_difficulty: Option<u8>,

        /// Ask at most this many questions
        #[arg(long)]
        limit: Option<usize>,

        /// Continue a saved session instead of starting a new one
        #[arg(long, conflicts_with_all = ["set", "skills", "kind", "max_difficulty", "limit"])]
        resume: Option<Uuid>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show statistics for a saved session file
    Summary {
        /// Path to a session JSON file
        #[arg(long)]
        session: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List past sessions with overall statistics
    History {
        /// Filter by status: in_progress, completed, failed
        #[arg(long)]
        status: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Log in and remember the token for later commands
    Login {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Forget the stored login
    Logout {
        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate question set TOML files
    Validate {
        /// Path to question set file or directory
        #[arg(long)]
        questions: PathBuf,
    },

    /// Create starter config and example question set
    Init,
}

#[tokio::main]
async fn main() {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "mockview=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Interview {
            email,
            password,
            set,
            skills,
            kind,
            max_difficulty,
            limit,
            resume,
            config,
        } => {
            commands::interview::execute(commands::interview::InterviewArgs {
                email,
                password,
                set,
                skills,
                kind,
                max_difficulty,
                limit,
                resume,
                config,
            })
            .await
        }
        Commands::Summary { session, json } => commands::summary::execute(session, json),
        Commands::History { status, config } => commands::history::execute(status, config).await,
        Commands::Login {
            email,
            password,
            config,
        } => commands::login::execute(email, password, config).await,
        Commands::Logout { config } => commands::login::logout(config).await,
        Commands::Validate { questions } => commands::validate::execute(questions),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
