//! Wiring shared by the commands that talk to the engine.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

use mockview_core::auth::AuthSession;
use mockview_core::bank::InMemoryQuestionBank;
use mockview_core::engine::InterviewSessionEngine;
use mockview_core::parser::load_question_sets;
use mockview_core::store::{JsonFileSessionStore, JsonFileTokenStore};
use mockview_core::traits::Credentials;
use mockview_providers::config::{
    create_analyzer, create_auth_backend, load_config_from, MockviewConfig,
};

/// Configured collaborators for one CLI invocation.
pub struct App {
    pub config: MockviewConfig,
    pub auth: Arc<AuthSession>,
    pub engine: InterviewSessionEngine,
}

impl App {
    /// Load config, build the collaborators, and restore any saved login.
    pub async fn open(config_path: Option<&Path>) -> Result<Self> {
        let config = load_config_from(config_path)?;

        let tokens = Arc::new(JsonFileTokenStore::new(config.token_path()));
        let auth = Arc::new(AuthSession::new(create_auth_backend(&config.auth)?, tokens));
        if let Err(e) = auth.restore().await {
            warn!("ignoring saved login: {e}");
        }

        let engine_config = config.engine_config();
        let analyzer = create_analyzer(&config.analyzer, engine_config.analysis_timeout)?;
        let store = Arc::new(JsonFileSessionStore::new(&config.session_dir));
        let engine =
            InterviewSessionEngine::new(analyzer, auth.clone(), engine_config).with_store(store);

        Ok(Self {
            config,
            auth,
            engine,
        })
    }

    /// Log in when credentials are given, then return the authenticated user id.
    pub async fn ensure_login(
        &self,
        email: Option<String>,
        password: Option<String>,
    ) -> Result<String> {
        if let (Some(email), Some(password)) = (email, password) {
            self.auth.login(&Credentials { email, password }).await?;
        }
        self.auth.require_authentication().map_err(|_| {
            anyhow::anyhow!("not logged in; run `mockview login` or pass --email and --password")
        })
    }

    /// Configured question sets, or the built-in set.
    pub fn question_bank(&self) -> Result<InMemoryQuestionBank> {
        match &self.config.question_sets {
            Some(path) => {
                let sets = load_question_sets(path)?;
                anyhow::ensure!(
                    !sets.is_empty(),
                    "no question sets found in {}",
                    path.display()
                );
                Ok(InMemoryQuestionBank::new(sets))
            }
            None => Ok(InMemoryQuestionBank::builtin()),
        }
    }
}
