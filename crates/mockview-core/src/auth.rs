//! The authenticated user's session.
//!
//! An `AuthSession` is created once at application start and shared as
//! `Arc<AuthSession>` with everything that needs to gate on authentication.
//! Only its own `login`, `refresh`, `restore`, and `logout` mutate it.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::SessionError;
use crate::traits::{AuthBackend, Credentials, LoginResponse, TokenStore};

/// Holds the current login and answers "is the user authenticated?".
pub struct AuthSession {
    backend: Arc<dyn AuthBackend>,
    tokens: Arc<dyn TokenStore>,
    current: RwLock<Option<LoginResponse>>,
    changes: watch::Sender<bool>,
}

impl AuthSession {
    pub fn new(backend: Arc<dyn AuthBackend>, tokens: Arc<dyn TokenStore>) -> Self {
        let (changes, _) = watch::channel(false);
        Self {
            backend,
            tokens,
            current: RwLock::new(None),
            changes,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<LoginResponse>> {
        self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace(&self, login: Option<LoginResponse>) {
        let authenticated = login.is_some();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = login;
        self.changes.send_replace(authenticated);
    }

    /// Log in through the backend and persist the resulting token.
    ///
    /// Fails with [`SessionError::Authentication`] carrying a message that can
    /// be shown to the user.
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, SessionError> {
        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return Err(SessionError::Validation(
                "email and password are required".into(),
            ));
        }

        let login = self.backend.login(credentials).await?;
        if login.token.is_empty() || login.expires_at <= Utc::now() {
            return Err(SessionError::Authentication(
                "server issued an unusable token".into(),
            ));
        }

        if let Err(e) = self.tokens.save(&login).await {
            warn!("failed to persist login token: {e:#}");
        }
        info!(user_id = %login.user_id, "logged in");
        self.replace(Some(login.clone()));
        Ok(login)
    }

    /// Exchange the current token for a fresh one.
    pub async fn refresh(&self) -> Result<LoginResponse, SessionError> {
        let token = self.token().ok_or(SessionError::Unauthorized)?;
        let login = self.backend.refresh(&token).await?;
        if login.expires_at <= Utc::now() {
            return Err(SessionError::Authentication(
                "server issued an expired token".into(),
            ));
        }
        if let Err(e) = self.tokens.save(&login).await {
            warn!("failed to persist refreshed token: {e:#}");
        }
        self.replace(Some(login.clone()));
        Ok(login)
    }

    /// Load a previously persisted login, if one exists and has not expired.
    ///
    /// Returns whether the session is now authenticated.
    pub async fn restore(&self) -> Result<bool, SessionError> {
        let stored = self.tokens.load().await.map_err(SessionError::storage)?;
        match stored {
            Some(login) if login.expires_at > Utc::now() => {
                info!(user_id = %login.user_id, "restored login");
                self.replace(Some(login));
                Ok(true)
            }
            Some(_) => {
                self.tokens.clear().await.map_err(SessionError::storage)?;
                Ok(false)
            }
            None => Ok(false),
        }
    }

    /// True iff a token is present and has not expired.
    pub fn is_authenticated(&self) -> bool {
        self.read()
            .as_ref()
            .is_some_and(|login| !login.token.is_empty() && login.expires_at > Utc::now())
    }

    /// Guard for protected operations. Returns the authenticated user id.
    pub fn require_authentication(&self) -> Result<String, SessionError> {
        if !self.is_authenticated() {
            return Err(SessionError::Unauthorized);
        }
        self.user_id().ok_or(SessionError::Unauthorized)
    }

    /// Clear the login and notify subscribers. Safe to call repeatedly.
    pub async fn logout(&self) {
        let was_logged_in = self.read().is_some();
        self.replace(None);
        if let Err(e) = self.tokens.clear().await {
            warn!("failed to clear persisted token: {e:#}");
        }
        if was_logged_in {
            info!("logged out");
        }
    }

    /// Receiver that observes authentication changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.changes.subscribe()
    }

    pub fn user_id(&self) -> Option<String> {
        self.read().as_ref().map(|l| l.user_id.clone())
    }

    pub fn token(&self) -> Option<String> {
        self.read().as_ref().map(|l| l.token.clone())
    }

    /// The current login, including the displayable profile.
    pub fn profile(&self) -> Option<LoginResponse> {
        self.read().clone()
    }
}
