//! Session and token persistence.
//!
//! In-memory stores for tests and memory-only runs, and JSON file stores for
//! resuming sessions and logins across process restarts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::model::{SessionId, SessionState, SessionStatus};
use crate::traits::{LoginResponse, SessionStore, TokenStore};

/// Keeps snapshots in a map; lost on process exit.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<SessionId, SessionState>>,
}

impl MemorySessionStore {
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, session: &SessionState) -> Result<()> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.session_id(), session.clone());
        Ok(())
    }

    async fn load(&self, session_id: SessionId) -> Result<Option<SessionState>> {
        Ok(self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&session_id)
            .cloned())
    }

    async fn list(
        &self,
        user_id: &str,
        status: Option<SessionStatus>,
    ) -> Result<Vec<SessionState>> {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let mut matching: Vec<SessionState> = sessions
            .values()
            .filter(|s| s.user_id() == user_id && status.is_none_or(|st| s.status() == st))
            .cloned()
            .collect();
        matching.sort_by_key(|s| s.started_at());
        Ok(matching)
    }
}

/// Stores one pretty-printed JSON file per session in a directory.
pub struct JsonFileSessionStore {
    dir: PathBuf,
}

impl JsonFileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, session_id: SessionId) -> PathBuf {
        self.dir.join(format!("{session_id}.json"))
    }
}

/// Read a session snapshot from a JSON file.
pub fn load_session_file(path: &Path) -> Result<SessionState> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read session from {}", path.display()))?;
    parse_session(&content, path)
}

async fn read_session_file(path: &Path) -> Result<SessionState> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read session from {}", path.display()))?;
    parse_session(&content, path)
}

fn parse_session(content: &str, path: &Path) -> Result<SessionState> {
    let mut session: SessionState = serde_json::from_str(content)
        .with_context(|| format!("failed to parse session JSON: {}", path.display()))?;
    session
        .normalize_loaded()
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("invalid session snapshot: {}", path.display()))?;
    Ok(session)
}

#[async_trait]
impl SessionStore for JsonFileSessionStore {
    async fn save(&self, session: &SessionState) -> Result<()> {
        let json = serde_json::to_string_pretty(session).context("failed to serialize session")?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let path = self.path_for(session.session_id());
        // Write then rename so a crash never leaves a half-written snapshot.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("failed to write session to {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("failed to move session into {}", path.display()))?;
        Ok(())
    }

    async fn load(&self, session_id: SessionId) -> Result<Option<SessionState>> {
        let path = self.path_for(session_id);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        read_session_file(&path).await.map(Some)
    }

    async fn list(
        &self,
        user_id: &str,
        status: Option<SessionStatus>,
    ) -> Result<Vec<SessionState>> {
        let mut sessions = Vec::new();
        if !self.dir.is_dir() {
            return Ok(sessions);
        }

        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("failed to read directory: {}", self.dir.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match read_session_file(&path).await {
                Ok(session) => {
                    if session.user_id() == user_id
                        && status.is_none_or(|st| session.status() == st)
                    {
                        sessions.push(session);
                    }
                }
                Err(e) => {
                    tracing::warn!("skipping {}: {e:#}", path.display());
                }
            }
        }
        sessions.sort_by_key(|s| s.started_at());
        Ok(sessions)
    }
}

/// Token store that forgets on process exit.
#[derive(Default)]
pub struct MemoryTokenStore {
    login: Mutex<Option<LoginResponse>>,
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn save(&self, login: &LoginResponse) -> Result<()> {
        *self.login.lock().unwrap_or_else(PoisonError::into_inner) = Some(login.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<LoginResponse>> {
        Ok(self
            .login
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn clear(&self) -> Result<()> {
        *self.login.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Token store backed by a single JSON file.
pub struct JsonFileTokenStore {
    path: PathBuf,
}

impl JsonFileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TokenStore for JsonFileTokenStore {
    async fn save(&self, login: &LoginResponse) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(login).context("failed to serialize token")?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("failed to write token to {}", self.path.display()))?;
        Ok(())
    }

    async fn load(&self) -> Result<Option<LoginResponse>> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read token from {}", self.path.display()))?;
        let login = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse token file: {}", self.path.display()))?;
        Ok(Some(login))
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("failed to remove token file {}", self.path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::three_questions;
    use chrono::Utc;

    fn started(user: &str) -> SessionState {
        let mut s = SessionState::new(user, three_questions());
        s.begin(Utc::now());
        s
    }

    #[tokio::test]
    async fn memory_store_filters_by_user_and_status() {
        let store = MemorySessionStore::default();
        let mut done = started("alice");
        done.finish(SessionStatus::Completed, Utc::now());
        store.save(&done).await.unwrap();
        store.save(&started("alice")).await.unwrap();
        store.save(&started("bob")).await.unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.list("alice", None).await.unwrap().len(), 2);
        let completed = store
            .list("alice", Some(SessionStatus::Completed))
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0], done);
    }

    #[tokio::test]
    async fn json_store_round_trips_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSessionStore::new(dir.path().join("sessions"));

        let mut session = started("alice");
        session.record_answer("I have 5 years experience", Utc::now());
        store.save(&session).await.unwrap();

        let loaded = store.load(session.session_id()).await.unwrap().unwrap();
        assert_eq!(loaded, session);
        assert_eq!(
            loaded.answer(1).unwrap().text,
            "I have 5 years experience"
        );
        assert!(store.load(uuid::Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn json_store_skips_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSessionStore::new(dir.path());
        store.save(&started("alice")).await.unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();

        let sessions = store.list("alice", None).await.unwrap();
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn session_file_must_satisfy_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(
            &path,
            serde_json::json!({
                "session_id": uuid::Uuid::new_v4(),
                "user_id": "alice",
                "questions": [{"id": 1, "text": "a"}, {"id": 2, "text": "b"}],
                "current_index": 1,
                "answers": {
                    "1": {"question_id": 1, "text": "x", "submitted_at": "2026-01-01T10:00:00Z"},
                    "2": {"question_id": 2, "text": "y", "submitted_at": "2026-01-01T10:01:00Z"}
                },
                "results": {"1": {"question_id": 1, "score": 90, "feedback": "ok"}},
                "status": "completed"
            })
            .to_string(),
        )
        .unwrap();

        let err = load_session_file(&path).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("invalid session snapshot"));
        assert!(message.contains("no result for question 2"));
    }

    #[tokio::test]
    async fn json_store_load_reports_invalid_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSessionStore::new(dir.path());
        let id = uuid::Uuid::new_v4();
        std::fs::write(
            dir.path().join(format!("{id}.json")),
            serde_json::json!({
                "session_id": id,
                "user_id": "alice",
                "questions": [],
                "current_index": 0,
                "answers": {},
                "results": {},
                "status": "in_progress"
            })
            .to_string(),
        )
        .unwrap();

        assert!(store.load(id).await.is_err());
        assert!(store.list("alice", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn json_token_store_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileTokenStore::new(dir.path().join("auth/token.json"));
        assert!(store.load().await.unwrap().is_none());

        let login = LoginResponse {
            user_id: "u".into(),
            full_name: String::new(),
            email: String::new(),
            token: "t".into(),
            expires_at: Utc::now(),
        };
        store.save(&login).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(login));

        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }
}
