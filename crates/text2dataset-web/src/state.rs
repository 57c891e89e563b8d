use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha512};
use text2dataset_core::{DatasetStore, LabelPipeline, OutputDirectory};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::ServerConfig;

/// Unique identifier for a session
pub type SessionId = Uuid;

/// A logged-in browser session
pub struct Session {
    pub id: SessionId,
    pub username: String,
    pub last_seen: DateTime<Utc>,
}

impl Session {
    pub fn new(username: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            last_seen: Utc::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Utc::now();
    }

    fn is_idle_at(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        now - self.last_seen > timeout
    }
}

/// In-memory session table with an idle timeout
pub struct SessionManager {
    sessions: HashMap<SessionId, Session>,
    idle_timeout: chrono::Duration,
}

impl SessionManager {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            idle_timeout: chrono::Duration::from_std(idle_timeout)
                .unwrap_or_else(|_| chrono::Duration::hours(1)),
        }
    }

    /// Start a session for `username`
    pub fn create(&mut self, username: String) -> SessionId {
        let session = Session::new(username);
        let id = session.id;
        self.sessions.insert(id, session);
        id
    }

    /// Username behind a live session. Idle sessions are dropped; live ones are touched.
    pub fn resolve(&mut self, session_id: SessionId) -> Option<String> {
        let now = Utc::now();
        let session = self.sessions.get_mut(&session_id)?;
        if session.is_idle_at(now, self.idle_timeout) {
            self.sessions.remove(&session_id);
            return None;
        }
        session.touch();
        Some(session.username.clone())
    }

    pub fn remove(&mut self, session_id: SessionId) -> Option<Session> {
        self.sessions.remove(&session_id)
    }

    /// End every session of `username`. Returns how many were ended.
    pub fn remove_user(&mut self, username: &str) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.username != username);
        before - self.sessions.len()
    }

    pub fn purge_idle(&mut self) -> usize {
        let now = Utc::now();
        let timeout = self.idle_timeout;
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_idle_at(now, timeout));
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DatasetStore>,
    pub sessions: Arc<RwLock<SessionManager>>,
    pub outputs: OutputDirectory,
    pub pipeline: Arc<LabelPipeline>,
    pub config: Arc<ServerConfig>,
    key: Key,
}

impl AppState {
    pub fn new(config: ServerConfig, store: Arc<dyn DatasetStore>, outputs: OutputDirectory) -> Self {
        Self::with_pipeline(config, store, outputs, LabelPipeline::new())
    }

    pub fn with_pipeline(
        config: ServerConfig,
        store: Arc<dyn DatasetStore>,
        outputs: OutputDirectory,
        pipeline: LabelPipeline,
    ) -> Self {
        // Key::from needs 64 bytes of key material.
        let key = Key::from(Sha512::digest(config.secret_key.as_bytes()).as_slice());
        Self {
            store,
            sessions: Arc::new(RwLock::new(SessionManager::new(
                config.session_idle_timeout(),
            ))),
            outputs,
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
            key,
        }
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.config.retention())
            .unwrap_or_else(|_| chrono::Duration::hours(24))
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.key.clone()
    }
}
