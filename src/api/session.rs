//! Durable storage for the bearer token.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const SESSION_FILE: &str = "session.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Persisted {
    token: Option<String>,
}

/// The signed-in session, shared by the HTTP adapter and the pages.
///
/// The token is kept in memory for synchronous reads at render time and mirrored to a
/// JSON file so it survives restarts. Persistence failures are logged and otherwise
/// ignored; the in-memory token stays authoritative for the running process.
#[derive(Debug, Clone)]
pub struct SessionStore {
    token: Arc<RwLock<Option<String>>>,
    path: Option<PathBuf>,
    expired: broadcast::Sender<()>,
}

impl SessionStore {
    /// A session that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_token(None, None)
    }

    /// Loads the session stored at `path`. A missing or unreadable file means no session.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let token = std::fs::read_to_string(&path)
            .inspect_err(|e| debug!(path = %path.display(), "no stored session: {e}"))
            .ok()
            .and_then(|s| {
                serde_json::from_str::<Persisted>(&s)
                    .inspect_err(|e| warn!(path = %path.display(), "failed to parse session: {e}"))
                    .ok()
            })
            .and_then(|persisted| persisted.token)
            .filter(|token| !token.is_empty());

        Self::with_token(token, Some(path))
    }

    /// `<config_dir>/avitolog/session.json`, if the platform has a config directory.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("avitolog").join(SESSION_FILE))
    }

    fn with_token(token: Option<String>, path: Option<PathBuf>) -> Self {
        let (expired, _) = broadcast::channel(8);
        Self {
            token: Arc::new(RwLock::new(token)),
            path,
            expired,
        }
    }

    /// The current token, if signed in.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns `true` if a token is stored.
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Stores a new token.
    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        info!("session token stored");
        self.persist(Some(token));
    }

    /// Forgets the token (sign out).
    pub fn clear(&self) {
        let had_token = self
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();
        if had_token {
            info!("session cleared");
            self.persist(None);
        }
    }

    /// Forgets `rejected` because the backend refused it, and notifies listeners.
    ///
    /// Does nothing if the stored token has changed since the rejected request was sent.
    /// Returns `true` if the session was expired.
    pub fn expire(&self, rejected: &str) -> bool {
        {
            let mut token = self.token.write().unwrap_or_else(PoisonError::into_inner);
            if token.as_deref() != Some(rejected) {
                debug!("rejected token is no longer stored");
                return false;
            }
            *token = None;
        }
        info!("session expired");
        self.persist(None);
        let _ = self.expired.send(());
        true
    }

    /// Receives one `()` per [`expire`](Self::expire) call.
    #[must_use]
    pub fn expired_events(&self) -> broadcast::Receiver<()> {
        self.expired.subscribe()
    }

    /// The file backing this session, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn persist(&self, token: Option<String>) {
        let Some(path) = &self.path else {
            return;
        };
        if let Some(dir) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                warn!(path = %dir.display(), "failed to create session directory: {e}");
                return;
            }
        }
        let body = match serde_json::to_string(&Persisted { token }) {
            Ok(body) => body,
            Err(e) => {
                warn!("failed to encode session: {e}");
                return;
            }
        };
        if let Err(e) = std::fs::write(path, body) {
            warn!(path = %path.display(), "failed to write session: {e}");
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
