use super::model::{Session, SessionSnapshot};
use crate::error::{Result, WheelError};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// Shared handle to one session. The mutex serialises that session's mutations.
pub type SessionHandle = Arc<Mutex<Session>>;

/// In-memory owner of every live session.
///
/// `SessionStore` is responsible for:
/// - Creating sessions with fresh identifiers
/// - Looking sessions up (and refreshing their access time)
/// - Deleting sessions on request
/// - Sweeping sessions that have been idle past their TTL
///
/// # Locking
///
/// The id → session map sits behind its own `RwLock`; each session has a
/// separate `Mutex`. The map lock is never held while waiting on a session
/// lock, and the sweep skips sessions whose lock is taken instead of waiting.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new uninitialised session for `model_name`.
    pub async fn create(&self, model_name: impl Into<String>) -> SessionSnapshot {
        let session = Session::new(model_name);
        let snapshot = session.snapshot();
        let handle = Arc::new(Mutex::new(session));

        let mut sessions = self.sessions.write().await;
        sessions.insert(snapshot.session_id.clone(), handle);
        drop(sessions);

        tracing::debug!(
            session_id = %snapshot.session_id,
            model = %snapshot.model_name,
            "Session created"
        );
        snapshot
    }

    /// Returns the session handle and refreshes its access time.
    ///
    /// # Errors
    ///
    /// `NotFound` if no live session has this id.
    pub async fn get(&self, session_id: &str) -> Result<SessionHandle> {
        let handle = self.handle(session_id).await?;
        {
            let mut session = handle.lock().await;
            if session.is_retired() {
                return Err(WheelError::session_not_found(session_id));
            }
            session.touch();
        }
        Ok(handle)
    }

    /// Runs `f` under the session's lock after refreshing its access time.
    ///
    /// The lock is released when `f` returns, on success and on error alike.
    ///
    /// # Errors
    ///
    /// `NotFound` if no live session has this id, otherwise whatever `f` returns.
    pub async fn with_session<F, T>(&self, session_id: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> Result<T>,
    {
        let handle = self.handle(session_id).await?;
        let mut session = handle.lock().await;
        if session.is_retired() {
            return Err(WheelError::session_not_found(session_id));
        }
        session.touch();
        f(&mut *session)
    }

    /// Snapshot of a session (counts as an access).
    pub async fn snapshot(&self, session_id: &str) -> Result<SessionSnapshot> {
        self.with_session(session_id, |session| Ok(session.snapshot()))
            .await
    }

    /// Removes a session. Returns whether it existed.
    pub async fn delete(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(session_id);
        drop(sessions);

        match removed {
            Some(handle) => {
                handle.lock().await.retire();
                tracing::debug!(session_id = %session_id, "Session deleted");
                true
            }
            None => false,
        }
    }

    /// Removes every session idle for longer than `ttl`. Returns how many.
    pub async fn sweep_expired(&self, ttl: Duration) -> usize {
        self.sweep_expired_at(ttl, Utc::now()).await
    }

    /// [`SessionStore::sweep_expired`] against an explicit clock reading.
    pub async fn sweep_expired_at(&self, ttl: Duration, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|session_id, handle| match handle.try_lock() {
            Ok(mut session) => {
                if session.is_expired_at(ttl, now) {
                    session.retire();
                    tracing::debug!(
                        session_id = %session_id,
                        last_accessed = %session.last_accessed_at(),
                        "Session expired"
                    );
                    false
                } else {
                    true
                }
            }
            Err(_) => {
                // A held lock means a request is using it right now.
                tracing::debug!(session_id = %session_id, "Session busy, skipped by sweep");
                true
            }
        });

        before - sessions.len()
    }

    /// Number of live sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn handle(&self, session_id: &str) -> Result<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| WheelError::session_not_found(session_id))
    }
}
