//! Application state for the imagejoin server
//!
//! Every browser session gets its own `UiSession` behind a mutex, so only
//! one request at a time can read or change a given session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use imagejoin_core::{ConversionOptions, SessionState};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::ServerError;

/// What one user sees and has entered
#[derive(Debug, Default)]
pub struct UiSession {
    pub images: SessionState,
    /// Last submitted form values, redisplayed on every render
    pub options: ConversionOptions,
}

pub type SharedSession = Arc<Mutex<UiSession>>;

#[derive(Debug)]
struct SessionEntry {
    session: SharedSession,
    last_seen: Instant,
}

/// In-memory sessions keyed by id
///
/// Idle sessions are swept on every lookup. At capacity, creating a session
/// drops the least recently used one.
#[derive(Clone, Debug)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
    idle_timeout: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            idle_timeout,
            max_sessions: max_sessions.max(1),
        }
    }

    fn evict_idle(&self, sessions: &mut HashMap<Uuid, SessionEntry>) {
        let before = sessions.len();
        let timeout = self.idle_timeout;
        sessions.retain(|_, entry| entry.last_seen.elapsed() < timeout);
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::info!(evicted, "evicted idle sessions");
        }
    }

    /// Start a fresh session and return its id
    pub async fn create(&self) -> Uuid {
        let mut sessions = self.sessions.write().await;
        self.evict_idle(&mut sessions);

        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                    tracing::info!(session = %id, "session limit reached, dropped least recently used");
                }
                None => break,
            }
        }

        let id = Uuid::new_v4();
        sessions.insert(
            id,
            SessionEntry {
                session: Arc::new(Mutex::new(UiSession::default())),
                last_seen: Instant::now(),
            },
        );
        id
    }

    /// Look up a live session and mark it as used
    pub async fn get(&self, id: Uuid) -> Option<SharedSession> {
        let mut sessions = self.sessions.write().await;
        self.evict_idle(&mut sessions);

        let entry = sessions.get_mut(&id)?;
        entry.last_seen = Instant::now();
        Some(entry.session.clone())
    }

    pub async fn require(&self, id: Uuid) -> Result<SharedSession, ServerError> {
        self.get(id).await.ok_or(ServerError::SessionNotFound(id))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Shared application state
#[derive(Clone, Debug)]
pub struct AppState {
    pub sessions: SessionStore,
    /// Request body limit for uploads
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(idle_timeout: Duration, max_sessions: usize, max_upload_bytes: usize) -> Self {
        Self {
            sessions: SessionStore::new(idle_timeout, max_sessions),
            max_upload_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get_session() {
        let store = SessionStore::new(Duration::from_secs(60), 10);
        let id = store.create().await;

        assert!(store.get(id).await.is_some());
        assert!(store.get(Uuid::new_v4()).await.is_none());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SessionStore::new(Duration::from_secs(60), 10);
        let a = store.create().await;
        let b = store.create().await;

        {
            let session = store.get(a).await.unwrap();
            session.lock().await.options.title = "Only A".into();
        }

        let b_session = store.get(b).await.unwrap();
        assert_eq!(b_session.lock().await.options.title, "");
    }

    #[tokio::test]
    async fn test_idle_sessions_expire() {
        let store = SessionStore::new(Duration::ZERO, 10);
        let id = store.create().await;

        assert!(store.get(id).await.is_none());
        assert!(matches!(
            store.require(id).await,
            Err(ServerError::SessionNotFound(_))
        ));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_lookup_sweeps_other_idle_sessions() {
        let store = SessionStore::new(Duration::from_millis(50), 10);
        let stale = store.create().await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        let fresh = store.create().await;
        assert_eq!(store.len().await, 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(store.get(fresh).await.is_some());
        assert!(store.get(stale).await.is_none());
    }

    #[tokio::test]
    async fn test_idle_sessions_swept_without_new_sessions() {
        let store = SessionStore::new(Duration::from_millis(50), 10);
        let a = store.create().await;
        let b = store.create().await;
        assert_eq!(store.len().await, 2);

        tokio::time::sleep(Duration::from_millis(80)).await;
        // Looking up any id clears every expired session
        assert!(store.get(Uuid::new_v4()).await.is_none());
        assert_eq!(store.len().await, 0);
        assert!(store.get(a).await.is_none());
        assert!(store.get(b).await.is_none());
    }

    #[tokio::test]
    async fn test_session_cap_drops_least_recently_used() {
        let store = SessionStore::new(Duration::from_secs(60), 2);
        let a = store.create().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let b = store.create().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(store.get(a).await.is_some());
        tokio::time::sleep(Duration::from_millis(5)).await;

        let c = store.create().await;
        assert_eq!(store.len().await, 2);
        assert!(store.get(a).await.is_some());
        assert!(store.get(b).await.is_none());
        assert!(store.get(c).await.is_some());
    }
}
