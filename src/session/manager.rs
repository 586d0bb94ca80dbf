//! Session lifecycle: creation, lookup, explicit destruction and idle expiry.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::Session;
use crate::ids::SessionId;
use crate::store::BlobStore;

/// Default idle lifetime of a session.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Owns every live session.
///
/// Clones share the same sessions.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionManagerInner>,
}

struct SessionManagerInner {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    store: Arc<dyn BlobStore>,
    ttl: Duration,
}

impl SessionManager {
    /// Create a manager whose sessions keep their blobs in `store`.
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self::with_ttl(store, DEFAULT_SESSION_TTL)
    }

    /// Create a manager with a custom idle lifetime.
    pub fn with_ttl(store: Arc<dyn BlobStore>, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(SessionManagerInner {
                sessions: RwLock::new(HashMap::new()),
                store,
                ttl,
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.inner.store
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    // ---- lifecycle ------------------------------------------------------

    /// Start a new, empty session.
    pub fn create(&self) -> Arc<Session> {
        let mut sessions = self.inner.sessions.write();
        let mut id = SessionId::generate();
        while sessions.contains_key(&id) {
            id = SessionId::generate();
        }
        let session = Arc::new(Session::new(id.clone(), Arc::clone(&self.inner.store)));
        sessions.insert(id, Arc::clone(&session));
        drop(sessions);

        tracing::info!(session_id = %session.id(), "Created session");
        session
    }

    /// Look up a live session and record activity on it.
    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        let session = self.inner.sessions.read().get(id).cloned()?;
        session.touch();
        Some(session)
    }

    /// Resume `id` if it is still live, otherwise start a new session.
    pub fn get_or_create(&self, id: Option<&SessionId>) -> Arc<Session> {
        id.and_then(|id| self.get(id))
            .unwrap_or_else(|| self.create())
    }

    /// Remove a session and delete all of its blobs.
    ///
    /// Returns whether the session existed.
    pub async fn destroy(&self, id: &SessionId) -> bool {
        let Some(session) = self.inner.sessions.write().remove(id) else {
            return false;
        };
        session.clear().await;
        tracing::info!(session_id = %id, "Destroyed session");
        true
    }

    // ---- queries --------------------------------------------------------

    pub fn session_count(&self) -> usize {
        self.inner.sessions.read().len()
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.inner.sessions.read().keys().cloned().collect()
    }

    // ---- cleanup --------------------------------------------------------

    /// Destroy sessions idle longer than the TTL.
    ///
    /// Returns the number of sessions destroyed.
    pub async fn purge_expired(&self) -> usize {
        let ttl = self.inner.ttl;
        let expired: Vec<SessionId> = self
            .inner
            .sessions
            .read()
            .iter()
            .filter(|(_, session)| session.idle_for() > ttl)
            .map(|(id, _)| id.clone())
            .collect();

        let mut count = 0;
        for id in expired {
            if self.destroy(&id).await {
                tracing::debug!(session_id = %id, "Purged expired session");
                count += 1;
            }
        }

        if count > 0 {
            tracing::info!(count, "Purged expired sessions");
        }
        count
    }

    /// Run [`SessionManager::purge_expired`] every `every` in the background.
    pub fn spawn_reaper(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                manager.purge_expired().await;
            }
        })
    }
}
