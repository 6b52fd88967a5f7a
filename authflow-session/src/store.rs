//! Session store - live login sessions keyed by id
//!
//! Every session sits behind its own [`SessionHandle`], so work on one
//! session never waits on another beyond the brief map lock.

use crate::types::LoginSession;
use crate::{SessionError, SessionResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, MutexGuard, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};

/// Why a session left the store while work on it may still be in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Explicit cancel by a caller
    Cancelled,
    /// Expired, or removed after its final status was read
    Evicted,
}

/// One live session plus its coordination primitives
#[derive(Debug)]
pub struct SessionHandle {
    id: String,
    expires_at: Instant,
    /// Session record; held only for short reads and writes
    record: Mutex<LoginSession>,
    /// Serialises mutating operations; `cancel` deliberately bypasses it
    operation: Mutex<()>,
    ended: watch::Sender<Option<SessionEnd>>,
}

impl SessionHandle {
    fn new(session: LoginSession, ttl: Duration) -> Self {
        let (ended, _) = watch::channel(None);
        Self {
            id: session.id.clone(),
            expires_at: Instant::now() + ttl,
            record: Mutex::new(session),
            operation: Mutex::new(()),
            ended,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    pub async fn record(&self) -> MutexGuard<'_, LoginSession> {
        self.record.lock().await
    }

    /// Exclusive right to run a mutating operation on this session
    pub async fn begin_operation(&self) -> MutexGuard<'_, ()> {
        self.operation.lock().await
    }

    /// Resolves with the reason once the session has ended
    pub async fn ended(&self) -> SessionEnd {
        let mut receiver = self.ended.subscribe();
        let reason = receiver
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|reason| *reason);
        match reason {
            Some(reason) => reason,
            // Sender lives as long as the handle; never reached while borrowed
            None => std::future::pending::<SessionEnd>().await,
        }
    }

    pub fn end_reason(&self) -> Option<SessionEnd> {
        *self.ended.borrow()
    }

    /// Record why the session ended; the first reason wins
    pub(crate) fn end(&self, reason: SessionEnd) {
        self.ended.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
    }
}

/// All live sessions
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Create a session in `initialized` under a fresh random id
    ///
    /// The record is fully built before it is published, so a concurrent
    /// `get` either misses it or sees it complete.
    pub async fn create(&self, account: &str) -> Arc<SessionHandle> {
        let mut sessions = self.sessions.write().await;

        let purged = Self::purge_expired_locked(&mut sessions);
        if purged > 0 {
            debug!("Purged {} expired sessions", purged);
        }

        let id = loop {
            let candidate = uuid::Uuid::new_v4().simple().to_string();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        let handle = Arc::new(SessionHandle::new(
            LoginSession::new(id.clone(), account.to_string(), self.ttl),
            self.ttl,
        ));
        sessions.insert(id.clone(), handle.clone());

        info!("Created login session {} for account {}", id, account);
        handle
    }

    /// Look up a live session; expired sessions are evicted and reported missing
    pub async fn get(&self, session_id: &str) -> SessionResult<Arc<SessionHandle>> {
        let handle = self
            .sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::not_found(session_id))?;

        if handle.is_expired() {
            debug!("Session {} expired", session_id);
            self.delete(session_id).await;
            return Err(SessionError::not_found(session_id));
        }

        Ok(handle)
    }

    /// Remove a session; removing an absent id is a no-op
    pub async fn delete(&self, session_id: &str) -> Option<Arc<SessionHandle>> {
        let removed = self.sessions.write().await.remove(session_id);
        if let Some(handle) = &removed {
            // Wake anything still waiting on a session that left the store
            handle.end(SessionEnd::Evicted);
        }
        removed
    }

    /// Drop every expired session, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        Self::purge_expired_locked(&mut sessions)
    }

    fn purge_expired_locked(sessions: &mut HashMap<String, Arc<SessionHandle>>) -> usize {
        let before = sessions.len();
        sessions.retain(|_, handle| {
            let keep = !handle.is_expired();
            if !keep {
                handle.end(SessionEnd::Evicted);
            }
            keep
        });
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authflow_core::SessionState;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_create_and_get() {
        let store = SessionStore::new(Duration::from_secs(300));
        let handle = store.create("default").await;

        let fetched = store.get(handle.id()).await.unwrap();
        let record = fetched.record().await;
        assert_eq!(record.state, SessionState::Initialized);
        assert_eq!(record.account, "default");
        assert_eq!(record.id, handle.id());
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let store = SessionStore::new(Duration::from_secs(300));
        let mut ids = HashSet::new();
        for _ in 0..200 {
            let handle = store.create("default").await;
            assert!(!handle.id().is_empty());
            assert!(ids.insert(handle.id().to_string()));
        }
        assert_eq!(store.len().await, 200);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = SessionStore::new(Duration::from_secs(300));
        let handle = store.create("default").await;

        assert!(store.delete(handle.id()).await.is_some());
        assert!(store.delete(handle.id()).await.is_none());
        assert!(store.get(handle.id()).await.unwrap_err().is_not_found());
        assert_eq!(handle.end_reason(), Some(SessionEnd::Evicted));
    }

    #[tokio::test]
    async fn test_end_reason_wakes_waiters() {
        let store = SessionStore::new(Duration::from_secs(300));
        let handle = store.create("default").await;

        let mut waiter = tokio_test::task::spawn(handle.ended());
        tokio_test::assert_pending!(waiter.poll());

        handle.end(SessionEnd::Cancelled);
        store.delete(handle.id()).await;
        assert!(waiter.is_woken());
        // The first reason sticks
        assert_eq!(
            tokio_test::assert_ready!(waiter.poll()),
            SessionEnd::Cancelled
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_sessions_are_not_found() {
        let store = SessionStore::new(Duration::from_secs(10));
        let stale = store.create("default").await;

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(store.get(stale.id()).await.unwrap_err().is_not_found());

        let fresh = store.create("default").await;
        let _other = store.create("other").await;
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.purge_expired().await, 2);
        assert!(store.is_empty().await);
        assert_eq!(fresh.end_reason(), Some(SessionEnd::Evicted));
    }
}
